//! Built-in function library.
//!
//! Registration conventions:
//! - One registration per function name with an arity range; implementations
//!   dispatch on `args.len()` when a parameter is optional.
//! - Variadic functions (`max_arity == None`) repeat the type of their last
//!   declared parameter.
//! - Parameter types drive the argument conversion applied by the evaluator
//!   before an implementation runs, so implementations may assume atomized,
//!   cardinality-checked arguments for atomic parameters.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use smallvec::SmallVec;

use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus, StaticContext};
use crate::item::{FunctionItem, Item, Sequence};
use crate::model::QName;
use crate::types::SequenceType;

mod arrays;
mod boolean;
mod common;
mod constructors;
mod datetime;
mod higher_order;
mod maps;
mod metapath;
mod nodes;
mod numeric;
mod sequences;
mod strings;

pub type FunctionImpl =
    Arc<dyn Fn(&mut CallContext<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync>;

/// Environment handed to a function implementation.
pub struct CallContext<'a> {
    pub dynamic: &'a mut DynamicContext,
    pub focus: &'a Focus,
}

impl CallContext<'_> {
    pub fn static_context(&self) -> Arc<StaticContext> {
        Arc::clone(self.dynamic.static_context())
    }

    pub fn context_item(&self) -> Result<&Item, Error> {
        self.focus.context_item()
    }

    /// Calls a function item with already evaluated arguments.
    pub fn invoke(&mut self, function: &FunctionItem, args: Vec<Sequence>) -> Result<Sequence, Error> {
        crate::engine::evaluator::invoke_function_item(self.dynamic, function, args)
    }
}

struct Overload {
    min_arity: usize,
    max_arity: Option<usize>,
    params: SmallVec<[SequenceType; 4]>,
    return_type: SequenceType,
    implementation: FunctionImpl,
}

impl Overload {
    fn accepts(&self, arity: usize) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|max| arity <= max)
    }

    fn param_type(&self, index: usize) -> SequenceType {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .cloned()
            .unwrap_or_else(SequenceType::any)
    }
}

/// A function bound to one concrete arity.
pub struct FunctionSignature {
    pub name: QName,
    pub params: Vec<SequenceType>,
    pub return_type: SequenceType,
    implementation: FunctionImpl,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn invoke(&self, ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
        (self.implementation)(ctx, args)
    }

    /// `name(type, ..) as type`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(SequenceType::signature)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}({params}) as {}",
            self.name.to_eqname(),
            self.return_type.signature()
        )
    }
}

impl fmt::Debug for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Immutable table of functions keyed by expanded name.
pub struct FunctionLibrary {
    functions: HashMap<QName, Vec<Overload>>,
}

static STANDARD: LazyLock<Arc<FunctionLibrary>> = LazyLock::new(|| {
    Arc::new(
        FunctionLibrary::builder()
            .with_standard_functions()
            .build(),
    )
});

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl FunctionLibrary {
    pub fn builder() -> FunctionLibraryBuilder {
        FunctionLibraryBuilder::default()
    }

    /// The process-wide library of built-in functions.
    pub fn standard() -> Arc<FunctionLibrary> {
        Arc::clone(&STANDARD)
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Binds `name` at `arity`, or fails with `MPST0017`.
    pub fn resolve(&self, name: &QName, arity: usize) -> Result<Arc<FunctionSignature>, Error> {
        let Some(overloads) = self.functions.get(name) else {
            return Err(Error::from_code(
                ErrorCode::MPST0017,
                format!("no function named {} is defined", name.to_eqname()),
            ));
        };
        let Some(overload) = overloads.iter().find(|o| o.accepts(arity)) else {
            let mut arities: Vec<String> = overloads
                .iter()
                .map(|o| match o.max_arity {
                    Some(max) if max == o.min_arity => max.to_string(),
                    Some(max) => format!("{}..{max}", o.min_arity),
                    None => format!("{}..", o.min_arity),
                })
                .collect();
            arities.sort();
            return Err(Error::from_code(
                ErrorCode::MPST0017,
                format!(
                    "function {} does not accept {arity} argument(s); known arities: {}",
                    name.to_eqname(),
                    arities.join(", ")
                ),
            ));
        };
        Ok(Arc::new(FunctionSignature {
            name: name.clone(),
            params: (0..arity).map(|i| overload.param_type(i)).collect(),
            return_type: overload.return_type.clone(),
            implementation: Arc::clone(&overload.implementation),
        }))
    }
}

#[derive(Default)]
pub struct FunctionLibraryBuilder {
    functions: HashMap<QName, Vec<Overload>>,
}

impl FunctionLibraryBuilder {
    /// Registers a function whose arity is the number of declared parameters.
    pub fn register<F>(
        &mut self,
        ns: &str,
        local: &str,
        params: &[SequenceType],
        return_type: SequenceType,
        f: F,
    ) -> &mut Self
    where
        F: Fn(&mut CallContext<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
    {
        self.register_range(ns, local, params.len(), Some(params.len()), params, return_type, f)
    }

    /// Registers a function accepting `min..=max` arguments (`max == None` is variadic).
    #[allow(clippy::too_many_arguments)]
    pub fn register_range<F>(
        &mut self,
        ns: &str,
        local: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        params: &[SequenceType],
        return_type: SequenceType,
        f: F,
    ) -> &mut Self
    where
        F: Fn(&mut CallContext<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
    {
        let overloads = self.functions.entry(QName::new(Some(ns), local)).or_default();
        overloads.push(Overload {
            min_arity,
            max_arity,
            params: params.iter().cloned().collect(),
            return_type,
            implementation: Arc::new(f),
        });
        // most specific first: higher minimum, then bounded before variadic
        overloads.sort_by(|a, b| {
            b.min_arity
                .cmp(&a.min_arity)
                .then_with(|| match (a.max_arity, b.max_arity) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });
        self
    }

    pub fn with_standard_functions(mut self) -> Self {
        boolean::register(&mut self);
        strings::register(&mut self);
        sequences::register(&mut self);
        numeric::register(&mut self);
        nodes::register(&mut self);
        datetime::register(&mut self);
        higher_order::register(&mut self);
        arrays::register(&mut self);
        maps::register(&mut self);
        metapath::register(&mut self);
        constructors::register(&mut self);
        self
    }

    pub fn build(self) -> FunctionLibrary {
        tracing::debug!(functions = self.functions.len(), "built function library");
        FunctionLibrary {
            functions: self.functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::NS_METAPATH_FUNCTIONS;

    #[test]
    fn resolves_by_arity_range() {
        let lib = FunctionLibrary::standard();
        let name = QName::new(Some(NS_METAPATH_FUNCTIONS), "substring");
        assert_eq!(lib.resolve(&name, 2).unwrap().arity(), 2);
        assert_eq!(lib.resolve(&name, 3).unwrap().arity(), 3);
        let err = lib.resolve(&name, 4).unwrap_err();
        assert_eq!(err.code, ErrorCode::MPST0017);
    }

    #[test]
    fn variadic_functions_repeat_last_parameter() {
        let lib = FunctionLibrary::standard();
        let concat = lib
            .resolve(&QName::new(Some(NS_METAPATH_FUNCTIONS), "concat"), 5)
            .unwrap();
        assert_eq!(concat.params.len(), 5);
    }
}
