//! Compilation of query text into an executable [`CompiledExpression`].
//!
//! ```
//! use metaschema_metapath::compiler::compile_metapath;
//! use metaschema_metapath::engine::runtime::DynamicContext;
//!
//! let expr = compile_metapath("2 to 5").unwrap();
//! let mut ctx = DynamicContext::default();
//! assert_eq!(expr.evaluate(None, &mut ctx).unwrap().size(), 4);
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use lru::LruCache;

use crate::engine::runtime::{DynamicContext, Error, Focus, StaticContext};
use crate::item::{Item, Sequence};
use crate::parser::parse_metapath;
use crate::types::ItemType;

mod builder;
pub mod expr;
mod static_type;

pub use expr::{Expr, ExprKind};

static DEFAULT_STATIC_CONTEXT: LazyLock<Arc<StaticContext>> =
    LazyLock::new(|| Arc::new(StaticContext::default()));

/// Compile using the default static context.
pub fn compile_metapath(text: &str) -> Result<CompiledExpression, Error> {
    compile_inner(text, &DEFAULT_STATIC_CONTEXT)
}

/// Compile with an explicitly provided static context.
pub fn compile_metapath_with_context(
    text: &str,
    static_ctx: &Arc<StaticContext>,
) -> Result<CompiledExpression, Error> {
    compile_inner(text, static_ctx)
}

fn compile_inner(text: &str, static_ctx: &Arc<StaticContext>) -> Result<CompiledExpression, Error> {
    let ast = parse_metapath(text)?;
    let root = builder::Builder::new(static_ctx).lower_expr(&ast)?;
    tracing::debug!(
        expr = %text,
        static_type = %root.static_result_type().signature(),
        "compiled metapath"
    );
    Ok(CompiledExpression {
        text: text.to_string(),
        root,
        static_ctx: Arc::clone(static_ctx),
    })
}

/// An immutable, thread-shareable compiled query.
#[derive(Debug)]
pub struct CompiledExpression {
    text: String,
    root: Expr,
    static_ctx: Arc<StaticContext>,
}

impl CompiledExpression {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn static_result_type(&self) -> &ItemType {
        self.root.static_result_type()
    }

    pub fn static_context(&self) -> &Arc<StaticContext> {
        &self.static_ctx
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluates with `focus` as the context item (position and size 1).
    pub fn evaluate(&self, focus: Option<Item>, ctx: &mut DynamicContext) -> Result<Sequence, Error> {
        let focus = focus.map_or_else(Focus::none, Focus::of);
        let mark = ctx.scope_mark();
        let result = ctx.with_static_context(&self.static_ctx, |ctx| self.root.accept(ctx, &focus));
        ctx.restore_scope(mark);
        if let Ok(seq) = &result {
            tracing::debug!(expr = %self.text, size = seq.size(), "evaluated metapath");
        }
        result
    }

    /// Effective boolean value of the result.
    pub fn evaluate_boolean(&self, focus: Option<Item>, ctx: &mut DynamicContext) -> Result<bool, Error> {
        self.evaluate(focus, ctx)?.ebv()
    }

    /// String value of a zero-or-one result; empty yields `""`.
    pub fn evaluate_string(&self, focus: Option<Item>, ctx: &mut DynamicContext) -> Result<String, Error> {
        let seq = self.evaluate(focus, ctx)?;
        match seq.first_item(true)? {
            Some(item) => item.string_value(),
            None => Ok(String::new()),
        }
    }

    /// The single result item, or `None` for an empty result.
    pub fn evaluate_single(
        &self,
        focus: Option<Item>,
        ctx: &mut DynamicContext,
    ) -> Result<Option<Item>, Error> {
        let seq = self.evaluate(focus, ctx)?;
        Ok(seq.first_item(true)?.cloned())
    }
}

/// Compiler bound to one static context, optionally memoising compiled
/// expressions by query text.
pub struct MetapathCompiler {
    static_ctx: Arc<StaticContext>,
    cache: Option<Mutex<LruCache<String, Arc<CompiledExpression>>>>,
}

impl MetapathCompiler {
    pub fn new(static_ctx: Arc<StaticContext>) -> Self {
        Self {
            static_ctx,
            cache: None,
        }
    }

    /// Keeps up to `capacity` compiled expressions; zero disables caching.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(|n| Mutex::new(LruCache::new(n)));
        self
    }

    pub fn static_context(&self) -> &Arc<StaticContext> {
        &self.static_ctx
    }

    pub fn compile(&self, text: &str) -> Result<Arc<CompiledExpression>, Error> {
        let Some(cache) = &self.cache else {
            return compile_inner(text, &self.static_ctx).map(Arc::new);
        };
        if let Some(hit) = cache.lock().unwrap_or_else(PoisonError::into_inner).get(text) {
            tracing::debug!(expr = %text, "compiled expression cache hit");
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(compile_inner(text, &self.static_ctx)?);
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(text.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl Default for MetapathCompiler {
    fn default() -> Self {
        Self::new(Arc::clone(&DEFAULT_STATIC_CONTEXT))
    }
}

/// Compiles `text` against the static context active in `ctx`; used by
/// functions that take query text as an argument.
pub(crate) fn compile_in_context(text: &str, ctx: &DynamicContext) -> Result<CompiledExpression, Error> {
    compile_inner(text, ctx.static_context()).map_err(|e| {
        Error::from_code(
            e.code,
            format!("unable to compile '{text}': {}", e.message),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::ErrorCode;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiled_expressions_are_shareable() {
        assert_send_sync::<CompiledExpression>();
        assert_send_sync::<MetapathCompiler>();
    }

    #[test]
    fn cache_returns_same_instance() {
        let compiler = MetapathCompiler::default().with_cache_capacity(4);
        let a = compiler.compile("1 + 2").unwrap();
        let b = compiler.compile("1 + 2").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_variable_is_static_error() {
        let err = compile_metapath("$nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::MPST0008);
    }
}
