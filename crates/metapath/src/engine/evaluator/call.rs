//! Static and dynamic function calls, function items and argument conversion.

use std::sync::Arc;

use crate::compiler::expr::{Expr, InlineFunctionDef};
use crate::engine::functions::{CallContext, FunctionSignature};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus};
use crate::item::{AtomicValue, FunctionItem, InlineClosure, Item, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

/// Target type an untyped argument is cast to for a parameter of type `target`.
fn untyped_target(target: AtomicType) -> Option<AtomicType> {
    match target {
        AtomicType::AnyAtomic | AtomicType::UntypedAtomic => None,
        AtomicType::Numeric => Some(AtomicType::Double),
        other => Some(other),
    }
}

/// Promotes a numeric or URI value to the parameter type where permitted.
fn promote(value: AtomicValue, target: AtomicType, ctx: &DynamicContext) -> Result<AtomicValue, Error> {
    let ty = value.atomic_type();
    if ty.is_subtype_of(target) {
        return Ok(value);
    }
    let promotable = match target {
        AtomicType::Double | AtomicType::Decimal => ty.is_numeric(),
        AtomicType::String => ty.is_subtype_of(AtomicType::UriReference),
        _ => false,
    };
    if promotable {
        ctx.static_context().adapters.cast(&value, target)
    } else {
        Ok(value)
    }
}

/// Applies the function conversion rules to one argument: atomization,
/// casting of untyped values, numeric and URI promotion, then the
/// occurrence and item type checks.
pub(crate) fn convert_argument(
    arg: Sequence,
    param: &SequenceType,
    ctx: &DynamicContext,
    what: &dyn Fn() -> String,
) -> Result<Sequence, Error> {
    let ItemType::Atomic(target) = param.item_type else {
        param.occurrence.check(arg.size()).map_err(|e| describe(e, what))?;
        if !param.matches(&arg, ctx.static_context())? {
            return Err(Error::type_error(format!(
                "{}: {} does not match the required type {}",
                what(),
                arg.signature(),
                param.signature()
            )));
        }
        return Ok(arg);
    };
    let mut converted = Vec::with_capacity(arg.size());
    for value in arg.atomize()? {
        let value = match (&value, untyped_target(target)) {
            (AtomicValue::UntypedAtomic(_), Some(cast_to)) => {
                ctx.static_context().adapters.cast(&value, cast_to)?
            }
            _ => promote(value, target, ctx)?,
        };
        if !value.atomic_type().is_subtype_of(target) {
            return Err(Error::type_error(format!(
                "{}: {} is not an instance of {}",
                what(),
                value.signature(),
                target.signature()
            )));
        }
        converted.push(value);
    }
    param.occurrence.check(converted.len()).map_err(|e| describe(e, what))?;
    Ok(Sequence::from_atomics(converted))
}

fn describe(e: Error, what: &dyn Fn() -> String) -> Error {
    Error::from_code(e.code, format!("{}: {}", what(), e.message))
}

fn convert_arguments(
    signature: &FunctionSignature,
    args: Vec<Sequence>,
    ctx: &DynamicContext,
) -> Result<Vec<Sequence>, Error> {
    args.into_iter()
        .zip(&signature.params)
        .enumerate()
        .map(|(index, (arg, param))| {
            convert_argument(arg, param, ctx, &|| {
                format!("argument {} of {}", index + 1, signature.name.to_eqname())
            })
        })
        .collect()
}

/// Static call to a built-in function; the caller's focus is passed through
/// for focus-dependent functions.
pub(super) fn function_call(
    function: &Arc<FunctionSignature>,
    args: &[Expr],
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
        evaluated.push(arg.accept(ctx, focus)?);
    }
    let evaluated = convert_arguments(function, evaluated, ctx)?;
    let mut call = CallContext { dynamic: ctx, focus };
    function.invoke(&mut call, &evaluated)
}

/// `base(args)`: the base must evaluate to exactly one function item.
pub(super) fn dynamic_call(
    base: &Expr,
    args: &[Expr],
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let target = base.accept(ctx, focus)?;
    let function = match target.items() {
        [Item::Function(f)] => f.clone(),
        _ => {
            return Err(Error::type_error(format!(
                "a dynamic function call requires a single function item, found {}",
                target.signature()
            )));
        }
    };
    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
        evaluated.push(arg.accept(ctx, focus)?);
    }
    invoke_function_item(ctx, &function, evaluated)
}

/// Calls any function item with already evaluated arguments.
pub(crate) fn invoke_function_item(
    ctx: &mut DynamicContext,
    function: &FunctionItem,
    args: Vec<Sequence>,
) -> Result<Sequence, Error> {
    if args.len() != function.arity() {
        return Err(Error::type_error(format!(
            "{} expects {} argument(s), but {} were supplied",
            function.signature(),
            function.arity(),
            args.len()
        )));
    }
    match function {
        FunctionItem::Named(signature) => {
            let args = convert_arguments(signature, args, ctx)?;
            let focus = Focus::none();
            let mut call = CallContext { dynamic: ctx, focus: &focus };
            signature.invoke(&mut call, &args)
        }
        FunctionItem::Inline(closure) => invoke_inline(ctx, closure, args),
        FunctionItem::Map(map) => {
            let key = single_key(&args[0])?;
            Ok(map.get(&key).cloned().unwrap_or_default())
        }
        FunctionItem::Array(array) => {
            let key = single_key(&args[0])?;
            array_member(array, &key).cloned()
        }
    }
}

fn invoke_inline(
    ctx: &DynamicContext,
    closure: &InlineClosure,
    args: Vec<Sequence>,
) -> Result<Sequence, Error> {
    let definition = &closure.definition;
    let mut locals = closure.captured.clone();
    for (index, ((name, ty), arg)) in definition.params.iter().zip(args).enumerate() {
        let arg = convert_argument(arg, ty, ctx, &|| {
            format!("argument {} of inline function ${}", index + 1, name.local_name())
        })?;
        locals.push((name.clone(), arg));
    }
    let mut inner = ctx.isolated(Arc::clone(&closure.static_ctx), locals);
    let result = definition.body.accept(&mut inner, &Focus::none())?;
    convert_argument(result, &definition.return_type, ctx, &|| {
        "result of inline function".to_string()
    })
}

pub(super) fn inline_function(definition: &Arc<InlineFunctionDef>, ctx: &DynamicContext) -> Sequence {
    Sequence::of(FunctionItem::Inline(Arc::new(InlineClosure {
        definition: Arc::clone(definition),
        captured: ctx.local_bindings().to_vec(),
        static_ctx: Arc::clone(ctx.static_context()),
    })))
}

pub(super) fn single_key(arg: &Sequence) -> Result<AtomicValue, Error> {
    arg.atomize_optional()?
        .ok_or_else(|| Error::type_error("a key of exactly one atomic value is required"))
}

/// 1-based array member access.
pub(super) fn array_member<'a>(
    array: &'a crate::item::ArrayItem,
    key: &AtomicValue,
) -> Result<&'a Sequence, Error> {
    let Some(position) = key.as_i64() else {
        return Err(Error::type_error(format!(
            "array positions must be integers, found {}",
            key.signature()
        )));
    };
    array.get(position).ok_or_else(|| {
        Error::from_code(
            ErrorCode::FOAY0001,
            format!("array index {position} is out of bounds for an array of size {}", array.size()),
        )
    })
}
