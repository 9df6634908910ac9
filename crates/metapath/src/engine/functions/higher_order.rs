use super::common::{count, function, function_arg, integer_arg, items, one, opt, string, string_arg};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::{Error, ErrorCode, NameRole};
use crate::item::{AtomicValue, FunctionItem, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    b.register(FN, "for-each", &[items(), function()], items(), for_each)
        .register(FN, "filter", &[items(), function()], items(), filter)
        .register(FN, "fold-left", &[items(), items(), function()], items(), fold_left)
        .register(FN, "function-arity", &[function()], one(AtomicType::Integer), function_arity)
        .register(FN, "function-name", &[function()], opt(AtomicType::String), function_name)
        .register(
            FN,
            "function-lookup",
            &[one(AtomicType::String), one(AtomicType::Integer)],
            SequenceType::optional(ItemType::AnyFunction),
            function_lookup,
        );
}

fn for_each(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let f = function_arg(&args[1])?;
    let mut out = Sequence::empty();
    for item in args[0].iter() {
        out.append(ctx.invoke(f, vec![Sequence::of(item.clone())])?);
    }
    Ok(out)
}

/// Result of a predicate function, which must be a single boolean.
pub(super) fn predicate_result(result: &Sequence) -> Result<bool, Error> {
    match result.items() {
        [item] => item.as_atomic().and_then(AtomicValue::as_bool).ok_or_else(|| {
            Error::type_error(format!(
                "a filter predicate must return a boolean, found {}",
                result.signature()
            ))
        }),
        _ => Err(Error::type_error(format!(
            "a filter predicate must return exactly one boolean, found {}",
            result.signature()
        ))),
    }
}

fn filter(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let f = function_arg(&args[1])?;
    let mut out = Sequence::empty();
    for item in args[0].iter() {
        let keep = ctx.invoke(f, vec![Sequence::of(item.clone())])?;
        if predicate_result(&keep)? {
            out.push(item.clone());
        }
    }
    Ok(out)
}

fn fold_left(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let f = function_arg(&args[2])?;
    args[0].iter().try_fold(args[1].clone(), |acc, item| {
        ctx.invoke(f, vec![acc, Sequence::of(item.clone())])
    })
}

fn function_arity(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(count(function_arg(&args[0])?.arity()))
}

/// The EQName of a named function; anonymous functions, maps and arrays
/// have none.
fn function_name(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(function_arg(&args[0])?
        .name()
        .map(|name| string(name.to_eqname()))
        .unwrap_or_default())
}

/// The named function with the given EQName or lexical QName and arity, or
/// the empty sequence when the library has none.
fn function_lookup(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let static_ctx = ctx.static_context();
    let name = static_ctx.expand_lexical(&string_arg(&args[0]), NameRole::Function)?;
    let arity = usize::try_from(integer_arg(&args[1])?).unwrap_or(usize::MAX);
    match static_ctx.functions.resolve(&name, arity) {
        Ok(signature) => Ok(Sequence::of(FunctionItem::Named(signature))),
        Err(e) if e.code == ErrorCode::MPST0017 => Ok(Sequence::empty()),
        Err(e) => Err(e),
    }
}
