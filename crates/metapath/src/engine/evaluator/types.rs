//! `instance of`, `treat as`, `cast as` and `castable as`.

use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::item::{AtomicValue, Sequence};
use crate::types::{AtomicType, SequenceType};

pub(super) fn instance_of(value: &Sequence, ty: &SequenceType, ctx: &DynamicContext) -> Result<Sequence, Error> {
    let matches = ty.matches(value, ctx.static_context())?;
    Ok(Sequence::of(AtomicValue::Boolean(matches)))
}

pub(super) fn treat_as(value: Sequence, ty: &SequenceType, ctx: &DynamicContext) -> Result<Sequence, Error> {
    if ty.matches(&value, ctx.static_context())? {
        Ok(value)
    } else {
        Err(Error::from_code(
            ErrorCode::MPDY0050,
            format!("{} does not match the required type {}", value.signature(), ty.signature()),
        ))
    }
}

fn cast_operand(value: &Sequence, target: AtomicType, allow_empty: bool) -> Result<Option<AtomicValue>, Error> {
    let mut values = value.atomize()?;
    match values.len() {
        0 if allow_empty => Ok(None),
        1 => Ok(values.pop()),
        n => Err(Error::type_error(format!(
            "cast to {} requires a single value{}, found {n} values",
            target.signature(),
            if allow_empty { " or an empty sequence" } else { "" }
        ))),
    }
}

pub(super) fn cast_as(
    value: &Sequence,
    target: AtomicType,
    allow_empty: bool,
    ctx: &DynamicContext,
) -> Result<Sequence, Error> {
    match cast_operand(value, target, allow_empty)? {
        Some(v) => Ok(Sequence::of(ctx.static_context().adapters.cast(&v, target)?)),
        None => Ok(Sequence::empty()),
    }
}

pub(super) fn castable_as(
    value: &Sequence,
    target: AtomicType,
    allow_empty: bool,
    ctx: &DynamicContext,
) -> Result<Sequence, Error> {
    let castable = match cast_operand(value, target, allow_empty) {
        Ok(Some(v)) => ctx.static_context().adapters.cast(&v, target).is_ok(),
        Ok(None) => true,
        Err(_) => false,
    };
    Ok(Sequence::of(AtomicValue::Boolean(castable)))
}
