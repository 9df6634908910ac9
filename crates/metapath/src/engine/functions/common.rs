//! Helpers shared by the function implementations.

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{ArrayItem, AtomicValue, FunctionItem, Item, MapItem, Sequence};
use crate::model::NodeRef;
use crate::types::{AtomicType, ItemType, Occurrence, SequenceType};

use super::CallContext;

// ===== Parameter and return types =====

pub(super) fn one(ty: AtomicType) -> SequenceType {
    SequenceType::atomic(ty, Occurrence::One)
}

pub(super) fn opt(ty: AtomicType) -> SequenceType {
    SequenceType::atomic(ty, Occurrence::ZeroOrOne)
}

pub(super) fn many(ty: AtomicType) -> SequenceType {
    SequenceType::atomic(ty, Occurrence::ZeroOrMore)
}

pub(super) fn items() -> SequenceType {
    SequenceType::any()
}

pub(super) fn opt_node() -> SequenceType {
    SequenceType::optional(ItemType::any_node())
}

pub(super) fn function() -> SequenceType {
    SequenceType::one(ItemType::AnyFunction)
}

pub(super) fn map() -> SequenceType {
    SequenceType::one(ItemType::Map(None))
}

pub(super) fn array() -> SequenceType {
    SequenceType::one(ItemType::Array(None))
}

// ===== Results =====

pub(super) fn boolean(b: bool) -> Sequence {
    Sequence::of(AtomicValue::Boolean(b))
}

pub(super) fn integer(i: i64) -> Sequence {
    Sequence::of(AtomicValue::Integer(i))
}

pub(super) fn string(s: impl Into<String>) -> Sequence {
    Sequence::of(AtomicValue::String(s.into()))
}

pub(super) fn count(n: usize) -> Sequence {
    integer(i64::try_from(n).unwrap_or(i64::MAX))
}

// ===== Arguments =====

/// The single atomic value of a converted zero-or-one argument.
pub(super) fn opt_atomic(arg: &Sequence) -> Option<&AtomicValue> {
    arg.items().first().and_then(Item::as_atomic)
}

/// Text of a zero-or-one string argument; empty becomes `""`.
pub(super) fn string_arg(arg: &Sequence) -> String {
    opt_atomic(arg).map(AtomicValue::lexical).unwrap_or_default()
}

pub(super) fn opt_string(arg: &Sequence) -> Option<String> {
    opt_atomic(arg).map(AtomicValue::lexical)
}

pub(super) fn integer_arg(arg: &Sequence) -> Result<i64, Error> {
    opt_atomic(arg)
        .and_then(AtomicValue::as_i64)
        .ok_or_else(|| Error::type_error(format!("expected an integer, found {}", arg.signature())))
}

pub(super) fn function_arg(arg: &Sequence) -> Result<&FunctionItem, Error> {
    match arg.items() {
        [Item::Function(f)] => Ok(f),
        _ => Err(Error::type_error(format!(
            "expected a function item, found {}",
            arg.signature()
        ))),
    }
}

pub(super) fn array_arg(arg: &Sequence) -> Result<&ArrayItem, Error> {
    match arg.items() {
        [Item::Function(FunctionItem::Array(a))] => Ok(a),
        _ => Err(Error::type_error(format!("expected an array, found {}", arg.signature()))),
    }
}

pub(super) fn map_arg(arg: &Sequence) -> Result<&MapItem, Error> {
    match arg.items() {
        [Item::Function(FunctionItem::Map(m))] => Ok(m),
        _ => Err(Error::type_error(format!("expected a map, found {}", arg.signature()))),
    }
}

/// Argument `index` when supplied, else the context item (for the
/// zero-argument forms of focus-dependent functions).
pub(super) fn arg_or_context(ctx: &CallContext<'_>, args: &[Sequence], index: usize) -> Result<Sequence, Error> {
    match args.get(index) {
        Some(arg) => Ok(arg.clone()),
        None => Ok(Sequence::of(ctx.context_item()?.clone())),
    }
}

/// Node from an optional argument or the context item.
pub(super) fn node_or_context(
    ctx: &CallContext<'_>,
    args: &[Sequence],
    index: usize,
) -> Result<Option<NodeRef>, Error> {
    let value = arg_or_context(ctx, args, index)?;
    match value.first_item(true)? {
        None => Ok(None),
        Some(Item::Node(n)) => Ok(Some(n.clone())),
        Some(other) => Err(Error::from_code(
            ErrorCode::MPTY0004,
            format!("expected a node, found {}", other.signature()),
        )),
    }
}

/// A numeric position argument rounded half up, as `subsequence` and
/// `substring` use it. NaN stays NaN.
pub(super) fn position_arg(v: &AtomicValue) -> Result<f64, Error> {
    crate::engine::evaluator::numeric::require_numeric(v).map(|n| (n.to_f64() + 0.5).floor())
}
