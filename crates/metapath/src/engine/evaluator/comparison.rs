//! Atomic value comparison for the value and general comparison families.

use std::cmp::Ordering;

use super::arithmetic::{date_instant, date_time_instant, time_instant};
use super::numeric::{self, classify};
use crate::compiler::expr::{ComparisonOp, NodeComp};
use crate::engine::runtime::{DynamicContext, Error};
use crate::item::{AtomicValue, Sequence};
use crate::types::AtomicType;

/// Result of relating two comparable atomic values.
enum Relation {
    Ordered(Ordering),
    /// NaN was involved: every operator but `ne` is false.
    Unordered,
    /// Only equality is defined for the pair.
    Equality(bool),
}

fn incomparable(a: &AtomicValue, b: &AtomicValue) -> Error {
    Error::type_error(format!("cannot compare {} with {}", a.signature(), b.signature()))
}

fn duration_parts(v: &AtomicValue) -> Option<(i64, Option<i64>)> {
    match v {
        AtomicValue::Duration { months, delta } => Some((i64::from(*months), delta.num_nanoseconds())),
        AtomicValue::DayTimeDuration(delta) => Some((0, delta.num_nanoseconds())),
        AtomicValue::YearMonthDuration(months) => Some((i64::from(*months), Some(0))),
        _ => None,
    }
}

fn relate(a: &AtomicValue, b: &AtomicValue, ctx: &DynamicContext) -> Result<Relation, Error> {
    let (ta, tb) = (a.atomic_type(), b.atomic_type());
    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return Ok(numeric::compare(x, y).map_or(Relation::Unordered, Relation::Ordered));
    }
    if ta.is_string_like() && tb.is_string_like() {
        let (x, y) = (a.as_str().unwrap_or_default(), b.as_str().unwrap_or_default());
        return Ok(Relation::Ordered(x.cmp(y)));
    }
    let tz = ctx.implicit_timezone();
    let temporal = |t: AtomicType| match t {
        AtomicType::DateWithTimezone => AtomicType::Date,
        AtomicType::DateTimeWithTimezone => AtomicType::DateTime,
        other => other,
    };
    let relation = match (a, b) {
        (AtomicValue::Boolean(x), AtomicValue::Boolean(y)) => Relation::Ordered(x.cmp(y)),
        _ if temporal(ta) == AtomicType::Date && temporal(tb) == AtomicType::Date => {
            Relation::Ordered(date_instant(a, tz)?.cmp(&date_instant(b, tz)?))
        }
        _ if temporal(ta) == AtomicType::DateTime && temporal(tb) == AtomicType::DateTime => {
            Relation::Ordered(date_time_instant(a, tz)?.cmp(&date_time_instant(b, tz)?))
        }
        (AtomicValue::Time { .. }, AtomicValue::Time { .. }) => {
            Relation::Ordered(time_instant(a, tz)?.cmp(&time_instant(b, tz)?))
        }
        (AtomicValue::DayTimeDuration(x), AtomicValue::DayTimeDuration(y)) => Relation::Ordered(x.cmp(y)),
        (AtomicValue::YearMonthDuration(x), AtomicValue::YearMonthDuration(y)) => {
            Relation::Ordered(x.cmp(y))
        }
        _ if ta.is_duration() && tb.is_duration() => {
            Relation::Equality(duration_parts(a) == duration_parts(b))
        }
        (AtomicValue::Base64(x), AtomicValue::Base64(y)) => Relation::Equality(x == y),
        (AtomicValue::IpV4Address(x), AtomicValue::IpV4Address(y)) => Relation::Ordered(x.cmp(y)),
        (AtomicValue::IpV6Address(x), AtomicValue::IpV6Address(y)) => Relation::Ordered(x.cmp(y)),
        _ => return Err(incomparable(a, b)),
    };
    Ok(relation)
}

fn test(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
    }
}

/// Compares two atomic values with value-comparison semantics; untyped
/// operands compare as strings.
pub(crate) fn compare_atomic(
    a: &AtomicValue,
    op: ComparisonOp,
    b: &AtomicValue,
    ctx: &DynamicContext,
) -> Result<bool, Error> {
    match relate(a, b, ctx)? {
        Relation::Ordered(ordering) => Ok(test(op, ordering)),
        Relation::Unordered => Ok(op == ComparisonOp::Ne),
        Relation::Equality(equal) => match op {
            ComparisonOp::Eq => Ok(equal),
            ComparisonOp::Ne => Ok(!equal),
            _ => Err(incomparable(a, b)),
        },
    }
}

/// `eq ne lt le gt ge`: singleton operands, empty in empty out.
pub(crate) fn value_comparison(
    left: &Sequence,
    op: ComparisonOp,
    right: &Sequence,
    ctx: &DynamicContext,
) -> Result<Sequence, Error> {
    let (Some(a), Some(b)) = (left.atomize_optional()?, right.atomize_optional()?) else {
        return Ok(Sequence::empty());
    };
    Ok(Sequence::of(AtomicValue::Boolean(compare_atomic(&a, op, &b, ctx)?)))
}

/// Converts an untyped operand for a general comparison against `other`.
fn general_operand(
    v: &AtomicValue,
    other: &AtomicValue,
    ctx: &DynamicContext,
) -> Result<AtomicValue, Error> {
    let AtomicValue::UntypedAtomic(_) = v else {
        return Ok(v.clone());
    };
    let target = other.atomic_type();
    let adapters = &ctx.static_context().adapters;
    if target.is_numeric() {
        adapters.cast(v, AtomicType::Double)
    } else if target.is_string_like() {
        adapters.cast(v, AtomicType::String)
    } else {
        adapters.cast(v, target)
    }
}

/// `= != < <= > >=`: true when any pairing of the atomized operands satisfies
/// the value comparison.
pub(crate) fn general_comparison(
    left: &Sequence,
    op: ComparisonOp,
    right: &Sequence,
    ctx: &DynamicContext,
) -> Result<bool, Error> {
    let (lhs, rhs) = (left.atomize()?, right.atomize()?);
    for a in &lhs {
        for b in &rhs {
            let x = general_operand(a, b, ctx)?;
            let y = general_operand(b, a, ctx)?;
            if compare_atomic(&x, op, &y, ctx)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `is`, `<<`, `>>` over zero-or-one node operands.
pub(crate) fn node_comparison(left: &Sequence, op: NodeComp, right: &Sequence) -> Result<Sequence, Error> {
    let (Some(a), Some(b)) = (left.first_item(true)?, right.first_item(true)?) else {
        return Ok(Sequence::empty());
    };
    let (Some(a), Some(b)) = (a.as_node(), b.as_node()) else {
        return Err(Error::type_error(format!(
            "node comparison requires nodes, found {} and {}",
            a.signature(),
            b.signature()
        )));
    };
    let ordering = a.document_order(b);
    let result = match op {
        NodeComp::Is => a == b,
        NodeComp::Precedes => ordering == Ordering::Less,
        NodeComp::Follows => ordering == Ordering::Greater,
    };
    Ok(Sequence::of(AtomicValue::Boolean(result)))
}

/// Equality used by `distinct-values`, `index-of` and `deep-equal`:
/// incomparable values are unequal and NaN equals itself.
pub(crate) fn atomic_equal(a: &AtomicValue, b: &AtomicValue, ctx: &DynamicContext) -> bool {
    let (a, b) = (untyped_as_string(a), untyped_as_string(b));
    match relate(&a, &b, ctx) {
        Ok(Relation::Ordered(ordering)) => ordering == Ordering::Equal,
        Ok(Relation::Equality(equal)) => equal,
        Ok(Relation::Unordered) => classify(&a).is_some_and(numeric::NumKind::is_nan)
            && classify(&b).is_some_and(numeric::NumKind::is_nan),
        Err(_) => false,
    }
}

/// Total-enough ordering used by `min` and `max`; `None` when NaN is involved.
pub(crate) fn atomic_order(
    a: &AtomicValue,
    b: &AtomicValue,
    ctx: &DynamicContext,
) -> Result<Option<Ordering>, Error> {
    match relate(a, b, ctx)? {
        Relation::Ordered(ordering) => Ok(Some(ordering)),
        Relation::Unordered => Ok(None),
        Relation::Equality(_) => Err(incomparable(a, b)),
    }
}

fn untyped_as_string(v: &AtomicValue) -> AtomicValue {
    match v {
        AtomicValue::UntypedAtomic(s) => AtomicValue::String(s.clone()),
        other => other.clone(),
    }
}
