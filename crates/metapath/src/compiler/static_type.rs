//! Bottom-up static result-type inference.
//!
//! Runs once per node while the tree is built. The result only narrows the
//! declared base type of an expression; evaluation never depends on it.

use crate::compiler::expr::{BinaryOp, ExprKind, StepTest};
use crate::types::{AtomicType, ItemType, KindTest};

pub(crate) fn infer(kind: &ExprKind) -> ItemType {
    match kind {
        ExprKind::Literal(value) => ItemType::Atomic(value.atomic_type()),
        ExprKind::Root => ItemType::Kind(KindTest::document(None)),
        ExprKind::Step { test, .. } => match test {
            StepTest::Kind(kind_test) => ItemType::Kind(kind_test.clone()),
            StepTest::Name(_) => ItemType::any_node(),
        },
        ExprKind::Path { right, .. } => right.static_type.clone(),
        ExprKind::Filter { base, .. } => base.static_type.clone(),
        ExprKind::SetOperation { .. } => ItemType::any_node(),
        ExprKind::Sequence(items) => common(items.iter().map(|e| &e.static_type)),
        ExprKind::If {
            then_expr,
            else_expr,
            ..
        } => then_expr.static_type.common_ancestor(&else_expr.static_type),
        ExprKind::Range { .. } => AtomicType::Integer.into(),
        ExprKind::Arithmetic { left, op, right } => arithmetic(&left.static_type, *op, &right.static_type),
        ExprKind::Negate(operand) => match &operand.static_type {
            ItemType::Atomic(t) if t.is_numeric() => numeric_base(*t).into(),
            ItemType::Atomic(t) if t.is_duration() => (*t).into(),
            _ => AtomicType::Numeric.into(),
        },
        ExprKind::StringConcat(_) => AtomicType::String.into(),
        ExprKind::ValueComparison { .. }
        | ExprKind::GeneralComparison { .. }
        | ExprKind::NodeComparison { .. }
        | ExprKind::And(_)
        | ExprKind::Or(_)
        | ExprKind::Quantified { .. }
        | ExprKind::InstanceOf { .. }
        | ExprKind::CastableAs { .. } => AtomicType::Boolean.into(),
        ExprKind::For { body, .. } | ExprKind::Let { body, .. } => body.static_type.clone(),
        ExprKind::SimpleMap { right, .. } => right.static_type.clone(),
        ExprKind::FunctionCall { function, .. } => function.return_type.item_type.clone(),
        ExprKind::NamedFunctionRef(_) | ExprKind::InlineFunction(_) => ItemType::AnyFunction,
        ExprKind::MapConstructor(_) => ItemType::Map(None),
        ExprKind::ArrayConstructor(_) | ExprKind::CurlyArray(_) => ItemType::Array(None),
        ExprKind::TreatAs { ty, .. } => ty.item_type.clone(),
        ExprKind::CastAs { target, .. } => (*target).into(),
        ExprKind::ContextItem
        | ExprKind::Variable(_)
        | ExprKind::DynamicCall { .. }
        | ExprKind::Lookup { .. }
        | ExprKind::UnaryLookup(_) => ItemType::AnyItem,
    }
}

fn common<'a>(mut types: impl Iterator<Item = &'a ItemType>) -> ItemType {
    let Some(first) = types.next() else {
        return ItemType::AnyItem;
    };
    types.fold(first.clone(), |acc, t| acc.common_ancestor(t))
}

/// Integer subtypes compute as integers.
fn numeric_base(t: AtomicType) -> AtomicType {
    if t.is_integer() { AtomicType::Integer } else { t }
}

fn arithmetic(left: &ItemType, op: BinaryOp, right: &ItemType) -> ItemType {
    let (ItemType::Atomic(l), ItemType::Atomic(r)) = (left, right) else {
        return AtomicType::AnyAtomic.into();
    };
    let (l, r) = (*l, *r);
    if l.is_numeric() && r.is_numeric() {
        let common = numeric_base(l).common_ancestor(numeric_base(r));
        return match op {
            BinaryOp::IDiv => AtomicType::Integer,
            BinaryOp::Div if common == AtomicType::Integer => AtomicType::Decimal,
            _ => common,
        }
        .into();
    }
    let temporal = |t: AtomicType| match t {
        AtomicType::DateWithTimezone => AtomicType::Date,
        AtomicType::DateTimeWithTimezone => AtomicType::DateTime,
        other => other,
    };
    let (l, r) = (temporal(l), temporal(r));
    let result = match (op, l, r) {
        (BinaryOp::Sub, AtomicType::Date, AtomicType::Date)
        | (BinaryOp::Sub, AtomicType::DateTime, AtomicType::DateTime)
        | (BinaryOp::Sub, AtomicType::Time, AtomicType::Time) => AtomicType::DayTimeDuration,
        (BinaryOp::Add | BinaryOp::Sub, t @ (AtomicType::Date | AtomicType::DateTime | AtomicType::Time), d)
            if d.is_duration() =>
        {
            t
        }
        (BinaryOp::Add, d, t @ (AtomicType::Date | AtomicType::DateTime | AtomicType::Time))
            if d.is_duration() =>
        {
            t
        }
        (BinaryOp::Div, a, b) if a.is_duration() && b.is_duration() => AtomicType::Decimal,
        (BinaryOp::Add | BinaryOp::Sub, a, b) if a.is_duration() && a == b => a,
        (BinaryOp::Mul | BinaryOp::Div, d, n) if d.is_duration() && n.is_numeric() => d,
        (BinaryOp::Mul, n, d) if d.is_duration() && n.is_numeric() => d,
        _ => AtomicType::AnyAtomic,
    };
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_widens_to_decimal() {
        let int = ItemType::from(AtomicType::Integer);
        assert_eq!(arithmetic(&int, BinaryOp::Div, &int), ItemType::from(AtomicType::Decimal));
        assert_eq!(arithmetic(&int, BinaryOp::IDiv, &int), ItemType::from(AtomicType::Integer));
        assert_eq!(
            arithmetic(&int, BinaryOp::Add, &ItemType::from(AtomicType::Double)),
            ItemType::from(AtomicType::Numeric)
        );
    }

    #[test]
    fn date_difference_is_day_time_duration() {
        let date = ItemType::from(AtomicType::Date);
        assert_eq!(
            arithmetic(&date, BinaryOp::Sub, &date),
            ItemType::from(AtomicType::DayTimeDuration)
        );
    }
}
