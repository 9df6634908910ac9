//! Tree-walking evaluation of compiled expressions.
//!
//! [`Expr::accept`] is the single entry point: it dispatches on the node kind
//! and delegates to the submodule that owns that family of expressions.

mod arithmetic;
mod binding;
mod call;
mod comparison;
mod containers;
mod logic;
pub(crate) mod numeric;
mod path;
mod types;

pub(crate) use arithmetic::apply as apply_arithmetic;
pub(crate) use call::invoke_function_item;
pub(crate) use comparison::{atomic_equal, atomic_order};

use crate::compiler::expr::{Expr, ExprKind};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus};
use crate::item::{AtomicValue, Item, Sequence};
use crate::types::AtomicType;

impl Expr {
    /// Evaluates this expression against `focus`.
    pub fn accept(&self, ctx: &mut DynamicContext, focus: &Focus) -> Result<Sequence, Error> {
        match &self.kind {
            ExprKind::Literal(value) => Ok(Sequence::of(value.clone())),
            ExprKind::ContextItem => Ok(Sequence::of(focus.context_item()?.clone())),
            ExprKind::Root => path::root(focus),
            ExprKind::Variable(name) => ctx.variable(name).cloned().ok_or_else(|| {
                Error::from_code(
                    ErrorCode::MPST0008,
                    format!("variable ${} is not bound", name.to_eqname()),
                )
            }),
            ExprKind::Sequence(items) => {
                let mut out = Sequence::empty();
                for item in items {
                    out.append(item.accept(ctx, focus)?);
                }
                Ok(out)
            }
            ExprKind::Range { start, end } => {
                let start = start.accept(ctx, focus)?;
                let end = end.accept(ctx, focus)?;
                range(&start, &end, ctx)
            }
            ExprKind::Arithmetic { left, op, right } => {
                let lhs = left.accept(ctx, focus)?.atomize_optional()?;
                let rhs = right.accept(ctx, focus)?.atomize_optional()?;
                match (lhs, rhs) {
                    (Some(a), Some(b)) => Ok(Sequence::of(arithmetic::apply(*op, &a, &b, ctx)?)),
                    _ => Ok(Sequence::empty()),
                }
            }
            ExprKind::Negate(operand) => match operand.accept(ctx, focus)?.atomize_optional()? {
                Some(value) => Ok(Sequence::of(arithmetic::negate(&value, ctx)?)),
                None => Ok(Sequence::empty()),
            },
            ExprKind::StringConcat(parts) => {
                let mut out = String::new();
                for part in parts {
                    for value in part.accept(ctx, focus)?.atomize()? {
                        out.push_str(&value.lexical());
                    }
                }
                Ok(Sequence::of(AtomicValue::String(out)))
            }
            ExprKind::ValueComparison { left, op, right } => {
                let lhs = left.accept(ctx, focus)?;
                let rhs = right.accept(ctx, focus)?;
                comparison::value_comparison(&lhs, *op, &rhs, ctx)
            }
            ExprKind::GeneralComparison { left, op, right } => {
                let lhs = left.accept(ctx, focus)?;
                let rhs = right.accept(ctx, focus)?;
                let result = comparison::general_comparison(&lhs, *op, &rhs, ctx)?;
                Ok(Sequence::of(AtomicValue::Boolean(result)))
            }
            ExprKind::NodeComparison { left, op, right } => {
                let lhs = left.accept(ctx, focus)?;
                let rhs = right.accept(ctx, focus)?;
                comparison::node_comparison(&lhs, *op, &rhs)
            }
            ExprKind::And(operands) => logic::and(operands, ctx, focus),
            ExprKind::Or(operands) => logic::or(operands, ctx, focus),
            ExprKind::If {
                cond,
                then_expr,
                else_expr,
            } => logic::conditional(cond, then_expr, else_expr, ctx, focus),
            ExprKind::SetOperation { left, op, right } => {
                let lhs = left.accept(ctx, focus)?;
                let rhs = right.accept(ctx, focus)?;
                path::set_operation(&lhs, *op, &rhs)
            }
            ExprKind::Path { left, right } => path::path(left, right, ctx, focus),
            ExprKind::Step {
                axis,
                test,
                predicates,
            } => path::step(*axis, test, predicates, ctx, focus),
            ExprKind::Filter { base, predicates } => path::filter(base, predicates, ctx, focus),
            ExprKind::For { var, input, body } => binding::for_each(var, input, body, ctx, focus),
            ExprKind::Let { var, value, body } => binding::let_binding(var, value, body, ctx, focus),
            ExprKind::Quantified {
                quantifier,
                bindings,
                satisfies,
            } => binding::quantified(*quantifier, bindings, satisfies, ctx, focus),
            ExprKind::SimpleMap { left, right } => binding::simple_map(left, right, ctx, focus),
            ExprKind::FunctionCall { function, args } => call::function_call(function, args, ctx, focus),
            ExprKind::DynamicCall { base, args } => call::dynamic_call(base, args, ctx, focus),
            ExprKind::NamedFunctionRef(signature) => Ok(Sequence::of(
                crate::item::FunctionItem::Named(std::sync::Arc::clone(signature)),
            )),
            ExprKind::InlineFunction(definition) => Ok(call::inline_function(definition, ctx)),
            ExprKind::MapConstructor(entries) => containers::map_constructor(entries, ctx, focus),
            ExprKind::ArrayConstructor(members) => containers::square_array(members, ctx, focus),
            ExprKind::CurlyArray(content) => containers::curly_array(content, ctx, focus),
            ExprKind::Lookup { base, key } => {
                let bases = base.accept(ctx, focus)?;
                containers::lookup(bases, key, ctx, focus)
            }
            ExprKind::UnaryLookup(key) => {
                let bases = Sequence::of(focus.context_item()?.clone());
                containers::lookup(bases, key, ctx, focus)
            }
            ExprKind::InstanceOf { expr, ty } => {
                let value = expr.accept(ctx, focus)?;
                types::instance_of(&value, ty, ctx)
            }
            ExprKind::TreatAs { expr, ty } => {
                let value = expr.accept(ctx, focus)?;
                types::treat_as(value, ty, ctx)
            }
            ExprKind::CastAs {
                expr,
                target,
                allow_empty,
            } => {
                let value = expr.accept(ctx, focus)?;
                types::cast_as(&value, *target, *allow_empty, ctx)
            }
            ExprKind::CastableAs {
                expr,
                target,
                allow_empty,
            } => {
                let value = expr.accept(ctx, focus)?;
                types::castable_as(&value, *target, *allow_empty, ctx)
            }
        }
    }
}

/// `start to end`: ascending integers, empty when `start > end`.
fn range(start: &Sequence, end: &Sequence, ctx: &DynamicContext) -> Result<Sequence, Error> {
    let bound = |seq: &Sequence| -> Result<Option<i64>, Error> {
        match seq.atomize_optional()? {
            None => Ok(None),
            Some(v @ AtomicValue::UntypedAtomic(_)) => {
                let cast = ctx.static_context().adapters.cast(&v, AtomicType::Integer)?;
                Ok(cast.as_i64())
            }
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                Error::type_error(format!("range bounds must be integers, found {}", v.signature()))
            }),
        }
    };
    let (Some(start), Some(end)) = (bound(start)?, bound(end)?) else {
        return Ok(Sequence::empty());
    };
    Ok((start..=end)
        .map(|i| Item::Atomic(AtomicValue::Integer(i)))
        .collect())
}
