//! Logical operators and conditionals over effective boolean values.

use crate::compiler::expr::Expr;
use crate::engine::runtime::{DynamicContext, Error, Focus};
use crate::item::{AtomicValue, Sequence};

fn boolean(b: bool) -> Sequence {
    Sequence::of(AtomicValue::Boolean(b))
}

/// Left to right; stops at the first false operand.
pub(super) fn and(operands: &[Expr], ctx: &mut DynamicContext, focus: &Focus) -> Result<Sequence, Error> {
    for operand in operands {
        if !operand.accept(ctx, focus)?.ebv()? {
            return Ok(boolean(false));
        }
    }
    Ok(boolean(true))
}

/// Left to right; stops at the first true operand.
pub(super) fn or(operands: &[Expr], ctx: &mut DynamicContext, focus: &Focus) -> Result<Sequence, Error> {
    for operand in operands {
        if operand.accept(ctx, focus)?.ebv()? {
            return Ok(boolean(true));
        }
    }
    Ok(boolean(false))
}

pub(super) fn conditional(
    cond: &Expr,
    then_expr: &Expr,
    else_expr: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    if cond.accept(ctx, focus)?.ebv()? {
        then_expr.accept(ctx, focus)
    } else {
        else_expr.accept(ctx, focus)
    }
}
