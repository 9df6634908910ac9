//! Variable binding constructs: `for`, `let`, quantified expressions and the
//! simple map operator.
//!
//! Every construct pushes its bindings onto the dynamic context and restores
//! the previous scope before returning, whether or not evaluation succeeded.

use crate::compiler::expr::{Expr, Quantifier};
use crate::engine::runtime::{DynamicContext, Error, Focus};
use crate::item::{AtomicValue, Item, Sequence};
use crate::model::QName;

fn scoped<T>(ctx: &mut DynamicContext, f: impl FnOnce(&mut DynamicContext) -> Result<T, Error>) -> Result<T, Error> {
    let mark = ctx.scope_mark();
    let result = f(ctx);
    ctx.restore_scope(mark);
    result
}

/// `for $v in input return body`: concatenation of one body evaluation per item.
pub(super) fn for_each(
    var: &QName,
    input: &Expr,
    body: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let items = input.accept(ctx, focus)?;
    let mut out = Sequence::empty();
    for item in items {
        let result = scoped(ctx, |ctx| {
            ctx.push_variable(var.clone(), Sequence::of(item));
            body.accept(ctx, focus)
        })?;
        out.append(result);
    }
    Ok(out)
}

pub(super) fn let_binding(
    var: &QName,
    value: &Expr,
    body: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let bound = value.accept(ctx, focus)?;
    scoped(ctx, |ctx| {
        ctx.push_variable(var.clone(), bound);
        body.accept(ctx, focus)
    })
}

/// `some`/`every` over the cartesian product of all bindings.
pub(super) fn quantified(
    quantifier: Quantifier,
    bindings: &[(QName, Expr)],
    satisfies: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let result = scoped(ctx, |ctx| quantify(quantifier, bindings, satisfies, ctx, focus))?;
    Ok(Sequence::of(AtomicValue::Boolean(result)))
}

fn quantify(
    quantifier: Quantifier,
    bindings: &[(QName, Expr)],
    satisfies: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<bool, Error> {
    let Some(((var, input), rest)) = bindings.split_first() else {
        return satisfies.accept(ctx, focus)?.ebv();
    };
    let items = input.accept(ctx, focus)?;
    for item in items {
        let holds = scoped(ctx, |ctx| {
            ctx.push_variable(var.clone(), Sequence::of(item));
            quantify(quantifier, rest, satisfies, ctx, focus)
        })?;
        match quantifier {
            Quantifier::Some if holds => return Ok(true),
            Quantifier::Every if !holds => return Ok(false),
            _ => {}
        }
    }
    Ok(quantifier == Quantifier::Every)
}

/// `left ! right`: `right` evaluated with each item of `left` as the focus.
pub(super) fn simple_map(
    left: &Expr,
    right: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let items: Vec<Item> = left.accept(ctx, focus)?.into_items();
    let size = items.len();
    let mut out = Sequence::empty();
    for (index, item) in items.into_iter().enumerate() {
        out.append(right.accept(ctx, &Focus::at(item, index + 1, size))?);
    }
    Ok(out)
}
