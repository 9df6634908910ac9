//! Path expressions, axis steps, predicates and node set operations.

use crate::compiler::expr::{Expr, SetOp, StepTest};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus};
use crate::item::{Item, Sequence};
use crate::model::{Axis, NodeKind, NodeRef};

use super::numeric::{self, classify};

fn focus_node(focus: &Focus) -> Result<&NodeRef, Error> {
    match focus.context_item()? {
        Item::Node(node) => Ok(node),
        other => Err(Error::from_code(
            ErrorCode::MPTY0020,
            format!("the context item {} is not a node", other.signature()),
        )),
    }
}

/// `/` at the start of a path: the document node of the focus' tree.
pub(super) fn root(focus: &Focus) -> Result<Sequence, Error> {
    let root = focus_node(focus)?.root();
    if root.kind() != NodeKind::Document {
        return Err(Error::from_code(
            ErrorCode::MPDY0050,
            "the root of the tree containing the context item is not a document node",
        ));
    }
    Ok(Sequence::of(root))
}

/// `E1/E2`: evaluates `right` once per node of `left`.
pub(super) fn path(
    left: &Expr,
    right: &Expr,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let inputs = left.accept(ctx, focus)?.nodes()?;
    let size = inputs.len();
    let mut items = Vec::new();
    for (index, node) in inputs.into_iter().enumerate() {
        let inner = Focus::at(Item::Node(node), index + 1, size);
        items.extend(right.accept(ctx, &inner)?);
    }
    let nodes = items.iter().filter(|i| matches!(i, Item::Node(_))).count();
    if nodes == items.len() {
        let nodes = items.into_iter().filter_map(|i| match i {
            Item::Node(n) => Some(n),
            _ => None,
        });
        Ok(Sequence::from_nodes(Sequence::sort_nodes(nodes.collect())))
    } else if nodes == 0 {
        Ok(Sequence::from_items(items))
    } else {
        Err(Error::from_code(
            ErrorCode::MPTY0018,
            "the result of a path step mixes nodes and atomic values",
        ))
    }
}

fn test_matches(axis: Axis, test: &StepTest, node: &NodeRef, ctx: &DynamicContext) -> Result<bool, Error> {
    match test {
        StepTest::Name(name) => {
            let principal = if axis == Axis::Flag {
                node.kind() == NodeKind::Flag
            } else {
                node.kind().is_model_item()
            };
            Ok(principal && name.matches(node.name()))
        }
        StepTest::Kind(kind) => kind.matches(node, ctx.static_context()),
    }
}

/// One axis step with its predicates. Predicate positions count along the
/// axis direction; the result is always in document order.
pub(super) fn step(
    axis: Axis,
    test: &StepTest,
    predicates: &[Expr],
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let origin = focus_node(focus)?;
    let mut selected = Vec::new();
    for node in axis.select(origin) {
        if test_matches(axis, test, &node, ctx)? {
            selected.push(Item::Node(node));
        }
    }
    tracing::trace!(axis = %axis, selected = selected.len(), "axis step");
    if predicates.is_empty() {
        return Ok(Sequence::from_items(selected));
    }
    if axis.is_reverse() {
        selected.reverse();
    }
    let mut filtered = apply_predicates(selected, predicates, ctx)?;
    if axis.is_reverse() {
        filtered.reverse();
    }
    Ok(Sequence::from_items(filtered))
}

/// Applies each predicate in turn. A single numeric result selects by
/// position; anything else is tested for its effective boolean value.
pub(super) fn apply_predicates(
    mut items: Vec<Item>,
    predicates: &[Expr],
    ctx: &mut DynamicContext,
) -> Result<Vec<Item>, Error> {
    for predicate in predicates {
        let size = items.len();
        let mut kept = Vec::with_capacity(size);
        for (index, item) in items.into_iter().enumerate() {
            let position = index + 1;
            let inner = Focus::at(item, position, size);
            let result = predicate.accept(ctx, &inner)?;
            if predicate_holds(&result, position)? {
                if let Some(item) = inner.item {
                    kept.push(item);
                }
            }
        }
        items = kept;
    }
    Ok(items)
}

fn predicate_holds(result: &Sequence, position: usize) -> Result<bool, Error> {
    if let [Item::Atomic(value)] = result.items() {
        if let Some(n) = classify(value) {
            let position = i64::try_from(position).unwrap_or(i64::MAX);
            return Ok(numeric::compare(n, numeric::NumKind::Int(position))
                .is_some_and(std::cmp::Ordering::is_eq));
        }
    }
    result.ebv()
}

/// `E[p]` over an arbitrary sequence.
pub(super) fn filter(
    base: &Expr,
    predicates: &[Expr],
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let items = base.accept(ctx, focus)?.into_items();
    Ok(Sequence::from_items(apply_predicates(items, predicates, ctx)?))
}

fn operand_nodes(seq: &Sequence, op: SetOp) -> Result<Vec<NodeRef>, Error> {
    seq.nodes().map_err(|e| {
        Error::from_code(
            ErrorCode::MPTY0004,
            format!("{op:?} requires node operands: {}", e.message),
        )
    })
}

/// `union`, `intersect`, `except`: distinct nodes in document order.
pub(super) fn set_operation(left: &Sequence, op: SetOp, right: &Sequence) -> Result<Sequence, Error> {
    let lhs = operand_nodes(left, op)?;
    let rhs = operand_nodes(right, op)?;
    let result = match op {
        SetOp::Union => {
            let mut all = lhs;
            all.extend(rhs);
            all
        }
        SetOp::Intersect => lhs.into_iter().filter(|n| rhs.contains(n)).collect(),
        SetOp::Except => lhs.into_iter().filter(|n| !rhs.contains(n)).collect(),
    };
    Ok(Sequence::from_nodes(Sequence::sort_nodes(result)))
}
