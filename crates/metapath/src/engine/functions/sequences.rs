use super::common::{boolean, count, items, many, one, opt_atomic, position_arg};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::evaluator::atomic_equal;
use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::item::{AtomicValue, FunctionItem, Item, Sequence};
use crate::model::NodeRef;
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{AnyAtomic, Boolean, Double, Integer};
    b.register(FN, "count", &[items()], one(Integer), fn_count)
        .register(FN, "empty", &[items()], one(Boolean), empty)
        .register(FN, "exists", &[items()], one(Boolean), exists)
        .register(FN, "head", &[items()], SequenceType::optional(ItemType::AnyItem), head)
        .register(FN, "tail", &[items()], items(), tail)
        .register(FN, "reverse", &[items()], items(), reverse)
        .register(FN, "remove", &[items(), one(Integer)], items(), remove)
        .register(FN, "insert-before", &[items(), one(Integer), items()], items(), insert_before)
        .register(FN, "index-of", &[many(AnyAtomic), one(AnyAtomic)], many(Integer), index_of)
        .register_range(FN, "subsequence", 2, Some(3), &[items(), one(Double), one(Double)], items(), subsequence)
        .register(FN, "distinct-values", &[many(AnyAtomic)], many(AnyAtomic), distinct_values)
        .register(FN, "zero-or-one", &[items()], SequenceType::optional(ItemType::AnyItem), zero_or_one)
        .register(FN, "one-or-more", &[items()], SequenceType::one_or_more(ItemType::AnyItem), one_or_more)
        .register(FN, "exactly-one", &[items()], SequenceType::one(ItemType::AnyItem), exactly_one)
        .register(FN, "deep-equal", &[items(), items()], one(Boolean), deep_equal)
        .register(FN, "position", &[], one(Integer), position)
        .register(FN, "last", &[], one(Integer), last)
        .register_range(FN, "data", 0, Some(1), &[items()], many(AnyAtomic), data);
}

fn fn_count(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(count(args[0].size()))
}

fn empty(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(args[0].is_empty()))
}

fn exists(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(!args[0].is_empty()))
}

fn head(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(args[0].items().first().cloned().map(Sequence::of).unwrap_or_default())
}

fn tail(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(args[0].items().iter().skip(1).cloned().collect())
}

fn reverse(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(args[0].items().iter().rev().cloned().collect())
}

/// Zero-based index for a one-based position, if it addresses an item.
fn index(position: i64, len: usize) -> Option<usize> {
    usize::try_from(position).ok().filter(|p| (1..=len).contains(p)).map(|p| p - 1)
}

fn remove(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let position = super::common::integer_arg(&args[1])?;
    let mut items = args[0].items().to_vec();
    if let Some(i) = index(position, items.len()) {
        items.remove(i);
    }
    Ok(Sequence::from_items(items))
}

fn insert_before(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let position = super::common::integer_arg(&args[1])?;
    let mut items = args[0].items().to_vec();
    let at = usize::try_from(position.max(1) - 1).unwrap_or(0).min(items.len());
    items.splice(at..at, args[2].items().iter().cloned());
    Ok(Sequence::from_items(items))
}

fn index_of(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let Some(search) = opt_atomic(&args[1]) else {
        return Ok(Sequence::empty());
    };
    let mut out = Sequence::empty();
    for (i, item) in args[0].items().iter().enumerate() {
        if let Some(value) = item.as_atomic() {
            if atomic_equal(value, search, ctx.dynamic) {
                out.append(count(i + 1));
            }
        }
    }
    Ok(out)
}

fn subsequence(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let start = opt_atomic(&args[1]).map_or(Ok(f64::NAN), position_arg)?;
    let end = match args.get(2) {
        Some(len) => start + opt_atomic(len).map_or(Ok(f64::NAN), position_arg)?,
        None => f64::INFINITY,
    };
    #[allow(clippy::cast_precision_loss)]
    let selected = args[0]
        .items()
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, item)| item.clone())
        .collect();
    Ok(selected)
}

fn distinct_values(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let mut seen: Vec<AtomicValue> = Vec::new();
    for value in args[0].atomize()? {
        if !seen.iter().any(|s| atomic_equal(s, &value, ctx.dynamic)) {
            seen.push(value);
        }
    }
    Ok(Sequence::from_atomics(seen))
}

fn zero_or_one(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    if args[0].size() > 1 {
        return Err(Error::from_code(
            ErrorCode::FORG0003,
            format!("zero-or-one called with a sequence of {} items", args[0].size()),
        ));
    }
    Ok(args[0].clone())
}

fn one_or_more(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    if args[0].is_empty() {
        return Err(Error::from_code(
            ErrorCode::FORG0004,
            "one-or-more called with an empty sequence",
        ));
    }
    Ok(args[0].clone())
}

fn exactly_one(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    if args[0].size() != 1 {
        return Err(Error::from_code(
            ErrorCode::FORG0005,
            format!("exactly-one called with a sequence of {} items", args[0].size()),
        ));
    }
    Ok(args[0].clone())
}

fn deep_equal(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(sequences_equal(&args[0], &args[1], ctx.dynamic)?))
}

fn sequences_equal(a: &Sequence, b: &Sequence, ctx: &DynamicContext) -> Result<bool, Error> {
    if a.size() != b.size() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b.iter()) {
        if !items_equal(x, y, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn items_equal(a: &Item, b: &Item, ctx: &DynamicContext) -> Result<bool, Error> {
    match (a, b) {
        (Item::Atomic(x), Item::Atomic(y)) => Ok(atomic_equal(x, y, ctx)),
        (Item::Node(x), Item::Node(y)) => nodes_equal(x, y, ctx),
        (Item::Function(FunctionItem::Map(x)), Item::Function(FunctionItem::Map(y))) => {
            if x.size() != y.size() {
                return Ok(false);
            }
            for (key, value) in x.iter() {
                match y.get(key) {
                    Some(other) if sequences_equal(value, other, ctx)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (Item::Function(FunctionItem::Array(x)), Item::Function(FunctionItem::Array(y))) => {
            if x.size() != y.size() {
                return Ok(false);
            }
            for (m, n) in x.members().iter().zip(y.members()) {
                if !sequences_equal(m, n, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Item::Function(x), Item::Function(y)) => Ok(x == y),
        _ => Ok(false),
    }
}

/// Same kind and name, equal values, the same flags in any order and equal
/// children in order.
fn nodes_equal(a: &NodeRef, b: &NodeRef, ctx: &DynamicContext) -> Result<bool, Error> {
    if a.kind() != b.kind() || a.name() != b.name() {
        return Ok(false);
    }
    match (a.value(), b.value()) {
        (Some(x), Some(y)) if !atomic_equal(x, y, ctx) => return Ok(false),
        (Some(_), None) | (None, Some(_)) => return Ok(false),
        _ => {}
    }
    let (flags_a, flags_b) = (a.flags(), b.flags());
    if flags_a.len() != flags_b.len() {
        return Ok(false);
    }
    for flag in &flags_a {
        let Some(name) = flag.name() else { continue };
        match b.flag_named(name) {
            Some(other) if nodes_equal(flag, &other, ctx)? => {}
            _ => return Ok(false),
        }
    }
    let (children_a, children_b) = (a.children(), b.children());
    if children_a.len() != children_b.len() {
        return Ok(false);
    }
    for (x, y) in children_a.iter().zip(&children_b) {
        if !nodes_equal(x, y, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn position(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    ctx.context_item()?;
    Ok(count(ctx.focus.position))
}

fn last(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    ctx.context_item()?;
    Ok(count(ctx.focus.size))
}

fn data(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let value = super::common::arg_or_context(ctx, args, 0)?;
    value.atomized()
}

