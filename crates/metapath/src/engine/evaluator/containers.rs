//! Map and array constructors and the lookup operator.

use indexmap::IndexMap;
use indexmap::map::Entry;

use super::call::{array_member, single_key};
use crate::compiler::expr::{Expr, KeySpecifier};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus};
use crate::item::{ArrayItem, AtomicValue, FunctionItem, Item, MapItem, MapKey, Sequence};

/// `map { k : v, .. }`: keys are single atomic values and must be distinct.
pub(super) fn map_constructor(
    entries: &[(Expr, Expr)],
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let mut map = IndexMap::with_capacity(entries.len());
    for (key_expr, value_expr) in entries {
        let key = single_key(&key_expr.accept(ctx, focus)?)?;
        let value = value_expr.accept(ctx, focus)?;
        match map.entry(MapKey::new(key)) {
            Entry::Occupied(entry) => {
                return Err(Error::from_code(
                    ErrorCode::FOJS0003,
                    format!("duplicate map key {}", entry.key().value().signature()),
                ));
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    Ok(Sequence::of(FunctionItem::Map(MapItem::new(map))))
}

/// `[a, b, ..]`
pub(super) fn square_array(members: &[Expr], ctx: &mut DynamicContext, focus: &Focus) -> Result<Sequence, Error> {
    let mut values = Vec::with_capacity(members.len());
    for member in members {
        values.push(member.accept(ctx, focus)?);
    }
    Ok(Sequence::of(FunctionItem::Array(ArrayItem::new(values))))
}

/// `array { e }`
pub(super) fn curly_array(content: &Expr, ctx: &mut DynamicContext, focus: &Focus) -> Result<Sequence, Error> {
    let members = content.accept(ctx, focus)?.into_iter().map(Sequence::of).collect();
    Ok(Sequence::of(FunctionItem::Array(ArrayItem::new(members))))
}

/// Applies a key specifier to every map or array in `bases`.
pub(super) fn lookup(
    bases: Sequence,
    key: &KeySpecifier,
    ctx: &mut DynamicContext,
    focus: &Focus,
) -> Result<Sequence, Error> {
    let keys = match key {
        KeySpecifier::Wildcard => None,
        KeySpecifier::Name(name) => Some(vec![AtomicValue::string(name.clone())]),
        KeySpecifier::Integer(i) => Some(vec![AtomicValue::Integer(*i)]),
        KeySpecifier::Expr(expr) => Some(expr.accept(ctx, focus)?.atomize()?),
    };
    let mut out = Sequence::empty();
    for base in bases {
        match (&base, &keys) {
            (Item::Function(FunctionItem::Map(map)), None) => {
                for (_, value) in map.iter() {
                    out.append(value.clone());
                }
            }
            (Item::Function(FunctionItem::Map(map)), Some(keys)) => {
                for key in keys {
                    if let Some(value) = map.get(key) {
                        out.append(value.clone());
                    }
                }
            }
            (Item::Function(FunctionItem::Array(array)), None) => {
                for member in array.members() {
                    out.append(member.clone());
                }
            }
            (Item::Function(FunctionItem::Array(array)), Some(keys)) => {
                for key in keys {
                    out.append(array_member(array, key)?.clone());
                }
            }
            (other, _) => {
                return Err(Error::type_error(format!(
                    "lookup requires a map or an array, found {}",
                    other.signature()
                )));
            }
        }
    }
    Ok(out)
}
