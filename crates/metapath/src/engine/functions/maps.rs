use indexmap::IndexMap;
use indexmap::map::Entry;

use super::common::{boolean, count, function, function_arg, items, many, map, map_arg, one, opt_atomic, string_arg};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS_MAP as MAP;
use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{ArrayItem, AtomicValue, FunctionItem, Item, MapItem, MapKey, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{AnyAtomic, Boolean, Integer};
    let maps = SequenceType::zero_or_more(ItemType::Map(None));
    b.register_range(MAP, "merge", 1, Some(2), &[maps, map()], map(), merge)
        .register(MAP, "size", &[map()], one(Integer), size)
        .register(MAP, "keys", &[map()], many(AnyAtomic), keys)
        .register(MAP, "contains", &[map(), one(AnyAtomic)], one(Boolean), contains)
        .register(MAP, "get", &[map(), one(AnyAtomic)], items(), get)
        .register(MAP, "put", &[map(), one(AnyAtomic), items()], map(), put)
        .register(MAP, "remove", &[map(), many(AnyAtomic)], map(), remove)
        .register(MAP, "entry", &[one(AnyAtomic), items()], map(), entry)
        .register(MAP, "find", &[items(), one(AnyAtomic)], SequenceType::one(ItemType::Array(None)), find)
        .register(MAP, "for-each", &[map(), function()], items(), for_each);
}

fn map_result(map: MapItem) -> Sequence {
    Sequence::of(FunctionItem::Map(map))
}

fn key_arg(arg: &Sequence) -> Result<&AtomicValue, Error> {
    opt_atomic(arg).ok_or_else(|| Error::type_error("a map key must be a single atomic value"))
}

/// How `map:merge` treats a key present in more than one input map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duplicates {
    Reject,
    UseFirst,
    UseLast,
    Combine,
}

impl Duplicates {
    fn from_options(options: Option<&Sequence>) -> Result<Self, Error> {
        let Some(options) = options else {
            return Ok(Duplicates::UseFirst);
        };
        let Some(value) = map_arg(options)?.get(&AtomicValue::string("duplicates")) else {
            return Ok(Duplicates::UseFirst);
        };
        match string_arg(value).as_str() {
            "reject" => Ok(Duplicates::Reject),
            "use-first" | "use-any" => Ok(Duplicates::UseFirst),
            "use-last" => Ok(Duplicates::UseLast),
            "combine" => Ok(Duplicates::Combine),
            other => Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("unsupported duplicates option '{other}'"),
            )),
        }
    }
}

fn merge(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let duplicates = Duplicates::from_options(args.get(1))?;
    let mut merged: IndexMap<MapKey, Sequence> = IndexMap::new();
    for item in &args[0] {
        let Item::Function(FunctionItem::Map(map)) = item else {
            return Err(Error::type_error(format!("expected a map, found {}", item.signature())));
        };
        for (key, value) in map.iter() {
            match merged.entry(MapKey::new(key.clone())) {
                Entry::Vacant(slot) => {
                    slot.insert(value.clone());
                }
                Entry::Occupied(mut slot) => match duplicates {
                    Duplicates::Reject => {
                        return Err(Error::from_code(
                            ErrorCode::FOJS0003,
                            format!("duplicate map key {}", key.signature()),
                        ));
                    }
                    Duplicates::UseFirst => {}
                    Duplicates::UseLast => {
                        slot.insert(value.clone());
                    }
                    Duplicates::Combine => slot.get_mut().append(value.clone()),
                },
            }
        }
    }
    Ok(map_result(MapItem::new(merged)))
}

fn size(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(count(map_arg(&args[0])?.size()))
}

fn keys(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::from_atomics(map_arg(&args[0])?.keys().cloned()))
}

fn contains(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(map_arg(&args[0])?.contains(key_arg(&args[1])?)))
}

fn get(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(map_arg(&args[0])?
        .get(key_arg(&args[1])?)
        .cloned()
        .unwrap_or_default())
}

fn put(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let map = map_arg(&args[0])?;
    Ok(map_result(map.put(key_arg(&args[1])?.clone(), args[2].clone())))
}

fn remove(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let mut map = map_arg(&args[0])?.clone();
    for key in args[1].atomize()? {
        map = map.remove(&key);
    }
    Ok(map_result(map))
}

fn entry(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(map_result(MapItem::from_pairs([(
        key_arg(&args[0])?.clone(),
        args[1].clone(),
    )])))
}

/// Values stored under `key` in every map reachable from the input, searching
/// inside arrays and map values.
fn find(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    fn walk(seq: &Sequence, key: &AtomicValue, found: &mut Vec<Sequence>) {
        for item in seq {
            match item {
                Item::Function(FunctionItem::Array(array)) => {
                    for member in array.members() {
                        walk(member, key, found);
                    }
                }
                Item::Function(FunctionItem::Map(map)) => {
                    if let Some(value) = map.get(key) {
                        found.push(value.clone());
                    }
                    for (_, value) in map.iter() {
                        walk(value, key, found);
                    }
                }
                _ => {}
            }
        }
    }
    let key = key_arg(&args[1])?;
    let mut found = Vec::new();
    walk(&args[0], key, &mut found);
    Ok(Sequence::of(FunctionItem::Array(ArrayItem::new(found))))
}

fn for_each(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let map = map_arg(&args[0])?;
    let f = function_arg(&args[1])?;
    let mut out = Sequence::empty();
    for (key, value) in map.iter() {
        out.append(ctx.invoke(f, vec![Sequence::of(key.clone()), value.clone()])?);
    }
    Ok(out)
}
