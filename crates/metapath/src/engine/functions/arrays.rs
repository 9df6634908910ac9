use super::common::{array, array_arg, count, function, function_arg, integer_arg, items, many, one};
use super::higher_order::predicate_result;
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS_ARRAY as ARRAY;
use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{ArrayItem, AtomicValue, FunctionItem, Item, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::Integer;
    let arrays = SequenceType::zero_or_more(ItemType::Array(None));
    b.register(ARRAY, "size", &[array()], one(Integer), size)
        .register(ARRAY, "get", &[array(), one(Integer)], items(), get)
        .register(ARRAY, "put", &[array(), one(Integer), items()], array(), put)
        .register(ARRAY, "append", &[array(), items()], array(), append)
        .register_range(ARRAY, "subarray", 2, Some(3), &[array(), one(Integer), one(Integer)], array(), subarray)
        .register(ARRAY, "remove", &[array(), many(Integer)], array(), remove)
        .register(ARRAY, "insert-before", &[array(), one(Integer), items()], array(), insert_before)
        .register(ARRAY, "head", &[array()], items(), head)
        .register(ARRAY, "tail", &[array()], array(), tail)
        .register(ARRAY, "reverse", &[array()], array(), reverse)
        .register(ARRAY, "join", &[arrays], array(), join)
        .register(ARRAY, "flatten", &[items()], items(), flatten)
        .register(ARRAY, "for-each", &[array(), function()], array(), for_each)
        .register(ARRAY, "filter", &[array(), function()], array(), filter);
}

fn array_result(members: Vec<Sequence>) -> Sequence {
    Sequence::of(FunctionItem::Array(ArrayItem::new(members)))
}

fn out_of_bounds(position: i64, size: usize) -> Error {
    Error::from_code(
        ErrorCode::FOAY0001,
        format!("array index {position} is out of bounds for an array of size {size}"),
    )
}

/// Zero-based index of `position`, which must lie in `1..=limit`.
fn checked_index(position: i64, limit: usize, size: usize) -> Result<usize, Error> {
    usize::try_from(position)
        .ok()
        .filter(|p| (1..=limit).contains(p))
        .map(|p| p - 1)
        .ok_or_else(|| out_of_bounds(position, size))
}

fn size(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(count(array_arg(&args[0])?.size()))
}

fn get(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let position = integer_arg(&args[1])?;
    array
        .get(position)
        .cloned()
        .ok_or_else(|| out_of_bounds(position, array.size()))
}

fn put(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let index = checked_index(integer_arg(&args[1])?, array.size(), array.size())?;
    let mut members = array.members().to_vec();
    members[index] = args[2].clone();
    Ok(array_result(members))
}

fn append(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let mut members = array_arg(&args[0])?.members().to_vec();
    members.push(args[1].clone());
    Ok(array_result(members))
}

fn subarray(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let start = integer_arg(&args[1])?;
    let from = checked_index(start, array.size() + 1, array.size())?;
    let length = match args.get(2) {
        Some(length) => {
            let length = integer_arg(length)?;
            if length < 0 {
                return Err(Error::from_code(
                    ErrorCode::FOAY0002,
                    format!("subarray length {length} is negative"),
                ));
            }
            usize::try_from(length).unwrap_or(usize::MAX)
        }
        None => array.size() - from,
    };
    let to = from
        .checked_add(length)
        .filter(|end| *end <= array.size())
        .ok_or_else(|| {
            Error::from_code(
                ErrorCode::FOAY0001,
                format!("subarray from {start} of length {length} exceeds the array size {}", array.size()),
            )
        })?;
    Ok(array_result(array.members()[from..to].to_vec()))
}

fn remove(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let mut drop = Vec::with_capacity(args[1].size());
    for position in &args[1] {
        let position = position
            .as_atomic()
            .and_then(AtomicValue::as_i64)
            .ok_or_else(|| Error::type_error(format!("expected an integer, found {}", position.signature())))?;
        drop.push(checked_index(position, array.size(), array.size())?);
    }
    let members = array
        .members()
        .iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, m)| m.clone())
        .collect();
    Ok(array_result(members))
}

fn insert_before(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let index = checked_index(integer_arg(&args[1])?, array.size() + 1, array.size())?;
    let mut members = array.members().to_vec();
    members.insert(index, args[2].clone());
    Ok(array_result(members))
}

fn head(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    array.members().first().cloned().ok_or_else(|| out_of_bounds(1, 0))
}

fn tail(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    match array_arg(&args[0])?.members() {
        [] => Err(out_of_bounds(1, 0)),
        [_, rest @ ..] => Ok(array_result(rest.to_vec())),
    }
}

fn reverse(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let members = array_arg(&args[0])?.members().iter().rev().cloned().collect();
    Ok(array_result(members))
}

fn join(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let mut members = Vec::new();
    for item in &args[0] {
        match item {
            Item::Function(FunctionItem::Array(array)) => members.extend(array.members().iter().cloned()),
            other => {
                return Err(Error::type_error(format!("expected an array, found {}", other.signature())));
            }
        }
    }
    Ok(array_result(members))
}

/// Replaces every array, recursively, by its members.
fn flatten(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    fn walk(seq: &Sequence, out: &mut Sequence) {
        for item in seq {
            match item {
                Item::Function(FunctionItem::Array(array)) => {
                    for member in array.members() {
                        walk(member, out);
                    }
                }
                other => out.push(other.clone()),
            }
        }
    }
    let mut out = Sequence::empty();
    walk(&args[0], &mut out);
    Ok(out)
}

fn for_each(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let f = function_arg(&args[1])?;
    let mut members = Vec::with_capacity(array.size());
    for member in array.members() {
        members.push(ctx.invoke(f, vec![member.clone()])?);
    }
    Ok(array_result(members))
}

fn filter(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let array = array_arg(&args[0])?;
    let f = function_arg(&args[1])?;
    let mut members = Vec::new();
    for member in array.members() {
        if predicate_result(&ctx.invoke(f, vec![member.clone()])?)? {
            members.push(member.clone());
        }
    }
    Ok(array_result(members))
}
