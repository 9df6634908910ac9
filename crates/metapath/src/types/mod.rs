//! Type system: atomic types, item types, kind tests, sequence types,
//! data-type adapters and casting.

pub mod adapter;
pub mod atomic;
pub mod cast;
pub mod item_type;
pub mod kind;
pub mod sequence_type;

pub use adapter::{AdapterRegistry, AdapterRegistryBuilder, BuiltinAdapter, DataTypeAdapter};
pub use atomic::AtomicType;
pub use item_type::ItemType;
pub use kind::{DefinitionName, KindTest, NameTest};
pub use sequence_type::{Occurrence, SequenceType};

use crate::engine::runtime::{Error, StaticContext};
use crate::item::{Item, Sequence};

/// `isInstance(item, type)`
pub fn is_instance(item: &Item, ty: &ItemType, ctx: &StaticContext) -> Result<bool, Error> {
    ty.matches(item, ctx)
}

/// `matches(sequence, sequenceType)`
pub fn matches(seq: &Sequence, ty: &SequenceType, ctx: &StaticContext) -> Result<bool, Error> {
    ty.matches(seq, ctx)
}

/// `cast(item, type)`: atomizes `seq`, requires at most one value and applies
/// the target type's registered cast executor. An empty input yields `None`.
pub fn cast_sequence(
    seq: &Sequence,
    target: AtomicType,
    ctx: &StaticContext,
) -> Result<Option<crate::item::AtomicValue>, Error> {
    let values = seq.atomize()?;
    match values.as_slice() {
        [] => Ok(None),
        [value] => ctx.adapters.cast(value, target).map(Some),
        _ => Err(Error::type_error(format!(
            "cast as {target} requires a single item, got {} items",
            values.len()
        ))),
    }
}
