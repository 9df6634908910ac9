//! Constructor functions `meta:<type>($arg)` and their `xs:` aliases.

use super::common::{opt, opt_atomic};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::{NS_METAPATH, NS_XML_SCHEMA};
use crate::engine::runtime::Error;
use crate::item::Sequence;
use crate::types::AtomicType;

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    for ty in AtomicType::ALL.into_iter().filter(|t| !t.is_abstract()) {
        let constructor = move |ctx: &mut CallContext<'_>, args: &[Sequence]| construct(ctx, args, ty);
        b.register(NS_METAPATH, ty.local_name(), &[opt(AtomicType::AnyAtomic)], opt(ty), constructor);
        if let Some(alias) = ty.xs_alias() {
            b.register(NS_XML_SCHEMA, alias, &[opt(AtomicType::AnyAtomic)], opt(ty), constructor);
        }
    }
}

/// Casts the argument to `ty`; the empty sequence constructs nothing.
fn construct(ctx: &mut CallContext<'_>, args: &[Sequence], ty: AtomicType) -> Result<Sequence, Error> {
    let Some(value) = opt_atomic(&args[0]) else {
        return Ok(Sequence::empty());
    };
    let cast = ctx.dynamic.static_context().adapters.cast(value, ty)?;
    Ok(Sequence::of(cast))
}
