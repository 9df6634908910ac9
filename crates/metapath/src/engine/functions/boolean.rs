use super::common::{boolean, items};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::Error;
use crate::item::Sequence;
use crate::types::AtomicType;

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    let out = super::common::one(AtomicType::Boolean);
    b.register(FN, "true", &[], out.clone(), fn_true)
        .register(FN, "false", &[], out.clone(), fn_false)
        .register(FN, "not", &[items()], out.clone(), fn_not)
        .register(FN, "boolean", &[items()], out, fn_boolean);
}

fn fn_true(_ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(true))
}

fn fn_false(_ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(false))
}

fn fn_not(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(!args[0].ebv()?))
}

fn fn_boolean(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(boolean(args[0].ebv()?))
}
