//! Metapath-specific functions and `fn:error`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::common::{one, opt, opt_atomic, opt_string, string_arg};
use super::{CallContext, FunctionLibraryBuilder};
use crate::compiler::compile_in_context;
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::{Error, ErrorCode, Focus};
use crate::item::{AtomicValue, Item, Sequence};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{AnyAtomic, Base64, String as Str};
    let nodes = SequenceType::zero_or_more(ItemType::any_node());
    b.register(FN, "base64-encode-text", &[opt(Str)], opt(Base64), base64_encode)
        .register(FN, "base64-decode-text", &[opt(Base64)], opt(Str), base64_decode)
        .register(FN, "base64-encode", &[opt(Str)], opt(Base64), base64_encode)
        .register(FN, "base64-decode", &[opt(Base64)], opt(Str), base64_decode)
        .register_range(FN, "recurse-depth", 1, Some(2), &[nodes.clone(), one(Str)], nodes, recurse_depth)
        .register_range(
            FN,
            "error",
            0,
            Some(3),
            &[opt(AnyAtomic), one(Str), SequenceType::any()],
            SequenceType::empty(),
            error,
        );
}

fn base64_encode(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::from_option(
        opt_string(&args[0]).map(|text| AtomicValue::Base64(text.into_bytes())),
    ))
}

fn base64_decode(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let Some(AtomicValue::Base64(bytes)) = opt_atomic(&args[0]) else {
        return Ok(Sequence::empty());
    };
    let text = String::from_utf8(bytes.clone()).map_err(|_| {
        Error::from_code(
            ErrorCode::FORG0001,
            format!("'{}' does not decode to UTF-8 text", STANDARD.encode(bytes)),
        )
    })?;
    Ok(Sequence::of(AtomicValue::String(text)))
}

/// `recurse-depth($nodes, $path)` compiles `$path` once, then emits every node
/// followed, depth first, by the nodes `$path` reaches from it.
fn recurse_depth(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (initial, path) = match args {
        [path] => (Sequence::of(ctx.context_item()?.clone()), path),
        [initial, path, ..] => (initial.clone(), path),
        [] => return Ok(Sequence::empty()),
    };
    let compiled = compile_in_context(&string_arg(path), ctx.dynamic)?;
    let mut out = Sequence::empty();
    let mut stack: Vec<Item> = initial.into_items();
    stack.reverse();
    while let Some(item) = stack.pop() {
        if !matches!(item, Item::Node(_)) {
            return Err(Error::type_error(format!(
                "recurse-depth requires nodes, found {}",
                item.signature()
            )));
        }
        let next = compiled.root().accept(ctx.dynamic, &Focus::of(item.clone()))?;
        out.push(item);
        stack.extend(next.into_items().into_iter().rev());
    }
    Ok(out)
}

/// Raises a dynamic error; the code defaults to `err:FOER0000`.
fn error(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let lexical = args.first().and_then(opt_string);
    let code = lexical.as_deref().map_or(ErrorCode::FOER0000, |name| {
        let local = name
            .rsplit_once('}')
            .or_else(|| name.rsplit_once(':'))
            .map_or(name, |(_, local)| local);
        ErrorCode::from_code(local)
    });
    let description = args.get(1).map(string_arg).unwrap_or_else(|| match &lexical {
        Some(name) if code == ErrorCode::Unknown => format!("error {name} raised"),
        _ => "error raised by fn:error".to_string(),
    });
    tracing::debug!(code = %code, %description, "fn:error called");
    Err(Error::from_code(code, description))
}
