use url::Url;

use super::common::{boolean, node_or_context, one, opt, opt_node, opt_string, string};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{AtomicValue, Sequence};
use crate::model::{NodeKind, NodeRef};
use crate::types::{AtomicType, ItemType, SequenceType};

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{Boolean, String as Str, Uri};
    let nodes = SequenceType::zero_or_more(ItemType::any_node());
    b.register_range(FN, "name", 0, Some(1), &[opt_node()], one(Str), name)
        .register_range(FN, "local-name", 0, Some(1), &[opt_node()], one(Str), local_name)
        .register_range(FN, "namespace-uri", 0, Some(1), &[opt_node()], one(Uri), namespace_uri)
        .register_range(FN, "root", 0, Some(1), &[opt_node()], opt_node(), root)
        .register_range(FN, "path", 0, Some(1), &[opt_node()], opt(Str), path)
        .register_range(FN, "has-children", 0, Some(1), &[opt_node()], one(Boolean), has_children)
        .register(FN, "innermost", &[nodes.clone()], nodes.clone(), innermost)
        .register(FN, "outermost", &[nodes.clone()], nodes, outermost)
        .register_range(FN, "base-uri", 0, Some(1), &[opt_node()], opt(Uri), base_uri)
        .register_range(FN, "document-uri", 0, Some(1), &[opt_node()], opt(Uri), document_uri)
        .register(FN, "static-base-uri", &[], opt(Uri), static_base_uri)
        .register_range(FN, "resolve-uri", 1, Some(2), &[opt(Str), one(Str)], opt(Uri), resolve_uri);
}

fn name(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    Ok(string(
        node.as_ref()
            .and_then(NodeRef::name)
            .map(crate::model::QName::to_eqname)
            .unwrap_or_default(),
    ))
}

fn local_name(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    Ok(string(
        node.as_ref()
            .and_then(NodeRef::name)
            .map(|n| n.local_name().to_string())
            .unwrap_or_default(),
    ))
}

fn namespace_uri(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    let uri = node
        .as_ref()
        .and_then(NodeRef::name)
        .and_then(|n| n.ns_uri().map(str::to_string))
        .unwrap_or_default();
    Ok(Sequence::of(AtomicValue::Uri(uri)))
}

fn root(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(node_or_context(ctx, args, 0)?
        .map(|n| Sequence::of(n.root()))
        .unwrap_or_default())
}

fn path(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(node_or_context(ctx, args, 0)?
        .map(|n| string(n.metapath()))
        .unwrap_or_default())
}

fn has_children(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    Ok(boolean(node.is_some_and(|n| n.has_children())))
}

/// Nodes of `arg` that are not an ancestor of another node of `arg`.
fn innermost(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let nodes = Sequence::sort_nodes(args[0].nodes()?);
    let selected: Vec<NodeRef> = nodes
        .iter()
        .filter(|n| !nodes.iter().any(|other| other != *n && n.contains(other)))
        .cloned()
        .collect();
    Ok(Sequence::from_nodes(selected))
}

/// Nodes of `arg` that have no ancestor in `arg`.
fn outermost(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let nodes = Sequence::sort_nodes(args[0].nodes()?);
    let selected: Vec<NodeRef> = nodes
        .iter()
        .filter(|n| !nodes.iter().any(|other| other != *n && other.contains(n)))
        .cloned()
        .collect();
    Ok(Sequence::from_nodes(selected))
}

fn base_uri(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    Ok(node
        .and_then(|n| n.base_uri().map(|uri| Sequence::of(AtomicValue::Uri(uri.to_string()))))
        .unwrap_or_default())
}

/// URI of a document node; other nodes have none.
fn document_uri(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let node = node_or_context(ctx, args, 0)?;
    Ok(node
        .filter(|n| n.kind() == NodeKind::Document)
        .and_then(|n| n.base_uri().map(|uri| Sequence::of(AtomicValue::Uri(uri.to_string()))))
        .unwrap_or_default())
}

fn static_base_uri(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::from_option(
        ctx.static_context().base_uri.clone().map(AtomicValue::Uri),
    ))
}

/// Resolves `relative` against `base`, or the static base URI when omitted.
fn resolve_uri(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let Some(relative) = opt_string(&args[0]) else {
        return Ok(Sequence::empty());
    };
    let invalid = |what: &str, value: &str| {
        Error::from_code(ErrorCode::FORG0002, format!("invalid {what} URI '{value}'"))
    };
    if let Ok(absolute) = Url::parse(&relative) {
        return Ok(Sequence::of(AtomicValue::Uri(absolute.to_string())));
    }
    let base = match args.get(1) {
        Some(base) => opt_string(base),
        None => ctx.static_context().base_uri.clone(),
    };
    let Some(base) = base else {
        return Err(invalid("relative", &relative));
    };
    let base_url = Url::parse(&base).map_err(|_| invalid("base", &base))?;
    let resolved = base_url.join(&relative).map_err(|_| invalid("relative", &relative))?;
    Ok(Sequence::of(AtomicValue::Uri(resolved.to_string())))
}
