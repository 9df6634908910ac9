//! Well-known namespace URIs and prefixes used by Metapath.

/// Namespace of Metapath atomic and node type names (`meta:`).
pub const NS_METAPATH: &str = "http://csrc.nist.gov/ns/metaschema/metapath";
/// Namespace of the core Metapath function library (`mp:` / `fn:`).
pub const NS_METAPATH_FUNCTIONS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions";
pub const NS_METAPATH_FUNCTIONS_MATH: &str =
    "http://csrc.nist.gov/ns/metaschema/metapath-functions/math";
pub const NS_METAPATH_FUNCTIONS_ARRAY: &str =
    "http://csrc.nist.gov/ns/metaschema/metapath-functions/array";
pub const NS_METAPATH_FUNCTIONS_MAP: &str =
    "http://csrc.nist.gov/ns/metaschema/metapath-functions/map";
/// XML Schema namespace; its type names are accepted as aliases.
pub const NS_XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";
/// Namespace of error codes (`err:`).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";

pub const PREFIX_META: &str = "meta";
pub const PREFIX_METAPATH_FUNCTIONS: &str = "mp";
pub const PREFIX_FN: &str = "fn";
pub const PREFIX_MATH: &str = "math";
pub const PREFIX_ARRAY: &str = "array";
pub const PREFIX_MAP: &str = "map";
pub const PREFIX_XS: &str = "xs";
pub const PREFIX_ERR: &str = "err";
