use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};

use crate::consts::{
    ERR_NS, NS_METAPATH, NS_METAPATH_FUNCTIONS, NS_METAPATH_FUNCTIONS_ARRAY,
    NS_METAPATH_FUNCTIONS_MAP, NS_METAPATH_FUNCTIONS_MATH, NS_XML_SCHEMA, PREFIX_ARRAY,
    PREFIX_ERR, PREFIX_FN, PREFIX_MAP, PREFIX_MATH, PREFIX_META, PREFIX_METAPATH_FUNCTIONS,
    PREFIX_XS,
};
use crate::engine::functions::FunctionLibrary;
use crate::item::{Item, Sequence};
use crate::model::QName;
use crate::types::AdapterRegistry;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Static
    MPST0003, // query text does not match the grammar
    MPST0008, // undefined variable or name
    MPST0010, // namespace axis is not supported
    MPST0017, // no function matching name and arity
    MPST0051, // unknown atomic type
    MPST0080, // cast to an abstract type
    MPST0081, // prefix cannot be expanded
    // Type
    MPTY0004, // operand or argument type mismatch
    MPTY0018, // path step result mixes nodes and atomic values
    MPTY0019, // path step applied to a non-node item
    MPTY0020, // axis step with a non-node focus
    // Dynamic
    MPDY0002, // focus (context item) is absent
    MPDY0050, // treat as failed
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOCA0002, // invalid lexical value
    FOCH0003, // unsupported normalization form
    FODT0001, // date/time overflow
    FODT0002, // duration overflow
    FODT0003, // invalid timezone value
    FOER0000, // fn:error
    FORG0001, // invalid value for cast
    FORG0002, // invalid argument to fn:resolve-uri
    FORG0003, // zero-or-one called with more than one item
    FORG0004, // one-or-more called with empty sequence
    FORG0005, // exactly-one called with zero or many items
    FORG0006, // invalid argument type
    FORG0008, // date and time have different timezones
    FORX0001, // invalid regular expression flags
    FORX0002, // invalid regular expression
    FOTY0012, // node has no typed value
    FOTY0013, // function item cannot be atomized
    FOAY0001, // array index out of bounds
    FOAY0002, // negative array length
    FOJS0003, // duplicate map key
    Unknown,
}

/// Error taxonomy used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Name or arity could not be resolved while compiling.
    Static,
    /// Operand type or cardinality violated during evaluation.
    DynamicType,
    /// A value could not be converted to the requested atomic type.
    Cast,
    /// A node navigation or node-kind requirement failed.
    AxisNavigation,
    /// Any other evaluation failure.
    Dynamic,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            MPST0003 => "MPST0003",
            MPST0008 => "MPST0008",
            MPST0010 => "MPST0010",
            MPST0017 => "MPST0017",
            MPST0051 => "MPST0051",
            MPST0080 => "MPST0080",
            MPST0081 => "MPST0081",
            MPTY0004 => "MPTY0004",
            MPTY0018 => "MPTY0018",
            MPTY0019 => "MPTY0019",
            MPTY0020 => "MPTY0020",
            MPDY0002 => "MPDY0002",
            MPDY0050 => "MPDY0050",
            FOAR0001 => "FOAR0001",
            FOAR0002 => "FOAR0002",
            FOCA0002 => "FOCA0002",
            FOCH0003 => "FOCH0003",
            FODT0001 => "FODT0001",
            FODT0002 => "FODT0002",
            FODT0003 => "FODT0003",
            FOER0000 => "FOER0000",
            FORG0001 => "FORG0001",
            FORG0002 => "FORG0002",
            FORG0003 => "FORG0003",
            FORG0004 => "FORG0004",
            FORG0005 => "FORG0005",
            FORG0006 => "FORG0006",
            FORG0008 => "FORG0008",
            FORX0001 => "FORX0001",
            FORX0002 => "FORX0002",
            FOTY0012 => "FOTY0012",
            FOTY0013 => "FOTY0013",
            FOAY0001 => "FOAY0001",
            FOAY0002 => "FOAY0002",
            FOJS0003 => "FOJS0003",
            Unknown => "UNKNOWN",
        }
    }

    /// The code as a qualified name in the `err` namespace.
    pub fn qname(self) -> QName {
        QName::new(Some(ERR_NS), self.as_str())
    }

    /// Parses `err:CODE` (or a bare `CODE`) back into the enum.
    pub fn from_code(s: &str) -> Self {
        let local = s.strip_prefix("err:").unwrap_or(s);
        ALL_CODES
            .iter()
            .copied()
            .find(|c| c.as_str() == local)
            .unwrap_or(ErrorCode::Unknown)
    }

    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            MPST0003 | MPST0008 | MPST0010 | MPST0017 | MPST0051 | MPST0080 | MPST0081 => {
                ErrorKind::Static
            }
            FORG0001 | FOCA0002 => ErrorKind::Cast,
            MPTY0019 | MPTY0020 | MPDY0050 => ErrorKind::AxisNavigation,
            MPTY0004 | MPTY0018 | FORG0003 | FORG0004 | FORG0005 | FORG0006 | FOAR0001
            | FOAR0002 | FOTY0012 | FOTY0013 => ErrorKind::DynamicType,
            _ => ErrorKind::Dynamic,
        }
    }
}

const ALL_CODES: [ErrorCode; 35] = {
    use ErrorCode::*;
    [
        MPST0003, MPST0008, MPST0010, MPST0017, MPST0051, MPST0080, MPST0081, MPTY0004, MPTY0018,
        MPTY0019, MPTY0020, MPDY0002, MPDY0050, FOAR0001, FOAR0002, FOCA0002, FOCH0003, FODT0001,
        FODT0002, FODT0003, FOER0000, FORG0001, FORG0002, FORG0003, FORG0004, FORG0005, FORG0006,
        FORG0008, FORX0001, FORX0002, FOTY0012, FOTY0013, FOAY0001, FOAY0002, FOJS0003,
    ]
};

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX_ERR}:{}", self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("error: {message} ({code})")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Format the code as `err:LOCAL`.
    pub fn format_code(&self) -> String {
        self.code.to_string()
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::MPTY0004, msg)
    }

    pub(crate) fn no_focus() -> Self {
        Self::from_code(ErrorCode::MPDY0002, "the focus is absent")
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORX0002, format!("invalid regular expression: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(e: chrono::ParseError) -> Self {
        Error::from_code(ErrorCode::FORG0001, format!("invalid temporal value: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

/// Role of a name in a query; decides which default namespace applies to
/// unprefixed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRole {
    Model,
    Flag,
    Function,
    Type,
    Variable,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

/// Compile-time environment. Immutable once built and captured by every
/// compiled expression and inline function.
#[derive(Debug, Clone)]
pub struct StaticContext {
    pub base_uri: Option<String>,
    pub default_model_namespace: Option<String>,
    pub default_function_namespace: Option<String>,
    pub namespaces: NamespaceBindings,
    pub in_scope_variables: HashSet<QName>,
    pub functions: Arc<FunctionLibrary>,
    pub adapters: Arc<AdapterRegistry>,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        for (prefix, uri) in [
            (PREFIX_META, NS_METAPATH),
            (PREFIX_METAPATH_FUNCTIONS, NS_METAPATH_FUNCTIONS),
            (PREFIX_FN, NS_METAPATH_FUNCTIONS),
            (PREFIX_MATH, NS_METAPATH_FUNCTIONS_MATH),
            (PREFIX_ARRAY, NS_METAPATH_FUNCTIONS_ARRAY),
            (PREFIX_MAP, NS_METAPATH_FUNCTIONS_MAP),
            (PREFIX_XS, NS_XML_SCHEMA),
            (PREFIX_ERR, ERR_NS),
        ] {
            ns.by_prefix.insert(prefix.to_string(), uri.to_string());
        }
        Self {
            base_uri: None,
            default_model_namespace: None,
            default_function_namespace: Some(NS_METAPATH_FUNCTIONS.to_string()),
            namespaces: ns,
            in_scope_variables: HashSet::new(),
            functions: FunctionLibrary::standard(),
            adapters: AdapterRegistry::standard(),
        }
    }
}

impl StaticContext {
    pub fn resolve_prefix(&self, prefix: &str) -> Result<&str, Error> {
        self.namespaces
            .by_prefix
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::from_code(
                    ErrorCode::MPST0081,
                    format!("the prefix '{prefix}' is not bound to a namespace"),
                )
            })
    }

    /// Expands a (prefix, local) pair using the default namespace for `role`.
    pub fn expand(&self, prefix: Option<&str>, local: &str, role: NameRole) -> Result<QName, Error> {
        if let Some(p) = prefix {
            let uri = self.resolve_prefix(p)?;
            return Ok(QName::new(Some(uri), local));
        }
        let default_ns = match role {
            NameRole::Model => self.default_model_namespace.as_deref(),
            NameRole::Function => self.default_function_namespace.as_deref(),
            NameRole::Type => Some(NS_METAPATH),
            NameRole::Flag | NameRole::Variable => None,
        };
        Ok(QName::new(default_ns, local))
    }

    /// Expands a lexical name: `Q{uri}local`, `prefix:local` or `local`.
    pub fn expand_lexical(&self, lexical: &str, role: NameRole) -> Result<QName, Error> {
        let lexical = lexical.trim();
        if let Some(body) = lexical.strip_prefix("Q{") {
            if let Some((uri, local)) = body.split_once('}') {
                return Ok(QName::new(Some(uri), local));
            }
        }
        match lexical.split_once(':') {
            Some((prefix, local)) => self.expand(Some(prefix), local, role),
            None => self.expand(None, lexical, role),
        }
    }
}

/// Builder for [`StaticContext`].
///
/// The resulting context is an immutable snapshot embedded into every
/// expression compiled against it; changing a builder afterwards has no
/// effect on existing compiled expressions.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: StaticContext::default(),
        }
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.ctx.base_uri = Some(uri.into());
        self
    }

    pub fn with_default_model_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_model_namespace = Some(uri.into());
        self
    }

    pub fn with_default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_function_namespace = Some(uri.into());
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.ctx.namespaces.by_prefix.insert(prefix.into(), uri.into());
        self
    }

    /// Declares a variable the caller will bind in the dynamic context.
    pub fn with_variable(mut self, name: impl Into<QName>) -> Self {
        self.ctx.in_scope_variables.insert(name.into());
        self
    }

    pub fn with_function_library(mut self, functions: Arc<FunctionLibrary>) -> Self {
        self.ctx.functions = functions;
        self
    }

    pub fn with_adapter_registry(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.ctx.adapters = adapters;
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

/// Focus of an evaluation step: the context item, its position and the
/// size of the sequence it was taken from.
#[derive(Debug, Clone, Default)]
pub struct Focus {
    pub item: Option<Item>,
    pub position: usize,
    pub size: usize,
}

impl Focus {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(item: Item) -> Self {
        Self::at(item, 1, 1)
    }

    pub fn at(item: Item, position: usize, size: usize) -> Self {
        Self {
            item: Some(item),
            position,
            size,
        }
    }

    pub fn context_item(&self) -> Result<&Item, Error> {
        self.item.as_ref().ok_or_else(Error::no_focus)
    }
}

/// Run-time environment threaded through one top-level evaluation.
///
/// Not meant to be shared between concurrent evaluations; every binding
/// construct pushes onto the local variable stack and truncates it again
/// when the construct completes.
#[derive(Debug, Clone)]
pub struct DynamicContext {
    static_ctx: Arc<StaticContext>,
    now: DateTime<FixedOffset>,
    implicit_timezone: FixedOffset,
    globals: Arc<HashMap<QName, Sequence>>,
    locals: Vec<(QName, Sequence)>,
}

impl Default for DynamicContext {
    fn default() -> Self {
        DynamicContextBuilder::new().build()
    }
}

impl DynamicContext {
    pub fn static_context(&self) -> &Arc<StaticContext> {
        &self.static_ctx
    }

    /// The frozen "current time" anchor of this evaluation.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn implicit_timezone(&self) -> FixedOffset {
        self.implicit_timezone
    }

    pub fn variable(&self, name: &QName) -> Option<&Sequence> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.globals.get(name))
    }

    pub(crate) fn push_variable(&mut self, name: QName, value: Sequence) {
        self.locals.push((name, value));
    }

    pub(crate) fn scope_mark(&self) -> usize {
        self.locals.len()
    }

    pub(crate) fn restore_scope(&mut self, mark: usize) {
        self.locals.truncate(mark);
    }

    pub(crate) fn local_bindings(&self) -> &[(QName, Sequence)] {
        &self.locals
    }

    /// Swaps in `static_ctx` for the duration of `f`.
    pub(crate) fn with_static_context<R>(
        &mut self,
        static_ctx: &Arc<StaticContext>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.static_ctx, Arc::clone(static_ctx));
        let result = f(self);
        self.static_ctx = previous;
        result
    }

    /// A fresh scope sharing the clock and global variables but none of the
    /// caller's local bindings.
    pub(crate) fn isolated(
        &self,
        static_ctx: Arc<StaticContext>,
        locals: Vec<(QName, Sequence)>,
    ) -> DynamicContext {
        DynamicContext {
            static_ctx,
            now: self.now,
            implicit_timezone: self.implicit_timezone,
            globals: Arc::clone(&self.globals),
            locals,
        }
    }
}

pub struct DynamicContextBuilder {
    static_ctx: Option<Arc<StaticContext>>,
    now: Option<DateTime<FixedOffset>>,
    implicit_timezone: Option<FixedOffset>,
    variables: HashMap<QName, Sequence>,
}

impl Default for DynamicContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicContextBuilder {
    pub fn new() -> Self {
        Self {
            static_ctx: None,
            now: None,
            implicit_timezone: None,
            variables: HashMap::new(),
        }
    }

    /// Static context used by functions that compile queries at run time.
    pub fn with_static_context(mut self, static_ctx: Arc<StaticContext>) -> Self {
        self.static_ctx = Some(static_ctx);
        self
    }

    pub fn with_variable(mut self, name: impl Into<QName>, value: impl Into<Sequence>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_implicit_timezone(mut self, tz: FixedOffset) -> Self {
        self.implicit_timezone = Some(tz);
        self
    }

    pub fn build(self) -> DynamicContext {
        let now = self.now.unwrap_or_else(|| Local::now().fixed_offset());
        DynamicContext {
            static_ctx: self
                .static_ctx
                .unwrap_or_else(|| Arc::new(StaticContext::default())),
            implicit_timezone: self.implicit_timezone.unwrap_or_else(|| *now.offset()),
            now,
            globals: Arc::new(self.variables),
            locals: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip() {
        for code in ALL_CODES {
            assert_eq!(ErrorCode::from_code(&code.to_string()), code);
        }
        assert_eq!(ErrorCode::from_code("err:NOPE0000"), ErrorCode::Unknown);
    }

    #[test]
    fn unprefixed_names_use_role_defaults() {
        let ctx = StaticContextBuilder::new()
            .with_default_model_namespace("urn:model")
            .build();
        let model = ctx.expand(None, "a", NameRole::Model).unwrap();
        assert_eq!(model.ns_uri(), Some("urn:model"));
        let flag = ctx.expand(None, "id", NameRole::Flag).unwrap();
        assert_eq!(flag.ns_uri(), None);
        let ty = ctx.expand_lexical("integer", NameRole::Type).unwrap();
        assert_eq!(ty.ns_uri(), Some(NS_METAPATH));
        assert!(ctx.expand(Some("nope"), "x", NameRole::Model).is_err());
    }
}
