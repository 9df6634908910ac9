use std::sync::OnceLock;

use crate::engine::runtime::{Error, NameRole, StaticContext};
use crate::model::{Atom, NodeKind, NodeRef, QName};

/// Name filter of a step or kind test.
#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
    /// `*`
    Any,
    Name(QName),
    /// `prefix:*` or `Q{uri}*`
    Namespace(Option<Atom>),
    /// `*:local`
    Local(Atom),
}

impl NameTest {
    pub fn matches(&self, name: Option<&QName>) -> bool {
        match (self, name) {
            (NameTest::Any, Some(_)) => true,
            (NameTest::Name(expected), Some(n)) => expected == n,
            (NameTest::Namespace(ns), Some(n)) => &n.namespace == ns,
            (NameTest::Local(local), Some(n)) => &n.local == local,
            (_, None) => false,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            NameTest::Any => "*".to_string(),
            NameTest::Name(n) => n.to_eqname(),
            NameTest::Namespace(Some(ns)) => format!("Q{{{ns}}}*"),
            NameTest::Namespace(None) => "Q{}*".to_string(),
            NameTest::Local(local) => format!("*:{local}"),
        }
    }
}

/// A definition name in a kind test whose expansion is deferred until the
/// test is first used, then cached.
#[derive(Debug, Clone)]
pub struct DefinitionName {
    lexical: String,
    resolved: OnceLock<Result<QName, Error>>,
}

impl DefinitionName {
    pub fn new(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            resolved: OnceLock::new(),
        }
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn resolve(&self, ctx: &StaticContext) -> Result<&QName, Error> {
        self.resolved
            .get_or_init(|| ctx.expand_lexical(&self.lexical, NameRole::Model))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl PartialEq for DefinitionName {
    fn eq(&self, other: &Self) -> bool {
        self.lexical == other.lexical
    }
}

/// `node()`, `document-node(..)`, `assembly(..)`, `field(..)` or `flag(..)`.
#[derive(Debug, Clone, PartialEq)]
pub struct KindTest {
    /// `None` for `node()`.
    pub kind: Option<NodeKind>,
    pub name: NameTest,
    pub definition: Option<DefinitionName>,
    /// Element test nested in `document-node(..)`.
    pub document_element: Option<Box<KindTest>>,
}

impl KindTest {
    pub fn any_node() -> Self {
        Self {
            kind: None,
            name: NameTest::Any,
            definition: None,
            document_element: None,
        }
    }

    pub fn document(element: Option<KindTest>) -> Self {
        Self {
            kind: Some(NodeKind::Document),
            name: NameTest::Any,
            definition: None,
            document_element: element.map(Box::new),
        }
    }

    pub fn of_kind(kind: NodeKind, name: NameTest, definition: Option<DefinitionName>) -> Self {
        Self {
            kind: Some(kind),
            name,
            definition,
            document_element: None,
        }
    }

    pub fn matches(&self, node: &NodeRef, ctx: &StaticContext) -> Result<bool, Error> {
        let Some(kind) = self.kind else {
            return Ok(true);
        };
        if node.kind() != kind {
            return Ok(false);
        }
        if kind == NodeKind::Document {
            return match &self.document_element {
                None => Ok(true),
                Some(element) => {
                    let children = node.children();
                    match children.as_slice() {
                        [only] => element.matches(only, ctx),
                        _ => Ok(false),
                    }
                }
            };
        }
        if !self.name.matches(node.name()) {
            return Ok(false);
        }
        match &self.definition {
            None => Ok(true),
            Some(definition) => {
                let expected = definition.resolve(ctx)?;
                Ok(node.definition_name() == Some(expected))
            }
        }
    }

    pub fn signature(&self) -> String {
        let Some(kind) = self.kind else {
            return "node()".to_string();
        };
        if kind == NodeKind::Document {
            return match &self.document_element {
                Some(element) => format!("document-node({})", element.signature()),
                None => "document-node()".to_string(),
            };
        }
        match (&self.name, &self.definition) {
            (NameTest::Any, None) => format!("{}()", kind.test_name()),
            (name, None) => format!("{}({})", kind.test_name(), name.signature()),
            (name, Some(def)) => {
                format!("{}({},{})", kind.test_name(), name.signature(), def.lexical())
            }
        }
    }
}
