//! Node-tree model queried by the engine.
//!
//! Trees are stored in an arena ([`DocumentTree`]) and addressed through cheap
//! [`NodeRef`] handles. Parent links are plain indices into the arena.

use std::fmt;

use string_cache::DefaultAtom;

pub mod axis;
pub mod tree;

pub use axis::Axis;
pub use tree::{DocumentTree, NodeBuilder, NodeId, NodeRef, assembly, document, field, flag};

pub type Atom = DefaultAtom;

/// Expanded qualified name: optional namespace URI plus local part.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<Atom>,
    pub local: Atom,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(Atom::from),
            local: Atom::from(local),
        }
    }

    /// Name without a namespace.
    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }

    pub fn ns_uri(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// `Q{uri}local` rendering, or the bare local name when there is no namespace.
    pub fn to_eqname(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("Q{{{ns}}}{}", self.local),
            None => self.local.to_string(),
        }
    }
}

impl From<&str> for QName {
    fn from(local: &str) -> Self {
        QName::local(local)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_eqname())
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self.to_eqname())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Assembly,
    Field,
    Flag,
}

impl NodeKind {
    pub fn test_name(self) -> &'static str {
        match self {
            NodeKind::Document => "document-node",
            NodeKind::Assembly => "assembly",
            NodeKind::Field => "field",
            NodeKind::Flag => "flag",
        }
    }

    /// Assemblies and fields are model items, reachable over the child axis.
    pub fn is_model_item(self) -> bool {
        matches!(self, NodeKind::Assembly | NodeKind::Field)
    }
}
