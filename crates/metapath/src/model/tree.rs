//! Arena-backed document trees.
//!
//! Nodes are laid out in document order (a node, then its flags, then its
//! model children, recursively), so document order is index order and every
//! subtree occupies a contiguous index range.
//!
//! ```
//! use metaschema_metapath::model::{assembly, document, field, flag, NodeKind};
//!
//! let doc = document()
//!     .child(
//!         assembly("catalog")
//!             .flag(flag("id", "c1"))
//!             .child(field("title", "Controls")),
//!     )
//!     .build();
//! let catalog = &doc.children()[0];
//! assert_eq!(catalog.kind(), NodeKind::Assembly);
//! assert_eq!(catalog.flags()[0].string_value(), "c1");
//! assert_eq!(doc.string_value(), "Controls");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::AtomicValue;
use crate::model::{NodeKind, QName};
use crate::types::{AdapterRegistry, AtomicType};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct NodeRecord {
    kind: NodeKind,
    name: Option<QName>,
    definition: Option<QName>,
    value: Option<AtomicValue>,
    parent: Option<NodeId>,
    flags: Vec<NodeId>,
    children: Vec<NodeId>,
    /// Last index inside this node's subtree.
    subtree_end: NodeId,
}

/// Immutable arena holding one tree.
#[derive(Debug)]
pub struct DocumentTree {
    id: u64,
    base_uri: Option<String>,
    nodes: Vec<NodeRecord>,
}

impl DocumentTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    fn record(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id.0]
    }
}

/// Handle to one node of a [`DocumentTree`].
#[derive(Clone)]
pub struct NodeRef {
    tree: Arc<DocumentTree>,
    id: NodeId,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.id.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("id", &self.id.0)
            .finish()
    }
}

impl NodeRef {
    fn at(&self, id: NodeId) -> NodeRef {
        NodeRef {
            tree: Arc::clone(&self.tree),
            id,
        }
    }

    fn record(&self) -> &NodeRecord {
        self.tree.record(self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &Arc<DocumentTree> {
        &self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.record().kind
    }

    /// Instance name; `None` for documents.
    pub fn name(&self) -> Option<&QName> {
        self.record().name.as_ref()
    }

    /// Name of the definition this node is an instance of.
    pub fn definition_name(&self) -> Option<&QName> {
        self.record().definition.as_ref()
    }

    /// Typed value of a field or flag.
    pub fn value(&self) -> Option<&AtomicValue> {
        self.record().value.as_ref()
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.tree.base_uri()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.record().parent.map(|p| self.at(p))
    }

    pub fn flags(&self) -> Vec<NodeRef> {
        self.record().flags.iter().map(|&i| self.at(i)).collect()
    }

    pub fn flag_named(&self, name: &QName) -> Option<NodeRef> {
        self.record()
            .flags
            .iter()
            .find(|&&i| self.tree.record(i).name.as_ref() == Some(name))
            .map(|&i| self.at(i))
    }

    /// Model children (assemblies and fields) in document order.
    pub fn children(&self) -> Vec<NodeRef> {
        self.record().children.iter().map(|&i| self.at(i)).collect()
    }

    pub fn children_named(&self, name: &QName) -> Vec<NodeRef> {
        self.record()
            .children
            .iter()
            .filter(|&&i| self.tree.record(i).name.as_ref() == Some(name))
            .map(|&i| self.at(i))
            .collect()
    }

    pub fn has_children(&self) -> bool {
        !self.record().children.is_empty()
    }

    pub fn root(&self) -> NodeRef {
        self.at(NodeId(0))
    }

    /// Ancestors from the root down to the parent.
    pub fn ancestors(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut cur = self.record().parent;
        while let Some(p) = cur {
            out.push(self.at(p));
            cur = self.tree.record(p).parent;
        }
        out.reverse();
        out
    }

    /// Model-item descendants in document order.
    pub fn descendants(&self) -> Vec<NodeRef> {
        let end = self.record().subtree_end.0;
        (self.id.0 + 1..=end)
            .map(NodeId)
            .filter(|&i| self.tree.record(i).kind != NodeKind::Flag)
            .map(|i| self.at(i))
            .collect()
    }

    pub fn following_siblings(&self) -> Vec<NodeRef> {
        self.siblings(Ordering::Greater)
    }

    pub fn preceding_siblings(&self) -> Vec<NodeRef> {
        self.siblings(Ordering::Less)
    }

    fn siblings(&self, side: Ordering) -> Vec<NodeRef> {
        if self.kind() == NodeKind::Flag {
            return Vec::new();
        }
        let Some(parent) = self.record().parent else {
            return Vec::new();
        };
        self.tree
            .record(parent)
            .children
            .iter()
            .filter(|&&i| i.cmp(&self.id) == side)
            .map(|&i| self.at(i))
            .collect()
    }

    /// Model items after this node in document order, excluding descendants.
    pub fn following(&self) -> Vec<NodeRef> {
        let start = self.record().subtree_end.0 + 1;
        (start..self.tree.len())
            .map(NodeId)
            .filter(|&i| self.tree.record(i).kind != NodeKind::Flag)
            .map(|i| self.at(i))
            .collect()
    }

    /// Model items before this node in document order, excluding ancestors.
    pub fn preceding(&self) -> Vec<NodeRef> {
        let mut ancestors = Vec::new();
        let mut cur = self.record().parent;
        while let Some(p) = cur {
            ancestors.push(p);
            cur = self.tree.record(p).parent;
        }
        (0..self.id.0)
            .map(NodeId)
            .filter(|i| !ancestors.contains(i))
            .filter(|&i| self.tree.record(i).kind.is_model_item())
            .map(|i| self.at(i))
            .collect()
    }

    /// Total document order; nodes of different trees order by tree creation.
    pub fn document_order(&self, other: &NodeRef) -> Ordering {
        self.tree
            .id
            .cmp(&other.tree.id)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Contains `other` in its subtree (or is `other`).
    pub fn contains(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree)
            && other.id >= self.id
            && other.id <= self.record().subtree_end
    }

    /// Leaves yield their value's lexical form; assemblies and documents
    /// concatenate the values of all descendant fields.
    pub fn string_value(&self) -> String {
        match self.kind() {
            NodeKind::Field | NodeKind::Flag => {
                self.value().map(AtomicValue::lexical).unwrap_or_default()
            }
            NodeKind::Assembly | NodeKind::Document => {
                let end = self.record().subtree_end.0;
                let mut out = String::new();
                for i in self.id.0 + 1..=end {
                    let rec = self.tree.record(NodeId(i));
                    if rec.kind == NodeKind::Field {
                        if let Some(v) = &rec.value {
                            out.push_str(&v.lexical());
                        }
                    }
                }
                out
            }
        }
    }

    /// Atomized value; documents and assemblies have none.
    pub fn typed_value(&self) -> Result<Option<AtomicValue>, Error> {
        match self.kind() {
            NodeKind::Field | NodeKind::Flag => Ok(self.value().cloned()),
            kind => Err(Error::from_code(
                ErrorCode::FOTY0012,
                format!(
                    "{} node '{}' has no typed value",
                    kind.test_name(),
                    self.metapath()
                ),
            )),
        }
    }

    /// 1-based position among siblings sharing this node's name.
    pub fn position(&self) -> usize {
        match (self.parent(), self.name()) {
            (Some(parent), Some(name)) if self.kind() != NodeKind::Flag => parent
                .children_named(name)
                .iter()
                .position(|n| n == self)
                .map_or(1, |p| p + 1),
            _ => 1,
        }
    }

    /// Location path such as `/catalog[1]/group[2]/@id`.
    pub fn metapath(&self) -> String {
        let mut segments = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            match (node.kind(), node.name()) {
                (NodeKind::Flag, Some(name)) => segments.push(format!("@{}", name.to_eqname())),
                (NodeKind::Assembly | NodeKind::Field, Some(name)) => {
                    segments.push(format!("{}[{}]", name.to_eqname(), node.position()));
                }
                _ => {}
            }
            cur = node.parent();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

/// Declarative builder for a node and its subtree.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    definition: Option<QName>,
    value: Option<AtomicValue>,
    base_uri: Option<String>,
    flags: Vec<NodeBuilder>,
    children: Vec<NodeBuilder>,
}

pub fn document() -> NodeBuilder {
    NodeBuilder::new(NodeKind::Document, None, None)
}

pub fn assembly(name: impl Into<QName>) -> NodeBuilder {
    NodeBuilder::new(NodeKind::Assembly, Some(name.into()), None)
}

pub fn field(name: impl Into<QName>, value: impl Into<AtomicValue>) -> NodeBuilder {
    NodeBuilder::new(NodeKind::Field, Some(name.into()), Some(value.into()))
}

pub fn flag(name: impl Into<QName>, value: impl Into<AtomicValue>) -> NodeBuilder {
    NodeBuilder::new(NodeKind::Flag, Some(name.into()), Some(value.into()))
}

impl NodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<AtomicValue>) -> Self {
        Self {
            kind,
            name,
            definition: None,
            value,
            base_uri: None,
            flags: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn definition(mut self, name: impl Into<QName>) -> Self {
        self.definition = Some(name.into());
        self
    }

    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    pub fn value(mut self, value: impl Into<AtomicValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the value by parsing `lexical` with the registered adapter for `ty`.
    pub fn parsed_value(self, ty: AtomicType, lexical: &str) -> Result<Self, Error> {
        self.parsed_value_with(&AdapterRegistry::standard(), ty, lexical)
    }

    pub fn parsed_value_with(
        mut self,
        registry: &AdapterRegistry,
        ty: AtomicType,
        lexical: &str,
    ) -> Result<Self, Error> {
        self.value = Some(registry.parse(ty, lexical)?);
        Ok(self)
    }

    pub fn flag(mut self, flag: NodeBuilder) -> Self {
        debug_assert!(flag.kind == NodeKind::Flag);
        self.flags.push(flag);
        self
    }

    pub fn child(mut self, child: NodeBuilder) -> Self {
        debug_assert!(child.kind.is_model_item());
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeBuilder>) -> Self {
        for child in children {
            self = self.child(child);
        }
        self
    }

    /// Lays the subtree out in an arena and returns a handle to its root.
    pub fn build(self) -> NodeRef {
        let base_uri = self.base_uri.clone();
        let mut nodes = Vec::new();
        let root = flatten(self, None, &mut nodes);
        let tree = DocumentTree {
            id: NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            base_uri,
            nodes,
        };
        tracing::trace!(tree = tree.id, nodes = tree.len(), "built document tree");
        NodeRef {
            tree: Arc::new(tree),
            id: root,
        }
    }
}

fn flatten(builder: NodeBuilder, parent: Option<NodeId>, nodes: &mut Vec<NodeRecord>) -> NodeId {
    let NodeBuilder {
        kind,
        name,
        definition,
        value,
        flags,
        children,
        ..
    } = builder;
    let id = NodeId(nodes.len());
    nodes.push(NodeRecord {
        kind,
        name,
        definition,
        value,
        parent,
        flags: Vec::new(),
        children: Vec::new(),
        subtree_end: id,
    });
    let flag_ids: Vec<NodeId> = flags
        .into_iter()
        .map(|f| flatten(f, Some(id), nodes))
        .collect();
    let child_ids: Vec<NodeId> = children
        .into_iter()
        .map(|c| flatten(c, Some(id), nodes))
        .collect();
    let end = NodeId(nodes.len() - 1);
    let record = &mut nodes[id.0];
    record.flags = flag_ids;
    record.children = child_ids;
    record.subtree_end = end;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeRef {
        document()
            .child(
                assembly("a")
                    .flag(flag("id", "x"))
                    .child(assembly("b").child(field("f", "1")))
                    .child(assembly("c"))
                    .child(field("f", "2")),
            )
            .build()
    }

    #[test]
    fn subtree_ranges_drive_axes() {
        let doc = sample();
        let a = &doc.children()[0];
        let names: Vec<_> = a
            .descendants()
            .iter()
            .map(|n| n.name().unwrap().local_name().to_string())
            .collect();
        assert_eq!(names, ["b", "f", "c", "f"]);
        let b = &a.children()[0];
        assert_eq!(b.following().len(), 2);
        let c = &a.children()[1];
        assert_eq!(c.preceding().len(), 2);
    }

    #[test]
    fn paths_and_string_values() {
        let doc = sample();
        let a = &doc.children()[0];
        assert_eq!(a.flags()[0].metapath(), "/a[1]/@id");
        assert_eq!(a.children()[2].metapath(), "/a[1]/f[1]");
        assert_eq!(doc.string_value(), "12");
        assert!(a.typed_value().is_err());
    }
}
