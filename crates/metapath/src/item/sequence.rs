//! Ordered item sequences.
//!
//! A [`Sequence`] is always materialized: iterating it through [`Sequence::iter`]
//! is restartable, and callers may traverse it any number of times. The
//! consuming [`IntoIterator`] view is the one-shot streaming form.

use itertools::Itertools;

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::{AtomicValue, FunctionItem, Item};
use crate::model::NodeRef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    items: Vec<Item>,
}

impl Sequence {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(item: impl Into<Item>) -> Self {
        Self {
            items: vec![item.into()],
        }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn from_atomics(values: impl IntoIterator<Item = AtomicValue>) -> Self {
        values.into_iter().map(Item::Atomic).collect()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeRef>) -> Self {
        nodes.into_iter().map(Item::Node).collect()
    }

    /// A single atomic value, or empty when `None`.
    pub fn from_option(value: Option<AtomicValue>) -> Self {
        value.map(Sequence::of).unwrap_or_default()
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    pub fn push(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    pub fn append(&mut self, other: Sequence) {
        self.items.extend(other.items);
    }

    /// First item; when `require_single` is set more than one item is an error.
    pub fn first_item(&self, require_single: bool) -> Result<Option<&Item>, Error> {
        if require_single && self.items.len() > 1 {
            return Err(Error::from_code(
                ErrorCode::MPTY0004,
                format!(
                    "a sequence of zero or one expected, but size is '{}'",
                    self.items.len()
                ),
            ));
        }
        Ok(self.items.first())
    }

    /// Flattens nodes to their typed values. Idempotent.
    pub fn atomize(&self) -> Result<Vec<AtomicValue>, Error> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            item.atomize_into(&mut out)?;
        }
        Ok(out)
    }

    pub fn atomized(&self) -> Result<Sequence, Error> {
        Ok(Sequence::from_atomics(self.atomize()?))
    }

    /// Atomizes and requires at most one value.
    pub fn atomize_optional(&self) -> Result<Option<AtomicValue>, Error> {
        let mut values = self.atomize()?;
        match values.len() {
            0 | 1 => Ok(values.pop()),
            n => Err(Error::from_code(
                ErrorCode::MPTY0004,
                format!("a sequence of zero or one expected, but size is '{n}'"),
            )),
        }
    }

    /// Effective boolean value.
    pub fn ebv(&self) -> Result<bool, Error> {
        let first = match self.items.as_slice() {
            [] => return Ok(false),
            [Item::Node(_), ..] => return Ok(true),
            [single] => single,
            _ => {
                return Err(Error::from_code(
                    ErrorCode::FORG0006,
                    format!(
                        "effective boolean value is not defined for a sequence of {} items starting with an atomic value",
                        self.items.len()
                    ),
                ));
            }
        };
        match first {
            Item::Atomic(AtomicValue::Boolean(b)) => Ok(*b),
            Item::Atomic(AtomicValue::Double(d)) => Ok(*d != 0.0 && !d.is_nan()),
            Item::Atomic(AtomicValue::Decimal(d)) => Ok(!d.is_zero()),
            Item::Atomic(v) if v.as_i64().is_some() => Ok(v.as_i64() != Some(0)),
            Item::Atomic(v) if v.as_str().is_some() => Ok(v.as_str().is_some_and(|s| !s.is_empty())),
            other => Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("effective boolean value is not defined for {}", other.signature()),
            )),
        }
    }

    /// All items as nodes, or a type error naming the first non-node.
    pub fn nodes(&self) -> Result<Vec<NodeRef>, Error> {
        self.items
            .iter()
            .map(|item| match item {
                Item::Node(n) => Ok(n.clone()),
                other => Err(Error::from_code(
                    ErrorCode::MPTY0019,
                    format!("expected a node, found {}", other.signature()),
                )),
            })
            .collect()
    }

    /// Removes duplicate nodes and sorts into document order.
    pub fn sort_nodes(nodes: Vec<NodeRef>) -> Vec<NodeRef> {
        nodes
            .into_iter()
            .sorted_by(NodeRef::document_order)
            .dedup()
            .collect()
    }

    pub fn only_nodes(&self) -> bool {
        self.items.iter().all(|i| matches!(i, Item::Node(_)))
    }

    pub fn signature(&self) -> String {
        format!("({})", self.items.iter().map(Item::signature).join(", "))
    }
}

impl FromIterator<Item> for Sequence {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Sequence {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl From<Item> for Sequence {
    fn from(item: Item) -> Self {
        Sequence::of(item)
    }
}

impl From<AtomicValue> for Sequence {
    fn from(v: AtomicValue) -> Self {
        Sequence::of(v)
    }
}

impl From<NodeRef> for Sequence {
    fn from(n: NodeRef) -> Self {
        Sequence::of(n)
    }
}

impl From<FunctionItem> for Sequence {
    fn from(f: FunctionItem) -> Self {
        Sequence::of(f)
    }
}

impl From<Vec<Item>> for Sequence {
    fn from(items: Vec<Item>) -> Self {
        Sequence::from_items(items)
    }
}
