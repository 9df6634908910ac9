//! Immutable item and sequence model.

pub mod atomic;
pub mod function;
pub mod sequence;

pub use atomic::AtomicValue;
pub use function::{ArrayItem, FunctionItem, InlineClosure, MapItem, MapKey};
pub use sequence::Sequence;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{NodeKind, NodeRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Atomic(AtomicValue),
    Node(NodeRef),
    Function(FunctionItem),
}

impl Item {
    pub fn as_atomic(&self) -> Option<&AtomicValue> {
        match self {
            Item::Atomic(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Item::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionItem> {
        match self {
            Item::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Appends this item's atomized values to `out`.
    pub fn atomize_into(&self, out: &mut Vec<AtomicValue>) -> Result<(), Error> {
        match self {
            Item::Atomic(v) => out.push(v.clone()),
            Item::Node(n) => {
                if let Some(v) = n.typed_value()? {
                    out.push(v);
                }
            }
            Item::Function(FunctionItem::Array(array)) => {
                for member in array.members() {
                    for item in member.iter() {
                        item.atomize_into(out)?;
                    }
                }
            }
            Item::Function(f) => {
                return Err(Error::from_code(
                    ErrorCode::FOTY0013,
                    format!("{} cannot be atomized", f.signature()),
                ));
            }
        }
        Ok(())
    }

    /// `fn:string` semantics for a single item.
    pub fn string_value(&self) -> Result<String, Error> {
        match self {
            Item::Atomic(v) => Ok(v.lexical()),
            Item::Node(n) => Ok(n.string_value()),
            Item::Function(f) => Err(Error::from_code(
                ErrorCode::FOTY0013,
                format!("{} has no string value", f.signature()),
            )),
        }
    }

    pub fn signature(&self) -> String {
        match self {
            Item::Atomic(v) => v.signature(),
            Item::Node(n) => match (n.kind(), n.name()) {
                (NodeKind::Document, _) => "document-node()".to_string(),
                (kind, Some(name)) => format!("{}({})", kind.test_name(), name.to_eqname()),
                (kind, None) => format!("{}()", kind.test_name()),
            },
            Item::Function(f) => f.signature(),
        }
    }
}

impl From<AtomicValue> for Item {
    fn from(v: AtomicValue) -> Self {
        Item::Atomic(v)
    }
}

impl From<NodeRef> for Item {
    fn from(n: NodeRef) -> Self {
        Item::Node(n)
    }
}

impl From<FunctionItem> for Item {
    fn from(f: FunctionItem) -> Self {
        Item::Function(f)
    }
}
