use crate::engine::runtime::{Error, StaticContext};
use crate::item::{FunctionItem, Item};
use crate::types::{AtomicType, KindTest, SequenceType};

/// Expected shape of a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
    AnyItem,
    Atomic(AtomicType),
    Kind(KindTest),
    AnyFunction,
    /// `map(*)` when `None`, otherwise `map(K, V)`.
    Map(Option<Box<(AtomicType, SequenceType)>>),
    /// `array(*)` when `None`, otherwise `array(V)`.
    Array(Option<Box<SequenceType>>),
}

impl ItemType {
    pub fn any_atomic() -> Self {
        ItemType::Atomic(AtomicType::AnyAtomic)
    }

    pub fn any_node() -> Self {
        ItemType::Kind(KindTest::any_node())
    }

    pub fn matches(&self, item: &Item, ctx: &StaticContext) -> Result<bool, Error> {
        Ok(match (self, item) {
            (ItemType::AnyItem, _) => true,
            (ItemType::Atomic(t), Item::Atomic(v)) => v.atomic_type().is_subtype_of(*t),
            (ItemType::Kind(test), Item::Node(n)) => test.matches(n, ctx)?,
            (ItemType::AnyFunction, Item::Function(_)) => true,
            (ItemType::Map(test), Item::Function(FunctionItem::Map(map))) => match test {
                None => true,
                Some(boxed) => {
                    let (key_type, value_type) = boxed.as_ref();
                    for (key, value) in map.iter() {
                        if !key.atomic_type().is_subtype_of(*key_type)
                            || !value_type.matches(value, ctx)?
                        {
                            return Ok(false);
                        }
                    }
                    true
                }
            },
            (ItemType::Array(test), Item::Function(FunctionItem::Array(array))) => match test {
                None => true,
                Some(member_type) => {
                    for member in array.members() {
                        if !member_type.matches(member, ctx)? {
                            return Ok(false);
                        }
                    }
                    true
                }
            },
            _ => false,
        })
    }

    /// Static subtype relation used for result-type narrowing.
    pub fn is_subtype_of(&self, other: &ItemType) -> bool {
        match (self, other) {
            (_, ItemType::AnyItem) => true,
            (ItemType::Atomic(a), ItemType::Atomic(b)) => a.is_subtype_of(*b),
            (ItemType::Kind(_), ItemType::Kind(b)) if b.kind.is_none() => true,
            (ItemType::Kind(a), ItemType::Kind(b)) => a == b,
            (ItemType::Map(_) | ItemType::Array(_), ItemType::AnyFunction) => true,
            (ItemType::Map(_), ItemType::Map(None)) | (ItemType::Array(_), ItemType::Array(None)) => {
                true
            }
            (a, b) => a == b,
        }
    }

    /// Most specific type that both `self` and `other` are subtypes of.
    pub fn common_ancestor(&self, other: &ItemType) -> ItemType {
        if self.is_subtype_of(other) {
            return other.clone();
        }
        if other.is_subtype_of(self) {
            return self.clone();
        }
        match (self, other) {
            (ItemType::Atomic(a), ItemType::Atomic(b)) => ItemType::Atomic(a.common_ancestor(*b)),
            (ItemType::Kind(_), ItemType::Kind(_)) => ItemType::any_node(),
            (
                ItemType::Map(_) | ItemType::Array(_) | ItemType::AnyFunction,
                ItemType::Map(_) | ItemType::Array(_) | ItemType::AnyFunction,
            ) => ItemType::AnyFunction,
            _ => ItemType::AnyItem,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            ItemType::AnyItem => "item()".to_string(),
            ItemType::Atomic(t) => t.signature(),
            ItemType::Kind(test) => test.signature(),
            ItemType::AnyFunction => "function(*)".to_string(),
            ItemType::Map(None) => "map(*)".to_string(),
            ItemType::Map(Some(boxed)) => {
                format!("map({},{})", boxed.0.signature(), boxed.1.signature())
            }
            ItemType::Array(None) => "array(*)".to_string(),
            ItemType::Array(Some(member)) => format!("array({})", member.signature()),
        }
    }
}

impl From<AtomicType> for ItemType {
    fn from(t: AtomicType) -> Self {
        ItemType::Atomic(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, QName};
    use crate::types::{DefinitionName, NameTest, Occurrence};

    #[test]
    fn map_and_array_signatures() {
        let map = ItemType::Map(Some(Box::new((
            AtomicType::String,
            SequenceType::zero_or_more(AtomicType::Integer),
        ))));
        assert_eq!(map.signature(), "map(meta:string,meta:integer*)");
        assert_eq!(ItemType::Map(None).signature(), "map(*)");
        let array = ItemType::Array(Some(Box::new(SequenceType::one(AtomicType::Boolean))));
        assert_eq!(array.signature(), "array(meta:boolean)");
        assert_eq!(ItemType::Array(None).signature(), "array(*)");
        assert_eq!(ItemType::AnyFunction.signature(), "function(*)");
    }

    #[test]
    fn kind_test_signatures() {
        let named = KindTest::of_kind(
            NodeKind::Assembly,
            NameTest::Name(QName::new(None, "control")),
            Some(DefinitionName::new("ctl")),
        );
        assert_eq!(ItemType::Kind(named.clone()).signature(), "assembly(control,ctl)");
        assert_eq!(
            ItemType::Kind(KindTest::of_kind(NodeKind::Field, NameTest::Any, None)).signature(),
            "field()"
        );
        assert_eq!(
            ItemType::Kind(KindTest::document(Some(named))).signature(),
            "document-node(assembly(control,ctl))"
        );
        assert_eq!(ItemType::any_node().signature(), "node()");
    }

    #[test]
    fn nested_sequence_type_in_array() {
        let inner = SequenceType::new(ItemType::Map(None), Occurrence::ZeroOrOne);
        let array = ItemType::Array(Some(Box::new(inner)));
        assert_eq!(array.signature(), "array(map(*)?)");
    }

    #[test]
    fn subtype_relation() {
        assert!(ItemType::Atomic(AtomicType::PositiveInteger).is_subtype_of(&ItemType::Atomic(AtomicType::Decimal)));
        assert!(ItemType::Map(None).is_subtype_of(&ItemType::AnyFunction));
        assert!(!ItemType::AnyFunction.is_subtype_of(&ItemType::Map(None)));
        assert_eq!(
            ItemType::Atomic(AtomicType::Integer).common_ancestor(&ItemType::Atomic(AtomicType::Double)),
            ItemType::Atomic(AtomicType::Numeric)
        );
    }
}
