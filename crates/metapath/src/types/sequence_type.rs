use std::fmt;

use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use crate::item::Sequence;
use crate::types::{AtomicType, ItemType};

/// Cardinality constraint of a [`SequenceType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    Zero,
    ZeroOrOne,
    One,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn indicator(self) -> &'static str {
        match self {
            Occurrence::Zero | Occurrence::One => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }

    pub fn from_indicator(indicator: &str) -> Option<Self> {
        match indicator {
            "" => Some(Occurrence::One),
            "?" => Some(Occurrence::ZeroOrOne),
            "*" => Some(Occurrence::ZeroOrMore),
            "+" => Some(Occurrence::OneOrMore),
            _ => None,
        }
    }

    pub fn accepts(self, size: usize) -> bool {
        match self {
            Occurrence::Zero => size == 0,
            Occurrence::ZeroOrOne => size <= 1,
            Occurrence::One => size == 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => size >= 1,
        }
    }

    /// Size rule with a typed error describing the violation.
    pub fn check(self, size: usize) -> Result<(), Error> {
        if self.accepts(size) {
            return Ok(());
        }
        let expected = match self {
            Occurrence::Zero => "an empty sequence",
            Occurrence::ZeroOrOne => "a sequence of zero or one",
            Occurrence::One => "a sequence of one",
            Occurrence::OneOrMore => "a sequence of one or more",
            Occurrence::ZeroOrMore => "any sequence",
        };
        Err(Error::from_code(
            ErrorCode::MPTY0004,
            format!("{expected} expected, but size is '{size}'"),
        ))
    }

    pub fn allows_empty(self) -> bool {
        self.accepts(0)
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Occurrence::ZeroOrMore | Occurrence::OneOrMore)
    }
}

/// An item type paired with an occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceType {
    pub item_type: ItemType,
    pub occurrence: Occurrence,
}

impl SequenceType {
    pub fn new(item_type: impl Into<ItemType>, occurrence: Occurrence) -> Self {
        Self {
            item_type: item_type.into(),
            occurrence,
        }
    }

    /// `empty-sequence()`
    pub fn empty() -> Self {
        Self::new(ItemType::AnyItem, Occurrence::Zero)
    }

    pub fn one(item_type: impl Into<ItemType>) -> Self {
        Self::new(item_type, Occurrence::One)
    }

    pub fn optional(item_type: impl Into<ItemType>) -> Self {
        Self::new(item_type, Occurrence::ZeroOrOne)
    }

    pub fn zero_or_more(item_type: impl Into<ItemType>) -> Self {
        Self::new(item_type, Occurrence::ZeroOrMore)
    }

    pub fn one_or_more(item_type: impl Into<ItemType>) -> Self {
        Self::new(item_type, Occurrence::OneOrMore)
    }

    pub fn any() -> Self {
        Self::zero_or_more(ItemType::AnyItem)
    }

    pub fn atomic(ty: AtomicType, occurrence: Occurrence) -> Self {
        Self::new(ItemType::Atomic(ty), occurrence)
    }

    /// Occurrence satisfied and every item an instance of the item type.
    pub fn matches(&self, seq: &Sequence, ctx: &StaticContext) -> Result<bool, Error> {
        if !self.occurrence.accepts(seq.size()) {
            return Ok(false);
        }
        for item in seq.iter() {
            if !self.item_type.matches(item, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn signature(&self) -> String {
        if self.occurrence == Occurrence::Zero {
            return "empty-sequence()".to_string();
        }
        format!("{}{}", self.item_type.signature(), self.occurrence.indicator())
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::AtomicValue;

    const ALL: [Occurrence; 5] = [
        Occurrence::Zero,
        Occurrence::ZeroOrOne,
        Occurrence::One,
        Occurrence::ZeroOrMore,
        Occurrence::OneOrMore,
    ];

    fn integers(n: usize) -> Sequence {
        Sequence::from_atomics((0..n).map(|i| AtomicValue::Integer(i64::try_from(i).unwrap())))
    }

    #[test]
    fn check_and_matches_agree_on_size() {
        let ctx = StaticContext::default();
        for occurrence in ALL {
            for size in 0..4 {
                let ty = SequenceType::atomic(AtomicType::Integer, occurrence);
                let matches = ty.matches(&integers(size), &ctx).unwrap();
                assert_eq!(matches, occurrence.check(size).is_ok(), "{occurrence:?} with {size} items");
                assert_eq!(matches, occurrence.accepts(size));
            }
        }
    }

    #[test]
    fn zero_rejects_any_item() {
        let ctx = StaticContext::default();
        let empty = SequenceType::empty();
        assert!(!empty.matches(&integers(1), &ctx).unwrap());
        assert!(empty.matches(&Sequence::empty(), &ctx).unwrap());
        assert_eq!(Occurrence::Zero.check(1).unwrap_err().code, ErrorCode::MPTY0004);
    }

    #[test]
    fn item_type_checked_after_size() {
        let ctx = StaticContext::default();
        let strings = SequenceType::zero_or_more(AtomicType::String);
        assert!(!strings.matches(&integers(2), &ctx).unwrap());
        assert!(strings.matches(&Sequence::empty(), &ctx).unwrap());
    }

    #[test]
    fn indicators_round_trip() {
        for occurrence in ALL.into_iter().filter(|o| *o != Occurrence::Zero) {
            assert_eq!(Occurrence::from_indicator(occurrence.indicator()), Some(occurrence));
        }
        assert_eq!(Occurrence::from_indicator("!"), None);
    }

    #[test]
    fn sequence_type_signatures() {
        assert_eq!(SequenceType::empty().signature(), "empty-sequence()");
        assert_eq!(SequenceType::one(AtomicType::String).signature(), "meta:string");
        assert_eq!(SequenceType::optional(AtomicType::Integer).signature(), "meta:integer?");
        assert_eq!(SequenceType::any().signature(), "item()*");
        assert_eq!(SequenceType::one_or_more(ItemType::any_node()).signature(), "node()+");
    }
}
