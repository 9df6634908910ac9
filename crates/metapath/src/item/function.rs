//! Function items: named function references, inline closures, maps and arrays.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::compiler::expr::InlineFunctionDef;
use crate::engine::functions::FunctionSignature;
use crate::engine::runtime::StaticContext;
use crate::item::{AtomicValue, Sequence};
use crate::model::QName;
use crate::types::AtomicType;

#[derive(Debug, Clone)]
pub enum FunctionItem {
    Named(Arc<FunctionSignature>),
    Inline(Arc<InlineClosure>),
    Map(MapItem),
    Array(ArrayItem),
}

/// An inline function together with the environment it closed over.
pub struct InlineClosure {
    pub definition: Arc<InlineFunctionDef>,
    /// Local variable bindings visible where the function was created.
    pub captured: Vec<(QName, Sequence)>,
    pub static_ctx: Arc<StaticContext>,
}

impl fmt::Debug for InlineClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineClosure")
            .field("arity", &self.definition.params.len())
            .field("captured", &self.captured.len())
            .finish_non_exhaustive()
    }
}

impl FunctionItem {
    pub fn arity(&self) -> usize {
        match self {
            FunctionItem::Named(sig) => sig.arity(),
            FunctionItem::Inline(closure) => closure.definition.params.len(),
            FunctionItem::Map(_) | FunctionItem::Array(_) => 1,
        }
    }

    pub fn name(&self) -> Option<&QName> {
        match self {
            FunctionItem::Named(sig) => Some(&sig.name),
            _ => None,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            FunctionItem::Named(sig) => format!("{}#{}", sig.name.to_eqname(), sig.arity()),
            FunctionItem::Inline(closure) => {
                let params = closure
                    .definition
                    .params
                    .iter()
                    .map(|(_, ty)| ty.signature())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("function({params})")
            }
            FunctionItem::Map(_) => "map(*)".to_string(),
            FunctionItem::Array(_) => "array(*)".to_string(),
        }
    }
}

impl PartialEq for FunctionItem {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionItem::Named(a), FunctionItem::Named(b)) => {
                a.name == b.name && a.arity() == b.arity()
            }
            (FunctionItem::Inline(a), FunctionItem::Inline(b)) => Arc::ptr_eq(a, b),
            (FunctionItem::Map(a), FunctionItem::Map(b)) => a == b,
            (FunctionItem::Array(a), FunctionItem::Array(b)) => a == b,
            _ => false,
        }
    }
}

/// Same-key identity of a map key: numerics compare by value across
/// integer/decimal/double, string-family values by their text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyIdentity {
    Text(String),
    Number(Decimal),
    Double(u64),
    Boolean(bool),
    Other(AtomicType, String),
}

/// Map key retaining the original value for `map:keys`.
#[derive(Debug, Clone)]
pub struct MapKey {
    value: AtomicValue,
    identity: KeyIdentity,
}

impl MapKey {
    pub fn new(value: AtomicValue) -> Self {
        let identity = match &value {
            AtomicValue::Boolean(b) => KeyIdentity::Boolean(*b),
            AtomicValue::Decimal(d) => KeyIdentity::Number(d.normalize()),
            AtomicValue::Double(d) => match Decimal::from_f64(*d) {
                Some(dec) if dec.to_f64() == Some(*d) => KeyIdentity::Number(dec.normalize()),
                _ if d.is_nan() => KeyIdentity::Double(f64::NAN.to_bits()),
                _ => KeyIdentity::Double(d.to_bits()),
            },
            v if v.as_i64().is_some() => {
                KeyIdentity::Number(Decimal::from(v.as_i64().unwrap_or_default()))
            }
            v if v.as_str().is_some() => KeyIdentity::Text(v.as_str().unwrap_or_default().to_string()),
            v => {
                let family = match v.atomic_type() {
                    AtomicType::DateWithTimezone => AtomicType::Date,
                    AtomicType::DateTimeWithTimezone => AtomicType::DateTime,
                    t if t.is_duration() => AtomicType::Duration,
                    t => t,
                };
                let text = match v {
                    AtomicValue::Duration { months, delta } if *months == 0 => {
                        AtomicValue::DayTimeDuration(*delta).lexical()
                    }
                    AtomicValue::Duration { months, delta } if delta.is_zero() => {
                        AtomicValue::YearMonthDuration(*months).lexical()
                    }
                    other => other.lexical(),
                };
                KeyIdentity::Other(family, text)
            }
        };
        Self { value, identity }
    }

    pub fn value(&self) -> &AtomicValue {
        &self.value
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Immutable map; updates return a new map sharing nothing mutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapItem {
    entries: Arc<IndexMap<MapKey, Sequence>>,
}

impl MapItem {
    pub fn new(entries: IndexMap<MapKey, Sequence>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (AtomicValue, Sequence)>) -> Self {
        Self::new(pairs.into_iter().map(|(k, v)| (MapKey::new(k), v)).collect())
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &AtomicValue) -> Option<&Sequence> {
        self.entries.get(&MapKey::new(key.clone()))
    }

    pub fn contains(&self, key: &AtomicValue) -> bool {
        self.entries.contains_key(&MapKey::new(key.clone()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &AtomicValue> {
        self.entries.keys().map(MapKey::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AtomicValue, &Sequence)> {
        self.entries.iter().map(|(k, v)| (k.value(), v))
    }

    pub fn put(&self, key: AtomicValue, value: Sequence) -> MapItem {
        let mut entries = (*self.entries).clone();
        let key = MapKey::new(key);
        entries.shift_remove(&key);
        entries.insert(key, value);
        MapItem::new(entries)
    }

    pub fn remove(&self, key: &AtomicValue) -> MapItem {
        let mut entries = (*self.entries).clone();
        entries.shift_remove(&MapKey::new(key.clone()));
        MapItem::new(entries)
    }
}

/// Immutable array of member sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayItem {
    members: Arc<Vec<Sequence>>,
}

impl ArrayItem {
    pub fn new(members: Vec<Sequence>) -> Self {
        Self {
            members: Arc::new(members),
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[Sequence] {
        &self.members
    }

    /// 1-based member access.
    pub fn get(&self, position: i64) -> Option<&Sequence> {
        usize::try_from(position)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|i| self.members.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_share_identity() {
        let map = MapItem::from_pairs([(AtomicValue::Integer(1), Sequence::of(AtomicValue::string("one")))]);
        assert!(map.contains(&AtomicValue::Decimal(Decimal::ONE)));
        assert!(map.contains(&AtomicValue::Double(1.0)));
        assert!(!map.contains(&AtomicValue::string("1")));
    }

    #[test]
    fn put_replaces_existing_key() {
        let map = MapItem::from_pairs([(AtomicValue::string("a"), Sequence::empty())]);
        let updated = map.put(AtomicValue::untyped("a"), Sequence::of(AtomicValue::Integer(2)));
        assert_eq!(updated.size(), 1);
        assert_eq!(map.get(&AtomicValue::string("a")), Some(&Sequence::empty()));
    }
}
