//! The closed set of Metapath atomic types and their static hierarchy.
//!
//! Subtyping is decided purely by walking [`AtomicType::parent`]; there is no
//! runtime inspection of values involved.

use std::fmt;

use crate::consts::{NS_METAPATH, NS_XML_SCHEMA, PREFIX_META};
use crate::model::QName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomicType {
    AnyAtomic,
    UntypedAtomic,
    String,
    Token,
    NcName,
    EmailAddress,
    Hostname,
    Uuid,
    MarkupLine,
    MarkupMultiline,
    UriReference,
    Uri,
    Boolean,
    Numeric,
    Decimal,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Double,
    Date,
    DateWithTimezone,
    DateTime,
    DateTimeWithTimezone,
    Time,
    Duration,
    DayTimeDuration,
    YearMonthDuration,
    Base64,
    IpV4Address,
    IpV6Address,
}

impl AtomicType {
    pub const ALL: [AtomicType; 30] = [
        AtomicType::AnyAtomic,
        AtomicType::UntypedAtomic,
        AtomicType::String,
        AtomicType::Token,
        AtomicType::NcName,
        AtomicType::EmailAddress,
        AtomicType::Hostname,
        AtomicType::Uuid,
        AtomicType::MarkupLine,
        AtomicType::MarkupMultiline,
        AtomicType::UriReference,
        AtomicType::Uri,
        AtomicType::Boolean,
        AtomicType::Numeric,
        AtomicType::Decimal,
        AtomicType::Integer,
        AtomicType::NonNegativeInteger,
        AtomicType::PositiveInteger,
        AtomicType::Double,
        AtomicType::Date,
        AtomicType::DateWithTimezone,
        AtomicType::DateTime,
        AtomicType::DateTimeWithTimezone,
        AtomicType::Time,
        AtomicType::Duration,
        AtomicType::DayTimeDuration,
        AtomicType::YearMonthDuration,
        AtomicType::Base64,
        AtomicType::IpV4Address,
        AtomicType::IpV6Address,
    ];

    /// Local part of the type name in the `meta` namespace.
    pub fn local_name(self) -> &'static str {
        match self {
            AtomicType::AnyAtomic => "any-atomic-type",
            AtomicType::UntypedAtomic => "untyped-atomic",
            AtomicType::String => "string",
            AtomicType::Token => "token",
            AtomicType::NcName => "ncname",
            AtomicType::EmailAddress => "email-address",
            AtomicType::Hostname => "hostname",
            AtomicType::Uuid => "uuid",
            AtomicType::MarkupLine => "markup-line",
            AtomicType::MarkupMultiline => "markup-multiline",
            AtomicType::UriReference => "uri-reference",
            AtomicType::Uri => "uri",
            AtomicType::Boolean => "boolean",
            AtomicType::Numeric => "numeric",
            AtomicType::Decimal => "decimal",
            AtomicType::Integer => "integer",
            AtomicType::NonNegativeInteger => "non-negative-integer",
            AtomicType::PositiveInteger => "positive-integer",
            AtomicType::Double => "double",
            AtomicType::Date => "date",
            AtomicType::DateWithTimezone => "date-with-timezone",
            AtomicType::DateTime => "date-time",
            AtomicType::DateTimeWithTimezone => "date-time-with-timezone",
            AtomicType::Time => "time",
            AtomicType::Duration => "duration",
            AtomicType::DayTimeDuration => "day-time-duration",
            AtomicType::YearMonthDuration => "year-month-duration",
            AtomicType::Base64 => "base64",
            AtomicType::IpV4Address => "ip-v4-address",
            AtomicType::IpV6Address => "ip-v6-address",
        }
    }

    /// XML Schema alias, where the type has a direct counterpart.
    pub fn xs_alias(self) -> Option<&'static str> {
        Some(match self {
            AtomicType::AnyAtomic => "anyAtomicType",
            AtomicType::UntypedAtomic => "untypedAtomic",
            AtomicType::String => "string",
            AtomicType::Token => "token",
            AtomicType::NcName => "NCName",
            AtomicType::UriReference => "anyURI",
            AtomicType::Boolean => "boolean",
            AtomicType::Numeric => "numeric",
            AtomicType::Decimal => "decimal",
            AtomicType::Integer => "integer",
            AtomicType::NonNegativeInteger => "nonNegativeInteger",
            AtomicType::PositiveInteger => "positiveInteger",
            AtomicType::Double => "double",
            AtomicType::Date => "date",
            AtomicType::DateTime => "dateTime",
            AtomicType::DateTimeWithTimezone => "dateTimeStamp",
            AtomicType::Time => "time",
            AtomicType::Duration => "duration",
            AtomicType::DayTimeDuration => "dayTimeDuration",
            AtomicType::YearMonthDuration => "yearMonthDuration",
            AtomicType::Base64 => "base64Binary",
            _ => return None,
        })
    }

    pub fn qname(self) -> QName {
        QName::new(Some(NS_METAPATH), self.local_name())
    }

    /// Resolves an expanded type name in either the `meta` or `xs` namespace.
    pub fn from_qname(name: &QName) -> Option<AtomicType> {
        match name.ns_uri() {
            Some(NS_METAPATH) => Self::ALL
                .into_iter()
                .find(|t| t.local_name() == name.local_name()),
            Some(NS_XML_SCHEMA) => Self::ALL
                .into_iter()
                .find(|t| t.xs_alias() == Some(name.local_name())),
            _ => None,
        }
    }

    /// Immediate supertype; `None` only for `any-atomic-type`.
    pub fn parent(self) -> Option<AtomicType> {
        use AtomicType as T;
        Some(match self {
            T::AnyAtomic => return None,
            T::String
            | T::UntypedAtomic
            | T::UriReference
            | T::Boolean
            | T::Numeric
            | T::Date
            | T::DateTime
            | T::Time
            | T::Duration
            | T::Base64
            | T::IpV4Address
            | T::IpV6Address
            | T::MarkupLine
            | T::MarkupMultiline => T::AnyAtomic,
            T::Token | T::EmailAddress | T::Hostname | T::Uuid => T::String,
            T::NcName => T::Token,
            T::Uri => T::UriReference,
            T::Decimal | T::Double => T::Numeric,
            T::Integer => T::Decimal,
            T::NonNegativeInteger => T::Integer,
            T::PositiveInteger => T::NonNegativeInteger,
            T::DateWithTimezone => T::Date,
            T::DateTimeWithTimezone => T::DateTime,
            T::DayTimeDuration | T::YearMonthDuration => T::Duration,
        })
    }

    /// Reflexive subtype check over the static hierarchy.
    pub fn is_subtype_of(self, other: AtomicType) -> bool {
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    fn depth(self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent();
        while let Some(t) = cur {
            depth += 1;
            cur = t.parent();
        }
        depth
    }

    /// Most specific type both `self` and `other` derive from.
    pub fn common_ancestor(self, other: AtomicType) -> AtomicType {
        let (mut a, mut b) = (self, other);
        let (mut da, mut db) = (a.depth(), b.depth());
        while da > db {
            a = a.parent().unwrap_or(AtomicType::AnyAtomic);
            da -= 1;
        }
        while db > da {
            b = b.parent().unwrap_or(AtomicType::AnyAtomic);
            db -= 1;
        }
        while a != b {
            a = a.parent().unwrap_or(AtomicType::AnyAtomic);
            b = b.parent().unwrap_or(AtomicType::AnyAtomic);
        }
        a
    }

    /// Abstract types have no values of their own and cannot be cast to.
    pub fn is_abstract(self) -> bool {
        matches!(self, AtomicType::AnyAtomic | AtomicType::Numeric)
    }

    pub fn is_numeric(self) -> bool {
        self.is_subtype_of(AtomicType::Numeric)
    }

    pub fn is_integer(self) -> bool {
        self.is_subtype_of(AtomicType::Integer)
    }

    /// String family plus untyped and URI values, which promote to string.
    pub fn is_string_like(self) -> bool {
        self.is_subtype_of(AtomicType::String)
            || self.is_subtype_of(AtomicType::UriReference)
            || matches!(
                self,
                AtomicType::UntypedAtomic | AtomicType::MarkupLine | AtomicType::MarkupMultiline
            )
    }

    pub fn is_duration(self) -> bool {
        self.is_subtype_of(AtomicType::Duration)
    }

    /// Diagnostic rendering, e.g. `meta:integer`.
    pub fn signature(self) -> String {
        format!("{PREFIX_META}:{}", self.local_name())
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX_META}:{}", self.local_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_transitive() {
        assert!(AtomicType::PositiveInteger.is_subtype_of(AtomicType::Numeric));
        assert!(AtomicType::NcName.is_subtype_of(AtomicType::String));
        assert!(!AtomicType::Double.is_subtype_of(AtomicType::Decimal));
    }

    #[test]
    fn common_ancestor_of_numeric_siblings() {
        assert_eq!(
            AtomicType::Integer.common_ancestor(AtomicType::Double),
            AtomicType::Numeric
        );
        assert_eq!(
            AtomicType::PositiveInteger.common_ancestor(AtomicType::Integer),
            AtomicType::Integer
        );
        assert_eq!(
            AtomicType::Date.common_ancestor(AtomicType::String),
            AtomicType::AnyAtomic
        );
    }

    #[test]
    fn names_round_trip() {
        for t in AtomicType::ALL {
            assert_eq!(AtomicType::from_qname(&t.qname()), Some(t));
        }
    }
}
