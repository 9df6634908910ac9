use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine as _;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;

use crate::types::AtomicType;

/// An atomic value together with its dynamic type.
///
/// Each variant corresponds to exactly one concrete [`AtomicType`]; the
/// value representation is the canonical one used for comparison and
/// arithmetic, not the lexical form it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    UntypedAtomic(String),
    String(String),
    Token(String),
    NcName(String),
    EmailAddress(String),
    Hostname(String),
    Uuid(String),
    MarkupLine(String),
    MarkupMultiline(String),
    UriReference(String),
    Uri(String),
    Boolean(bool),
    Decimal(Decimal),
    Integer(i64),
    NonNegativeInteger(i64),
    PositiveInteger(i64),
    Double(f64),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    DateWithTimezone {
        date: NaiveDate,
        tz: FixedOffset,
    },
    DateTime {
        value: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    DateTimeWithTimezone {
        value: NaiveDateTime,
        tz: FixedOffset,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    Duration {
        months: i32,
        delta: TimeDelta,
    },
    DayTimeDuration(TimeDelta),
    YearMonthDuration(i32),
    Base64(Vec<u8>),
    IpV4Address(Ipv4Addr),
    IpV6Address(Ipv6Addr),
}

impl AtomicValue {
    pub fn atomic_type(&self) -> AtomicType {
        match self {
            AtomicValue::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            AtomicValue::String(_) => AtomicType::String,
            AtomicValue::Token(_) => AtomicType::Token,
            AtomicValue::NcName(_) => AtomicType::NcName,
            AtomicValue::EmailAddress(_) => AtomicType::EmailAddress,
            AtomicValue::Hostname(_) => AtomicType::Hostname,
            AtomicValue::Uuid(_) => AtomicType::Uuid,
            AtomicValue::MarkupLine(_) => AtomicType::MarkupLine,
            AtomicValue::MarkupMultiline(_) => AtomicType::MarkupMultiline,
            AtomicValue::UriReference(_) => AtomicType::UriReference,
            AtomicValue::Uri(_) => AtomicType::Uri,
            AtomicValue::Boolean(_) => AtomicType::Boolean,
            AtomicValue::Decimal(_) => AtomicType::Decimal,
            AtomicValue::Integer(_) => AtomicType::Integer,
            AtomicValue::NonNegativeInteger(_) => AtomicType::NonNegativeInteger,
            AtomicValue::PositiveInteger(_) => AtomicType::PositiveInteger,
            AtomicValue::Double(_) => AtomicType::Double,
            AtomicValue::Date { .. } => AtomicType::Date,
            AtomicValue::DateWithTimezone { .. } => AtomicType::DateWithTimezone,
            AtomicValue::DateTime { .. } => AtomicType::DateTime,
            AtomicValue::DateTimeWithTimezone { .. } => AtomicType::DateTimeWithTimezone,
            AtomicValue::Time { .. } => AtomicType::Time,
            AtomicValue::Duration { .. } => AtomicType::Duration,
            AtomicValue::DayTimeDuration(_) => AtomicType::DayTimeDuration,
            AtomicValue::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            AtomicValue::Base64(_) => AtomicType::Base64,
            AtomicValue::IpV4Address(_) => AtomicType::IpV4Address,
            AtomicValue::IpV6Address(_) => AtomicType::IpV6Address,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        AtomicValue::String(s.into())
    }

    pub fn untyped(s: impl Into<String>) -> Self {
        AtomicValue::UntypedAtomic(s.into())
    }

    /// Borrowed text of string-family values (including URIs and markup).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AtomicValue::UntypedAtomic(s)
            | AtomicValue::String(s)
            | AtomicValue::Token(s)
            | AtomicValue::NcName(s)
            | AtomicValue::EmailAddress(s)
            | AtomicValue::Hostname(s)
            | AtomicValue::Uuid(s)
            | AtomicValue::MarkupLine(s)
            | AtomicValue::MarkupMultiline(s)
            | AtomicValue::UriReference(s)
            | AtomicValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AtomicValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AtomicValue::Integer(i)
            | AtomicValue::NonNegativeInteger(i)
            | AtomicValue::PositiveInteger(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.atomic_type().is_numeric()
    }

    /// Canonical lexical form (`asString`).
    pub fn lexical(&self) -> String {
        match self {
            AtomicValue::Boolean(b) => b.to_string(),
            AtomicValue::Decimal(d) => format_decimal(*d),
            AtomicValue::Integer(i)
            | AtomicValue::NonNegativeInteger(i)
            | AtomicValue::PositiveInteger(i) => i.to_string(),
            AtomicValue::Double(d) => format_double(*d),
            AtomicValue::Date { date, tz } => {
                format!("{}{}", date.format("%Y-%m-%d"), format_tz(*tz))
            }
            AtomicValue::DateWithTimezone { date, tz } => {
                format!("{}{}", date.format("%Y-%m-%d"), format_tz(Some(*tz)))
            }
            AtomicValue::DateTime { value, tz } => {
                format!("{}{}", trim_fraction(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()), format_tz(*tz))
            }
            AtomicValue::DateTimeWithTimezone { value, tz } => format!(
                "{}{}",
                trim_fraction(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
                format_tz(Some(*tz))
            ),
            AtomicValue::Time { time, tz } => {
                format!("{}{}", trim_fraction(time.format("%H:%M:%S%.f").to_string()), format_tz(*tz))
            }
            AtomicValue::Duration { months, delta } => format_duration(*months, *delta),
            AtomicValue::DayTimeDuration(delta) => format_duration(0, *delta),
            AtomicValue::YearMonthDuration(months) => {
                if *months == 0 {
                    "P0M".to_string()
                } else {
                    format_duration(*months, TimeDelta::zero())
                }
            }
            AtomicValue::Base64(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            AtomicValue::IpV4Address(ip) => ip.to_string(),
            AtomicValue::IpV6Address(ip) => ip.to_string(),
            other => other.as_str().unwrap_or_default().to_string(),
        }
    }

    /// Diagnostic rendering carrying both type and value, e.g. `meta:integer(42)`.
    pub fn signature(&self) -> String {
        let ty = self.atomic_type();
        if ty.is_string_like() {
            format!("{}('{}')", ty.signature(), self.lexical())
        } else {
            format!("{}({})", ty.signature(), self.lexical())
        }
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

impl From<bool> for AtomicValue {
    fn from(b: bool) -> Self {
        AtomicValue::Boolean(b)
    }
}

impl From<i64> for AtomicValue {
    fn from(i: i64) -> Self {
        AtomicValue::Integer(i)
    }
}

impl From<f64> for AtomicValue {
    fn from(d: f64) -> Self {
        AtomicValue::Double(d)
    }
}

impl From<Decimal> for AtomicValue {
    fn from(d: Decimal) -> Self {
        AtomicValue::Decimal(d)
    }
}

impl From<&str> for AtomicValue {
    fn from(s: &str) -> Self {
        AtomicValue::String(s.to_string())
    }
}

impl From<String> for AtomicValue {
    fn from(s: String) -> Self {
        AtomicValue::String(s)
    }
}

pub(crate) fn format_decimal(d: Decimal) -> String {
    let n = d.normalize();
    if n.is_zero() {
        "0".to_string()
    } else {
        n.to_string()
    }
}

pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) {
        return d.to_string();
    }
    let sci = format!("{d:E}");
    match sci.split_once('E') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0E{exp}"),
        _ => sci,
    }
}

/// Drops trailing zeros of fractional seconds, and the dot when nothing is left.
fn trim_fraction(mut text: String) -> String {
    if text.contains('.') {
        let kept = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(kept);
    }
    text
}

pub(crate) fn format_tz(tz: Option<FixedOffset>) -> String {
    match tz {
        None => String::new(),
        Some(off) => {
            let secs = off.local_minus_utc();
            if secs == 0 {
                "Z".to_string()
            } else {
                let sign = if secs < 0 { '-' } else { '+' };
                let abs = secs.abs();
                format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

pub(crate) fn format_duration(months: i32, delta: TimeDelta) -> String {
    let negative = months < 0 || delta < TimeDelta::zero();
    let months = months.unsigned_abs();
    let delta = if delta < TimeDelta::zero() { -delta } else { delta };
    let total_secs = delta.num_seconds();
    let nanos = delta.subsec_nanos();
    let (years, months) = (months / 12, months % 12);
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if years > 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months > 0 {
        out.push_str(&format!("{months}M"));
    }
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || nanos > 0 {
            if nanos > 0 {
                let frac = format!("{nanos:09}");
                out.push_str(&format!("{seconds}.{}S", frac.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{seconds}S"));
            }
        }
    }
    if out.ends_with('P') {
        out.push_str("T0S");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_lexical_forms() {
        assert_eq!(format_duration(0, TimeDelta::days(366)), "P366D");
        assert_eq!(format_duration(14, TimeDelta::zero()), "P1Y2M");
        assert_eq!(format_duration(0, TimeDelta::zero()), "PT0S");
        assert_eq!(format_duration(0, -TimeDelta::minutes(90)), "-PT1H30M");
    }

    #[test]
    fn double_lexical_forms() {
        assert_eq!(format_double(1.0), "1");
        assert_eq!(format_double(f64::INFINITY), "INF");
        assert_eq!(format_double(1e7), "1.0E7");
        assert_eq!(format_double(0.5), "0.5");
    }
}
