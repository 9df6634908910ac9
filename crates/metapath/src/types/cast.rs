//! Lexical parsing and the "cast as" conversions between atomic types.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use base64::Engine as _;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::AtomicValue;
use crate::types::AtomicType;

/// Error raised when `value` has no representation in `target`.
pub fn invalid_value_for_cast(value: &AtomicValue, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!(
            "cannot cast '{}' ({}) to {}",
            value.lexical(),
            value.atomic_type(),
            target
        ),
    )
}

fn invalid_lexical(lexical: &str, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("'{lexical}' is not a valid lexical form for {target}"),
    )
}

/// Parses `lexical` into a value of type `ty`.
pub fn parse_lexical(ty: AtomicType, lexical: &str) -> Result<AtomicValue, Error> {
    use AtomicType as T;
    let trimmed = lexical.trim();
    let bad = || invalid_lexical(lexical, ty);
    Ok(match ty {
        T::AnyAtomic | T::Numeric => {
            return Err(Error::from_code(
                ErrorCode::MPST0080,
                format!("{ty} is abstract and has no lexical space"),
            ));
        }
        T::UntypedAtomic => AtomicValue::UntypedAtomic(lexical.to_string()),
        T::String => AtomicValue::String(lexical.to_string()),
        T::MarkupLine => AtomicValue::MarkupLine(lexical.to_string()),
        T::MarkupMultiline => AtomicValue::MarkupMultiline(lexical.to_string()),
        T::Token => {
            let collapsed = collapse_whitespace(lexical);
            if collapsed.is_empty() {
                return Err(bad());
            }
            AtomicValue::Token(collapsed)
        }
        T::NcName => {
            if !is_ncname(trimmed) {
                return Err(bad());
            }
            AtomicValue::NcName(trimmed.to_string())
        }
        T::EmailAddress => match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !trimmed.chars().any(char::is_whitespace) =>
            {
                AtomicValue::EmailAddress(trimmed.to_string())
            }
            _ => return Err(bad()),
        },
        T::Hostname => {
            if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
                return Err(bad());
            }
            AtomicValue::Hostname(trimmed.to_string())
        }
        T::Uuid => {
            if !is_uuid(trimmed) {
                return Err(bad());
            }
            AtomicValue::Uuid(trimmed.to_string())
        }
        T::UriReference => {
            if trimmed.chars().any(char::is_whitespace) {
                return Err(bad());
            }
            AtomicValue::UriReference(trimmed.to_string())
        }
        T::Uri => {
            url::Url::parse(trimmed).map_err(|_| bad())?;
            AtomicValue::Uri(trimmed.to_string())
        }
        T::Boolean => match trimmed {
            "true" | "1" => AtomicValue::Boolean(true),
            "false" | "0" => AtomicValue::Boolean(false),
            _ => return Err(bad()),
        },
        T::Decimal => AtomicValue::Decimal(parse_decimal(trimmed).ok_or_else(bad)?),
        T::Integer => AtomicValue::Integer(parse_integer(trimmed).ok_or_else(bad)?),
        T::NonNegativeInteger => match parse_integer(trimmed) {
            Some(i) if i >= 0 => AtomicValue::NonNegativeInteger(i),
            _ => return Err(bad()),
        },
        T::PositiveInteger => match parse_integer(trimmed) {
            Some(i) if i > 0 => AtomicValue::PositiveInteger(i),
            _ => return Err(bad()),
        },
        T::Double => AtomicValue::Double(parse_double(trimmed).ok_or_else(bad)?),
        T::Date | T::DateWithTimezone => {
            let (body, tz) = split_timezone(trimmed).ok_or_else(bad)?;
            let date = NaiveDate::parse_from_str(body, "%Y-%m-%d").map_err(|_| bad())?;
            match (ty, tz) {
                (T::DateWithTimezone, Some(tz)) => AtomicValue::DateWithTimezone { date, tz },
                (T::DateWithTimezone, None) => return Err(bad()),
                _ => AtomicValue::Date { date, tz },
            }
        }
        T::DateTime | T::DateTimeWithTimezone => {
            let (body, tz) = split_timezone(trimmed).ok_or_else(bad)?;
            let value =
                NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| bad())?;
            match (ty, tz) {
                (T::DateTimeWithTimezone, Some(tz)) => {
                    AtomicValue::DateTimeWithTimezone { value, tz }
                }
                (T::DateTimeWithTimezone, None) => return Err(bad()),
                _ => AtomicValue::DateTime { value, tz },
            }
        }
        T::Time => {
            let (body, tz) = split_timezone(trimmed).ok_or_else(bad)?;
            let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f").map_err(|_| bad())?;
            AtomicValue::Time { time, tz }
        }
        T::Duration => {
            let (months, delta) = parse_duration(trimmed).ok_or_else(bad)?;
            AtomicValue::Duration { months, delta }
        }
        T::DayTimeDuration => match parse_duration(trimmed) {
            Some((0, delta)) if !has_year_month_part(trimmed) => {
                AtomicValue::DayTimeDuration(delta)
            }
            _ => return Err(bad()),
        },
        T::YearMonthDuration => match parse_duration(trimmed) {
            Some((months, delta)) if delta.is_zero() && !trimmed.contains(['D', 'T']) => {
                AtomicValue::YearMonthDuration(months)
            }
            _ => return Err(bad()),
        },
        T::Base64 => {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|_| bad())?;
            AtomicValue::Base64(bytes)
        }
        T::IpV4Address => AtomicValue::IpV4Address(Ipv4Addr::from_str(trimmed).map_err(|_| bad())?),
        T::IpV6Address => AtomicValue::IpV6Address(Ipv6Addr::from_str(trimmed).map_err(|_| bad())?),
    })
}

/// Casts `value` to `target` following the "cast as" rules.
pub fn cast_atomic(value: &AtomicValue, target: AtomicType) -> Result<AtomicValue, Error> {
    if target.is_abstract() {
        return Err(Error::from_code(
            ErrorCode::MPST0080,
            format!("cannot cast to the abstract type {target}"),
        ));
    }
    let source = value.atomic_type();
    if source == target {
        return Ok(value.clone());
    }
    if let Some(text) = value.as_str() {
        return parse_lexical(target, text).map_err(|_| invalid_value_for_cast(value, target));
    }
    if target.is_string_like() {
        return parse_lexical(target, &value.lexical())
            .map_err(|_| invalid_value_for_cast(value, target));
    }
    if target.is_numeric() {
        return cast_to_numeric(value, target);
    }
    use AtomicType as T;
    let cast = match (value, target) {
        (v, T::Boolean) if v.is_numeric() => {
            let zero_or_nan = match v {
                AtomicValue::Double(d) => *d == 0.0 || d.is_nan(),
                AtomicValue::Decimal(d) => d.is_zero(),
                other => other.as_i64() == Some(0),
            };
            AtomicValue::Boolean(!zero_or_nan)
        }
        (AtomicValue::Date { date, tz }, T::DateTime) => AtomicValue::DateTime {
            value: date.and_time(NaiveTime::MIN),
            tz: *tz,
        },
        (AtomicValue::DateWithTimezone { date, tz }, T::DateTime) => AtomicValue::DateTime {
            value: date.and_time(NaiveTime::MIN),
            tz: Some(*tz),
        },
        (AtomicValue::DateWithTimezone { date, tz }, T::Date) => AtomicValue::Date {
            date: *date,
            tz: Some(*tz),
        },
        (AtomicValue::Date { date, tz: Some(tz) }, T::DateWithTimezone) => {
            AtomicValue::DateWithTimezone {
                date: *date,
                tz: *tz,
            }
        }
        (AtomicValue::DateTime { value, tz }, T::Date) => AtomicValue::Date {
            date: value.date(),
            tz: *tz,
        },
        (AtomicValue::DateTime { value, tz }, T::Time) => AtomicValue::Time {
            time: value.time(),
            tz: *tz,
        },
        (AtomicValue::DateTime { value, tz: Some(tz) }, T::DateTimeWithTimezone) => {
            AtomicValue::DateTimeWithTimezone {
                value: *value,
                tz: *tz,
            }
        }
        (AtomicValue::DateTimeWithTimezone { value, tz }, T::DateTime) => AtomicValue::DateTime {
            value: *value,
            tz: Some(*tz),
        },
        (AtomicValue::DateTimeWithTimezone { value, tz }, T::Date) => AtomicValue::Date {
            date: value.date(),
            tz: Some(*tz),
        },
        (AtomicValue::DateTimeWithTimezone { value, tz }, T::Time) => AtomicValue::Time {
            time: value.time(),
            tz: Some(*tz),
        },
        (AtomicValue::Duration { delta, .. }, T::DayTimeDuration) => {
            AtomicValue::DayTimeDuration(*delta)
        }
        (AtomicValue::Duration { months, .. }, T::YearMonthDuration) => {
            AtomicValue::YearMonthDuration(*months)
        }
        (AtomicValue::DayTimeDuration(delta), T::Duration) => AtomicValue::Duration {
            months: 0,
            delta: *delta,
        },
        (AtomicValue::DayTimeDuration(_), T::YearMonthDuration) => {
            AtomicValue::YearMonthDuration(0)
        }
        (AtomicValue::YearMonthDuration(months), T::Duration) => AtomicValue::Duration {
            months: *months,
            delta: TimeDelta::zero(),
        },
        (AtomicValue::YearMonthDuration(_), T::DayTimeDuration) => {
            AtomicValue::DayTimeDuration(TimeDelta::zero())
        }
        (AtomicValue::Date { tz: None, .. }, T::DateWithTimezone)
        | (AtomicValue::DateTime { tz: None, .. }, T::DateTimeWithTimezone) => {
            return Err(invalid_value_for_cast(value, target));
        }
        _ => {
            return Err(Error::type_error(format!(
                "casting from {} to {target} is not supported",
                value.atomic_type()
            )));
        }
    };
    Ok(cast)
}

fn cast_to_numeric(value: &AtomicValue, target: AtomicType) -> Result<AtomicValue, Error> {
    use AtomicType as T;
    let overflow = || {
        Error::from_code(
            ErrorCode::FOCA0002,
            format!("{} cannot be represented as {target}", value.signature()),
        )
    };
    match target {
        T::Double => Ok(AtomicValue::Double(match value {
            AtomicValue::Boolean(b) => f64::from(u8::from(*b)),
            AtomicValue::Decimal(d) => d.to_f64().ok_or_else(overflow)?,
            v => match v.as_i64() {
                #[allow(clippy::cast_precision_loss)]
                Some(i) => i as f64,
                None => return Err(unsupported_numeric(value, target)),
            },
        })),
        T::Decimal => Ok(AtomicValue::Decimal(match value {
            AtomicValue::Boolean(b) => Decimal::from(u8::from(*b)),
            AtomicValue::Double(d) => {
                if !d.is_finite() {
                    return Err(overflow());
                }
                Decimal::from_f64(*d).ok_or_else(overflow)?
            }
            v => match v.as_i64() {
                Some(i) => Decimal::from(i),
                None => return Err(unsupported_numeric(value, target)),
            },
        })),
        T::Integer | T::NonNegativeInteger | T::PositiveInteger => {
            let i = match value {
                AtomicValue::Boolean(b) => i64::from(*b),
                AtomicValue::Double(d) => {
                    let t = d.trunc();
                    #[allow(clippy::cast_precision_loss)]
                    let in_range = d.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64;
                    if !in_range {
                        return Err(overflow());
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let i = t as i64;
                    i
                }
                AtomicValue::Decimal(d) => d.trunc().to_i64().ok_or_else(overflow)?,
                v => v
                    .as_i64()
                    .ok_or_else(|| unsupported_numeric(value, target))?,
            };
            match target {
                T::NonNegativeInteger if i < 0 => Err(invalid_value_for_cast(value, target)),
                T::PositiveInteger if i <= 0 => Err(invalid_value_for_cast(value, target)),
                T::NonNegativeInteger => Ok(AtomicValue::NonNegativeInteger(i)),
                T::PositiveInteger => Ok(AtomicValue::PositiveInteger(i)),
                _ => Ok(AtomicValue::Integer(i)),
            }
        }
        _ => Err(unsupported_numeric(value, target)),
    }
}

fn unsupported_numeric(value: &AtomicValue, target: AtomicType) -> Error {
    Error::type_error(format!(
        "casting from {} to {target} is not supported",
        value.atomic_type()
    ))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'))
}

fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8usize, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

fn parse_integer(s: &str) -> Option<i64> {
    if s.is_empty() || s.contains(['.', 'e', 'E']) {
        return None;
    }
    i64::from_str(s).ok()
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let digits = s.trim_start_matches(['+', '-']);
    if digits.is_empty()
        || digits == "."
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.matches('.').count() > 1
    {
        return None;
    }
    Decimal::from_str(s.trim_start_matches('+')).ok()
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    f64::from_str(s).ok()
}

/// Splits a trailing `Z` or `(+|-)hh:mm` zone designator off a temporal lexical form.
pub(crate) fn split_timezone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }
    let bytes = s.as_bytes();
    if bytes.len() > 6 {
        let sign_at = bytes.len() - 6;
        let sign = bytes[sign_at];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            let zone = &s[sign_at + 1..];
            let (h, m) = zone.split_once(':')?;
            let hours: i32 = h.parse().ok()?;
            let minutes: i32 = m.parse().ok()?;
            if hours > 14 || minutes > 59 || (hours == 14 && minutes > 0) {
                return None;
            }
            let mut secs = hours * 3600 + minutes * 60;
            if sign == b'-' {
                secs = -secs;
            }
            return Some((&s[..sign_at], Some(FixedOffset::east_opt(secs)?)));
        }
    }
    Some((s, None))
}

fn has_year_month_part(s: &str) -> bool {
    let date_part = s.split('T').next().unwrap_or_default();
    date_part.contains(['Y', 'M'])
}

/// Parses an ISO-8601 duration into (months, day-time delta).
pub(crate) fn parse_duration(s: &str) -> Option<(i32, TimeDelta)> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let body = body.strip_prefix('P')?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (body, None),
    };

    let mut any = false;
    let mut months: i64 = 0;
    let mut seconds: i64 = 0;
    let mut nanos: u32 = 0;

    let mut rest = date_part;
    for (designator, factor) in [('Y', 12i64), ('M', 1)] {
        if let Some((num, tail)) = take_component(rest, designator) {
            months = months.checked_add(num.parse::<i64>().ok()?.checked_mul(factor)?)?;
            rest = tail;
            any = true;
        }
    }
    if let Some((num, tail)) = take_component(rest, 'D') {
        seconds = seconds.checked_add(num.parse::<i64>().ok()?.checked_mul(86_400)?)?;
        rest = tail;
        any = true;
    }
    if !rest.is_empty() {
        return None;
    }

    if let Some(mut rest) = time_part {
        let mut any_time = false;
        for (designator, factor) in [('H', 3_600i64), ('M', 60)] {
            if let Some((num, tail)) = take_component(rest, designator) {
                seconds = seconds.checked_add(num.parse::<i64>().ok()?.checked_mul(factor)?)?;
                rest = tail;
                any_time = true;
            }
        }
        if let Some((num, tail)) = take_component(rest, 'S') {
            let (whole, frac) = match num.split_once('.') {
                Some((w, f)) => (w, f),
                None => (num, ""),
            };
            if whole.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            seconds = seconds.checked_add(whole.parse::<i64>().ok()?)?;
            let mut padded: String = frac.chars().take(9).collect();
            while padded.len() < 9 {
                padded.push('0');
            }
            nanos = padded.parse().ok()?;
            rest = tail;
            any_time = true;
        }
        if !rest.is_empty() || !any_time {
            return None;
        }
        any = true;
    }
    if !any {
        return None;
    }

    let months = i32::try_from(months).ok()?;
    let delta = TimeDelta::new(seconds, nanos)?;
    if negative {
        Some((-months, -delta))
    } else {
        Some((months, delta))
    }
}

fn take_component(s: &str, designator: char) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    if end == 0 || !s[end..].starts_with(designator) {
        return None;
    }
    Some((&s[..end], &s[end + designator.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_components() {
        assert_eq!(parse_duration("P1Y2M"), Some((14, TimeDelta::zero())));
        assert_eq!(
            parse_duration("-PT1H30M"),
            Some((0, -TimeDelta::minutes(90)))
        );
        assert_eq!(
            parse_duration("PT1.5S"),
            TimeDelta::new(1, 500_000_000).map(|d| (0, d))
        );
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P1S"), None);
    }

    #[test]
    fn timezone_designators() {
        let (body, tz) = split_timezone("2024-01-01+05:30").unwrap();
        assert_eq!(body, "2024-01-01");
        assert_eq!(tz.unwrap().local_minus_utc(), 5 * 3600 + 30 * 60);
        assert_eq!(split_timezone("12:00:00").unwrap().1, None);
    }
}
