use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use rust_decimal::Decimal;

use super::common::{one, opt, opt_atomic};
use super::{CallContext, FunctionLibraryBuilder};
use crate::consts::NS_METAPATH_FUNCTIONS as FN;
use crate::engine::runtime::{Error, ErrorCode};
use crate::item::atomic::{format_duration, format_tz};
use crate::item::{AtomicValue, Sequence};
use crate::types::AtomicType;

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{Date, DateTime, DayTimeDuration, Decimal as Dec, Duration, Integer, Time};
    b.register(FN, "current-date", &[], one(Date), current_date)
        .register(FN, "current-dateTime", &[], one(DateTime), current_date_time)
        .register(FN, "current-time", &[], one(Time), current_time)
        .register(FN, "implicit-timezone", &[], one(DayTimeDuration), implicit_timezone)
        .register(FN, "year-from-date", &[opt(Date)], opt(Integer), year_from_date)
        .register(FN, "month-from-date", &[opt(Date)], opt(Integer), month_from_date)
        .register(FN, "day-from-date", &[opt(Date)], opt(Integer), day_from_date)
        .register(FN, "hours-from-dateTime", &[opt(DateTime)], opt(Integer), hours_from_date_time)
        .register(FN, "minutes-from-dateTime", &[opt(DateTime)], opt(Integer), minutes_from_date_time)
        .register(FN, "seconds-from-dateTime", &[opt(DateTime)], opt(Dec), seconds_from_date_time)
        .register(FN, "days-from-duration", &[opt(Duration)], opt(Integer), days_from_duration)
        .register(FN, "hours-from-duration", &[opt(Duration)], opt(Integer), hours_from_duration)
        .register(FN, "minutes-from-duration", &[opt(Duration)], opt(Integer), minutes_from_duration)
        .register(FN, "seconds-from-duration", &[opt(Duration)], opt(Dec), seconds_from_duration)
        .register(FN, "years-from-duration", &[opt(Duration)], opt(Integer), years_from_duration)
        .register(FN, "months-from-duration", &[opt(Duration)], opt(Integer), months_from_duration)
        .register(FN, "dateTime", &[opt(Date), opt(Time)], opt(DateTime), date_time_of)
        .register_range(
            FN,
            "adjust-dateTime-to-timezone",
            1,
            Some(2),
            &[opt(DateTime), opt(DayTimeDuration)],
            opt(DateTime),
            adjust_date_time_to_timezone,
        )
        .register_range(
            FN,
            "adjust-date-to-timezone",
            1,
            Some(2),
            &[opt(Date), opt(DayTimeDuration)],
            opt(Date),
            adjust_date_to_timezone,
        )
        .register_range(
            FN,
            "adjust-time-to-timezone",
            1,
            Some(2),
            &[opt(Time), opt(DayTimeDuration)],
            opt(Time),
            adjust_time_to_timezone,
        );
}

fn current_date(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    let now = ctx.dynamic.now();
    Ok(Sequence::of(AtomicValue::Date {
        date: now.date_naive(),
        tz: Some(*now.offset()),
    }))
}

fn current_date_time(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    let now = ctx.dynamic.now();
    Ok(Sequence::of(AtomicValue::DateTime {
        value: now.naive_local(),
        tz: Some(*now.offset()),
    }))
}

fn current_time(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    let now = ctx.dynamic.now();
    Ok(Sequence::of(AtomicValue::Time {
        time: now.time(),
        tz: Some(*now.offset()),
    }))
}

fn implicit_timezone(ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    let seconds = ctx.dynamic.implicit_timezone().local_minus_utc();
    Ok(Sequence::of(AtomicValue::DayTimeDuration(TimeDelta::seconds(
        i64::from(seconds),
    ))))
}

// ===== Component extraction =====

fn integer(value: Option<i64>) -> Sequence {
    Sequence::from_option(value.map(AtomicValue::Integer))
}

fn date_part(arg: &Sequence, f: impl Fn(NaiveDate) -> i64) -> Sequence {
    integer(match opt_atomic(arg) {
        Some(AtomicValue::Date { date, .. } | AtomicValue::DateWithTimezone { date, .. }) => Some(f(*date)),
        _ => None,
    })
}

fn date_time(arg: &Sequence) -> Option<NaiveDateTime> {
    match opt_atomic(arg) {
        Some(
            AtomicValue::DateTime { value, .. } | AtomicValue::DateTimeWithTimezone { value, .. },
        ) => Some(*value),
        _ => None,
    }
}

fn year_from_date(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(date_part(&args[0], |d| i64::from(d.year())))
}

fn month_from_date(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(date_part(&args[0], |d| i64::from(d.month())))
}

fn day_from_date(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(date_part(&args[0], |d| i64::from(d.day())))
}

fn hours_from_date_time(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(date_time(&args[0]).map(|v| i64::from(v.hour()))))
}

fn minutes_from_date_time(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(date_time(&args[0]).map(|v| i64::from(v.minute()))))
}

fn seconds_from_date_time(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::from_option(date_time(&args[0]).map(|v| {
        AtomicValue::Decimal(seconds(i64::from(v.second()), i64::from(v.nanosecond())))
    })))
}

fn seconds(whole: i64, nanos: i64) -> Decimal {
    (Decimal::from(whole) + Decimal::new(nanos, 9)).normalize()
}

/// Month and day-time components of any duration value.
fn duration_parts(arg: &Sequence) -> Option<(i32, TimeDelta)> {
    match opt_atomic(arg)? {
        AtomicValue::Duration { months, delta } => Some((*months, *delta)),
        AtomicValue::DayTimeDuration(delta) => Some((0, *delta)),
        AtomicValue::YearMonthDuration(months) => Some((*months, TimeDelta::zero())),
        _ => None,
    }
}

fn days_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(duration_parts(&args[0]).map(|(_, d)| d.num_days())))
}

fn hours_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(duration_parts(&args[0]).map(|(_, d)| d.num_hours() % 24)))
}

fn minutes_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(duration_parts(&args[0]).map(|(_, d)| d.num_minutes() % 60)))
}

fn seconds_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::from_option(duration_parts(&args[0]).map(|(_, d)| {
        AtomicValue::Decimal(seconds(d.num_seconds() % 60, i64::from(d.subsec_nanos())))
    })))
}

fn years_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(duration_parts(&args[0]).map(|(m, _)| i64::from(m / 12))))
}

fn months_from_duration(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(integer(duration_parts(&args[0]).map(|(m, _)| i64::from(m % 12))))
}

// ===== Construction and timezone adjustment =====

fn expected(what: &str, found: &AtomicValue) -> Error {
    Error::type_error(format!("expected {what}, found {}", found.signature()))
}

/// `fn:dateTime($date, $time)`. When both carry a timezone they must agree.
fn date_time_of(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (Some(date), Some(time)) = (opt_atomic(&args[0]), opt_atomic(&args[1])) else {
        return Ok(Sequence::empty());
    };
    let (date, date_tz) = match date {
        AtomicValue::Date { date, tz } => (*date, *tz),
        AtomicValue::DateWithTimezone { date, tz } => (*date, Some(*tz)),
        other => return Err(expected("a date", other)),
    };
    let AtomicValue::Time { time, tz: time_tz } = time else {
        return Err(expected("a time", time));
    };
    let tz = match (date_tz, *time_tz) {
        (Some(a), Some(b)) if a != b => {
            return Err(Error::from_code(
                ErrorCode::FORG0008,
                format!(
                    "the date ({}) and time ({}) timezones are inconsistent",
                    format_tz(Some(a)),
                    format_tz(Some(b))
                ),
            ));
        }
        (a, b) => a.or(b),
    };
    Ok(Sequence::of(AtomicValue::DateTime {
        value: date.and_time(*time),
        tz,
    }))
}

/// Offset for a `day-time-duration` timezone, which must be whole minutes
/// within fourteen hours of UTC.
fn timezone_of(delta: TimeDelta) -> Result<FixedOffset, Error> {
    let invalid = || {
        Error::from_code(
            ErrorCode::FODT0003,
            format!("{} is not a valid timezone", format_duration(0, delta)),
        )
    };
    let limit = TimeDelta::hours(14);
    if delta > limit || delta < -limit || delta.num_seconds() % 60 != 0 || delta.subsec_nanos() != 0 {
        return Err(invalid());
    }
    i32::try_from(delta.num_seconds())
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(invalid)
}

/// Target of an adjust function: the implicit timezone when the argument is
/// omitted, no timezone when it is the empty sequence.
fn target_timezone(ctx: &CallContext<'_>, args: &[Sequence]) -> Result<Option<FixedOffset>, Error> {
    let Some(arg) = args.get(1) else {
        return Ok(Some(ctx.dynamic.implicit_timezone()));
    };
    match opt_atomic(arg) {
        None => Ok(None),
        Some(AtomicValue::DayTimeDuration(delta)) => timezone_of(*delta).map(Some),
        Some(other) => Err(expected("a day-time-duration", other)),
    }
}

/// Moves a local date-time from one timezone to another. A value without a
/// timezone keeps its local time and gains the target; removing the timezone
/// also keeps the local time.
fn shift(value: NaiveDateTime, from: Option<FixedOffset>, to: Option<FixedOffset>) -> Result<NaiveDateTime, Error> {
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(value);
    };
    let delta = TimeDelta::seconds(i64::from(to.local_minus_utc() - from.local_minus_utc()));
    value.checked_add_signed(delta).ok_or_else(|| {
        Error::from_code(
            ErrorCode::FODT0001,
            format!("adjusting {value} to {} overflows", format_tz(Some(to))),
        )
    })
}

fn adjust_date_time_to_timezone(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (value, from) = match opt_atomic(&args[0]) {
        None => return Ok(Sequence::empty()),
        Some(AtomicValue::DateTime { value, tz }) => (*value, *tz),
        Some(AtomicValue::DateTimeWithTimezone { value, tz }) => (*value, Some(*tz)),
        Some(other) => return Err(expected("a date-time", other)),
    };
    let to = target_timezone(ctx, args)?;
    Ok(Sequence::of(AtomicValue::DateTime {
        value: shift(value, from, to)?,
        tz: to,
    }))
}

fn adjust_date_to_timezone(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (date, from) = match opt_atomic(&args[0]) {
        None => return Ok(Sequence::empty()),
        Some(AtomicValue::Date { date, tz }) => (*date, *tz),
        Some(AtomicValue::DateWithTimezone { date, tz }) => (*date, Some(*tz)),
        Some(other) => return Err(expected("a date", other)),
    };
    let to = target_timezone(ctx, args)?;
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    Ok(Sequence::of(AtomicValue::Date {
        date: shift(midnight, from, to)?.date(),
        tz: to,
    }))
}

fn adjust_time_to_timezone(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let (time, from) = match opt_atomic(&args[0]) {
        None => return Ok(Sequence::empty()),
        Some(AtomicValue::Time { time, tz }) => (*time, *tz),
        Some(other) => return Err(expected("a time", other)),
    };
    let to = target_timezone(ctx, args)?;
    let anchored = NaiveDate::default().and_time(time);
    Ok(Sequence::of(AtomicValue::Time {
        time: shift(anchored, from, to)?.time(),
        tz: to,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timezone_bounds() {
        assert!(timezone_of(TimeDelta::hours(14)).is_ok());
        assert!(timezone_of(-TimeDelta::hours(14)).is_ok());
        assert_eq!(timezone_of(TimeDelta::hours(15)).unwrap_err().code, ErrorCode::FODT0003);
        assert_eq!(timezone_of(TimeDelta::seconds(90)).unwrap_err().code, ErrorCode::FODT0003);
    }

    #[test]
    fn shift_keeps_local_time_without_source_timezone() {
        let value = NaiveDate::default().and_time(chrono::NaiveTime::MIN);
        let to = FixedOffset::east_opt(3600);
        assert_eq!(shift(value, None, to).unwrap(), value);
    }

    #[test]
    fn fractional_seconds_are_exact() {
        assert_eq!(seconds(5, 250_000_000).to_string(), "5.25");
        assert_eq!(seconds(-3, -500_000_000).to_string(), "-3.5");
    }
}
