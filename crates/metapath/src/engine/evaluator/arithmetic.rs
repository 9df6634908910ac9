//! Arithmetic operators dispatched through per-operator strategy tables.
//!
//! Each table maps a (left class, right class) pair to the function that
//! implements the operator for that combination. The tables are built once on
//! first use and are the only place the legal operand combinations are listed.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;

use super::numeric::{self, NumKind};
use crate::compiler::expr::BinaryOp;
use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::item::AtomicValue;
use crate::types::AtomicType;

/// Runtime operand class used as a strategy-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OperandClass {
    Integer,
    Decimal,
    Double,
    Date,
    DateTime,
    Time,
    DayTimeDuration,
    YearMonthDuration,
    Other,
}

impl OperandClass {
    fn of(v: &AtomicValue) -> Self {
        match v {
            AtomicValue::Decimal(_) => OperandClass::Decimal,
            AtomicValue::Double(_) => OperandClass::Double,
            AtomicValue::Date { .. } | AtomicValue::DateWithTimezone { .. } => OperandClass::Date,
            AtomicValue::DateTime { .. } | AtomicValue::DateTimeWithTimezone { .. } => {
                OperandClass::DateTime
            }
            AtomicValue::Time { .. } => OperandClass::Time,
            AtomicValue::DayTimeDuration(_) => OperandClass::DayTimeDuration,
            AtomicValue::YearMonthDuration(_) => OperandClass::YearMonthDuration,
            v if v.as_i64().is_some() => OperandClass::Integer,
            _ => OperandClass::Other,
        }
    }
}

type Strategy = fn(&AtomicValue, &AtomicValue, &DynamicContext) -> Result<AtomicValue, Error>;
type StrategyTable = HashMap<(OperandClass, OperandClass), Strategy>;

const NUMERIC: [OperandClass; 3] = [OperandClass::Integer, OperandClass::Decimal, OperandClass::Double];

fn with_numeric(table: &mut StrategyTable, strategy: Strategy) {
    for l in NUMERIC {
        for r in NUMERIC {
            table.insert((l, r), strategy);
        }
    }
}

static ADD: LazyLock<StrategyTable> = LazyLock::new(|| {
    use OperandClass as C;
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| numeric_op(a, b, numeric::add));
    t.insert((C::Date, C::DayTimeDuration), |a, b, _| date_plus_day_time(a, day_time(b)?));
    t.insert((C::DayTimeDuration, C::Date), |a, b, _| date_plus_day_time(b, day_time(a)?));
    t.insert((C::Date, C::YearMonthDuration), |a, b, _| date_plus_months(a, year_month(b)?));
    t.insert((C::YearMonthDuration, C::Date), |a, b, _| date_plus_months(b, year_month(a)?));
    t.insert((C::DateTime, C::DayTimeDuration), |a, b, _| {
        date_time_plus_day_time(a, day_time(b)?)
    });
    t.insert((C::DayTimeDuration, C::DateTime), |a, b, _| {
        date_time_plus_day_time(b, day_time(a)?)
    });
    t.insert((C::DateTime, C::YearMonthDuration), |a, b, _| {
        date_time_plus_months(a, year_month(b)?)
    });
    t.insert((C::YearMonthDuration, C::DateTime), |a, b, _| {
        date_time_plus_months(b, year_month(a)?)
    });
    t.insert((C::Time, C::DayTimeDuration), |a, b, _| time_plus(a, day_time(b)?));
    t.insert((C::DayTimeDuration, C::Time), |a, b, _| time_plus(b, day_time(a)?));
    t.insert((C::DayTimeDuration, C::DayTimeDuration), |a, b, _| {
        let sum = day_time(a)?
            .checked_add(&day_time(b)?)
            .ok_or_else(duration_overflow)?;
        Ok(AtomicValue::DayTimeDuration(sum))
    });
    t.insert((C::YearMonthDuration, C::YearMonthDuration), |a, b, _| {
        let sum = year_month(a)?
            .checked_add(year_month(b)?)
            .ok_or_else(duration_overflow)?;
        Ok(AtomicValue::YearMonthDuration(sum))
    });
    t
});

static SUBTRACT: LazyLock<StrategyTable> = LazyLock::new(|| {
    use OperandClass as C;
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| numeric_op(a, b, numeric::subtract));
    t.insert((C::Date, C::Date), |a, b, ctx| {
        let tz = ctx.implicit_timezone();
        instant_difference(date_instant(a, tz)?, date_instant(b, tz)?)
    });
    t.insert((C::DateTime, C::DateTime), |a, b, ctx| {
        let tz = ctx.implicit_timezone();
        instant_difference(date_time_instant(a, tz)?, date_time_instant(b, tz)?)
    });
    t.insert((C::Time, C::Time), |a, b, ctx| {
        let tz = ctx.implicit_timezone();
        instant_difference(time_instant(a, tz)?, time_instant(b, tz)?)
    });
    t.insert((C::Date, C::DayTimeDuration), |a, b, _| date_plus_day_time(a, -day_time(b)?));
    t.insert((C::Date, C::YearMonthDuration), |a, b, _| {
        date_plus_months(a, negate_months(year_month(b)?)?)
    });
    t.insert((C::DateTime, C::DayTimeDuration), |a, b, _| {
        date_time_plus_day_time(a, -day_time(b)?)
    });
    t.insert((C::DateTime, C::YearMonthDuration), |a, b, _| {
        date_time_plus_months(a, negate_months(year_month(b)?)?)
    });
    t.insert((C::Time, C::DayTimeDuration), |a, b, _| time_plus(a, -day_time(b)?));
    t.insert((C::DayTimeDuration, C::DayTimeDuration), |a, b, _| {
        let diff = day_time(a)?
            .checked_sub(&day_time(b)?)
            .ok_or_else(duration_overflow)?;
        Ok(AtomicValue::DayTimeDuration(diff))
    });
    t.insert((C::YearMonthDuration, C::YearMonthDuration), |a, b, _| {
        let diff = year_month(a)?
            .checked_sub(year_month(b)?)
            .ok_or_else(duration_overflow)?;
        Ok(AtomicValue::YearMonthDuration(diff))
    });
    t
});

static MULTIPLY: LazyLock<StrategyTable> = LazyLock::new(|| {
    use OperandClass as C;
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| numeric_op(a, b, numeric::multiply));
    for n in NUMERIC {
        t.insert((C::DayTimeDuration, n), |a, b, _| scale_day_time(a, factor(b)?));
        t.insert((n, C::DayTimeDuration), |a, b, _| scale_day_time(b, factor(a)?));
        t.insert((C::YearMonthDuration, n), |a, b, _| scale_year_month(a, factor(b)?));
        t.insert((n, C::YearMonthDuration), |a, b, _| scale_year_month(b, factor(a)?));
    }
    t
});

static DIVIDE: LazyLock<StrategyTable> = LazyLock::new(|| {
    use OperandClass as C;
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| numeric_op(a, b, numeric::divide));
    for n in NUMERIC {
        t.insert((C::DayTimeDuration, n), |a, b, _| {
            let divisor = factor(b)?;
            if divisor == 0.0 {
                return Err(Error::from_code(ErrorCode::FOAR0001, "division of a duration by zero"));
            }
            scale_day_time(a, 1.0 / divisor)
        });
        t.insert((C::YearMonthDuration, n), |a, b, _| {
            let divisor = factor(b)?;
            if divisor == 0.0 {
                return Err(Error::from_code(ErrorCode::FOAR0001, "division of a duration by zero"));
            }
            scale_year_month(a, 1.0 / divisor)
        });
    }
    t.insert((C::DayTimeDuration, C::DayTimeDuration), |a, b, _| {
        let (x, y) = (nanos(day_time(a)?)?, nanos(day_time(b)?)?);
        duration_ratio(Decimal::from(x), Decimal::from(y))
    });
    t.insert((C::YearMonthDuration, C::YearMonthDuration), |a, b, _| {
        duration_ratio(Decimal::from(year_month(a)?), Decimal::from(year_month(b)?))
    });
    t
});

static INTEGER_DIVIDE: LazyLock<StrategyTable> = LazyLock::new(|| {
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| {
        let (x, y) = (numeric::require_numeric(a)?, numeric::require_numeric(b)?);
        numeric::integer_divide(x, y).map(AtomicValue::Integer)
    });
    t
});

static MODULO: LazyLock<StrategyTable> = LazyLock::new(|| {
    let mut t: StrategyTable = HashMap::new();
    with_numeric(&mut t, |a, b, _| numeric_op(a, b, numeric::modulo));
    t
});

fn table(op: BinaryOp) -> &'static StrategyTable {
    match op {
        BinaryOp::Add => &ADD,
        BinaryOp::Sub => &SUBTRACT,
        BinaryOp::Mul => &MULTIPLY,
        BinaryOp::Div => &DIVIDE,
        BinaryOp::IDiv => &INTEGER_DIVIDE,
        BinaryOp::Mod => &MODULO,
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "div",
        BinaryOp::IDiv => "idiv",
        BinaryOp::Mod => "mod",
    }
}

/// Applies `op` to two atomic operands.
///
/// Lookup is by the exact operand-class pair. When the pair is absent and an
/// untyped operand is involved, untyped operands are cast to double and the
/// lookup is retried; otherwise the operator does not apply to these types.
pub(crate) fn apply(
    op: BinaryOp,
    left: &AtomicValue,
    right: &AtomicValue,
    ctx: &DynamicContext,
) -> Result<AtomicValue, Error> {
    let strategies = table(op);
    let key = (OperandClass::of(left), OperandClass::of(right));
    if let Some(strategy) = strategies.get(&key) {
        tracing::trace!(op = symbol(op), left = ?key.0, right = ?key.1, "arithmetic dispatch");
        return strategy(left, right, ctx);
    }
    let untyped = |v: &AtomicValue| matches!(v, AtomicValue::UntypedAtomic(_));
    if untyped(left) || untyped(right) {
        let promote = |v: &AtomicValue| -> Result<AtomicValue, Error> {
            if untyped(v) {
                ctx.static_context().adapters.cast(v, AtomicType::Double)
            } else {
                Ok(v.clone())
            }
        };
        let (l, r) = (promote(left)?, promote(right)?);
        let key = (OperandClass::of(&l), OperandClass::of(&r));
        if let Some(strategy) = strategies.get(&key) {
            tracing::trace!(op = symbol(op), left = ?key.0, right = ?key.1, "arithmetic dispatch after numeric promotion");
            return strategy(&l, &r, ctx);
        }
    }
    Err(Error::type_error(format!(
        "the operator '{}' is not defined for {} and {}",
        symbol(op),
        left.signature(),
        right.signature()
    )))
}

/// Unary minus.
pub(crate) fn negate(value: &AtomicValue, ctx: &DynamicContext) -> Result<AtomicValue, Error> {
    match value {
        AtomicValue::UntypedAtomic(_) => {
            let promoted = ctx.static_context().adapters.cast(value, AtomicType::Double)?;
            negate(&promoted, ctx)
        }
        AtomicValue::DayTimeDuration(d) => Ok(AtomicValue::DayTimeDuration(-*d)),
        AtomicValue::YearMonthDuration(m) => Ok(AtomicValue::YearMonthDuration(negate_months(*m)?)),
        v => match numeric::classify(v) {
            Some(n) => numeric::negate(n).map(NumKind::into_atomic),
            None => Err(Error::type_error(format!(
                "unary minus is not defined for {}",
                v.signature()
            ))),
        },
    }
}

fn numeric_op(
    a: &AtomicValue,
    b: &AtomicValue,
    f: fn(NumKind, NumKind) -> Result<NumKind, Error>,
) -> Result<AtomicValue, Error> {
    let (x, y) = (numeric::require_numeric(a)?, numeric::require_numeric(b)?);
    f(x, y).map(NumKind::into_atomic)
}

// ===== Durations =====

fn duration_overflow() -> Error {
    Error::from_code(ErrorCode::FODT0002, "duration overflow")
}

fn date_overflow() -> Error {
    Error::from_code(ErrorCode::FODT0001, "date/time overflow")
}

fn day_time(v: &AtomicValue) -> Result<TimeDelta, Error> {
    match v {
        AtomicValue::DayTimeDuration(d) => Ok(*d),
        other => Err(Error::type_error(format!(
            "expected a day-time duration, found {}",
            other.signature()
        ))),
    }
}

fn year_month(v: &AtomicValue) -> Result<i32, Error> {
    match v {
        AtomicValue::YearMonthDuration(m) => Ok(*m),
        other => Err(Error::type_error(format!(
            "expected a year-month duration, found {}",
            other.signature()
        ))),
    }
}

fn negate_months(months: i32) -> Result<i32, Error> {
    months.checked_neg().ok_or_else(duration_overflow)
}

fn nanos(d: TimeDelta) -> Result<i64, Error> {
    d.num_nanoseconds().ok_or_else(duration_overflow)
}

fn factor(v: &AtomicValue) -> Result<f64, Error> {
    let f = numeric::require_numeric(v)?.to_f64();
    if f.is_nan() {
        return Err(Error::type_error("a duration cannot be scaled by NaN"));
    }
    Ok(f)
}

fn scale_day_time(v: &AtomicValue, factor: f64) -> Result<AtomicValue, Error> {
    #[allow(clippy::cast_precision_loss)]
    let scaled = (nanos(day_time(v)?)? as f64 * factor).round();
    #[allow(clippy::cast_precision_loss)]
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return Err(duration_overflow());
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(AtomicValue::DayTimeDuration(TimeDelta::nanoseconds(scaled as i64)))
}

fn scale_year_month(v: &AtomicValue, factor: f64) -> Result<AtomicValue, Error> {
    let scaled = (f64::from(year_month(v)?) * factor).round();
    if !scaled.is_finite() || scaled.abs() > f64::from(i32::MAX) {
        return Err(duration_overflow());
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(AtomicValue::YearMonthDuration(scaled as i32))
}

fn duration_ratio(x: Decimal, y: Decimal) -> Result<AtomicValue, Error> {
    if y.is_zero() {
        return Err(Error::from_code(ErrorCode::FOAR0001, "division by a zero duration"));
    }
    x.checked_div(y)
        .map(AtomicValue::Decimal)
        .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "numeric overflow in division"))
}

// ===== Dates and times =====

/// Date with its timezone and whether it came from the strict
/// `date-with-timezone` type, which the result keeps.
fn date_parts(v: &AtomicValue) -> Result<(NaiveDate, Option<FixedOffset>, bool), Error> {
    match v {
        AtomicValue::Date { date, tz } => Ok((*date, *tz, false)),
        AtomicValue::DateWithTimezone { date, tz } => Ok((*date, Some(*tz), true)),
        other => Err(Error::type_error(format!("expected a date, found {}", other.signature()))),
    }
}

fn make_date(date: NaiveDate, tz: Option<FixedOffset>, strict: bool) -> AtomicValue {
    match tz {
        Some(tz) if strict => AtomicValue::DateWithTimezone { date, tz },
        tz => AtomicValue::Date { date, tz },
    }
}

fn date_time_parts(v: &AtomicValue) -> Result<(NaiveDateTime, Option<FixedOffset>, bool), Error> {
    match v {
        AtomicValue::DateTime { value, tz } => Ok((*value, *tz, false)),
        AtomicValue::DateTimeWithTimezone { value, tz } => Ok((*value, Some(*tz), true)),
        other => Err(Error::type_error(format!(
            "expected a date-time, found {}",
            other.signature()
        ))),
    }
}

fn make_date_time(value: NaiveDateTime, tz: Option<FixedOffset>, strict: bool) -> AtomicValue {
    match tz {
        Some(tz) if strict => AtomicValue::DateTimeWithTimezone { value, tz },
        tz => AtomicValue::DateTime { value, tz },
    }
}

fn date_plus_day_time(v: &AtomicValue, delta: TimeDelta) -> Result<AtomicValue, Error> {
    let (date, tz, strict) = date_parts(v)?;
    let shifted = date
        .and_time(NaiveTime::MIN)
        .checked_add_signed(delta)
        .ok_or_else(date_overflow)?;
    Ok(make_date(shifted.date(), tz, strict))
}

fn add_months(date: NaiveDate, months: i32) -> Result<NaiveDate, Error> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(date_overflow)
}

fn date_plus_months(v: &AtomicValue, months: i32) -> Result<AtomicValue, Error> {
    let (date, tz, strict) = date_parts(v)?;
    Ok(make_date(add_months(date, months)?, tz, strict))
}

fn date_time_plus_day_time(v: &AtomicValue, delta: TimeDelta) -> Result<AtomicValue, Error> {
    let (value, tz, strict) = date_time_parts(v)?;
    let shifted = value.checked_add_signed(delta).ok_or_else(date_overflow)?;
    Ok(make_date_time(shifted, tz, strict))
}

fn date_time_plus_months(v: &AtomicValue, months: i32) -> Result<AtomicValue, Error> {
    let (value, tz, strict) = date_time_parts(v)?;
    let date = add_months(value.date(), months)?;
    Ok(make_date_time(date.and_time(value.time()), tz, strict))
}

fn time_plus(v: &AtomicValue, delta: TimeDelta) -> Result<AtomicValue, Error> {
    let AtomicValue::Time { time, tz } = v else {
        return Err(Error::type_error(format!("expected a time, found {}", v.signature())));
    };
    let (shifted, _) = time.overflowing_add_signed(delta);
    Ok(AtomicValue::Time {
        time: shifted,
        tz: *tz,
    })
}

/// UTC instant of a local value, using `implicit` when it has no timezone.
fn to_utc(local: NaiveDateTime, tz: Option<FixedOffset>, implicit: FixedOffset) -> Result<NaiveDateTime, Error> {
    let offset = tz.unwrap_or(implicit);
    local
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .ok_or_else(date_overflow)
}

pub(crate) fn date_instant(v: &AtomicValue, implicit: FixedOffset) -> Result<NaiveDateTime, Error> {
    let (date, tz, _) = date_parts(v)?;
    to_utc(date.and_time(NaiveTime::MIN), tz, implicit)
}

pub(crate) fn date_time_instant(v: &AtomicValue, implicit: FixedOffset) -> Result<NaiveDateTime, Error> {
    let (value, tz, _) = date_time_parts(v)?;
    to_utc(value, tz, implicit)
}

/// Times compare on a common reference date.
pub(crate) fn time_instant(v: &AtomicValue, implicit: FixedOffset) -> Result<NaiveDateTime, Error> {
    let AtomicValue::Time { time, tz } = v else {
        return Err(Error::type_error(format!("expected a time, found {}", v.signature())));
    };
    let reference = NaiveDate::from_ymd_opt(1972, 12, 31).ok_or_else(date_overflow)?;
    to_utc(reference.and_time(*time), *tz, implicit)
}

fn instant_difference(a: NaiveDateTime, b: NaiveDateTime) -> Result<AtomicValue, Error> {
    Ok(AtomicValue::DayTimeDuration(a.signed_duration_since(b)))
}
