use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::common::{integer_arg, many, one, opt, opt_atomic};
use super::{CallContext, FunctionLibraryBuilder};
use crate::compiler::expr::BinaryOp;
use crate::consts::{NS_METAPATH_FUNCTIONS as FN, NS_METAPATH_FUNCTIONS_MATH as MATH};
use crate::engine::evaluator::{apply_arithmetic, atomic_order, numeric};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode};
use crate::item::{AtomicValue, Sequence};
use crate::types::AtomicType;

pub(super) fn register(b: &mut FunctionLibraryBuilder) {
    use AtomicType::{AnyAtomic, Double, Integer, Numeric};
    b.register_range(FN, "sum", 1, Some(2), &[many(AnyAtomic), opt(AnyAtomic)], opt(AnyAtomic), sum)
        .register(FN, "avg", &[many(AnyAtomic)], opt(AnyAtomic), avg)
        .register(FN, "min", &[many(AnyAtomic)], opt(AnyAtomic), min)
        .register(FN, "max", &[many(AnyAtomic)], opt(AnyAtomic), max)
        .register(FN, "abs", &[opt(Numeric)], opt(Numeric), abs)
        .register(FN, "ceiling", &[opt(Numeric)], opt(Numeric), ceiling)
        .register(FN, "floor", &[opt(Numeric)], opt(Numeric), floor)
        .register_range(FN, "round", 1, Some(2), &[opt(Numeric), one(Integer)], opt(Numeric), round);
    b.register(MATH, "pi", &[], one(Double), pi)
        .register(MATH, "sqrt", &[opt(Double)], opt(Double), sqrt)
        .register(MATH, "pow", &[opt(Double), one(Numeric)], opt(Double), pow)
        .register(MATH, "exp", &[opt(Double)], opt(Double), exp)
        .register(MATH, "log", &[opt(Double)], opt(Double), log)
        .register(MATH, "log10", &[opt(Double)], opt(Double), log10);
}

/// Aggregates work on doubles where the input was untyped.
fn aggregate_values(arg: &Sequence, ctx: &DynamicContext) -> Result<Vec<AtomicValue>, Error> {
    arg.atomize()?
        .into_iter()
        .map(|v| match v {
            AtomicValue::UntypedAtomic(_) => ctx.static_context().adapters.cast(&v, AtomicType::Double),
            other => Ok(other),
        })
        .collect()
}

fn total(values: Vec<AtomicValue>, ctx: &DynamicContext) -> Result<Option<AtomicValue>, Error> {
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if !first.is_numeric() && !first.atomic_type().is_duration() {
        return Err(Error::type_error(format!(
            "sum and avg require numeric or duration values, found {}",
            first.signature()
        )));
    }
    values
        .try_fold(first, |acc, v| apply_arithmetic(BinaryOp::Add, &acc, &v, ctx))
        .map(Some)
}

fn sum(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let values = aggregate_values(&args[0], ctx.dynamic)?;
    match total(values, ctx.dynamic)? {
        Some(v) => Ok(Sequence::of(v)),
        None => Ok(match args.get(1) {
            Some(zero) => zero.clone(),
            None => Sequence::of(AtomicValue::Integer(0)),
        }),
    }
}

fn avg(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let values = aggregate_values(&args[0], ctx.dynamic)?;
    let n = i64::try_from(values.len()).unwrap_or(i64::MAX);
    match total(values, ctx.dynamic)? {
        Some(v) => Ok(Sequence::of(apply_arithmetic(
            BinaryOp::Div,
            &v,
            &AtomicValue::Integer(n),
            ctx.dynamic,
        )?)),
        None => Ok(Sequence::empty()),
    }
}

fn extreme(ctx: &DynamicContext, arg: &Sequence, wanted: Ordering) -> Result<Sequence, Error> {
    let values = aggregate_values(arg, ctx)?;
    let mut best: Option<AtomicValue> = None;
    for value in values {
        if matches!(value, AtomicValue::Double(d) if d.is_nan()) {
            return Ok(Sequence::of(value));
        }
        best = Some(match best {
            None => value,
            Some(current) => match atomic_order(&value, &current, ctx)? {
                Some(ordering) if ordering == wanted => value,
                _ => current,
            },
        });
    }
    Ok(Sequence::from_option(best))
}

fn min(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    extreme(ctx.dynamic, &args[0], Ordering::Less)
}

fn max(ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    extreme(ctx.dynamic, &args[0], Ordering::Greater)
}

/// Applies `op` preserving the numeric class of the argument.
fn unary(
    arg: &Sequence,
    int: impl Fn(i64) -> Option<i64>,
    dec: impl Fn(Decimal) -> Decimal,
    dbl: impl Fn(f64) -> f64,
) -> Result<Sequence, Error> {
    let Some(value) = opt_atomic(arg) else {
        return Ok(Sequence::empty());
    };
    let result = match value {
        AtomicValue::Decimal(d) => AtomicValue::Decimal(dec(*d)),
        AtomicValue::Double(d) => AtomicValue::Double(dbl(*d)),
        other => match other.as_i64() {
            Some(i) => AtomicValue::Integer(int(i).ok_or_else(|| {
                Error::from_code(ErrorCode::FOAR0002, "integer overflow")
            })?),
            None => {
                return Err(Error::type_error(format!(
                    "expected a numeric value, found {}",
                    other.signature()
                )));
            }
        },
    };
    Ok(Sequence::of(result))
}

fn abs(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    unary(&args[0], i64::checked_abs, |d| d.abs(), f64::abs)
}

fn ceiling(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    unary(&args[0], Some, |d| d.ceil(), f64::ceil)
}

fn floor(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    unary(&args[0], Some, |d| d.floor(), f64::floor)
}

fn round_decimal(d: Decimal, precision: i32) -> Decimal {
    let strategy = if d.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    if precision >= 0 {
        d.round_dp_with_strategy(precision.unsigned_abs(), strategy)
    } else {
        let scale = Decimal::from(10_i64.pow(precision.unsigned_abs().min(18)));
        (d / scale).round_dp_with_strategy(0, strategy) * scale
    }
}

/// Rounds half towards positive infinity at `precision` decimal digits.
fn round(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let precision = match args.get(1) {
        Some(p) => integer_arg(p)?,
        None => 0,
    };
    let precision = i32::try_from(precision.clamp(-18, 28)).unwrap_or(0);
    unary(
        &args[0],
        |i| {
            if precision >= 0 {
                Some(i)
            } else {
                round_decimal(Decimal::from(i), precision).to_i64()
            }
        },
        |d| round_decimal(d, precision),
        |d| {
            if !d.is_finite() {
                return d;
            }
            let scale = 10_f64.powi(precision);
            (d * scale + 0.5).floor() / scale
        },
    )
}

// ===== math =====

fn double(arg: &Sequence, f: impl Fn(f64) -> f64) -> Sequence {
    match opt_atomic(arg) {
        Some(AtomicValue::Double(d)) => Sequence::of(AtomicValue::Double(f(*d))),
        _ => Sequence::empty(),
    }
}

fn pi(_ctx: &mut CallContext<'_>, _args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(Sequence::of(AtomicValue::Double(std::f64::consts::PI)))
}

fn sqrt(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(double(&args[0], f64::sqrt))
}

fn pow(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    let exponent = opt_atomic(&args[1])
        .and_then(numeric::classify)
        .map_or(f64::NAN, |n| n.to_f64());
    Ok(double(&args[0], |x| x.powf(exponent)))
}

fn exp(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(double(&args[0], f64::exp))
}

fn log(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(double(&args[0], f64::ln))
}

fn log10(_ctx: &mut CallContext<'_>, args: &[Sequence]) -> Result<Sequence, Error> {
    Ok(double(&args[0], f64::log10))
}
