//! Numeric classification and promotion shared by arithmetic, comparison and
//! the aggregate functions.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::engine::runtime::{Error, ErrorCode};
use crate::item::AtomicValue;

/// A numeric value classified into one of the three computation classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumKind {
    Int(i64),
    Dec(Decimal),
    Double(f64),
}

impl NumKind {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            NumKind::Int(i) => i as f64,
            NumKind::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            NumKind::Double(d) => d,
        }
    }

    pub(crate) fn into_atomic(self) -> AtomicValue {
        match self {
            NumKind::Int(i) => AtomicValue::Integer(i),
            NumKind::Dec(d) => AtomicValue::Decimal(d),
            NumKind::Double(d) => AtomicValue::Double(d),
        }
    }

    pub(crate) fn is_nan(self) -> bool {
        matches!(self, NumKind::Double(d) if d.is_nan())
    }
}

/// Classifies a numeric atomic value; the integer subtypes compute as integers.
pub(crate) fn classify(v: &AtomicValue) -> Option<NumKind> {
    match v {
        AtomicValue::Decimal(d) => Some(NumKind::Dec(*d)),
        AtomicValue::Double(d) => Some(NumKind::Double(*d)),
        other => other.as_i64().map(NumKind::Int),
    }
}

/// Like [`classify`] but a type error for non-numeric values.
pub(crate) fn require_numeric(v: &AtomicValue) -> Result<NumKind, Error> {
    classify(v).ok_or_else(|| {
        Error::type_error(format!("expected a numeric value, found {}", v.signature()))
    })
}

/// Promotes both operands to their common class: integer to decimal to double,
/// never narrowing.
pub(crate) fn unify_numeric(a: NumKind, b: NumKind) -> (NumKind, NumKind) {
    use NumKind::*;
    match (a, b) {
        (Double(x), y) => (Double(x), Double(y.to_f64())),
        (y, Double(x)) => (Double(y.to_f64()), Double(x)),
        (Dec(x), Int(y)) => (Dec(x), Dec(Decimal::from(y))),
        (Int(x), Dec(y)) => (Dec(Decimal::from(x)), Dec(y)),
        pair => pair,
    }
}

fn overflow(op: &str) -> Error {
    Error::from_code(ErrorCode::FOAR0002, format!("numeric overflow in {op}"))
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

pub(crate) fn add(a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    Ok(match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => NumKind::Int(x.checked_add(y).ok_or_else(|| overflow("addition"))?),
        (NumKind::Dec(x), NumKind::Dec(y)) => NumKind::Dec(x.checked_add(y).ok_or_else(|| overflow("addition"))?),
        (x, y) => NumKind::Double(x.to_f64() + y.to_f64()),
    })
}

pub(crate) fn subtract(a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    Ok(match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => {
            NumKind::Int(x.checked_sub(y).ok_or_else(|| overflow("subtraction"))?)
        }
        (NumKind::Dec(x), NumKind::Dec(y)) => {
            NumKind::Dec(x.checked_sub(y).ok_or_else(|| overflow("subtraction"))?)
        }
        (x, y) => NumKind::Double(x.to_f64() - y.to_f64()),
    })
}

pub(crate) fn multiply(a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    Ok(match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => {
            NumKind::Int(x.checked_mul(y).ok_or_else(|| overflow("multiplication"))?)
        }
        (NumKind::Dec(x), NumKind::Dec(y)) => {
            NumKind::Dec(x.checked_mul(y).ok_or_else(|| overflow("multiplication"))?)
        }
        (x, y) => NumKind::Double(x.to_f64() * y.to_f64()),
    })
}

/// `div`: integer operands produce a decimal; only doubles follow IEEE
/// semantics for a zero divisor.
pub(crate) fn divide(a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    let (a, b) = match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => (NumKind::Dec(Decimal::from(x)), NumKind::Dec(Decimal::from(y))),
        pair => pair,
    };
    Ok(match (a, b) {
        (NumKind::Dec(x), NumKind::Dec(y)) => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            NumKind::Dec(x.checked_div(y).ok_or_else(|| overflow("division"))?)
        }
        (x, y) => NumKind::Double(x.to_f64() / y.to_f64()),
    })
}

/// `idiv`: truncating integer division.
pub(crate) fn integer_divide(a: NumKind, b: NumKind) -> Result<i64, Error> {
    match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => {
            if y == 0 {
                return Err(division_by_zero());
            }
            x.checked_div(y).ok_or_else(|| overflow("integer division"))
        }
        (NumKind::Dec(x), NumKind::Dec(y)) => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            x.checked_div(y)
                .and_then(|q| q.trunc().to_i64())
                .ok_or_else(|| overflow("integer division"))
        }
        (x, y) => {
            let (x, y) = (x.to_f64(), y.to_f64());
            if y == 0.0 {
                return Err(division_by_zero());
            }
            if x.is_nan() || y.is_nan() || x.is_infinite() {
                return Err(overflow("integer division"));
            }
            let q = (x / y).trunc();
            #[allow(clippy::cast_precision_loss)]
            let in_range = q >= i64::MIN as f64 && q < i64::MAX as f64;
            if !in_range {
                return Err(overflow("integer division"));
            }
            #[allow(clippy::cast_possible_truncation)]
            Ok(q as i64)
        }
    }
}

/// `mod`: the sign of the result follows the dividend.
pub(crate) fn modulo(a: NumKind, b: NumKind) -> Result<NumKind, Error> {
    Ok(match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => {
            if y == 0 {
                return Err(division_by_zero());
            }
            // i64::MIN % -1 overflows in Rust; the mathematical result is 0
            NumKind::Int(x.checked_rem(y).unwrap_or(0))
        }
        (NumKind::Dec(x), NumKind::Dec(y)) => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            NumKind::Dec(x.checked_rem(y).ok_or_else(|| overflow("modulus"))?)
        }
        (x, y) => NumKind::Double(x.to_f64() % y.to_f64()),
    })
}

pub(crate) fn negate(a: NumKind) -> Result<NumKind, Error> {
    Ok(match a {
        NumKind::Int(i) => NumKind::Int(i.checked_neg().ok_or_else(|| overflow("negation"))?),
        NumKind::Dec(d) => NumKind::Dec(-d),
        NumKind::Double(d) => NumKind::Double(-d),
    })
}

/// Numeric ordering after promotion; `None` when either side is NaN.
pub(crate) fn compare(a: NumKind, b: NumKind) -> Option<Ordering> {
    match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => Some(x.cmp(&y)),
        (NumKind::Dec(x), NumKind::Dec(y)) => Some(x.cmp(&y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_never_narrows() {
        let (a, b) = unify_numeric(NumKind::Int(1), NumKind::Dec(Decimal::new(15, 1)));
        assert_eq!(a, NumKind::Dec(Decimal::ONE));
        assert_eq!(b, NumKind::Dec(Decimal::new(15, 1)));
        let (a, _) = unify_numeric(NumKind::Dec(Decimal::ONE), NumKind::Double(2.0));
        assert_eq!(a, NumKind::Double(1.0));
    }

    #[test]
    fn modulo_follows_dividend_sign() {
        assert_eq!(modulo(NumKind::Int(-5), NumKind::Int(3)).unwrap(), NumKind::Int(-2));
        assert_eq!(modulo(NumKind::Int(5), NumKind::Int(-3)).unwrap(), NumKind::Int(2));
        assert_eq!(integer_divide(NumKind::Int(-7), NumKind::Int(2)).unwrap(), -3);
    }

    #[test]
    fn zero_divisors() {
        assert_eq!(
            divide(NumKind::Int(1), NumKind::Int(0)).unwrap_err().code,
            ErrorCode::FOAR0001
        );
        assert_eq!(
            divide(NumKind::Double(1.0), NumKind::Int(0)).unwrap(),
            NumKind::Double(f64::INFINITY)
        );
        assert!(integer_divide(NumKind::Double(1.0), NumKind::Double(0.0)).is_err());
    }
}
