// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::float_cmp, clippy::as_conversions)]

use core::cmp::Ordering;
use core::fmt::{self, Debug, Display, Formatter};
use core::str::FromStr;

use anyhow::{bail, Result};

/// Numeric operand of the intrinsic arithmetic functions.
///
/// Integer arithmetic is attempted first; on overflow the operation is
/// redone in `f64` instead of wrapping.
#[derive(Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(*v),
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                let candidate = *f as i64;
                if (candidate as f64) == *f {
                    Some(candidate)
                } else {
                    None
                }
            }
            Number::Float(_) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Int(_))
    }

    fn checked_or_float(
        &self,
        rhs: &Self,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match int_op(*a, *b) {
                Some(v) => Number::Int(v),
                None => Number::Float(float_op(*a as f64, *b as f64)),
            },
            _ => Number::Float(float_op(self.as_f64(), rhs.as_f64())),
        }
    }

    pub fn add(&self, rhs: &Self) -> Number {
        self.checked_or_float(rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Self) -> Number {
        self.checked_or_float(rhs, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Self) -> Number {
        self.checked_or_float(rhs, i64::checked_mul, |a, b| a * b)
    }

    pub fn divide(&self, rhs: &Self) -> Result<Number> {
        match (self, rhs) {
            (Number::Int(_), Number::Int(0)) => bail!("Attempted to divide by zero."),
            (Number::Int(a), Number::Int(b)) => Ok(match a.checked_div(*b) {
                Some(v) => Number::Int(v),
                None => Number::Float(*a as f64 / *b as f64),
            }),
            _ => Ok(Number::Float(self.as_f64() / rhs.as_f64())),
        }
    }

    pub fn modulo(&self, rhs: &Self) -> Result<Number> {
        match (self, rhs) {
            (Number::Int(_), Number::Int(0)) => bail!("Attempted to divide by zero."),
            (Number::Int(a), Number::Int(b)) => Ok(match a.checked_rem(*b) {
                Some(v) => Number::Int(v),
                None => Number::Int(0),
            }),
            _ => Ok(Number::Float(self.as_f64() % rhs.as_f64())),
        }
    }

    pub fn and(&self, rhs: &Self) -> Option<Number> {
        Some(Number::Int(self.as_i64()? & rhs.as_i64()?))
    }

    pub fn or(&self, rhs: &Self) -> Option<Number> {
        Some(Number::Int(self.as_i64()? | rhs.as_i64()?))
    }

    pub fn xor(&self, rhs: &Self) -> Option<Number> {
        Some(Number::Int(self.as_i64()? ^ rhs.as_i64()?))
    }

    pub fn not(&self) -> Option<Number> {
        Some(Number::Int(!self.as_i64()?))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string())
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => f.write_str(&format_double(*v)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseNumberError;

impl FromStr for Number {
    type Err = ParseNumberError;

    /// Integers parse as `Int`; anything else that is a valid floating
    /// point literal parses as `Float`. An integer literal that does not fit
    /// in `i64` becomes a `Float`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(v) = parse_integer(s) {
            return Ok(Number::Int(v));
        }
        parse_double(s).map(Number::Float).ok_or(ParseNumberError)
    }
}

/// Parse an integer the way invariant-culture `long.Parse` does: surrounding
/// whitespace and a leading sign are accepted, nothing else.
pub fn parse_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('+'))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.strip_prefix('+').unwrap_or(trimmed).parse::<i64>().ok()
}

/// Parse a floating point literal. Accepts `1`, `1.5`, `.5`, `1e10`,
/// `-2.5E-3` and the special names `NaN`, `Infinity`, `-Infinity`.
pub fn parse_double(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed {
        "NaN" => return Some(f64::NAN),
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => (),
    }
    // Rust accepts "inf"/"nan" spellings which are not valid here.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Format a double as the shortest round-trippable string, switching to
/// scientific notation (`1.5E+20`, `1E-05`) outside the `-5 < exp < 15`
/// range.
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{v:e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent > -5 && exponent < 15 {
        format!("{v}")
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{:02}", exponent.abs())
    }
}

/// Format an integer with an invariant-culture numeric format string:
/// `X`/`x` (hex, optional width), `D` (zero padded), `N` (grouped).
pub fn format_integer(v: i64, format: &str) -> Result<String> {
    let (spec, precision) = match format.chars().next() {
        Some(c) => (c, &format[c.len_utf8()..]),
        None => return Ok(v.to_string()),
    };
    let width = if precision.is_empty() {
        0
    } else {
        match precision.parse::<usize>() {
            Ok(w) => w,
            Err(_) => bail!("Format specifier was invalid."),
        }
    };

    Ok(match spec {
        'X' => format!("{:0width$X}", v, width = width),
        'x' => format!("{:0width$x}", v, width = width),
        'D' | 'd' => {
            let digits = format!("{:0width$}", v.unsigned_abs(), width = width);
            if v < 0 {
                format!("-{digits}")
            } else {
                digits
            }
        }
        'N' | 'n' => {
            let digits = v.unsigned_abs().to_string();
            let mut grouped = String::new();
            for (idx, ch) in digits.chars().enumerate() {
                if idx > 0 && (digits.len() - idx) % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(ch);
            }
            if width > 0 {
                grouped.push('.');
                grouped.push_str(&"0".repeat(width));
            }
            if v < 0 {
                format!("-{grouped}")
            } else {
                grouped
            }
        }
        _ => bail!("Format specifier was invalid."),
    })
}

/// Render an integer in base 2, 8, 10 or 16 (two's complement for
/// negative values in the non-decimal bases).
pub fn format_radix(v: i64, radix: i64) -> Result<String> {
    Ok(match radix {
        2 => format!("{:b}", v),
        8 => format!("{:o}", v),
        10 => v.to_string(),
        16 => format!("{:x}", v),
        _ => bail!("Invalid Base."),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_use_shortest_form() {
        assert_eq!(format_double(42.0), "42");
        assert_eq!(format_double(0.5), "0.5");
        assert_eq!(format_double(123456789012345.0), "123456789012345");
        assert_eq!(format_double(1e15), "1E+15");
        assert_eq!(format_double(0.0001), "0.0001");
        assert_eq!(format_double(0.00001), "1E-05");
        assert_eq!(
            format_double(i64::MAX as f64 + 20.0),
            "9.223372036854776E+18"
        );
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let sum = Number::Int(i64::MAX).add(&Number::Int(20));
        assert!(!sum.is_integer());
        assert_eq!(sum.as_f64(), i64::MAX as f64 + 20.0);

        let product = Number::Int(6).mul(&Number::Int(7));
        assert_eq!(product, Number::Int(42));
    }

    #[test]
    fn integer_division() {
        assert_eq!(Number::Int(7).divide(&Number::Int(2)).ok(), Some(Number::Int(3)));
        assert!(Number::Int(7).divide(&Number::Int(0)).is_err());
        assert_eq!(
            Number::Float(7.0).divide(&Number::Int(2)).ok(),
            Some(Number::Float(3.5))
        );
    }

    #[test]
    fn parsing() {
        assert_eq!(parse_integer(" -12 "), Some(-12));
        assert_eq!(parse_integer("+7"), Some(7));
        assert_eq!(parse_integer("1.0"), None);
        assert_eq!(parse_double(".5"), Some(0.5));
        assert_eq!(parse_double("inf"), None);
        assert_eq!("9223372036854775808".parse::<Number>().ok().map(|n| n.is_integer()), Some(false));
    }

    #[test]
    fn integer_formats() -> Result<()> {
        assert_eq!(format_integer(255, "X")?, "FF");
        assert_eq!(format_integer(255, "x4")?, "00ff");
        assert_eq!(format_integer(-5, "D3")?, "-005");
        assert_eq!(format_integer(1234567, "N0")?, "1,234,567");
        assert_eq!(format_radix(255, 2)?, "11111111");
        assert!(format_radix(255, 3).is_err());
        Ok(())
    }
}
