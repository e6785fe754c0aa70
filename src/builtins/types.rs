// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::float_cmp, clippy::as_conversions)]

use crate::builtins::utils::{
    ensure_array, ensure_bool, ensure_char, ensure_double, ensure_i32, ensure_int, ensure_string,
    optional,
};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::number::{format_double, format_integer, format_radix, parse_double, parse_integer};
use crate::value::Value;

use core::cmp::Ordering;

use anyhow::{bail, Result};

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.math::abs", Builtin(abs, 1, 1));
    m.insert("system.math::ceiling", Builtin(ceiling, 1, 1));
    m.insert("system.math::e", Builtin(e, 0, 0));
    m.insert("system.math::floor", Builtin(floor, 1, 1));
    m.insert("system.math::log", Builtin(log, 1, 2));
    m.insert("system.math::log10", Builtin(log10, 1, 1));
    m.insert("system.math::max", Builtin(max, 2, 2));
    m.insert("system.math::min", Builtin(min, 2, 2));
    m.insert("system.math::pi", Builtin(pi, 0, 0));
    m.insert("system.math::pow", Builtin(pow, 2, 2));
    m.insert("system.math::round", Builtin(round, 1, 2));
    m.insert("system.math::sign", Builtin(sign, 1, 1));
    m.insert("system.math::sqrt", Builtin(sqrt, 1, 1));
    m.insert("system.math::truncate", Builtin(truncate, 1, 1));

    m.insert("system.int32::maxvalue", Builtin(int32_max_value, 0, 0));
    m.insert("system.int32::minvalue", Builtin(int32_min_value, 0, 0));
    m.insert("system.int32::parse", Builtin(int32_parse, 1, 1));
    m.insert("system.int64::maxvalue", Builtin(int64_max_value, 0, 0));
    m.insert("system.int64::minvalue", Builtin(int64_min_value, 0, 0));
    m.insert("system.int64::parse", Builtin(int64_parse, 1, 1));
    m.insert("system.double::maxvalue", Builtin(double_max_value, 0, 0));
    m.insert("system.double::minvalue", Builtin(double_min_value, 0, 0));
    m.insert("system.double::parse", Builtin(double_parse, 1, 1));

    m.insert("system.convert::toboolean", Builtin(to_boolean, 1, 1));
    m.insert("system.convert::todouble", Builtin(to_double, 1, 1));
    m.insert("system.convert::toint32", Builtin(to_int32, 1, 2));
    m.insert("system.convert::toint64", Builtin(to_int64, 1, 2));
    m.insert("system.convert::tostring", Builtin(convert_to_string, 1, 2));

    m.insert("system.char::isdigit", Builtin(is_digit, 1, 2));
    m.insert("system.char::isletter", Builtin(is_letter, 1, 2));
    m.insert("system.char::isletterordigit", Builtin(is_letter_or_digit, 1, 2));
    m.insert("system.char::iswhitespace", Builtin(is_white_space, 1, 2));
    m.insert("system.char::tolower", Builtin(char_to_lower, 1, 1));
    m.insert("system.char::toupper", Builtin(char_to_upper, 1, 1));
}

pub fn register_instance(m: &mut BuiltinTable) {
    m.insert("system.int64::compareto", Builtin(int_compare_to, 1, 1));
    m.insert("system.int64::equals", Builtin(int_equals, 1, 1));
    m.insert("system.int64::tostring", Builtin(int_to_string, 0, 1));

    m.insert("system.double::compareto", Builtin(double_compare_to, 1, 1));
    m.insert("system.double::equals", Builtin(double_equals, 1, 1));
    m.insert("system.double::tostring", Builtin(double_to_string, 0, 1));

    m.insert("system.boolean::compareto", Builtin(bool_compare_to, 1, 1));
    m.insert("system.boolean::equals", Builtin(bool_equals, 1, 1));
    m.insert("system.boolean::tostring", Builtin(to_string, 0, 0));

    m.insert("system.char::compareto", Builtin(char_compare_to, 1, 1));
    m.insert("system.char::equals", Builtin(char_equals, 1, 1));
    m.insert("system.char::tostring", Builtin(to_string, 0, 0));

    m.insert("system.array::getvalue", Builtin(array_get_value, 1, 1));
    m.insert("system.array::length", Builtin(array_length, 0, 0));
}

fn ordering_value(o: Option<Ordering>) -> Value {
    Value::Int(match o {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) | None => 0,
        Some(Ordering::Greater) => 1,
    })
}

/// Integers stay integers where the corresponding overload exists.
fn int_or_double(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Value> {
    match &args[idx] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::String(s) if parse_integer(s).is_some() => Ok(Value::Int(ensure_int(ctx, args, idx)?)),
        _ => Ok(Value::Double(ensure_double(ctx, args, idx)?)),
    }
}

/// `Math.Round` semantics: midpoints go to the even neighbour.
pub fn round_half_even(v: f64) -> f64 {
    let r = v.round();
    if (v - v.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - v.signum()
    } else {
        r
    }
}

fn abs(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    match int_or_double(ctx, args, 0)? {
        Value::Int(i) => match i.checked_abs() {
            Some(v) => Ok(Value::Int(v)),
            None => bail!("Negating the minimum value of a twos complement number is invalid."),
        },
        v => Ok(Value::Double(ensure_double(ctx, &[v], 0)?.abs())),
    }
}

fn ceiling(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.ceil()))
}

fn floor(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.floor()))
}

fn truncate(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.trunc()))
}

fn e(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Double(core::f64::consts::E))
}

fn pi(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Double(core::f64::consts::PI))
}

fn log(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_double(ctx, args, 0)?;
    Ok(Value::Double(match optional(args, 1) {
        Some(_) => v.log(ensure_double(ctx, args, 1)?),
        None => v.ln(),
    }))
}

fn log10(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.log10()))
}

fn min_max(ctx: &CallContext, args: &[Value], want: Ordering) -> Result<Value> {
    match (int_or_double(ctx, args, 0)?, int_or_double(ctx, args, 1)?) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if a.cmp(&b) == want { a } else { b })),
        _ => {
            let a = ensure_double(ctx, args, 0)?;
            let b = ensure_double(ctx, args, 1)?;
            if a.is_nan() || b.is_nan() {
                return Ok(Value::Double(f64::NAN));
            }
            Ok(Value::Double(if a.partial_cmp(&b) == Some(want) { a } else { b }))
        }
    }
}

fn max(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    min_max(ctx, args, Ordering::Greater)
}

fn min(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    min_max(ctx, args, Ordering::Less)
}

fn pow(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.powf(ensure_double(ctx, args, 1)?)))
}

fn round(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_double(ctx, args, 0)?;
    let digits = match optional(args, 1) {
        Some(_) => ensure_i32(ctx, args, 1)?,
        None => 0,
    };
    if !(0..=15).contains(&digits) {
        bail!("Rounding digits must be between 0 and 15, inclusive. (Parameter 'digits')");
    }
    let scale = 10f64.powi(digits);
    Ok(Value::Double(round_half_even(v * scale) / scale))
}

fn sign(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_double(ctx, args, 0)?;
    if v.is_nan() {
        bail!("Function does not accept floating point Not-a-Number values.");
    }
    Ok(Value::Int(if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }))
}

fn sqrt(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Double(ensure_double(ctx, args, 0)?.sqrt()))
}

fn int32_max_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i32::MAX as i64))
}

fn int32_min_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i32::MIN as i64))
}

fn int64_max_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::MAX))
}

fn int64_min_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::MIN))
}

fn double_max_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Double(f64::MAX))
}

fn double_min_value(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Double(f64::MIN))
}

fn parse_int_text(ctx: &CallContext, args: &[Value]) -> Result<i64> {
    let s = ensure_string(ctx, args, 0)?;
    if s.trim().is_empty() || !s.trim().trim_start_matches(['-', '+']).chars().all(|c| c.is_ascii_digit()) {
        bail!("The input string '{s}' was not in a correct format.");
    }
    match parse_integer(&s) {
        Some(v) => Ok(v),
        None => bail!("Value was either too large or too small for an Int64."),
    }
}

fn int32_parse(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = parse_int_text(ctx, args)?;
    if i32::try_from(v).is_err() {
        bail!("Value was either too large or too small for an Int32.");
    }
    Ok(Value::Int(v))
}

fn int64_parse(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(parse_int_text(ctx, args)?))
}

fn double_parse(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    match parse_double(&s) {
        Some(v) => Ok(Value::Double(v)),
        None => bail!("The input string '{s}' was not in a correct format."),
    }
}

fn to_boolean(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Bool(*i != 0)),
        Value::Double(d) => Ok(Value::Bool(*d != 0.0)),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Null => Ok(Value::Bool(false)),
        _ => match ensure_bool(ctx, args, 0) {
            Ok(b) => Ok(Value::Bool(b)),
            Err(_) => bail!("String '{}' was not recognized as a valid Boolean.", args[0]),
        },
    }
}

fn to_double(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Double(0.0)),
        Value::Bool(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
        Value::Int(_) | Value::Double(_) => Ok(Value::Double(ensure_double(ctx, args, 0)?)),
        _ => double_parse(ctx, args),
    }
}

/// Shared by `ToInt32`/`ToInt64`: an optional base selects radix parsing.
fn to_integer(ctx: &CallContext, args: &[Value]) -> Result<i64> {
    if optional(args, 1).is_some() {
        let s = ensure_string(ctx, args, 0)?;
        let radix = ensure_int(ctx, args, 1)?;
        if !matches!(radix, 2 | 8 | 10 | 16) {
            bail!("Invalid Base.");
        }
        let digits = if radix == 16 {
            s.trim().trim_start_matches("0x").trim_start_matches("0X")
        } else {
            s.trim()
        };
        return match i64::from_str_radix(digits, radix as u32) {
            Ok(v) => Ok(v),
            Err(_) => bail!("Could not find any recognizable digits."),
        };
    }
    match &args[0] {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(*b as i64),
        Value::Int(i) => Ok(*i),
        Value::Char(c) => Ok(*c as i64),
        Value::Double(d) => {
            let r = round_half_even(*d);
            if !r.is_finite() || r.abs() >= 9.223_372_036_854_776e18 {
                bail!("Value was either too large or too small for an Int64.");
            }
            Ok(r as i64)
        }
        _ => parse_int_text(ctx, args),
    }
}

fn to_int32(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = to_integer(ctx, args)?;
    if i32::try_from(v).is_err() {
        bail!("Value was either too large or too small for an Int32.");
    }
    Ok(Value::Int(v))
}

fn to_int64(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(to_integer(ctx, args)?))
}

fn convert_to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    match optional(args, 1) {
        Some(_) => {
            let v = ensure_int(ctx, args, 0)?;
            Ok(Value::from(format_radix(v, ensure_int(ctx, args, 1)?)?))
        }
        None => Ok(Value::from(args[0].to_string())),
    }
}

/// `Char.IsX(c)` or `Char.IsX(s, index)`.
fn char_arg(ctx: &CallContext, args: &[Value]) -> Result<char> {
    match optional(args, 1) {
        Some(_) => {
            let s = ensure_string(ctx, args, 0)?;
            let idx = ensure_int(ctx, args, 1)?;
            match usize::try_from(idx).ok().and_then(|i| s.chars().nth(i)) {
                Some(c) => Ok(c),
                None => bail!("Index was out of range. Must be non-negative and less than the size of the collection. (Parameter 'index')"),
            }
        }
        None => ensure_char(ctx, args, 0),
    }
}

fn is_digit(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_arg(ctx, args)?.is_numeric()))
}

fn is_letter(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_arg(ctx, args)?.is_alphabetic()))
}

fn is_letter_or_digit(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_arg(ctx, args)?.is_alphanumeric()))
}

fn is_white_space(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(char_arg(ctx, args)?.is_whitespace()))
}

fn char_to_lower(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let c = ensure_char(ctx, args, 0)?;
    Ok(Value::Char(c.to_lowercase().next().unwrap_or(c)))
}

fn char_to_upper(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let c = ensure_char(ctx, args, 0)?;
    Ok(Value::Char(c.to_uppercase().next().unwrap_or(c)))
}

fn int_compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_int(ctx, args, 0)?;
    let b = ensure_int(ctx, args, 1)?;
    Ok(ordering_value(Some(a.cmp(&b))))
}

fn int_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_int(ctx, args, 0)?;
    Ok(Value::Bool(ensure_int(ctx, args, 1).is_ok_and(|b| a == b)))
}

fn int_to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_int(ctx, args, 0)?;
    Ok(Value::from(match optional(args, 1) {
        Some(_) => format_integer(v, &ensure_string(ctx, args, 1)?)?,
        None => v.to_string(),
    }))
}

fn double_compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_double(ctx, args, 0)?;
    let b = ensure_double(ctx, args, 1)?;
    Ok(ordering_value(a.partial_cmp(&b)))
}

fn double_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_double(ctx, args, 0)?;
    Ok(Value::Bool(ensure_double(ctx, args, 1).is_ok_and(|b| a == b)))
}

/// `R`, `G` and the empty format give the shortest form; `F<n>` and `N<n>`
/// fix the number of decimals.
fn double_to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_double(ctx, args, 0)?;
    let format = match optional(args, 1) {
        Some(_) => ensure_string(ctx, args, 1)?.to_string(),
        None => String::new(),
    };
    let (spec, precision) = match format.chars().next() {
        Some(c) => (c.to_ascii_uppercase(), &format[c.len_utf8()..]),
        None => ('G', ""),
    };
    let decimals = match precision {
        "" => 2,
        p => match p.parse::<usize>() {
            Ok(d) => d,
            Err(_) => bail!("Format specifier was invalid."),
        },
    };
    Ok(Value::from(match spec {
        'G' | 'R' if precision.is_empty() => format_double(v),
        'F' => format!("{:.*}", decimals, v),
        'N' => {
            let fixed = format!("{:.*}", decimals, v.abs());
            let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
            let grouped = format_integer(int_part.parse::<i64>().unwrap_or(0), "N0")?;
            let sign = if v < 0.0 { "-" } else { "" };
            if frac.is_empty() {
                format!("{sign}{grouped}")
            } else {
                format!("{sign}{grouped}.{frac}")
            }
        }
        _ => bail!("Format specifier was invalid."),
    }))
}

fn bool_compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_bool(ctx, args, 0)?;
    let b = ensure_bool(ctx, args, 1)?;
    Ok(ordering_value(Some(a.cmp(&b))))
}

fn bool_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_bool(ctx, args, 0)?;
    Ok(Value::Bool(ensure_bool(ctx, args, 1).is_ok_and(|b| a == b)))
}

fn char_compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_char(ctx, args, 0)?;
    let b = ensure_char(ctx, args, 1)?;
    Ok(ordering_value(Some(a.cmp(&b))))
}

fn char_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_char(ctx, args, 0)?;
    Ok(Value::Bool(ensure_char(ctx, args, 1).is_ok_and(|b| a == b)))
}

fn to_string(_ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(args[0].to_string()))
}

fn array_get_value(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let values = ensure_array(ctx, args, 0)?;
    let idx = ensure_int(ctx, args, 1)?;
    match usize::try_from(idx).ok().and_then(|i| values.get(i)) {
        Some(v) => Ok(v.clone()),
        None => bail!("Index was outside the bounds of the array."),
    }
}

fn array_length(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_array(ctx, args, 0)?.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.Math::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    #[test]
    fn math() -> Result<()> {
        assert_eq!(call(abs, &["-5".into()])?, Value::Int(5));
        assert_eq!(call(max, &["3".into(), "7".into()])?, Value::Int(7));
        assert_eq!(call(min, &["3.5".into(), "7".into()])?, Value::Double(3.5));
        assert_eq!(call(round, &["2.5".into()])?, Value::Double(2.0));
        assert_eq!(call(round, &["3.5".into()])?, Value::Double(4.0));
        assert_eq!(call(round, &["1.2345".into(), "2".into()])?, Value::Double(1.23));
        assert_eq!(call(sign, &["-0.1".into()])?, Value::Int(-1));
        assert!(call(abs, &["x".into()]).is_err());
        Ok(())
    }

    #[test]
    fn conversions() -> Result<()> {
        assert_eq!(call(to_int32, &["ff".into(), Value::Int(16)])?, Value::Int(255));
        assert_eq!(call(convert_to_string, &[Value::Int(10), Value::Int(2)])?, Value::from("1010"));
        assert_eq!(call(to_int64, &[Value::Double(2.5)])?, Value::Int(2));
        assert!(call(int32_parse, &["3000000000".into()]).is_err());
        assert_eq!(call(to_boolean, &["True".into()])?, Value::Bool(true));
        Ok(())
    }

    #[test]
    fn instance_formatting() -> Result<()> {
        assert_eq!(call(int_to_string, &[Value::Int(255), "X4".into()])?, Value::from("00FF"));
        assert_eq!(call(double_to_string, &[Value::Double(1234.5), "N1".into()])?, Value::from("1,234.5"));
        assert_eq!(call(double_to_string, &[Value::Double(1.239), "F2".into()])?, Value::from("1.24"));
        assert_eq!(call(array_get_value, &[Value::from_array(vec!["a".into()]), Value::Int(0)])?, Value::from("a"));
        Ok(())
    }
}
