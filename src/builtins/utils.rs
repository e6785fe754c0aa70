// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::CallContext;
use crate::error::ArgumentMismatch;
use crate::number::{parse_double, parse_integer, Number};
use crate::value::{Value, Version};
use crate::Rc;

use chrono::{NaiveDateTime, TimeDelta};

use anyhow::{bail, Result};

fn mismatch(ctx: &CallContext, idx: usize, expected: &'static str, v: &Value) -> anyhow::Error {
    anyhow::Error::new(ArgumentMismatch {
        function: ctx.function.to_string(),
        index: idx,
        expected,
        actual: v.to_string(),
    })
}

/// Argument `idx` or `None` when the optional argument was not supplied.
pub fn optional(args: &[Value], idx: usize) -> Option<&Value> {
    args.get(idx)
}

/// Any value is accepted as a string parameter; `null` becomes `""`.
pub fn ensure_string(_ctx: &CallContext, args: &[Value], idx: usize) -> Result<Rc<str>> {
    Ok(match args.get(idx) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "".into(),
        Some(v) => v.to_string().into(),
    })
}

/// String parameter that distinguishes `null` from `""`.
pub fn ensure_nullable_string(
    ctx: &CallContext,
    args: &[Value],
    idx: usize,
) -> Result<Option<Rc<str>>> {
    match args.get(idx) {
        Some(Value::Null) | None => Ok(None),
        _ => ensure_string(ctx, args, idx).map(Some),
    }
}

pub fn ensure_int(ctx: &CallContext, args: &[Value], idx: usize) -> Result<i64> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Int(i) => Ok(*i),
        Value::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(*d as i64),
        Value::Char(c) => Ok(*c as i64),
        Value::String(s) => parse_integer(s).ok_or_else(|| mismatch(ctx, idx, "an integer", v)),
        _ => Err(mismatch(ctx, idx, "an integer", v)),
    }
}

pub fn ensure_i32(ctx: &CallContext, args: &[Value], idx: usize) -> Result<i32> {
    let v = ensure_int(ctx, args, idx)?;
    i32::try_from(v).map_err(|_| mismatch(ctx, idx, "a 32-bit integer", &Value::Int(v)))
}

/// Non-negative `i32` used as an index or a count.
pub fn ensure_index(ctx: &CallContext, args: &[Value], idx: usize) -> Result<i64> {
    Ok(ensure_i32(ctx, args, idx)? as i64)
}

pub fn ensure_double(ctx: &CallContext, args: &[Value], idx: usize) -> Result<f64> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Double(d) => Ok(*d),
        Value::Int(i) => Ok(*i as f64),
        Value::String(s) => parse_double(s).ok_or_else(|| mismatch(ctx, idx, "a number", v)),
        _ => Err(mismatch(ctx, idx, "a number", v)),
    }
}

/// Operand of the intrinsic arithmetic functions. `null` and an empty
/// string are `0`.
pub fn ensure_number(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Number> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Int(i) => Ok(Number::Int(*i)),
        Value::Double(d) => Ok(Number::Float(*d)),
        Value::Null => Ok(Number::Int(0)),
        Value::String(s) if s.trim().is_empty() => Ok(Number::Int(0)),
        Value::String(s) => s.parse().map_err(|_| mismatch(ctx, idx, "a number", v)),
        _ => Err(mismatch(ctx, idx, "a number", v)),
    }
}

pub fn ensure_bool(ctx: &CallContext, args: &[Value], idx: usize) -> Result<bool> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(mismatch(ctx, idx, "a boolean", v)),
    }
}

pub fn ensure_char(ctx: &CallContext, args: &[Value], idx: usize) -> Result<char> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Char(c) => Ok(*c),
        Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(mismatch(ctx, idx, "a single character", v)),
            }
        }
        _ => Err(mismatch(ctx, idx, "a single character", v)),
    }
}

/// A `char[]` parameter: an array of chars or a string whose characters
/// are taken individually.
pub fn ensure_chars(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Vec<char>> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Char(c) => Ok(vec![*c]),
        Value::String(s) => Ok(s.chars().collect()),
        Value::Array(values) => values
            .iter()
            .enumerate()
            .map(|(i, _)| ensure_char(ctx, values, i))
            .collect(),
        _ => Err(mismatch(ctx, idx, "an array of characters", v)),
    }
}

pub fn ensure_version(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Version> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Version(version) => Ok(*version),
        Value::String(s) => s.parse().map_err(|_| mismatch(ctx, idx, "a version", v)),
        _ => Err(mismatch(ctx, idx, "a version", v)),
    }
}

pub fn ensure_date_time(ctx: &CallContext, args: &[Value], idx: usize) -> Result<NaiveDateTime> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::DateTime(dt) => Ok(*dt),
        Value::String(s) => {
            crate::builtins::time::parse_date_time(s).ok_or_else(|| mismatch(ctx, idx, "a date", v))
        }
        _ => Err(mismatch(ctx, idx, "a date", v)),
    }
}

pub fn ensure_time_span(ctx: &CallContext, args: &[Value], idx: usize) -> Result<TimeDelta> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::TimeSpan(span) => Ok(*span),
        _ => Err(mismatch(ctx, idx, "a time span", v)),
    }
}

/// A `string[]` parameter. A plain string is a one element array.
pub fn ensure_string_array(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Vec<Rc<str>>> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Array(values) => Ok(values
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                e => e.to_string().into(),
            })
            .collect()),
        Value::Null => Err(mismatch(ctx, idx, "an array", v)),
        v => Ok(vec![v.to_string().into()]),
    }
}

pub fn ensure_array(ctx: &CallContext, args: &[Value], idx: usize) -> Result<Rc<Vec<Value>>> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(mismatch(ctx, idx, "an array", v)),
    }
}

/// Parse enum flags written as `Name`, `Type.Name`, `A | B` or an integer.
pub fn ensure_enum_flags(
    ctx: &CallContext,
    args: &[Value],
    idx: usize,
    enum_name: &str,
    names: &[(&str, u32)],
) -> Result<u32> {
    let v = args.get(idx).unwrap_or(&Value::Null);
    match v {
        Value::Int(i) => u32::try_from(*i).map_err(|_| mismatch(ctx, idx, "an enum value", v)),
        Value::String(s) => {
            let mut flags = 0;
            for part in s.split(['|', ',']).map(str::trim) {
                if let Ok(i) = part.parse::<u32>() {
                    flags |= i;
                    continue;
                }
                let name = match part.rsplit_once('.') {
                    Some((prefix, name)) if prefix.rsplit('.').next().is_some_and(|p| p.eq_ignore_ascii_case(enum_name)) => name,
                    _ => part,
                };
                match names.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                    Some((_, value)) => flags |= value,
                    None => bail!(ArgumentMismatch {
                        function: ctx.function.to_string(),
                        index: idx,
                        expected: "an enum value",
                        actual: part.to_string(),
                    }),
                }
            }
            Ok(flags)
        }
        _ => Err(mismatch(ctx, idx, "an enum value", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn ctx() -> CallContext<'static> {
        CallContext {
            function: "Test::Fcn",
            registry: &NoRegistry,
            base_dir: None,
        }
    }

    #[test]
    fn coercions() -> Result<()> {
        let args = vec![
            Value::from(" 42 "),
            Value::from("2.5"),
            Value::from("TRUE"),
            Value::from("x"),
            Value::from(""),
        ];
        let ctx = ctx();
        assert_eq!(ensure_int(&ctx, &args, 0)?, 42);
        assert_eq!(ensure_double(&ctx, &args, 1)?, 2.5);
        assert!(ensure_bool(&ctx, &args, 2)?);
        assert_eq!(ensure_char(&ctx, &args, 3)?, 'x');
        assert_eq!(ensure_number(&ctx, &args, 4)?, Number::Int(0));

        let err = ensure_int(&ctx, &args, 3).err();
        assert!(err.is_some_and(|e| e.downcast_ref::<ArgumentMismatch>().is_some()));
        Ok(())
    }

    #[test]
    fn enum_flags() -> Result<()> {
        let names = [("None", 0), ("IgnoreCase", 1), ("Multiline", 2)];
        let args = vec![Value::from("RegexOptions.IgnoreCase | Multiline")];
        assert_eq!(ensure_enum_flags(&ctx(), &args, 0, "RegexOptions", &names)?, 3);
        let bad = vec![Value::from("Bogus")];
        assert!(ensure_enum_flags(&ctx(), &bad, 0, "RegexOptions", &names).is_err());
        Ok(())
    }
}
