// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{
    ensure_bool, ensure_chars, ensure_enum_flags, ensure_i32, ensure_int, ensure_string,
    ensure_string_array, optional,
};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::number::format_integer;
use crate::value::Value;
use crate::Rc;

use core::cmp::Ordering;

use anyhow::{bail, Result};

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.string::compare", Builtin(compare, 2, 3));
    m.insert("system.string::concat", Builtin(concat, 1, 16));
    m.insert("system.string::copy", Builtin(copy, 1, 1));
    m.insert("system.string::empty", Builtin(empty, 0, 0));
    m.insert("system.string::equals", Builtin(static_equals, 2, 3));
    m.insert("system.string::format", Builtin(format, 1, 16));
    m.insert("system.string::isnullorempty", Builtin(is_null_or_empty, 1, 1));
    m.insert("system.string::isnullorwhitespace", Builtin(is_null_or_white_space, 1, 1));
    m.insert("system.string::join", Builtin(join, 2, 16));
    m.insert("system.string::new", Builtin(new, 1, 2));
}

pub fn register_instance(m: &mut BuiltinTable) {
    m.insert("system.string::chars", Builtin(chars, 1, 1));
    m.insert("system.string::compareto", Builtin(compare_to, 1, 1));
    m.insert("system.string::contains", Builtin(contains, 1, 1));
    m.insert("system.string::endswith", Builtin(ends_with, 1, 2));
    m.insert("system.string::equals", Builtin(equals, 1, 2));
    m.insert("system.string::indexof", Builtin(index_of, 1, 3));
    m.insert("system.string::indexofany", Builtin(index_of_any, 1, 3));
    m.insert("system.string::insert", Builtin(insert, 2, 2));
    m.insert("system.string::lastindexof", Builtin(last_index_of, 1, 3));
    m.insert("system.string::lastindexofany", Builtin(last_index_of_any, 1, 1));
    m.insert("system.string::length", Builtin(length, 0, 0));
    m.insert("system.string::padleft", Builtin(pad_left, 1, 2));
    m.insert("system.string::padright", Builtin(pad_right, 1, 2));
    m.insert("system.string::remove", Builtin(remove, 1, 2));
    m.insert("system.string::replace", Builtin(replace, 2, 2));
    m.insert("system.string::split", Builtin(split, 0, 2));
    m.insert("system.string::startswith", Builtin(starts_with, 1, 2));
    m.insert("system.string::substring", Builtin(substring, 1, 2));
    m.insert("system.string::tochararray", Builtin(to_char_array, 0, 0));
    m.insert("system.string::tolower", Builtin(to_lower, 0, 0));
    m.insert("system.string::tolowerinvariant", Builtin(to_lower, 0, 0));
    m.insert("system.string::tostring", Builtin(to_string, 0, 0));
    m.insert("system.string::toupper", Builtin(to_upper, 0, 0));
    m.insert("system.string::toupperinvariant", Builtin(to_upper, 0, 0));
    m.insert("system.string::trim", Builtin(trim, 0, 1));
    m.insert("system.string::trimend", Builtin(trim_end, 0, 1));
    m.insert("system.string::trimstart", Builtin(trim_start, 0, 1));
}

const STRING_COMPARISON: [(&str, u32); 6] = [
    ("CurrentCulture", 0),
    ("CurrentCultureIgnoreCase", 1),
    ("InvariantCulture", 2),
    ("InvariantCultureIgnoreCase", 3),
    ("Ordinal", 4),
    ("OrdinalIgnoreCase", 5),
];

const STRING_SPLIT_OPTIONS: [(&str, u32); 3] =
    [("None", 0), ("RemoveEmptyEntries", 1), ("TrimEntries", 2)];

/// Whether the optional `StringComparison` argument asks to ignore case.
fn ignore_case(ctx: &CallContext, args: &[Value], idx: usize) -> Result<bool> {
    match optional(args, idx) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Ok(ensure_enum_flags(ctx, args, idx, "StringComparison", &STRING_COMPARISON)? % 2 == 1),
    }
}

fn eq_with_case(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Culture-like ordering: letters compare case-insensitively first, with
/// lowercase sorting before uppercase on ties.
pub fn culture_compare(a: &str, b: &str, ignore_case: bool) -> Ordering {
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    if folded != Ordering::Equal || ignore_case {
        return folded;
    }
    for (x, y) in a.chars().zip(b.chars()) {
        if x != y {
            return if x.is_lowercase() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
    }
    a.len().cmp(&b.len())
}

fn ordering_value(o: Ordering) -> Value {
    Value::Int(match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}

/// Byte offset of the char at index `idx`.
fn byte_offset(s: &str, idx: i64) -> usize {
    s.char_indices()
        .nth(idx as usize)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn char_index_of_byte(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn compare(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_string(ctx, args, 0)?;
    let b = ensure_string(ctx, args, 1)?;
    let ignore = match optional(args, 2) {
        Some(_) => ensure_bool(ctx, args, 2).or_else(|_| ignore_case(ctx, args, 2))?,
        None => false,
    };
    Ok(ordering_value(culture_compare(&a, &b, ignore)))
}

fn concat(_ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::Array(values) => values.iter().for_each(|v| out.push_str(&v.to_string())),
            v => out.push_str(&v.to_string()),
        }
    }
    Ok(Value::from(out))
}

fn copy(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::String(ensure_string(ctx, args, 0)?))
}

fn empty(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(""))
}

fn static_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_string(ctx, args, 0)?;
    let b = ensure_string(ctx, args, 1)?;
    Ok(Value::Bool(eq_with_case(&a, &b, ignore_case(ctx, args, 2)?)))
}

/// Composite formatting with `{index[,alignment][:format]}` items.
fn format(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let template = ensure_string(ctx, args, 0)?;
    let values = &args[1..];
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => item.push(c),
                        None => bail!("Input string was not in a correct format."),
                    }
                }
                let (head, fmt) = item.split_once(':').unwrap_or((item.as_str(), ""));
                let (index, alignment) = match head.split_once(',') {
                    Some((i, a)) => (i.trim(), a.trim().parse::<i32>().ok()),
                    None => (head.trim(), None),
                };
                let value = match index.parse::<usize>().ok().and_then(|i| values.get(i)) {
                    Some(v) => v,
                    None => bail!("Index (zero based) must be greater than or equal to zero and less than the size of the argument list."),
                };
                let text = match (value, fmt) {
                    (Value::Int(i), f) if !f.is_empty() => format_integer(*i, f)?,
                    (v, _) => v.to_string(),
                };
                match alignment {
                    Some(w) if w > 0 => out.push_str(&format!("{text:>width$}", width = w as usize)),
                    Some(w) if w < 0 => out.push_str(&format!("{text:<width$}", width = w.unsigned_abs() as usize)),
                    _ => out.push_str(&text),
                }
            }
            '}' => bail!("Input string was not in a correct format."),
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

fn is_null_or_empty(_ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(match &args[0] {
        Value::Null => true,
        v => v.to_string().is_empty(),
    }))
}

fn is_null_or_white_space(_ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(match &args[0] {
        Value::Null => true,
        v => v.to_string().trim().is_empty(),
    }))
}

fn join(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let separator = ensure_string(ctx, args, 0)?;
    let parts: Vec<Rc<str>> = if args.len() == 2 {
        ensure_string_array(ctx, args, 1)?
    } else {
        (1..args.len())
            .map(|i| ensure_string(ctx, args, i))
            .collect::<Result<_>>()?
    };
    Ok(Value::from(
        parts
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(&separator),
    ))
}

/// `new string(char, count)` or `new string(char[])`.
fn new(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let chars = ensure_chars(ctx, args, 0)?;
    match optional(args, 1) {
        Some(_) => {
            let count = ensure_i32(ctx, args, 1)?;
            if count < 0 {
                bail!("Count cannot be less than zero.");
            }
            let c = chars.first().copied().unwrap_or_default();
            Ok(Value::from(c.to_string().repeat(count as usize)))
        }
        None => Ok(Value::from(chars.into_iter().collect::<String>())),
    }
}

fn chars(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let idx = ensure_int(ctx, args, 1)?;
    match usize::try_from(idx).ok().and_then(|i| s.chars().nth(i)) {
        Some(c) => Ok(Value::Char(c)),
        None => bail!("Index was outside the bounds of the array."),
    }
}

fn compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_string(ctx, args, 0)?;
    let b = ensure_string(ctx, args, 1)?;
    Ok(ordering_value(culture_compare(&a, &b, false)))
}

fn contains(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let value = ensure_string(ctx, args, 1)?;
    Ok(Value::Bool(s.contains(value.as_ref())))
}

fn starts_with(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let value = ensure_string(ctx, args, 1)?;
    Ok(Value::Bool(if ignore_case(ctx, args, 2)? {
        s.to_lowercase().starts_with(&value.to_lowercase())
    } else {
        s.starts_with(value.as_ref())
    }))
}

fn ends_with(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let value = ensure_string(ctx, args, 1)?;
    Ok(Value::Bool(if ignore_case(ctx, args, 2)? {
        s.to_lowercase().ends_with(&value.to_lowercase())
    } else {
        s.ends_with(value.as_ref())
    }))
}

fn equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let other = ensure_string(ctx, args, 1)?;
    Ok(Value::Bool(eq_with_case(&s, &other, ignore_case(ctx, args, 2)?)))
}

/// Start position and search window of the `IndexOf` family.
fn search_range(ctx: &CallContext, args: &[Value], s: &str, first: usize) -> Result<(i64, i64)> {
    let len = char_len(s);
    let start = match optional(args, first) {
        Some(_) => ensure_int(ctx, args, first)?,
        None => 0,
    };
    if start < 0 || start > len {
        bail!("Index was out of range. Must be non-negative and less than the size of the collection.");
    }
    let count = match optional(args, first + 1) {
        Some(_) => ensure_int(ctx, args, first + 1)?,
        None => len - start,
    };
    if count < 0 || count > len - start {
        bail!("Count must be positive and count must refer to a location within the string.");
    }
    Ok((start, count))
}

fn index_of(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let needle = ensure_string(ctx, args, 1)?;

    // IndexOf(value, StringComparison)
    if args.len() == 3 && ensure_int(ctx, args, 2).is_err() {
        let ignore = ignore_case(ctx, args, 2)?;
        let (hay, needle) = if ignore {
            (s.to_lowercase(), needle.to_lowercase())
        } else {
            (s.to_string(), needle.to_string())
        };
        return Ok(Value::Int(
            hay.find(&needle)
                .map(|b| char_index_of_byte(&hay, b))
                .unwrap_or(-1),
        ));
    }

    let (start, count) = search_range(ctx, args, &s, 2)?;
    let from = byte_offset(&s, start);
    let to = byte_offset(&s, start + count);
    Ok(Value::Int(
        s[from..to]
            .find(needle.as_ref())
            .map(|b| char_index_of_byte(&s, from + b))
            .unwrap_or(-1),
    ))
}

fn index_of_any(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let any = ensure_chars(ctx, args, 1)?;
    let (start, count) = search_range(ctx, args, &s, 2)?;
    Ok(Value::Int(
        s.chars()
            .enumerate()
            .skip(start as usize)
            .take(count as usize)
            .find(|(_, c)| any.contains(c))
            .map(|(i, _)| i as i64)
            .unwrap_or(-1),
    ))
}

fn last_index_of(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let needle = ensure_string(ctx, args, 1)?;
    if args.len() == 3 && ensure_int(ctx, args, 2).is_err() {
        let ignore = ignore_case(ctx, args, 2)?;
        let (hay, needle) = if ignore {
            (s.to_lowercase(), needle.to_lowercase())
        } else {
            (s.to_string(), needle.to_string())
        };
        return Ok(Value::Int(
            hay.rfind(&needle)
                .map(|b| char_index_of_byte(&hay, b))
                .unwrap_or(-1),
        ));
    }
    // LastIndexOf(value, startIndex) searches backwards from startIndex.
    let end = match optional(args, 2) {
        Some(_) => {
            let start = ensure_int(ctx, args, 2)?;
            if start < 0 || start >= char_len(&s).max(1) {
                bail!("startIndex must be less than length of string.");
            }
            byte_offset(&s, start + 1)
        }
        None => s.len(),
    };
    Ok(Value::Int(
        s[..end]
            .rfind(needle.as_ref())
            .map(|b| char_index_of_byte(&s, b))
            .unwrap_or(-1),
    ))
}

fn last_index_of_any(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let any = ensure_chars(ctx, args, 1)?;
    Ok(Value::Int(
        s.chars()
            .enumerate()
            .filter(|(_, c)| any.contains(c))
            .last()
            .map(|(i, _)| i as i64)
            .unwrap_or(-1),
    ))
}

fn insert(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let idx = ensure_int(ctx, args, 1)?;
    let value = ensure_string(ctx, args, 2)?;
    if idx < 0 || idx > char_len(&s) {
        bail!("Specified argument was out of the range of valid values. (Parameter 'startIndex')");
    }
    let at = byte_offset(&s, idx);
    Ok(Value::from(format!("{}{}{}", &s[..at], value, &s[at..])))
}

fn length(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(char_len(&ensure_string(ctx, args, 0)?)))
}

fn pad(ctx: &CallContext, args: &[Value], left: bool) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let width = ensure_i32(ctx, args, 1)?;
    if width < 0 {
        bail!("Non-negative number required. (Parameter 'totalWidth')");
    }
    let fill = match optional(args, 2) {
        Some(_) => ensure_chars(ctx, args, 2)?.first().copied().unwrap_or(' '),
        None => ' ',
    };
    let missing = (width as i64 - char_len(&s)).max(0) as usize;
    let padding: String = core::iter::repeat(fill).take(missing).collect();
    Ok(Value::from(if left {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }))
}

fn pad_left(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    pad(ctx, args, true)
}

fn pad_right(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    pad(ctx, args, false)
}

fn remove(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let len = char_len(&s);
    let start = ensure_int(ctx, args, 1)?;
    if start < 0 {
        bail!("StartIndex cannot be less than zero.");
    }
    let count = match optional(args, 2) {
        Some(_) => ensure_int(ctx, args, 2)?,
        None => len - start,
    };
    if count < 0 || count > len - start {
        bail!("Index and count must refer to a location within the string.");
    }
    let from = byte_offset(&s, start);
    let to = byte_offset(&s, start + count);
    Ok(Value::from(format!("{}{}", &s[..from], &s[to..])))
}

fn replace(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let old = ensure_string(ctx, args, 1)?;
    let new = ensure_string(ctx, args, 2)?;
    if old.is_empty() {
        bail!("String cannot be of zero length. (Parameter 'oldValue')");
    }
    Ok(Value::from(s.replace(old.as_ref(), &new)))
}

/// `Split()`, `Split(chars)`, `Split(chars, count)` and
/// `Split(chars, StringSplitOptions)`.
fn split(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let separators = match optional(args, 1) {
        Some(_) => ensure_chars(ctx, args, 1)?,
        None => vec![],
    };
    let is_separator = |c: char| {
        if separators.is_empty() {
            c.is_whitespace()
        } else {
            separators.contains(&c)
        }
    };

    let (mut count, mut options) = (usize::MAX, 0);
    if optional(args, 2).is_some() {
        match ensure_int(ctx, args, 2) {
            Ok(n) if n >= 0 => count = n as usize,
            Ok(_) => bail!("Count cannot be less than zero."),
            Err(_) => {
                options = ensure_enum_flags(ctx, args, 2, "StringSplitOptions", &STRING_SPLIT_OPTIONS)?
            }
        }
    }
    if count == 0 {
        return Ok(Value::from_array(vec![]));
    }

    let mut parts: Vec<&str> = vec![];
    let mut rest: &str = &s;
    while parts.len() + 1 < count {
        match rest.char_indices().find(|(_, c)| is_separator(*c)) {
            Some((i, c)) => {
                parts.push(&rest[..i]);
                rest = &rest[i + c.len_utf8()..];
            }
            None => break,
        }
    }
    parts.push(rest);

    Ok(Value::from_array(
        parts
            .into_iter()
            .map(|p| if options & 2 != 0 { p.trim() } else { p })
            .filter(|p| options & 1 == 0 || !p.is_empty())
            .map(Value::from)
            .collect(),
    ))
}

fn substring(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let len = char_len(&s);
    let start = ensure_int(ctx, args, 1)?;
    if start < 0 {
        bail!("startIndex cannot be less than zero. (Parameter 'startIndex')");
    }
    if start > len {
        bail!("startIndex cannot be larger than length of string. (Parameter 'startIndex')");
    }
    let count = match optional(args, 2) {
        Some(_) => ensure_int(ctx, args, 2)?,
        None => len - start,
    };
    if count < 0 {
        bail!("Length cannot be less than zero. (Parameter 'length')");
    }
    if count > len - start {
        bail!("Index and length must refer to a location within the string. (Parameter 'length')");
    }
    let from = byte_offset(&s, start);
    let to = byte_offset(&s, start + count);
    Ok(Value::from(&s[from..to]))
}

fn to_char_array(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from_array(s.chars().map(Value::Char).collect()))
}

fn to_lower(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(ensure_string(ctx, args, 0)?.to_lowercase()))
}

fn to_upper(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(ensure_string(ctx, args, 0)?.to_uppercase()))
}

fn to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::String(ensure_string(ctx, args, 0)?))
}

fn trim_chars(ctx: &CallContext, args: &[Value]) -> Result<Option<Vec<char>>> {
    match optional(args, 1) {
        Some(Value::Null) | None => Ok(None),
        Some(_) => Ok(Some(ensure_chars(ctx, args, 1)?)),
    }
}

fn trim(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(match trim_chars(ctx, args)? {
        Some(chars) => s.trim_matches(chars.as_slice()),
        None => s.trim(),
    }))
}

fn trim_start(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(match trim_chars(ctx, args)? {
        Some(chars) => s.trim_start_matches(chars.as_slice()),
        None => s.trim_start(),
    }))
}

fn trim_end(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(match trim_chars(ctx, args)? {
        Some(chars) => s.trim_end_matches(chars.as_slice()),
        None => s.trim_end(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<String> {
        let ctx = CallContext {
            function: "System.String::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args).map(|v| v.to_string())
    }

    #[test]
    fn substring_bounds() -> Result<()> {
        assert_eq!(call(substring, &["hello".into(), "1".into(), "3".into()])?, "ell");
        assert_eq!(call(substring, &["hello".into(), Value::Int(5)])?, "");
        assert!(call(substring, &["hello".into(), Value::Int(-10)]).is_err());
        assert!(call(substring, &["hello".into(), Value::Int(2), Value::Int(9)]).is_err());
        Ok(())
    }

    #[test]
    fn searching() -> Result<()> {
        assert_eq!(call(index_of, &["abcabc".into(), "c".into(), "3".into()])?, "5");
        assert_eq!(call(index_of, &["ABC".into(), "b".into(), "OrdinalIgnoreCase".into()])?, "1");
        assert_eq!(call(last_index_of, &["abcabc".into(), "b".into()])?, "4");
        assert_eq!(call(index_of_any, &["a.b/c".into(), "/.".into()])?, "1");
        Ok(())
    }

    #[test]
    fn split_and_format() -> Result<()> {
        assert_eq!(call(split, &["a;b;;c".into(), ";".into()])?, "a;b;;c");
        let parts = split(
            &CallContext {
                function: "System.String::Split",
                registry: &NoRegistry,
                base_dir: None,
            },
            &["a;b;;c".into(), ";".into(), "RemoveEmptyEntries".into()],
        )?;
        assert!(matches!(parts, Value::Array(ref a) if a.len() == 3));
        assert_eq!(
            call(format, &["{0}-{1,3}-{{x}}-{0:X}".into(), Value::Int(255), "a".into()])?,
            "255-  a-{x}-FF"
        );
        Ok(())
    }

    #[test]
    fn comparison() {
        assert_eq!(culture_compare("a", "B", false), Ordering::Less);
        assert_eq!(culture_compare("a", "A", false), Ordering::Less);
        assert_eq!(culture_compare("a", "A", true), Ordering::Equal);
    }
}
