// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_enum_flags, ensure_string, optional};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::value::Value;

use anyhow::{bail, Result};
use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.text.regularexpressions.regex::escape", Builtin(escape, 1, 1));
    m.insert("system.text.regularexpressions.regex::ismatch", Builtin(is_match, 2, 3));
    m.insert("system.text.regularexpressions.regex::match", Builtin(regex_match, 2, 3));
    m.insert("system.text.regularexpressions.regex::matches", Builtin(matches, 2, 3));
    m.insert("system.text.regularexpressions.regex::replace", Builtin(replace, 3, 4));
    m.insert("system.text.regularexpressions.regex::split", Builtin(split, 2, 3));
    m.insert("system.text.regularexpressions.regex::unescape", Builtin(unescape, 1, 1));
}

const REGEX_OPTIONS: [(&str, u32); 10] = [
    ("None", 0),
    ("IgnoreCase", 1),
    ("Multiline", 2),
    ("ExplicitCapture", 4),
    ("Compiled", 8),
    ("Singleline", 16),
    ("IgnorePatternWhitespace", 32),
    ("RightToLeft", 64),
    ("ECMAScript", 256),
    ("CultureInvariant", 512),
];

lazy_static! {
    static ref COMPILED: DashMap<(String, u32), Regex> = DashMap::new();
}

/// Compile `pattern` (argument 1) with the options at `options_idx`.
fn compile(ctx: &CallContext, args: &[Value], options_idx: usize) -> Result<Regex> {
    let pattern = ensure_string(ctx, args, 1)?.to_string();
    let flags = match optional(args, options_idx) {
        Some(_) => ensure_enum_flags(ctx, args, options_idx, "RegexOptions", &REGEX_OPTIONS)?,
        None => 0,
    };
    if flags & 64 != 0 {
        bail!("RegexOptions.RightToLeft is not supported.");
    }

    let key = (pattern, flags);
    if let Some(regex) = COMPILED.get(&key) {
        return Ok(regex.clone());
    }
    let regex = match RegexBuilder::new(&key.0)
        .case_insensitive(flags & 1 != 0)
        .multi_line(flags & 2 != 0)
        .dot_matches_new_line(flags & 16 != 0)
        .ignore_whitespace(flags & 32 != 0)
        .build()
    {
        Ok(r) => r,
        Err(e) => bail!("Invalid pattern '{}': {e}", key.0),
    };
    COMPILED.insert(key, regex.clone());
    Ok(regex)
}

fn is_match(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let input = ensure_string(ctx, args, 0)?;
    Ok(Value::Bool(compile(ctx, args, 2)?.is_match(&input)))
}

/// Text of the first match, `""` when nothing matches.
fn regex_match(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let input = ensure_string(ctx, args, 0)?;
    let regex = compile(ctx, args, 2)?;
    Ok(Value::from(regex.find(&input).map(|m| m.as_str()).unwrap_or_default()))
}

fn matches(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let input = ensure_string(ctx, args, 0)?;
    let regex = compile(ctx, args, 2)?;
    Ok(Value::from_array(
        regex
            .find_iter(&input)
            .map(|m| Value::from(m.as_str()))
            .collect(),
    ))
}

/// Rewrite a substitution pattern into the replacement syntax of the
/// `regex` crate: `$1x` becomes `${1}x` and `$&` the whole match.
fn translate_replacement(replacement: &str) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::with_capacity(replacement.len());
    let mut idx = 0;
    while idx < chars.len() {
        if chars[idx] != '$' {
            out.push(chars[idx]);
            idx += 1;
            continue;
        }
        match chars.get(idx + 1) {
            Some('$') => {
                out.push_str("$$");
                idx += 2;
            }
            Some('&') => {
                out.push_str("${0}");
                idx += 2;
            }
            Some(c) if c.is_ascii_digit() => {
                let digits: String = chars[idx + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
                out.push_str(&format!("${{{digits}}}"));
                idx += 1 + digits.len();
            }
            Some('{') => match chars[idx..].iter().position(|c| *c == '}') {
                Some(end) => {
                    out.extend(&chars[idx..=idx + end]);
                    idx += end + 1;
                }
                None => {
                    out.push_str("$$");
                    idx += 1;
                }
            },
            _ => {
                out.push_str("$$");
                idx += 1;
            }
        }
    }
    out
}

fn replace(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let input = ensure_string(ctx, args, 0)?;
    let regex = compile(ctx, args, 3)?;
    let replacement = translate_replacement(&ensure_string(ctx, args, 2)?);
    Ok(Value::from(regex.replace_all(&input, replacement.as_str()).into_owned()))
}

/// Captured groups are included in the result, as with .NET.
fn split(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let input = ensure_string(ctx, args, 0)?;
    let regex = compile(ctx, args, 2)?;
    let mut parts = vec![];
    let mut last = 0;
    for caps in regex.captures_iter(&input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        parts.push(Value::from(&input[last..whole.start()]));
        for group in caps.iter().skip(1).flatten() {
            parts.push(Value::from(group.as_str()));
        }
        last = whole.end();
    }
    parts.push(Value::from(&input[last..]));
    Ok(Value::from_array(parts))
}

fn escape(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '*' | '+' | '?' | '|' | '{' | '[' | '(' | ')' | '^' | '$' | '.' | '#' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

fn unescape(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some(c) => out.push(c),
            None => bail!("Illegal \\ at end of pattern."),
        }
    }
    Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.Text.RegularExpressions.Regex::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    #[test]
    fn matching() -> Result<()> {
        assert_eq!(call(is_match, &["Hello".into(), "^h".into(), "IgnoreCase".into()])?, Value::Bool(true));
        assert_eq!(call(is_match, &["Hello".into(), "^h".into()])?, Value::Bool(false));
        assert_eq!(call(regex_match, &["v1.2.3".into(), r"\d+\.\d+".into()])?, Value::from("1.2"));
        assert_eq!(call(matches, &["a1b22".into(), r"\d+".into()])?.to_string(), "1;22");
        assert!(call(is_match, &["x".into(), "(".into()]).is_err());
        Ok(())
    }

    #[test]
    fn replacement_syntax() -> Result<()> {
        assert_eq!(translate_replacement("$1a$$"), "${1}a$$");
        assert_eq!(translate_replacement("[$&]"), "[${0}]");
        assert_eq!(
            call(replace, &["2024-01-05".into(), r"(\d+)-(\d+)-(\d+)".into(), "$3/$2/$1".into()])?,
            Value::from("05/01/2024")
        );
        Ok(())
    }

    #[test]
    fn split_and_escape() -> Result<()> {
        assert_eq!(call(split, &["a1b2c".into(), r"\d".into()])?.to_string(), "a;b;c");
        assert_eq!(call(split, &["a-b".into(), "(-)".into()])?.to_string(), "a;-;b");
        assert_eq!(call(escape, &["a.b c".into()])?, Value::from(r"a\.b\ c"));
        assert_eq!(call(unescape, &[r"a\.b\ c".into()])?, Value::from("a.b c"));
        Ok(())
    }
}
