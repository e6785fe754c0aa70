// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::escaping;
use crate::number::format_double;
use crate::Rc;

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use anyhow::{bail, Result};
use chrono::{NaiveDateTime, TimeDelta};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// Runtime value flowing through a property function chain.
///
/// Strings held here are unescaped; the interpreter escapes them again when
/// they are rendered back into expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The bare `null` argument, or a function that produced no object.
    Null,
    String(Rc<str>),
    Char(char),
    Bool(bool),
    Int(i64),
    Double(f64),
    Version(Version),
    DateTime(NaiveDateTime),
    TimeSpan(TimeDelta),
    Array(Rc<Vec<Value>>),
}

pub mod type_names {
    pub const STRING: &str = "System.String";
    pub const CHAR: &str = "System.Char";
    pub const BOOLEAN: &str = "System.Boolean";
    pub const INT64: &str = "System.Int64";
    pub const DOUBLE: &str = "System.Double";
    pub const VERSION: &str = "System.Version";
    pub const DATE_TIME: &str = "System.DateTime";
    pub const TIME_SPAN: &str = "System.TimeSpan";
    pub const ARRAY: &str = "System.Array";
    pub const OBJECT: &str = "System.Object";
}

impl Value {
    pub fn from_string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn from_array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(values))
    }

    /// Name of the runtime type, used to pick the instance member table.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => type_names::OBJECT,
            Value::String(_) => type_names::STRING,
            Value::Char(_) => type_names::CHAR,
            Value::Bool(_) => type_names::BOOLEAN,
            Value::Int(_) => type_names::INT64,
            Value::Double(_) => type_names::DOUBLE,
            Value::Version(_) => type_names::VERSION,
            Value::DateTime(_) => type_names::DATE_TIME,
            Value::TimeSpan(_) => type_names::TIME_SPAN,
            Value::Array(_) => type_names::ARRAY,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Render as expression text in escaped form. Array elements are
    /// escaped individually and joined with a raw `;` so that they become
    /// separate list entries.
    pub fn to_escaped_string(&self) -> String {
        match self {
            Value::Array(values) => values
                .iter()
                .map(|v| v.to_escaped_string())
                .collect::<Vec<_>>()
                .join(";"),
            _ => escaping::escape(&self.to_string()).into_owned(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::from_array(values)
    }
}

pub fn format_date_time(dt: &NaiveDateTime) -> String {
    dt.format("%m/%d/%Y %H:%M:%S").to_string()
}

pub fn format_time_span(span: &TimeDelta) -> String {
    let ticks = span.num_nanoseconds().unwrap_or(i64::MAX) / 100;
    let negative = ticks < 0;
    let ticks = ticks.unsigned_abs();
    let total_seconds = ticks / 10_000_000;
    let fraction = ticks % 10_000_000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds / 3600) % 24;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if fraction > 0 {
        out.push_str(&format!(".{fraction:07}"));
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Char(c) => write!(f, "{c}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => f.write_str(&format_double(*v)),
            Value::Version(v) => write!(f, "{v}"),
            Value::DateTime(dt) => f.write_str(&format_date_time(dt)),
            Value::TimeSpan(span) => f.write_str(&format_time_span(span)),
            Value::Array(values) => {
                for (idx, v) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

/// A `major.minor[.build[.revision]]` version number.
///
/// Unspecified components compare as `-1`, so `1.2 < 1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub build: i32,
    pub revision: i32,
}

impl Version {
    pub fn new(major: i32, minor: i32, build: i32, revision: i32) -> Result<Version> {
        if major < 0 || minor < 0 {
            bail!("Version's parameters must be greater than or equal to zero.");
        }
        Ok(Version {
            major,
            minor,
            build,
            revision,
        })
    }

    fn components(&self) -> [i32; 4] {
        [self.major, self.minor, self.build, self.revision]
    }

    /// Render only the first `field_count` components.
    pub fn to_string_with_fields(&self, field_count: usize) -> Result<String> {
        let defined = self.components().iter().take_while(|c| **c >= 0).count();
        if field_count > defined {
            bail!("Argument must be between 0 and {defined}.");
        }
        Ok(self.components()[..field_count]
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(&other.components())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            bail!("Version string portion was too short or too long.");
        }
        let mut components = [-1i32; 4];
        for (idx, part) in parts.iter().enumerate() {
            let part = part.trim();
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                bail!("Input string '{s}' was not in a correct format.");
            }
            components[idx] = match part.parse::<i32>() {
                Ok(v) => v,
                Err(_) => bail!("Value was either too large or too small for an Int32."),
            };
        }
        Version::new(components[0], components[1], components[2], components[3])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.build >= 0 {
            write!(f, ".{}", self.build)?;
            if self.revision >= 0 {
                write!(f, ".{}", self.revision)?;
            }
        }
        Ok(())
    }
}

/// Result of expanding an expression whose native type may be preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionResult {
    /// Expression text in escaped form.
    String(Rc<str>),
    /// Native value of an expression made of a single property function
    /// reference.
    Typed(Value),
}

impl ExpressionResult {
    /// Escaped text form of the result.
    pub fn to_escaped_string(&self) -> String {
        match self {
            ExpressionResult::String(s) => s.to_string(),
            ExpressionResult::Typed(v) => v.to_escaped_string(),
        }
    }

    /// Value passed to a function parameter: strings are unescaped, typed
    /// values are passed through.
    pub fn into_argument(self) -> Value {
        match self {
            ExpressionResult::String(s) => match escaping::unescape(&s) {
                std::borrow::Cow::Borrowed(_) => Value::String(s),
                std::borrow::Cow::Owned(u) => Value::String(u.into()),
            },
            ExpressionResult::Typed(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parse_and_compare() -> Result<()> {
        let a: Version = "1.2".parse()?;
        let b: Version = "1.2.0".parse()?;
        let c: Version = "1.10.0.4".parse()?;
        assert!(a < b);
        assert!(b < c);
        assert_eq!(c.to_string(), "1.10.0.4");
        assert_eq!(c.to_string_with_fields(2)?, "1.10");
        assert!(a.to_string_with_fields(3).is_err());
        assert!("1".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
        Ok(())
    }

    #[test]
    fn display_follows_invariant_culture() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(
            Value::from_array(vec![Value::from("a"), Value::Int(3)]).to_string(),
            "a;3"
        );
        assert_eq!(
            Value::TimeSpan(TimeDelta::hours(26) + TimeDelta::milliseconds(5)).to_string(),
            "1.02:00:00.0050000"
        );
        assert_eq!(Value::TimeSpan(TimeDelta::minutes(-90)).to_string(), "-01:30:00");
    }

    #[test]
    fn arrays_escape_elements_but_not_separators() {
        let v = Value::from_array(vec![Value::from("a;b"), Value::from("c")]);
        assert_eq!(v.to_escaped_string(), "a%3bb;c");
    }
}
