// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions)]

use crate::builtins::utils::{ensure_date_time, ensure_double, ensure_i32, ensure_string, ensure_time_span, optional};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::value::Value;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.datetime::new", Builtin(new, 3, 7));
    m.insert("system.datetime::now", Builtin(now, 0, 0));
    m.insert("system.datetime::parse", Builtin(parse, 1, 1));
    m.insert("system.datetime::today", Builtin(today, 0, 0));
    m.insert("system.datetime::utcnow", Builtin(utc_now, 0, 0));

    m.insert("system.timespan::fromdays", Builtin(from_days, 1, 1));
    m.insert("system.timespan::fromhours", Builtin(from_hours, 1, 1));
    m.insert("system.timespan::frommilliseconds", Builtin(from_milliseconds, 1, 1));
    m.insert("system.timespan::fromminutes", Builtin(from_minutes, 1, 1));
    m.insert("system.timespan::fromseconds", Builtin(from_seconds, 1, 1));
}

pub fn register_instance(m: &mut BuiltinTable) {
    m.insert("system.datetime::adddays", Builtin(add_days, 1, 1));
    m.insert("system.datetime::addhours", Builtin(add_hours, 1, 1));
    m.insert("system.datetime::addminutes", Builtin(add_minutes, 1, 1));
    m.insert("system.datetime::addseconds", Builtin(add_seconds, 1, 1));
    m.insert("system.datetime::compareto", Builtin(compare_to, 1, 1));
    m.insert("system.datetime::date", Builtin(date, 0, 0));
    m.insert("system.datetime::day", Builtin(day, 0, 0));
    m.insert("system.datetime::dayofyear", Builtin(day_of_year, 0, 0));
    m.insert("system.datetime::hour", Builtin(hour, 0, 0));
    m.insert("system.datetime::millisecond", Builtin(millisecond, 0, 0));
    m.insert("system.datetime::minute", Builtin(minute, 0, 0));
    m.insert("system.datetime::month", Builtin(month, 0, 0));
    m.insert("system.datetime::second", Builtin(second, 0, 0));
    m.insert("system.datetime::subtract", Builtin(subtract, 1, 1));
    m.insert("system.datetime::ticks", Builtin(ticks, 0, 0));
    m.insert("system.datetime::tostring", Builtin(to_string, 0, 1));
    m.insert("system.datetime::year", Builtin(year, 0, 0));

    m.insert("system.timespan::days", Builtin(span_days, 0, 0));
    m.insert("system.timespan::hours", Builtin(span_hours, 0, 0));
    m.insert("system.timespan::milliseconds", Builtin(span_milliseconds, 0, 0));
    m.insert("system.timespan::minutes", Builtin(span_minutes, 0, 0));
    m.insert("system.timespan::seconds", Builtin(span_seconds, 0, 0));
    m.insert("system.timespan::ticks", Builtin(span_ticks, 0, 0));
    m.insert("system.timespan::tostring", Builtin(span_to_string, 0, 0));
    m.insert("system.timespan::totaldays", Builtin(total_days, 0, 0));
    m.insert("system.timespan::totalhours", Builtin(total_hours, 0, 0));
    m.insert("system.timespan::totalmilliseconds", Builtin(total_milliseconds, 0, 0));
    m.insert("system.timespan::totalminutes", Builtin(total_minutes, 0, 0));
    m.insert("system.timespan::totalseconds", Builtin(total_seconds, 0, 0));
}

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse the date formats accepted by invariant-culture `DateTime.Parse`.
/// Values carrying a UTC offset are converted to local time.
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const DAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

/// Fraction of the second in 100ns units.
fn fraction_ticks(dt: &NaiveDateTime) -> u32 {
    dt.nanosecond() % 1_000_000_000 / 100
}

/// Render `dt` with a standard (single letter) or custom date format.
pub fn format_date_time(dt: &NaiveDateTime, format: &str) -> Result<String> {
    let custom = match format {
        "" | "G" => "MM/dd/yyyy HH:mm:ss",
        "g" => "MM/dd/yyyy HH:mm",
        "d" => "MM/dd/yyyy",
        "D" => "dddd, dd MMMM yyyy",
        "t" => "HH:mm",
        "T" => "HH:mm:ss",
        "s" => "yyyy'-'MM'-'dd'T'HH':'mm':'ss",
        "o" | "O" => "yyyy'-'MM'-'dd'T'HH':'mm':'ss'.'fffffff",
        "u" => "yyyy'-'MM'-'dd HH':'mm':'ss'Z'",
        f if f.chars().count() == 1 && f.chars().all(|c| c.is_ascii_alphabetic()) => {
            bail!("Input string was not in a correct format.")
        }
        f => f,
    };

    let chars: Vec<char> = custom.chars().collect();
    let mut out = String::new();
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        let run = chars[idx..].iter().take_while(|c| **c == ch).count();
        match ch {
            'y' => {
                let year = dt.year();
                match run {
                    1 => out.push_str(&(year % 100).to_string()),
                    2 => out.push_str(&format!("{:02}", year % 100)),
                    n => out.push_str(&format!("{:0n$}", year, n = n)),
                }
            }
            'M' => match run {
                1 => out.push_str(&dt.month().to_string()),
                2 => out.push_str(&format!("{:02}", dt.month())),
                3 => out.push_str(&MONTHS[dt.month0() as usize][..3]),
                _ => out.push_str(MONTHS[dt.month0() as usize]),
            },
            'd' => match run {
                1 => out.push_str(&dt.day().to_string()),
                2 => out.push_str(&format!("{:02}", dt.day())),
                3 => out.push_str(&DAYS[dt.weekday().num_days_from_monday() as usize][..3]),
                _ => out.push_str(DAYS[dt.weekday().num_days_from_monday() as usize]),
            },
            'H' | 'h' | 'm' | 's' => {
                let v = match ch {
                    'H' => dt.hour(),
                    'h' => match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    },
                    'm' => dt.minute(),
                    _ => dt.second(),
                };
                if run == 1 {
                    out.push_str(&v.to_string());
                } else {
                    out.push_str(&format!("{v:02}"));
                }
            }
            'f' | 'F' => {
                if run > 7 {
                    bail!("Input string was not in a correct format.");
                }
                let digits = format!("{:07}", fraction_ticks(dt));
                let digits = &digits[..run];
                if ch == 'f' {
                    out.push_str(digits);
                } else {
                    out.push_str(digits.trim_end_matches('0'));
                }
            }
            't' => {
                let marker = if dt.hour() < 12 { "AM" } else { "PM" };
                out.push_str(if run == 1 { &marker[..1] } else { marker });
            }
            '\'' | '"' => {
                let end = match chars[idx + 1..].iter().position(|c| *c == ch) {
                    Some(p) => idx + 1 + p,
                    None => bail!("Cannot find a matching quote character for the character '{ch}'."),
                };
                out.extend(&chars[idx + 1..end]);
                idx = end + 1;
                continue;
            }
            '\\' => {
                match chars.get(idx + 1) {
                    Some(c) => out.push(*c),
                    None => bail!("Input string was not in a correct format."),
                }
                idx += 2;
                continue;
            }
            c => {
                out.extend(core::iter::repeat(c).take(run));
            }
        }
        idx += run;
    }
    Ok(out)
}

fn now(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::DateTime(Local::now().naive_local()))
}

fn utc_now(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::DateTime(Utc::now().naive_utc()))
}

fn today(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    match Local::now().date_naive().and_hms_opt(0, 0, 0) {
        Some(dt) => Ok(Value::DateTime(dt)),
        None => bail!("could not compute today's date"),
    }
}

fn parse(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    match parse_date_time(&s) {
        Some(dt) => Ok(Value::DateTime(dt)),
        None => bail!("String '{s}' was not recognized as a valid DateTime."),
    }
}

/// `new DateTime(y, m, d[, h, mi, s[, ms]])`.
fn new(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let mut parts = [0i32; 7];
    for (idx, p) in parts.iter_mut().enumerate().take(args.len()) {
        *p = ensure_i32(ctx, args, idx)?;
    }
    let [y, mo, d, h, mi, s, ms] = parts;
    let date = u32::try_from(mo)
        .ok()
        .zip(u32::try_from(d).ok())
        .and_then(|(mo, d)| NaiveDate::from_ymd_opt(y, mo, d));
    let time = date.and_then(|date| {
        date.and_hms_milli_opt(
            u32::try_from(h).ok()?,
            u32::try_from(mi).ok()?,
            u32::try_from(s).ok()?,
            u32::try_from(ms).ok()?,
        )
    });
    match time {
        Some(dt) => Ok(Value::DateTime(dt)),
        None => bail!("Year, Month, and Day parameters describe an un-representable DateTime."),
    }
}

fn span_from(ctx: &CallContext, args: &[Value], millis_per_unit: f64) -> Result<Value> {
    let v = ensure_double(ctx, args, 0)?;
    if v.is_nan() {
        bail!("TimeSpan does not accept floating point Not-a-Number values.");
    }
    let millis = (v * millis_per_unit).round();
    if millis.abs() >= 9.2e15 {
        bail!("TimeSpan overflowed because the duration is too long.");
    }
    Ok(Value::TimeSpan(TimeDelta::milliseconds(millis as i64)))
}

fn from_days(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    span_from(ctx, args, 86_400_000.0)
}

fn from_hours(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    span_from(ctx, args, 3_600_000.0)
}

fn from_minutes(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    span_from(ctx, args, 60_000.0)
}

fn from_seconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    span_from(ctx, args, 1_000.0)
}

fn from_milliseconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    span_from(ctx, args, 1.0)
}

fn add(ctx: &CallContext, args: &[Value], millis_per_unit: f64) -> Result<Value> {
    let dt = ensure_date_time(ctx, args, 0)?;
    let span = match span_from(ctx, &args[1..], millis_per_unit)? {
        Value::TimeSpan(span) => span,
        _ => TimeDelta::zero(),
    };
    match dt.checked_add_signed(span) {
        Some(dt) => Ok(Value::DateTime(dt)),
        None => bail!("The added or subtracted value results in an un-representable DateTime."),
    }
}

fn add_days(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    add(ctx, args, 86_400_000.0)
}

fn add_hours(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    add(ctx, args, 3_600_000.0)
}

fn add_minutes(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    add(ctx, args, 60_000.0)
}

fn add_seconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    add(ctx, args, 1_000.0)
}

fn compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_date_time(ctx, args, 0)?;
    let b = ensure_date_time(ctx, args, 1)?;
    Ok(Value::Int(a.cmp(&b) as i64))
}

fn date(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let dt = ensure_date_time(ctx, args, 0)?;
    match dt.date().and_hms_opt(0, 0, 0) {
        Some(d) => Ok(Value::DateTime(d)),
        None => bail!("could not truncate {dt} to a date"),
    }
}

fn component(ctx: &CallContext, args: &[Value], f: fn(&NaiveDateTime) -> u32) -> Result<Value> {
    Ok(Value::Int(f(&ensure_date_time(ctx, args, 0)?) as i64))
}

fn year(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_date_time(ctx, args, 0)?.year() as i64))
}

fn month(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.month())
}

fn day(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.day())
}

fn day_of_year(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.ordinal())
}

fn hour(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.hour())
}

fn minute(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.minute())
}

fn second(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.second())
}

fn millisecond(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    component(ctx, args, |dt| dt.nanosecond() % 1_000_000_000 / 1_000_000)
}

/// `DateTime - DateTime` is a time span, `DateTime - TimeSpan` a date.
fn subtract(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let dt = ensure_date_time(ctx, args, 0)?;
    if let Value::TimeSpan(span) = &args[1] {
        return match dt.checked_sub_signed(*span) {
            Some(dt) => Ok(Value::DateTime(dt)),
            None => bail!("The added or subtracted value results in an un-representable DateTime."),
        };
    }
    let other = ensure_date_time(ctx, args, 1)?;
    Ok(Value::TimeSpan(dt.signed_duration_since(other)))
}

/// 100ns intervals since 0001-01-01 00:00:00.
fn ticks(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let dt = ensure_date_time(ctx, args, 0)?;
    let epoch = match NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(e) => e,
        None => bail!("could not compute the tick epoch"),
    };
    let since = dt.signed_duration_since(epoch);
    Ok(Value::Int(since.num_seconds() * 10_000_000 + fraction_ticks(&dt) as i64))
}

fn to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let dt = ensure_date_time(ctx, args, 0)?;
    let format = match optional(args, 1) {
        Some(_) => ensure_string(ctx, args, 1)?.to_string(),
        None => String::new(),
    };
    Ok(Value::from(format_date_time(&dt, &format)?))
}

fn span_days(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_time_span(ctx, args, 0)?.num_days()))
}

fn span_hours(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_time_span(ctx, args, 0)?.num_hours() % 24))
}

fn span_minutes(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_time_span(ctx, args, 0)?.num_minutes() % 60))
}

fn span_seconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_time_span(ctx, args, 0)?.num_seconds() % 60))
}

fn span_milliseconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_time_span(ctx, args, 0)?.num_milliseconds() % 1000))
}

fn span_ticks(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let span = ensure_time_span(ctx, args, 0)?;
    Ok(Value::Int(span.num_nanoseconds().unwrap_or(i64::MAX) / 100))
}

fn span_to_string(_ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(args[0].to_string()))
}

fn total(ctx: &CallContext, args: &[Value], millis_per_unit: f64) -> Result<Value> {
    let span = ensure_time_span(ctx, args, 0)?;
    let micros = span
        .num_microseconds()
        .map(|m| m as f64 / 1000.0)
        .unwrap_or(span.num_milliseconds() as f64);
    Ok(Value::Double(micros / millis_per_unit))
}

fn total_days(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    total(ctx, args, 86_400_000.0)
}

fn total_hours(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    total(ctx, args, 3_600_000.0)
}

fn total_minutes(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    total(ctx, args, 60_000.0)
}

fn total_seconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    total(ctx, args, 1_000.0)
}

fn total_milliseconds(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    total(ctx, args, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.DateTime::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    fn sample() -> Result<NaiveDateTime> {
        match parse_date_time("2021-03-04T05:06:07.123") {
            Some(dt) => Ok(dt),
            None => bail!("sample date did not parse"),
        }
    }

    #[test]
    fn parsing() {
        assert!(parse_date_time("2020-01-02").is_some());
        assert!(parse_date_time("01/02/2020 10:11:12").is_some());
        assert!(parse_date_time("not a date").is_none());
    }

    #[test]
    fn custom_formats() -> Result<()> {
        let dt = sample()?;
        assert_eq!(format_date_time(&dt, "yyyyMMdd")?, "20210304");
        assert_eq!(format_date_time(&dt, "yy-M-d h:mm tt")?, "21-3-4 5:06 AM");
        assert_eq!(format_date_time(&dt, "HH:mm:ss.fff")?, "05:06:07.123");
        assert_eq!(format_date_time(&dt, "ddd, MMM dd")?, "Thu, Mar 04");
        assert_eq!(format_date_time(&dt, "s")?, "2021-03-04T05:06:07");
        assert_eq!(format_date_time(&dt, "'year' yyyy")?, "year 2021");
        assert_eq!(format_date_time(&dt, "")?, "03/04/2021 05:06:07");
        assert!(format_date_time(&dt, "Q").is_err());
        Ok(())
    }

    #[test]
    fn arithmetic() -> Result<()> {
        let dt = Value::DateTime(sample()?);
        let later = call(add_days, &[dt.clone(), "1.5".into()])?;
        assert_eq!(call(day, &[later.clone()])?, Value::Int(5));
        assert_eq!(call(hour, &[later.clone()])?, Value::Int(17));
        let span = call(subtract, &[later, dt])?;
        assert_eq!(call(total_hours, &[span.clone()])?, Value::Double(36.0));
        assert_eq!(span.to_string(), "1.12:00:00");
        assert_eq!(call(new, &["2000".into(), "1".into(), "1".into()])?.to_string(), "01/01/2000 00:00:00");
        assert!(call(new, &["2000".into(), "13".into(), "1".into()]).is_err());
        Ok(())
    }
}
