// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The `[MSBuild]::` pseudo-type.

use crate::builtins::utils::{ensure_nullable_string, ensure_number, ensure_string};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::escaping;
use crate::number::Number;
use crate::registry::{RegistryProvider, RegistryValue, RegistryView};
use crate::utils;
use crate::value::Value;

use core::cmp::Ordering;

use anyhow::{bail, Result};

pub fn register(m: &mut BuiltinTable) {
    m.insert("msbuild::add", Builtin(add, 2, 2));
    m.insert("msbuild::subtract", Builtin(subtract, 2, 2));
    m.insert("msbuild::multiply", Builtin(multiply, 2, 2));
    m.insert("msbuild::divide", Builtin(divide, 2, 2));
    m.insert("msbuild::modulo", Builtin(modulo, 2, 2));

    m.insert("msbuild::bitwiseand", Builtin(bitwise_and, 2, 2));
    m.insert("msbuild::bitwisenot", Builtin(bitwise_not, 1, 1));
    m.insert("msbuild::bitwiseor", Builtin(bitwise_or, 2, 2));
    m.insert("msbuild::bitwisexor", Builtin(bitwise_xor, 2, 2));

    m.insert("msbuild::escape", Builtin(escape, 1, 1));
    m.insert("msbuild::unescape", Builtin(unescape, 1, 1));
    m.insert("msbuild::valueordefault", Builtin(value_or_default, 2, 2));
    m.insert("msbuild::stablestringhash", Builtin(stable_string_hash, 1, 1));

    m.insert("msbuild::getregistryvalue", Builtin(get_registry_value, 1, 2));
    m.insert("msbuild::getregistryvaluefromview", Builtin(get_registry_value_from_view, 3, 16));

    m.insert("msbuild::doestaskhostexist", Builtin(does_task_host_exist, 2, 2));
    m.insert("msbuild::isosplatform", Builtin(is_os_platform, 1, 1));
    m.insert("msbuild::isosunixlike", Builtin(is_os_unix_like, 0, 0));

    m.insert("msbuild::ensuretrailingslash", Builtin(ensure_trailing_slash, 1, 1));
    m.insert("msbuild::getdirectorynameoffileabove", Builtin(get_directory_name_of_file_above, 2, 2));
    m.insert("msbuild::getpathoffileabove", Builtin(get_path_of_file_above, 1, 2));
    m.insert("msbuild::makerelative", Builtin(make_relative, 2, 2));
    m.insert("msbuild::normalizedirectory", Builtin(normalize_directory, 1, 16));
    m.insert("msbuild::normalizepath", Builtin(normalize_path, 1, 16));

    m.insert("msbuild::versionequals", Builtin(version_equals, 2, 2));
    m.insert("msbuild::versiongreaterthan", Builtin(version_greater_than, 2, 2));
    m.insert("msbuild::versiongreaterthanorequals", Builtin(version_greater_than_or_equals, 2, 2));
    m.insert("msbuild::versionlessthan", Builtin(version_less_than, 2, 2));
    m.insert("msbuild::versionlessthanorequals", Builtin(version_less_than_or_equals, 2, 2));
    m.insert("msbuild::versionnotequals", Builtin(version_not_equals, 2, 2));

    #[cfg(feature = "base64")]
    {
        m.insert("msbuild::convertfrombase64", Builtin(convert_from_base64, 1, 1));
        m.insert("msbuild::converttobase64", Builtin(convert_to_base64, 1, 1));
    }
}

fn number_value(n: Number) -> Value {
    match n {
        Number::Int(i) => Value::Int(i),
        Number::Float(f) => Value::Double(f),
    }
}

fn operands(ctx: &CallContext, args: &[Value]) -> Result<(Number, Number)> {
    Ok((ensure_number(ctx, args, 0)?, ensure_number(ctx, args, 1)?))
}

fn add(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    Ok(number_value(a.add(&b)))
}

fn subtract(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    Ok(number_value(a.sub(&b)))
}

fn multiply(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    Ok(number_value(a.mul(&b)))
}

fn divide(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    Ok(number_value(a.divide(&b)?))
}

fn modulo(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    Ok(number_value(a.modulo(&b)?))
}

fn bitwise(ctx: &CallContext, args: &[Value], op: fn(&Number, &Number) -> Option<Number>) -> Result<Value> {
    let (a, b) = operands(ctx, args)?;
    match op(&a, &b) {
        Some(n) => Ok(number_value(n)),
        None => bail!("Bitwise operations require integer operands, got `{a}` and `{b}`."),
    }
}

fn bitwise_and(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    bitwise(ctx, args, Number::and)
}

fn bitwise_or(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    bitwise(ctx, args, Number::or)
}

fn bitwise_xor(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    bitwise(ctx, args, Number::xor)
}

fn bitwise_not(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_number(ctx, args, 0)?;
    match a.not() {
        Some(n) => Ok(number_value(n)),
        None => bail!("Bitwise operations require integer operands, got `{a}`."),
    }
}

/// Result is escaped text and is rendered as is.
fn escape(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(escaping::escape(&s).into_owned()))
}

/// Result is raw text and is rendered as is.
fn unescape(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(escaping::unescape(&s).into_owned()))
}

fn value_or_default(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let value = ensure_string(ctx, args, 0)?;
    if value.is_empty() {
        Ok(Value::String(ensure_string(ctx, args, 1)?))
    } else {
        Ok(Value::String(value))
    }
}

/// Hash of the UTF-16 code units that is stable across processes and
/// platforms.
pub fn stable_hash(s: &str) -> i32 {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut hash1: i32 = (5381 << 16) + 5381;
    let mut hash2 = hash1;
    for pair in units.chunks(2) {
        hash1 = (hash1 << 5).wrapping_add(hash1) ^ i32::from(pair[0]);
        if let Some(second) = pair.get(1) {
            hash2 = (hash2 << 5).wrapping_add(hash2) ^ i32::from(*second);
        }
    }
    hash1.wrapping_add(hash2.wrapping_mul(1_566_083_941))
}

fn stable_string_hash(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(stable_hash(&ensure_string(ctx, args, 0)?) as i64))
}

/// Native value of a registry entry. Multi-string entries and binary
/// data become arrays so that each entry is a separate list element.
fn registry_value_to_value(value: RegistryValue) -> Value {
    match value {
        RegistryValue::String(s) => Value::from(s),
        v @ RegistryValue::ExpandString(_) => Value::from(v.to_string()),
        RegistryValue::MultiString(values) => {
            Value::from_array(values.into_iter().map(Value::from).collect())
        }
        RegistryValue::Binary(bytes) => {
            Value::from_array(bytes.into_iter().map(|b| Value::Int(b as i64)).collect())
        }
        RegistryValue::DWord(v) => Value::Int(v as i64),
        RegistryValue::QWord(v) => match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::from(v.to_string()),
        },
    }
}

/// Read `value_name` of `key` in `view`; `Null` when either is missing.
pub fn read_registry(
    registry: &dyn RegistryProvider,
    view: RegistryView,
    key: &str,
    value_name: &str,
) -> Result<Value> {
    Ok(match registry.get_value(view, key, value_name)? {
        Some(v) => registry_value_to_value(v),
        None => Value::Null,
    })
}

fn get_registry_value(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let key = ensure_string(ctx, args, 0)?;
    let value_name = ensure_nullable_string(ctx, args, 1)?
        .map(|v| v.to_string())
        .unwrap_or_default();
    read_registry(ctx.registry, RegistryView::Default, &key, &value_name)
}

/// The views are tried in order; the first value found wins, otherwise the
/// default value is returned.
fn get_registry_value_from_view(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let key = ensure_string(ctx, args, 0)?;
    let value_name = ensure_nullable_string(ctx, args, 1)?
        .map(|v| v.to_string())
        .unwrap_or_default();
    let mut views = vec![];
    for idx in 3..args.len() {
        match ensure_nullable_string(ctx, args, idx)? {
            Some(view) if !view.trim().is_empty() => views.push(RegistryView::parse(&view)?),
            _ => (),
        }
    }
    if views.is_empty() {
        views.push(RegistryView::Default);
    }
    for view in views {
        let value = read_registry(ctx.registry, view, &key, &value_name)?;
        if !value.is_null() {
            return Ok(value);
        }
    }
    Ok(args[2].clone())
}

fn does_task_host_exist(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let runtime = ensure_string(ctx, args, 0)?.to_ascii_lowercase();
    let architecture = ensure_string(ctx, args, 1)?.to_ascii_lowercase();
    let runtime_known = match runtime.as_str() {
        "clr4" | "currentruntime" | "net" | "*" | "" => true,
        "clr2" => false,
        _ => bail!("The runtime \"{runtime}\" is not a valid task host runtime."),
    };
    let architecture_known = match architecture.as_str() {
        "x86" | "x64" | "arm64" | "currentarchitecture" | "*" | "" => true,
        _ => bail!("The architecture \"{architecture}\" is not a valid task host architecture."),
    };
    Ok(Value::Bool(runtime_known && architecture_known))
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "osx",
        os => os,
    }
}

fn is_os_platform(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let platform = ensure_string(ctx, args, 0)?;
    Ok(Value::Bool(platform.trim().eq_ignore_ascii_case(os_name())))
}

fn is_os_unix_like(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(!cfg!(windows)))
}

fn base_dir(ctx: &CallContext) -> String {
    match ctx.base_dir {
        Some(dir) => dir.to_string(),
        None => utils::current_directory(),
    }
}

fn ensure_trailing_slash(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = ensure_string(ctx, args, 0)?;
    Ok(Value::from(utils::ensure_trailing_slash(&path)))
}

fn get_directory_name_of_file_above(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let start = ensure_string(ctx, args, 0)?;
    let file = ensure_string(ctx, args, 1)?;
    let start = utils::get_full_path(&start, ctx.base_dir)?;
    Ok(Value::from(utils::get_directory_name_of_file_above(&start, &file)?))
}

fn get_path_of_file_above(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let file = ensure_string(ctx, args, 0)?;
    if file.chars().any(utils::is_separator) {
        bail!("The parameter \"file\" can only be a file name and cannot include a directory.");
    }
    let start = match ensure_nullable_string(ctx, args, 1)? {
        Some(dir) if !dir.is_empty() => utils::get_full_path(&dir, ctx.base_dir)?,
        _ => base_dir(ctx),
    };
    let dir = utils::get_directory_name_of_file_above(&start, &file)?;
    Ok(Value::from(if dir.is_empty() {
        dir
    } else {
        utils::combine(&dir, &file)
    }))
}

fn make_relative(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let base = ensure_string(ctx, args, 0)?;
    let path = ensure_string(ctx, args, 1)?;
    let full_base = utils::get_full_path(&utils::ensure_trailing_slash(&base), ctx.base_dir)?;
    let full_path = utils::get_full_path(&path, Some(&full_base))?;
    Ok(Value::from(utils::make_relative(&full_base, &full_path)?))
}

fn combined_full_path(ctx: &CallContext, args: &[Value]) -> Result<String> {
    let mut combined = String::new();
    for idx in 0..args.len() {
        combined = utils::combine(&combined, &ensure_string(ctx, args, idx)?);
    }
    if combined.trim().is_empty() {
        bail!("The path is empty.");
    }
    utils::get_full_path(&combined, ctx.base_dir)
}

fn normalize_path(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(combined_full_path(ctx, args)?))
}

fn normalize_directory(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(utils::ensure_trailing_slash(&combined_full_path(ctx, args)?)))
}

/// Lenient version parsing: an optional leading `v`, one to four numeric
/// components and anything after `-` or `+` ignored. Missing components
/// are zero.
fn parse_lenient_version(s: &str) -> Option<[u32; 4]> {
    let s = s.trim();
    let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
    let s = s.split(['-', '+']).next().unwrap_or(s);
    let mut components = [0u32; 4];
    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    for (idx, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        components[idx] = part.parse().ok()?;
    }
    Some(components)
}

fn compare_versions(ctx: &CallContext, args: &[Value]) -> Result<Ordering> {
    let a = ensure_string(ctx, args, 0)?;
    let b = ensure_string(ctx, args, 1)?;
    match (parse_lenient_version(&a), parse_lenient_version(&b)) {
        (Some(x), Some(y)) => Ok(x.cmp(&y)),
        (None, _) => bail!("Version string \"{a}\" was not in a correct format."),
        (_, None) => bail!("Version string \"{b}\" was not in a correct format."),
    }
}

fn version_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? == Ordering::Equal))
}

fn version_not_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? != Ordering::Equal))
}

fn version_greater_than(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? == Ordering::Greater))
}

fn version_greater_than_or_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? != Ordering::Less))
}

fn version_less_than(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? == Ordering::Less))
}

fn version_less_than_or_equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(compare_versions(ctx, args)? != Ordering::Greater))
}

#[cfg(feature = "base64")]
fn convert_to_base64(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(data_encoding::BASE64.encode(s.as_bytes())))
}

#[cfg(feature = "base64")]
fn convert_from_base64(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    let decoded = data_encoding::BASE64.decode(s.trim().as_bytes())?;
    Ok(Value::from(String::from_utf8(decoded)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, NoRegistry};

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "MSBuild::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    #[test]
    fn arithmetic() -> Result<()> {
        assert_eq!(call(add, &["40".into(), "2".into()])?, Value::Int(42));
        assert_eq!(call(add, &["".into(), "2".into()])?, Value::Int(2));
        assert_eq!(call(subtract, &["1.5".into(), "1".into()])?, Value::Double(0.5));
        assert_eq!(call(divide, &["7".into(), "2".into()])?, Value::Int(3));
        assert!(call(divide, &["7".into(), "0".into()]).is_err());
        assert!(matches!(
            call(add, &["9223372036854775807".into(), "20".into()])?,
            Value::Double(_)
        ));
        assert_eq!(call(bitwise_or, &["1".into(), "6".into()])?, Value::Int(7));
        assert!(call(bitwise_and, &["1.5".into(), "1".into()]).is_err());
        Ok(())
    }

    #[test]
    fn versions() -> Result<()> {
        assert_eq!(call(version_equals, &["1.0".into(), "v1".into()])?, Value::Bool(true));
        assert_eq!(call(version_less_than, &["1.9".into(), "1.10-preview".into()])?, Value::Bool(true));
        assert!(call(version_equals, &["one".into(), "1".into()]).is_err());
        Ok(())
    }

    #[test]
    fn hashes_are_stable() {
        assert_eq!(stable_hash(""), stable_hash(""));
        assert_ne!(stable_hash("a"), stable_hash("b"));
        assert_eq!(stable_hash("abc"), stable_hash("abc"));
    }

    #[test]
    fn registry_reads() -> Result<()> {
        let registry = MemoryRegistry::new();
        registry.set_value(r"HKLM\Software\X", "Names", RegistryValue::MultiString(vec!["a".into(), "b".into()]))?;
        registry.set_value_in_view(RegistryView::Registry64, r"HKLM\Software\X", "Bits", RegistryValue::DWord(64))?;
        let ctx = CallContext {
            function: "MSBuild::GetRegistryValueFromView",
            registry: &registry,
            base_dir: None,
        };
        let names = get_registry_value(&ctx, &[r"HKLM\Software\X".into(), "Names".into()])?;
        assert_eq!(names.to_escaped_string(), "a;b");
        let bits = get_registry_value_from_view(
            &ctx,
            &[
                r"HKLM\Software\X".into(),
                "Bits".into(),
                "none".into(),
                "RegistryView.Registry32".into(),
                "RegistryView.Registry64".into(),
            ],
        )?;
        assert_eq!(bits, Value::Int(64));
        let missing = get_registry_value_from_view(
            &ctx,
            &[r"HKLM\Software\Y".into(), "".into(), "fallback".into()],
        )?;
        assert_eq!(missing, Value::from("fallback"));
        Ok(())
    }

    #[cfg(feature = "base64")]
    #[test]
    fn base64() -> Result<()> {
        let encoded = call(convert_to_base64, &["hello".into()])?;
        assert_eq!(encoded, Value::from("aGVsbG8="));
        assert_eq!(call(convert_from_base64, &[encoded])?, Value::from("hello"));
        Ok(())
    }
}
