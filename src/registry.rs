// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read access to a hierarchical key/value store addressed by
//! `HIVE\path\to\key` and a value name.

use crate::escaping::escape;

use core::fmt;

use anyhow::{bail, Result};
use dashmap::DashMap;
use serde::Deserialize;

/// Which registry view a lookup is made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum RegistryView {
    #[default]
    Default,
    Registry32,
    Registry64,
}

impl RegistryView {
    pub fn parse(s: &str) -> Result<RegistryView> {
        let name = s.trim();
        let name = name
            .rsplit_once('.')
            .map(|(prefix, n)| {
                if prefix.eq_ignore_ascii_case("RegistryView")
                    || prefix.eq_ignore_ascii_case("Microsoft.Win32.RegistryView")
                {
                    n
                } else {
                    name
                }
            })
            .unwrap_or(name);
        Ok(match name.to_ascii_lowercase().as_str() {
            "default" => RegistryView::Default,
            "registry32" => RegistryView::Registry32,
            "registry64" => RegistryView::Registry64,
            _ => bail!("Requested value '{s}' was not found in RegistryView."),
        })
    }
}

/// A typed registry value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum RegistryValue {
    String(String),
    /// A string with `%NAME%` environment references.
    ExpandString(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
    DWord(u32),
    QWord(u64),
}

impl RegistryValue {
    /// Escaped text form. Multi-string entries become separate list
    /// entries.
    pub fn to_escaped_string(&self) -> String {
        match self {
            RegistryValue::MultiString(values) => values
                .iter()
                .map(|v| escape(v).into_owned())
                .collect::<Vec<_>>()
                .join(";"),
            _ => escape(&self.to_string()).into_owned(),
        }
    }
}

/// Replace `%NAME%` with the value of the environment variable. Unknown
/// names are kept as written.
pub fn expand_environment_variables(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                out.push_str(&rest[..start]);
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..=start]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryValue::String(s) => f.write_str(s),
            RegistryValue::ExpandString(s) => f.write_str(&expand_environment_variables(s)),
            RegistryValue::MultiString(values) => f.write_str(&values.join(";")),
            RegistryValue::Binary(bytes) => f.write_str(
                &bytes
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            RegistryValue::DWord(v) => write!(f, "{v}"),
            RegistryValue::QWord(v) => write!(f, "{v}"),
        }
    }
}

const HIVES: [(&str, &str); 6] = [
    ("HKEY_LOCAL_MACHINE", "HKLM"),
    ("HKEY_CURRENT_USER", "HKCU"),
    ("HKEY_CLASSES_ROOT", "HKCR"),
    ("HKEY_USERS", "HKU"),
    ("HKEY_CURRENT_CONFIG", "HKCC"),
    ("HKEY_PERFORMANCE_DATA", "HKPD"),
];

/// Canonical lowercase form of a key path: the hive spelled out in full,
/// `/` accepted as a separator, no trailing separator.
pub fn normalize_key(key: &str) -> Result<String> {
    let key = key.trim().replace('/', "\\");
    let (hive, path) = key.split_once('\\').unwrap_or((key.as_str(), ""));
    let hive = match HIVES
        .iter()
        .find(|(long, short)| hive.eq_ignore_ascii_case(long) || hive.eq_ignore_ascii_case(short))
    {
        Some((long, _)) => *long,
        None => bail!("The registry key \"{key}\" does not start with a valid hive name."),
    };
    let path = path.trim_matches('\\');
    Ok(if path.is_empty() {
        hive.to_ascii_lowercase()
    } else {
        format!("{hive}\\{path}").to_ascii_lowercase()
    })
}

/// Split `Key@ValueName` at the first `@`.
pub fn split_key_and_value(spec: &str) -> (&str, &str) {
    spec.split_once('@').unwrap_or((spec, ""))
}

/// A registry the expander reads from.
///
/// `key` is a full path starting with the hive name; an empty `value_name`
/// designates the key's default value.
pub trait RegistryProvider {
    fn get_value(&self, view: RegistryView, key: &str, value_name: &str) -> Result<Option<RegistryValue>>;
}

/// Registry with no keys. Every lookup yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistry;

impl RegistryProvider for NoRegistry {
    fn get_value(&self, _view: RegistryView, key: &str, _value_name: &str) -> Result<Option<RegistryValue>> {
        normalize_key(key)?;
        Ok(None)
    }
}

/// Thread-safe in-memory registry.
///
/// Values stored under [`RegistryView::Default`] are visible from every
/// view unless the view defines its own.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: DashMap<(RegistryView, String), DashMap<String, RegistryValue>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, key: &str, value_name: &str, value: RegistryValue) -> Result<()> {
        self.set_value_in_view(RegistryView::Default, key, value_name, value)
    }

    pub fn set_value_in_view(
        &self,
        view: RegistryView,
        key: &str,
        value_name: &str,
        value: RegistryValue,
    ) -> Result<()> {
        let key = normalize_key(key)?;
        self.inner
            .entry((view, key))
            .or_default()
            .insert(value_name.to_ascii_lowercase(), value);
        Ok(())
    }

    /// Remove a key and all its values. Returns whether it existed.
    pub fn remove_key(&self, view: RegistryView, key: &str) -> Result<bool> {
        Ok(self.inner.remove(&(view, normalize_key(key)?)).is_some())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    fn lookup(&self, view: RegistryView, key: &str, value_name: &str) -> Option<RegistryValue> {
        self.inner
            .get(&(view, key.to_string()))
            .and_then(|values| values.get(&value_name.to_ascii_lowercase()).map(|v| v.value().clone()))
    }
}

impl RegistryProvider for MemoryRegistry {
    fn get_value(&self, view: RegistryView, key: &str, value_name: &str) -> Result<Option<RegistryValue>> {
        let key = normalize_key(key)?;
        Ok(match self.lookup(view, &key, value_name) {
            Some(v) => Some(v),
            None if view != RegistryView::Default => {
                self.lookup(RegistryView::Default, &key, value_name)
            }
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized() -> Result<()> {
        assert_eq!(
            normalize_key(r"HKLM\Software\Foo\")?,
            r"hkey_local_machine\software\foo"
        );
        assert_eq!(normalize_key("hkey_current_user/A")?, r"hkey_current_user\a");
        assert!(normalize_key(r"NOPE\Software").is_err());
        Ok(())
    }

    #[test]
    fn memory_registry_views() -> Result<()> {
        let registry = MemoryRegistry::new();
        registry.set_value(r"HKEY_LOCAL_MACHINE\Software\Vendor", "Path", RegistryValue::String("c:\\x".into()))?;
        registry.set_value_in_view(
            RegistryView::Registry32,
            r"HKLM\Software\Vendor",
            "Path",
            RegistryValue::String("c:\\x86".into()),
        )?;

        let get = |view| registry.get_value(view, r"hklm\software\vendor", "path");
        assert_eq!(get(RegistryView::Default)?, Some(RegistryValue::String("c:\\x".into())));
        assert_eq!(get(RegistryView::Registry32)?, Some(RegistryValue::String("c:\\x86".into())));
        assert_eq!(get(RegistryView::Registry64)?, Some(RegistryValue::String("c:\\x".into())));
        assert_eq!(registry.get_value(RegistryView::Default, r"HKLM\Other", "")?, None);
        Ok(())
    }

    #[test]
    fn value_rendering() {
        assert_eq!(RegistryValue::DWord(42).to_string(), "42");
        assert_eq!(RegistryValue::Binary(vec![1, 2, 255]).to_string(), "1;2;255");
        assert_eq!(
            RegistryValue::MultiString(vec!["a;b".into(), "c".into()]).to_escaped_string(),
            "a%3bb;c"
        );
        assert_eq!(expand_environment_variables("%%a%"), "%%a%");
        assert_eq!(
            RegistryView::parse("RegistryView.Registry64").ok(),
            Some(RegistryView::Registry64)
        );
    }

    #[test]
    fn key_and_value_split() {
        assert_eq!(split_key_and_value(r"HKLM\A@B@C"), (r"HKLM\A", "B@C"));
        assert_eq!(split_key_and_value(r"HKLM\A"), (r"HKLM\A", ""));
    }
}
