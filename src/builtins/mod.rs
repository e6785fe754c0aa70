// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registration tables of the property functions and their resolution.
//!
//! Every callable member is an explicit entry keyed by
//! `lowercase.type.name::member`. The default tables form the allow-list;
//! the extended table only becomes reachable when all property functions
//! are enabled.

pub mod environment;
pub mod intrinsics;
pub mod paths;
#[cfg(feature = "regex")]
pub mod regex;
pub mod strings;
pub mod time;
pub mod types;
pub mod utils;
pub mod version;

use crate::registry::RegistryProvider;
use crate::value::Value;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use dashmap::DashMap;
use lazy_static::lazy_static;

/// Environment variable that widens the set of callable functions.
pub const ENABLE_ALL_FUNCTIONS_ENV: &str = "MSBUILDENABLEALLPROPERTYFUNCTIONS";

/// Name of the intrinsic function pseudo-type.
pub const INTRINSIC_TYPE: &str = "msbuild";

/// Ambient state a function may consult.
pub struct CallContext<'a> {
    /// `Type::Member` as written, for diagnostics.
    pub function: &'a str,
    pub registry: &'a dyn RegistryProvider,
    /// Directory relative paths are resolved against.
    pub base_dir: Option<&'a str>,
}

/// Instance members receive the receiver as `args[0]`.
pub type BuiltinFcn = fn(&CallContext, &[Value]) -> Result<Value>;

/// A function with its accepted argument count range (receiver excluded).
#[derive(Clone, Copy)]
pub struct Builtin(pub BuiltinFcn, pub u8, pub u8);

impl Builtin {
    pub fn accepts(&self, argc: usize) -> bool {
        self.1 as usize <= argc && argc <= self.2 as usize
    }
}

pub type BuiltinTable = HashMap<&'static str, Builtin>;

/// Types that exist but expose nothing as a property function.
const RESTRICTED_TYPES: [&str; 8] = [
    "system.activator",
    "system.appdomain",
    "system.diagnostics.process",
    "system.io.filestream",
    "system.net.webclient",
    "system.reflection.assembly",
    "system.threading.thread",
    "system.type",
];

#[rustfmt::skip]
lazy_static! {
    pub static ref STATIC_BUILTINS: BuiltinTable = {
	let mut m: BuiltinTable = HashMap::new();

	strings::register(&mut m);
	paths::register(&mut m);
	types::register(&mut m);
	version::register(&mut m);
	time::register(&mut m);
	environment::register(&mut m);
	intrinsics::register(&mut m);
	#[cfg(feature = "regex")]
	regex::register(&mut m);

	m
    };

    pub static ref INSTANCE_BUILTINS: BuiltinTable = {
	let mut m: BuiltinTable = HashMap::new();

	strings::register_instance(&mut m);
	types::register_instance(&mut m);
	version::register_instance(&mut m);
	time::register_instance(&mut m);

	m
    };

    pub static ref EXTENDED_BUILTINS: BuiltinTable = {
	let mut m: BuiltinTable = HashMap::new();

	paths::register_extended(&mut m);
	environment::register_extended(&mut m);

	m
    };

    static ref KNOWN_TYPES: HashSet<&'static str> = STATIC_BUILTINS
	.keys()
	.chain(EXTENDED_BUILTINS.keys())
	.filter_map(|k| {
	    let k: &'static str = *k;
	    k.split_once("::").map(|(t, _)| t)
	})
	.chain(RESTRICTED_TYPES)
	.collect();

    static ref RESOLVED: DashMap<CacheKey, Builtin> = DashMap::new();
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    instance: bool,
    type_name: String,
    member: String,
    argc: usize,
    widened: bool,
}

/// Forget every cached resolution.
///
/// Resolutions never go stale at runtime; this exists for tests that
/// toggle the set of enabled functions.
pub fn reset_function_cache() {
    RESOLVED.clear();
}

/// Whether the extended table is reachable. An explicit setting wins over
/// the environment variable, which is read on every call.
pub fn all_functions_enabled(setting: Option<bool>) -> bool {
    match setting {
        Some(enabled) => enabled,
        None => std::env::var(ENABLE_ALL_FUNCTIONS_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    }
}

/// Canonical table spelling of a static type name.
pub fn normalize_type_name(type_name: &str) -> String {
    let name = type_name.trim().to_ascii_lowercase();
    match name.as_str() {
        INTRINSIC_TYPE | "microsoft.build.evaluation.intrinsicfunctions" => {
            INTRINSIC_TYPE.to_string()
        }
        n if !n.contains('.') => format!("system.{n}"),
        _ => name,
    }
}

/// `get_Length` is `Length`.
pub fn normalize_member_name(member: &str) -> String {
    let member = member.to_ascii_lowercase();
    match member.strip_prefix("get_") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => member,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("The type \"{0}\" could not be found.")]
    TypeNotFound(String),
    #[error("The function \"{member}\" on type \"{type_name}\" is not available for execution as an MSBuild property function.")]
    Unavailable { type_name: String, member: String },
    #[error("Method '{type_name}.{member}' with {argc} argument(s) was not found.")]
    NotFound {
        type_name: String,
        member: String,
        argc: usize,
    },
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        use crate::error::codes;
        match self {
            ResolveError::TypeNotFound(_) => codes::TYPE_NOT_FOUND,
            ResolveError::Unavailable { .. } => codes::FUNCTION_UNAVAILABLE,
            ResolveError::NotFound { .. } => codes::INVALID_PROPERTY_FUNCTION,
        }
    }
}

/// Resolve a static member of `type_name`, or an instance member when
/// `receiver` is given (its runtime type then replaces `type_name`).
pub fn resolve(
    type_name: &str,
    receiver: Option<&Value>,
    member: &str,
    argc: usize,
    widened: bool,
) -> core::result::Result<Builtin, ResolveError> {
    let instance = receiver.is_some();
    let type_key = match receiver {
        Some(v) => v.type_name().to_ascii_lowercase(),
        None => normalize_type_name(type_name),
    };
    let member_key = normalize_member_name(member);
    let cache_key = CacheKey {
        instance,
        type_name: type_key,
        member: member_key,
        argc,
        widened,
    };
    if let Some(builtin) = RESOLVED.get(&cache_key) {
        return Ok(*builtin);
    }

    let key = format!("{}::{}", cache_key.type_name, cache_key.member);
    let found = if instance {
        INSTANCE_BUILTINS.get(key.as_str())
    } else {
        STATIC_BUILTINS
            .get(key.as_str())
            .or_else(|| widened.then(|| EXTENDED_BUILTINS.get(key.as_str())).flatten())
    };

    let display_type = match receiver {
        Some(v) => v.type_name().to_string(),
        None => type_name.trim().to_string(),
    };
    match found {
        Some(builtin) if builtin.accepts(argc) => {
            log::debug!("resolved {key}/{argc} (widened: {widened})");
            RESOLVED.insert(cache_key, *builtin);
            Ok(*builtin)
        }
        Some(_) => Err(ResolveError::NotFound {
            type_name: display_type,
            member: member.to_string(),
            argc,
        }),
        None if !instance && !KNOWN_TYPES.contains(cache_key.type_name.as_str()) => {
            Err(ResolveError::TypeNotFound(display_type))
        }
        None if !instance
            && (EXTENDED_BUILTINS.contains_key(key.as_str())
                || RESTRICTED_TYPES.contains(&cache_key.type_name.as_str())) =>
        {
            Err(ResolveError::Unavailable {
                type_name: display_type,
                member: member.to_string(),
            })
        }
        None => Err(ResolveError::NotFound {
            type_name: display_type,
            member: member.to_string(),
            argc,
        }),
    }
}

/// `[MSBuild]::Escape` and `[MSBuild]::Unescape` produce text that must
/// not be escaped again.
pub fn returns_raw_text(type_name: &str, member: &str) -> bool {
    normalize_type_name(type_name) == INTRINSIC_TYPE
        && matches!(normalize_member_name(member).as_str(), "escape" | "unescape")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_normalized() {
        assert_eq!(normalize_type_name("String"), "system.string");
        assert_eq!(normalize_type_name(" System.IO.Path "), "system.io.path");
        assert_eq!(normalize_type_name("MSBuild"), "msbuild");
        assert_eq!(
            normalize_type_name("Microsoft.Build.Evaluation.IntrinsicFunctions"),
            "msbuild"
        );
        assert_eq!(normalize_member_name("get_Length"), "length");
    }

    #[test]
    fn resolution_errors() {
        let err = |t, m, argc, widened| resolve(t, None, m, argc, widened).err().map(|e| e.code());
        assert_eq!(err("MSBuild", "Add", 2, false), None);
        assert_eq!(err("No.Such.Type", "Foo", 0, false), Some("MSB4212"));
        assert_eq!(err("System.Diagnostics.Process", "Start", 1, true), Some("MSB4185"));
        assert_eq!(err("System.IO.Directory", "Exists", 1, false), Some("MSB4185"));
        assert_eq!(err("System.IO.Directory", "Exists", 1, true), None);
        assert_eq!(err("MSBuild", "NoSuchFunction", 1, false), Some("MSB4184"));
        assert_eq!(err("MSBuild", "Add", 3, false), Some("MSB4184"));
    }

    #[test]
    fn instance_members_use_runtime_type() {
        let s = Value::from("abc");
        assert!(resolve("", Some(&s), "Substring", 1, false).is_ok());
        assert!(resolve("", Some(&s), "get_Length", 0, false).is_ok());
        assert!(resolve("", Some(&s), "Foo", 0, false).is_err());
        assert!(resolve("", Some(&Value::Int(1)), "ToString", 1, false).is_ok());
    }
}
