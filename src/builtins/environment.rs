// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_nullable_string, ensure_string};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::registry::expand_environment_variables;
use crate::value::Value;

use anyhow::{bail, Result};
use uuid::Uuid;

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.environment::expandenvironmentvariables", Builtin(expand_variables, 1, 1));
    m.insert("system.environment::getenvironmentvariable", Builtin(get_variable, 1, 1));
    m.insert("system.environment::is64bitoperatingsystem", Builtin(is_64bit, 0, 0));
    m.insert("system.environment::is64bitprocess", Builtin(is_64bit, 0, 0));
    m.insert("system.environment::machinename", Builtin(machine_name, 0, 0));
    m.insert("system.environment::newline", Builtin(new_line, 0, 0));
    m.insert("system.environment::processorcount", Builtin(processor_count, 0, 0));
    m.insert("system.environment::username", Builtin(user_name, 0, 0));

    m.insert("system.guid::newguid", Builtin(new_guid, 0, 0));
}

/// Members that read or change process wide state.
pub fn register_extended(m: &mut BuiltinTable) {
    m.insert("system.environment::currentdirectory", Builtin(current_directory, 0, 0));
    m.insert("system.environment::setenvironmentvariable", Builtin(set_variable, 2, 2));
}

fn expand_variables(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::from(expand_environment_variables(&s)))
}

/// Missing variables yield no object.
fn get_variable(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let name = ensure_string(ctx, args, 0)?;
    Ok(match std::env::var(name.as_ref()) {
        Ok(v) => Value::from(v),
        Err(_) => Value::Null,
    })
}

fn is_64bit(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(cfg!(target_pointer_width = "64")))
}

fn machine_name(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    let name = std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::fs::read_to_string("/etc/hostname").map(|h| h.trim().to_string()))
        .unwrap_or_else(|_| "localhost".to_string());
    Ok(Value::from(name))
}

fn new_line(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(if cfg!(windows) { "\r\n" } else { "\n" }))
}

fn processor_count(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    let count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Ok(Value::Int(count as i64))
}

fn user_name(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    let name = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_default();
    Ok(Value::from(name))
}

fn new_guid(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(Uuid::new_v4().hyphenated().to_string()))
}

fn current_directory(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(crate::utils::current_directory()))
}

fn set_variable(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let name = ensure_string(ctx, args, 0)?;
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        bail!("Environment variable name cannot contain equal character. (Parameter 'variable')");
    }
    match ensure_nullable_string(ctx, args, 1)? {
        Some(v) if !v.is_empty() => std::env::set_var(name.as_ref(), v.as_ref()),
        _ => std::env::remove_var(name.as_ref()),
    }
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.Environment::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    #[test]
    fn guids_are_unique() -> Result<()> {
        let a = call(new_guid, &[])?.to_string();
        let b = call(new_guid, &[])?.to_string();
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
        Ok(())
    }

    #[test]
    fn variables() -> Result<()> {
        assert!(call(get_variable, &["MSBUILD_EXPANDER_SURELY_UNSET".into()])?.is_null());
        assert!(call(processor_count, &[])?.to_string().parse::<i64>()? >= 1);
        Ok(())
    }
}
