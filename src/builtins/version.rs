// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_i32, ensure_index, ensure_string, ensure_version, optional};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::value::{Value, Version};

use anyhow::{bail, Result};

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.version::new", Builtin(new, 1, 4));
    m.insert("system.version::parse", Builtin(parse, 1, 1));
}

pub fn register_instance(m: &mut BuiltinTable) {
    m.insert("system.version::build", Builtin(build, 0, 0));
    m.insert("system.version::compareto", Builtin(compare_to, 1, 1));
    m.insert("system.version::equals", Builtin(equals, 1, 1));
    m.insert("system.version::major", Builtin(major, 0, 0));
    m.insert("system.version::minor", Builtin(minor, 0, 0));
    m.insert("system.version::revision", Builtin(revision, 0, 0));
    m.insert("system.version::tostring", Builtin(to_string, 0, 1));
}

fn parse(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let s = ensure_string(ctx, args, 0)?;
    Ok(Value::Version(s.parse()?))
}

/// `new Version("1.2.3")` or `new Version(major, minor[, build[, revision]])`.
fn new(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    if args.len() == 1 {
        return parse(ctx, args);
    }
    let mut components = [-1; 4];
    for (idx, c) in components.iter_mut().enumerate().take(args.len()) {
        *c = ensure_i32(ctx, args, idx)?;
        if *c < 0 {
            bail!("Version's parameters must be greater than or equal to zero.");
        }
    }
    Ok(Value::Version(Version::new(
        components[0],
        components[1],
        components[2],
        components[3],
    )?))
}

fn major(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_version(ctx, args, 0)?.major as i64))
}

fn minor(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_version(ctx, args, 0)?.minor as i64))
}

fn build(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_version(ctx, args, 0)?.build as i64))
}

fn revision(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(ensure_version(ctx, args, 0)?.revision as i64))
}

fn compare_to(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_version(ctx, args, 0)?;
    // Every version is greater than null.
    if args[1].is_null() {
        return Ok(Value::Int(1));
    }
    let b = ensure_version(ctx, args, 1)?;
    Ok(Value::Int(a.cmp(&b) as i64))
}

fn equals(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let a = ensure_version(ctx, args, 0)?;
    Ok(Value::Bool(ensure_version(ctx, args, 1).is_ok_and(|b| a == b)))
}

fn to_string(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let v = ensure_version(ctx, args, 0)?;
    Ok(Value::from(match optional(args, 1) {
        Some(_) => v.to_string_with_fields(ensure_index(ctx, args, 1)?.max(0) as usize)?,
        None => v.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call(f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.Version::Test",
            registry: &NoRegistry,
            base_dir: None,
        };
        f(&ctx, args)
    }

    #[test]
    fn construction() -> Result<()> {
        assert_eq!(call(new, &["1".into(), "2".into(), "3".into()])?.to_string(), "1.2.3");
        assert_eq!(call(new, &["4.5".into()])?.to_string(), "4.5");
        assert!(call(new, &["1".into(), "-2".into()]).is_err());
        assert!(call(parse, &["abc".into()]).is_err());
        Ok(())
    }

    #[test]
    fn members() -> Result<()> {
        let v = call(parse, &["1.2.3".into()])?;
        assert_eq!(call(build, &[v.clone()])?, Value::Int(3));
        assert_eq!(call(revision, &[v.clone()])?, Value::Int(-1));
        assert_eq!(call(compare_to, &[v.clone(), "1.10".into()])?, Value::Int(-1));
        assert_eq!(call(compare_to, &[v.clone(), Value::Null])?, Value::Int(1));
        assert_eq!(call(to_string, &[v, Value::Int(2)])?, Value::from("1.2"));
        Ok(())
    }
}
