// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_enum_flags, ensure_nullable_string, ensure_string, optional};
use crate::builtins::{Builtin, BuiltinTable, CallContext};
use crate::utils::{self, FileTime};
use crate::value::Value;

use std::path::Path;

use anyhow::{bail, Result};
use chrono::NaiveDate;

pub fn register(m: &mut BuiltinTable) {
    m.insert("system.io.path::altdirectoryseparatorchar", Builtin(alt_directory_separator_char, 0, 0));
    m.insert("system.io.path::changeextension", Builtin(change_extension, 2, 2));
    m.insert("system.io.path::combine", Builtin(combine, 1, 16));
    m.insert("system.io.path::directoryseparatorchar", Builtin(directory_separator_char, 0, 0));
    m.insert("system.io.path::getdirectoryname", Builtin(get_directory_name, 1, 1));
    m.insert("system.io.path::getextension", Builtin(get_extension, 1, 1));
    m.insert("system.io.path::getfilename", Builtin(get_file_name, 1, 1));
    m.insert("system.io.path::getfilenamewithoutextension", Builtin(get_file_name_without_extension, 1, 1));
    m.insert("system.io.path::getfullpath", Builtin(get_full_path, 1, 1));
    m.insert("system.io.path::getpathroot", Builtin(get_path_root, 1, 1));
    m.insert("system.io.path::gettemppath", Builtin(get_temp_path, 0, 0));
    m.insert("system.io.path::hasextension", Builtin(has_extension, 1, 1));
    m.insert("system.io.path::ispathrooted", Builtin(is_path_rooted, 1, 1));
    m.insert("system.io.path::pathseparator", Builtin(path_separator, 0, 0));

    m.insert("system.io.file::exists", Builtin(file_exists, 1, 1));
    m.insert("system.io.file::getcreationtime", Builtin(get_creation_time, 1, 1));
    m.insert("system.io.file::getlastaccesstime", Builtin(get_last_access_time, 1, 1));
    m.insert("system.io.file::getlastwritetime", Builtin(get_last_write_time, 1, 1));
    m.insert("system.io.file::readalltext", Builtin(read_all_text, 1, 1));

    m.insert("system.io.directory::getdirectories", Builtin(get_directories, 1, 3));
    m.insert("system.io.directory::getfiles", Builtin(get_files, 1, 3));
    m.insert("system.io.directory::getlastaccesstime", Builtin(get_last_access_time, 1, 1));
    m.insert("system.io.directory::getlastwritetime", Builtin(get_last_write_time, 1, 1));
    m.insert("system.io.directory::getparent", Builtin(get_parent, 1, 1));
}

/// Members that touch the file system beyond reading metadata.
pub fn register_extended(m: &mut BuiltinTable) {
    m.insert("system.io.directory::exists", Builtin(directory_exists, 1, 1));
    m.insert("system.io.file::readalllines", Builtin(read_all_lines, 1, 1));
    m.insert("system.io.file::writealltext", Builtin(write_all_text, 2, 2));
}

/// Resolve a path argument against the directory of the project.
fn resolve(ctx: &CallContext, path: &str) -> Result<String> {
    utils::validate_path(path)?;
    let fixed = utils::fix_file_path(path);
    Ok(match ctx.base_dir {
        Some(base) if !utils::is_path_rooted(&fixed) => utils::combine(base, &fixed),
        _ => fixed.into_owned(),
    })
}

fn path_arg(ctx: &CallContext, args: &[Value], idx: usize) -> Result<String> {
    let path = ensure_string(ctx, args, idx)?;
    utils::validate_path(&path)?;
    Ok(path.to_string())
}

fn alt_directory_separator_char(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Char(utils::ALT_DIRECTORY_SEPARATOR))
}

fn directory_separator_char(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Char(utils::DIRECTORY_SEPARATOR))
}

fn path_separator(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    Ok(Value::Char(utils::PATH_SEPARATOR))
}

fn change_extension(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = path_arg(ctx, args, 0)?;
    if path.is_empty() {
        return Ok(Value::from(""));
    }
    let extension = ensure_nullable_string(ctx, args, 1)?;
    Ok(Value::from(utils::change_extension(&path, extension.as_deref())))
}

fn combine(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for idx in 0..args.len() {
        if args[idx].is_null() {
            bail!("Value cannot be null. (Parameter 'paths')");
        }
        out = utils::combine(&out, &path_arg(ctx, args, idx)?);
    }
    Ok(Value::from(out))
}

fn get_directory_name(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = path_arg(ctx, args, 0)?;
    Ok(match utils::get_directory_name(&path) {
        Some(dir) => Value::from(dir),
        None => Value::Null,
    })
}

fn get_extension(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(utils::get_extension(&path_arg(ctx, args, 0)?)))
}

fn get_file_name(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(utils::get_file_name(&path_arg(ctx, args, 0)?)))
}

fn get_file_name_without_extension(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(utils::get_file_name_without_extension(&path_arg(ctx, args, 0)?)))
}

fn get_full_path(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = path_arg(ctx, args, 0)?;
    if path.trim().is_empty() {
        bail!("The path is empty. (Parameter 'path')");
    }
    Ok(Value::from(utils::get_full_path(&path, ctx.base_dir)?))
}

fn get_path_root(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::from(utils::get_path_root(&path_arg(ctx, args, 0)?)))
}

fn get_temp_path(_ctx: &CallContext, _args: &[Value]) -> Result<Value> {
    let temp = std::env::temp_dir().to_string_lossy().into_owned();
    Ok(Value::from(utils::ensure_trailing_slash(&temp)))
}

fn has_extension(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(utils::has_extension(&path_arg(ctx, args, 0)?)))
}

fn is_path_rooted(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(utils::is_path_rooted(&path_arg(ctx, args, 0)?)))
}

fn file_exists(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = ensure_string(ctx, args, 0)?;
    // Invalid paths simply do not exist.
    Ok(Value::Bool(match resolve(ctx, &path) {
        Ok(p) => Path::new(&p).is_file(),
        Err(_) => false,
    }))
}

fn directory_exists(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = ensure_string(ctx, args, 0)?;
    Ok(Value::Bool(match resolve(ctx, &path) {
        Ok(p) => Path::new(&p).is_dir(),
        Err(_) => false,
    }))
}

/// Time reported for files that do not exist: midnight, January 1, 1601.
fn missing_file_time() -> Value {
    match NaiveDate::from_ymd_opt(1601, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(dt) => Value::DateTime(dt),
        None => Value::Null,
    }
}

fn file_time(ctx: &CallContext, args: &[Value], kind: FileTime) -> Result<Value> {
    let path = resolve(ctx, &ensure_string(ctx, args, 0)?)?;
    Ok(match utils::file_time(&path, kind) {
        Some(dt) => Value::DateTime(dt),
        None => missing_file_time(),
    })
}

fn get_creation_time(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    file_time(ctx, args, FileTime::Created)
}

fn get_last_access_time(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    file_time(ctx, args, FileTime::Accessed)
}

fn get_last_write_time(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    file_time(ctx, args, FileTime::Modified)
}

fn read_all_text(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = resolve(ctx, &ensure_string(ctx, args, 0)?)?;
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Value::from(text)),
        Err(e) => bail!("Could not read file '{path}': {e}"),
    }
}

fn read_all_lines(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let text = read_all_text(ctx, args)?.to_string();
    Ok(Value::from_array(text.lines().map(Value::from).collect()))
}

fn write_all_text(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = resolve(ctx, &ensure_string(ctx, args, 0)?)?;
    let contents = ensure_string(ctx, args, 1)?;
    if let Err(e) = std::fs::write(&path, contents.as_bytes()) {
        bail!("Could not write file '{path}': {e}");
    }
    Ok(Value::Null)
}

fn get_parent(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    let path = ensure_string(ctx, args, 0)?;
    if path.trim().is_empty() {
        bail!("The path is empty. (Parameter 'path')");
    }
    let full = utils::get_full_path(&path, ctx.base_dir)?;
    let trimmed = if full.len() > utils::root_length(&full) {
        full.trim_end_matches(utils::is_separator)
    } else {
        full.as_str()
    };
    Ok(match utils::get_directory_name(trimmed) {
        Some(dir) => Value::from(dir),
        None => Value::Null,
    })
}

const SEARCH_OPTION: [(&str, u32); 2] = [("TopDirectoryOnly", 0), ("AllDirectories", 1)];

/// Matcher for a `*`/`?` search pattern applied to entry names.
#[cfg(feature = "glob")]
fn search_matcher(pattern: &str) -> Result<Box<dyn Fn(&str) -> bool>> {
    let glob = match globset::GlobBuilder::new(pattern)
        .case_insensitive(cfg!(windows))
        .literal_separator(true)
        .build()
    {
        Ok(g) => g.compile_matcher(),
        Err(e) => bail!("Invalid search pattern '{pattern}': {e}"),
    };
    Ok(Box::new(move |name: &str| glob.is_match(name)))
}

#[cfg(not(feature = "glob"))]
fn search_matcher(pattern: &str) -> Result<Box<dyn Fn(&str) -> bool>> {
    match pattern {
        "*" | "*.*" => Ok(Box::new(|_: &str| true)),
        _ => bail!("Search patterns other than '*' require the `glob` feature."),
    }
}

/// Entries of `dir` whose names match the optional pattern, in sorted
/// order. Returned paths start with `dir` as written.
fn list_entries(ctx: &CallContext, args: &[Value], want_dirs: bool) -> Result<Value> {
    let dir = ensure_string(ctx, args, 0)?;
    let pattern = match optional(args, 1) {
        Some(_) => ensure_string(ctx, args, 1)?.to_string(),
        None => "*".to_string(),
    };
    let recursive = match optional(args, 2) {
        Some(_) => ensure_enum_flags(ctx, args, 2, "SearchOption", &SEARCH_OPTION)? == 1,
        None => false,
    };
    let matcher = search_matcher(&pattern)?;
    let root = resolve(ctx, &dir)?;
    if !Path::new(&root).is_dir() {
        bail!("Could not find a part of the path '{root}'.");
    }

    let mut found = vec![];
    let mut pending = vec![(root, dir.to_string())];
    while let Some((physical, shown)) = pending.pop() {
        let entries = match std::fs::read_dir(&physical) {
            Ok(entries) => entries,
            Err(e) => bail!("Could not list '{physical}': {e}"),
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let shown_path = utils::combine(&shown, &name);
            if is_dir && recursive {
                pending.push((utils::combine(&physical, &name), shown_path.clone()));
            }
            if is_dir == want_dirs && matcher(&name) {
                found.push(shown_path);
            }
        }
    }
    found.sort();
    Ok(Value::from_array(found.into_iter().map(Value::from).collect()))
}

fn get_files(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    list_entries(ctx, args, false)
}

fn get_directories(ctx: &CallContext, args: &[Value]) -> Result<Value> {
    list_entries(ctx, args, true)
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use crate::registry::NoRegistry;

    fn call_in(base: Option<&str>, f: crate::builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        let ctx = CallContext {
            function: "System.IO.Path::Test",
            registry: &NoRegistry,
            base_dir: base,
        };
        f(&ctx, args)
    }

    #[test]
    fn path_members() -> Result<()> {
        let call = |f: crate::builtins::BuiltinFcn, args: &[Value]| {
            call_in(None, f, args).map(|v| v.to_string())
        };
        assert_eq!(call(combine, &["a".into(), "b".into(), "c.txt".into()])?, "a/b/c.txt");
        assert_eq!(call(combine, &["a".into(), "/abs".into()])?, "/abs");
        assert_eq!(call(get_file_name, &["dir/file.ext".into()])?, "file.ext");
        assert_eq!(call(change_extension, &["dir/file.ext".into(), "obj".into()])?, "dir/file.obj");
        assert_eq!(call(change_extension, &["file.ext".into(), Value::Null])?, "file");
        assert!(call_in(None, get_directory_name, &["/".into()])?.is_null());
        assert!(call(get_file_name, &["a\0b".into()]).is_err());
        Ok(())
    }

    #[test]
    fn directory_listing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.txt"), "x")?;
        std::fs::write(dir.path().join("b.cs"), "y")?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub").join("c.txt"), "z")?;
        let base = dir.path().to_string_lossy().into_owned();

        let files = call_in(Some(&base), get_files, &[".".into()])?;
        assert_eq!(files.to_string(), "./a.txt;./b.cs");
        let dirs = call_in(Some(&base), get_directories, &[".".into()])?;
        assert_eq!(dirs.to_string(), "./sub");

        #[cfg(feature = "glob")]
        {
            let txt = call_in(
                Some(&base),
                get_files,
                &[".".into(), "*.txt".into(), "SearchOption.AllDirectories".into()],
            )?;
            assert_eq!(txt.to_string(), "./a.txt;./sub/c.txt");
        }

        assert_eq!(
            call_in(Some(&base), file_exists, &["a.txt".into()])?,
            Value::Bool(true)
        );
        assert_eq!(
            call_in(Some(&base), read_all_text, &["sub/c.txt".into()])?,
            Value::from("z")
        );
        Ok(())
    }
}
