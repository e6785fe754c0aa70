// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! String based path helpers with the host platform's rules.
//!
//! Both `/` and `\` are accepted as separators; on non-Windows hosts `\` is
//! rewritten to `/` before a string is treated as a path.

use std::borrow::Cow;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Result};
use chrono::{DateTime, Local, NaiveDateTime};

#[cfg(windows)]
pub const DIRECTORY_SEPARATOR: char = '\\';
#[cfg(not(windows))]
pub const DIRECTORY_SEPARATOR: char = '/';

pub const ALT_DIRECTORY_SEPARATOR: char = '/';

#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

#[cfg(windows)]
pub const MAX_PATH: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH: usize = 4096;

pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

pub fn fix_file_path(path: &str) -> Cow<'_, str> {
    if cfg!(windows) || !path.contains('\\') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(path.replace('\\', "/"))
    }
}

fn is_invalid_path_char(c: char) -> bool {
    if cfg!(windows) {
        matches!(c, '"' | '<' | '>' | '|') || (c as u32) < 32
    } else {
        c == '\0'
    }
}

/// Fail if the path contains characters the platform rejects or exceeds the
/// platform path length limit.
pub fn validate_path(path: &str) -> Result<()> {
    if path.chars().any(is_invalid_path_char) {
        bail!("Illegal characters in path \"{path}\".");
    }
    if path.len() >= MAX_PATH {
        bail!(
            "The specified path, file name, or both are too long. The fully qualified file name must be less than {MAX_PATH} characters."
        );
    }
    Ok(())
}

/// Number of leading characters that form the root of the path.
pub fn root_length(path: &str) -> usize {
    let bytes = path.as_bytes();
    if cfg!(windows) {
        if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            if bytes.len() >= 3 && is_separator(bytes[2] as char) {
                return 3;
            }
            return 2;
        }
        if bytes.len() >= 2 && is_separator(bytes[0] as char) && is_separator(bytes[1] as char) {
            // \\server\share\
            let mut separators = 0;
            for (idx, ch) in path.char_indices().skip(2) {
                if is_separator(ch) {
                    separators += 1;
                    if separators == 2 {
                        return idx + 1;
                    }
                }
            }
            return path.len();
        }
    }
    match bytes.first() {
        Some(b) if is_separator(*b as char) => 1,
        _ => 0,
    }
}

pub fn is_path_rooted(path: &str) -> bool {
    root_length(&fix_file_path(path)) > 0
}

pub fn get_path_root(path: &str) -> String {
    let path = fix_file_path(path);
    path[..root_length(&path)].to_string()
}

pub fn ends_with_separator(path: &str) -> bool {
    path.chars().last().is_some_and(is_separator)
}

pub fn combine(base: &str, rest: &str) -> String {
    let base = fix_file_path(base);
    let rest = fix_file_path(rest);
    if rest.is_empty() {
        return base.into_owned();
    }
    if base.is_empty() || root_length(&rest) > 0 {
        return rest.into_owned();
    }
    if ends_with_separator(&base) || (cfg!(windows) && base.ends_with(':')) {
        format!("{base}{rest}")
    } else {
        format!("{base}{DIRECTORY_SEPARATOR}{rest}")
    }
}

/// Directory part of the path; `None` for a root or empty path, `""` when
/// the path has no directory component.
pub fn get_directory_name(path: &str) -> Option<String> {
    let path = fix_file_path(path);
    let root = root_length(&path);
    if path.is_empty() || path.len() == root {
        return None;
    }
    match path.rfind(is_separator) {
        Some(idx) if idx < root => Some(path[..root].to_string()),
        Some(idx) => {
            let dir = path[..idx].trim_end_matches(is_separator);
            if dir.len() < root {
                Some(path[..root].to_string())
            } else {
                Some(dir.to_string())
            }
        }
        None if root > 0 => Some(path[..root].to_string()),
        None => Some(String::new()),
    }
}

pub fn get_file_name(path: &str) -> String {
    let path = fix_file_path(path);
    let start = match path.rfind(is_separator) {
        Some(idx) => idx + 1,
        None => root_length(&path),
    };
    path[start..].to_string()
}

pub fn get_extension(path: &str) -> String {
    let name = get_file_name(path);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx..].to_string(),
        _ => String::new(),
    }
}

pub fn has_extension(path: &str) -> bool {
    !get_extension(path).is_empty()
}

pub fn get_file_name_without_extension(path: &str) -> String {
    let name = get_file_name(path);
    match name.rfind('.') {
        Some(idx) => name[..idx].to_string(),
        None => name,
    }
}

/// Replace the extension. `None` removes it together with the dot.
pub fn change_extension(path: &str, extension: Option<&str>) -> String {
    let path = fix_file_path(path);
    let name_start = path.rfind(is_separator).map(|i| i + 1).unwrap_or(0);
    let stem_end = match path[name_start..].rfind('.') {
        Some(idx) => name_start + idx,
        None => path.len(),
    };
    let stem = &path[..stem_end];
    match extension {
        None => stem.to_string(),
        Some(ext) if ext.starts_with('.') => format!("{stem}{ext}"),
        Some(ext) => format!("{stem}.{ext}"),
    }
}

/// Collapse `.` and `..` segments and repeated separators. The root and a
/// trailing separator are kept.
pub fn normalize(path: &str) -> String {
    let path = fix_file_path(path);
    let root_len = root_length(&path);
    let root: String = path[..root_len]
        .chars()
        .map(|c| if is_separator(c) { DIRECTORY_SEPARATOR } else { c })
        .collect();
    let rest = &path[root_len..];

    let mut segments: Vec<&str> = vec![];
    for segment in rest.split(is_separator) {
        match segment {
            "" | "." => (),
            ".." => {
                if matches!(segments.last(), Some(s) if *s != "..") {
                    segments.pop();
                } else if root_len == 0 {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let mut out = root;
    out.push_str(&segments.join(&DIRECTORY_SEPARATOR.to_string()));
    if ends_with_separator(rest) && !segments.is_empty() {
        out.push(DIRECTORY_SEPARATOR);
    }
    out
}

pub fn current_directory() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Absolute, normalized form of `path` resolved against `base` (the
/// current directory when `None`).
pub fn get_full_path(path: &str, base: Option<&str>) -> Result<String> {
    validate_path(path)?;
    let fixed = fix_file_path(path);
    let combined = if is_path_rooted(&fixed) {
        fixed.into_owned()
    } else {
        let base = match base {
            Some(b) if is_path_rooted(b) => b.to_string(),
            Some(b) => combine(&current_directory(), b),
            None => current_directory(),
        };
        combine(&base, &fixed)
    };
    let full = normalize(&combined);
    validate_path(&full)?;
    Ok(full)
}

pub fn ensure_trailing_slash(path: &str) -> String {
    let path = fix_file_path(path);
    if path.is_empty() || ends_with_separator(&path) {
        path.into_owned()
    } else {
        format!("{path}{DIRECTORY_SEPARATOR}")
    }
}

fn segments_equal(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Path of `path` relative to the directory `base`. Paths on different
/// roots are returned in full.
pub fn make_relative(base: &str, path: &str) -> Result<String> {
    let full_base = get_full_path(base, None)?;
    let full_path = get_full_path(path, None)?;

    if !segments_equal(&get_path_root(&full_base), &get_path_root(&full_path)) {
        return Ok(full_path);
    }

    let base_segments: Vec<&str> = full_base.split(is_separator).filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = full_path.split(is_separator).filter(|s| !s.is_empty()).collect();

    let common = base_segments
        .iter()
        .zip(path_segments.iter())
        .take_while(|(a, b)| segments_equal(a, b))
        .count();

    let mut parts: Vec<&str> = vec![".."; base_segments.len() - common];
    parts.extend_from_slice(&path_segments[common..]);
    if parts.is_empty() {
        return Ok(".".to_string());
    }
    let mut relative = parts.join(&DIRECTORY_SEPARATOR.to_string());
    if ends_with_separator(&full_path) {
        relative.push(DIRECTORY_SEPARATOR);
    }
    Ok(relative)
}

/// Walk up from `start` looking for `file_name`; returns the directory
/// containing it or `""`.
pub fn get_directory_name_of_file_above(start: &str, file_name: &str) -> Result<String> {
    let mut dir = get_full_path(start, None)?;
    loop {
        let candidate = combine(&dir, file_name);
        if Path::new(&candidate).exists() {
            return Ok(dir);
        }
        match get_directory_name(&dir) {
            Some(parent) if parent != dir && !parent.is_empty() => dir = parent,
            _ => return Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTime {
    Created,
    Modified,
    Accessed,
}

pub fn file_time(path: &str, kind: FileTime) -> Option<NaiveDateTime> {
    let metadata = std::fs::metadata(fix_file_path(path).as_ref()).ok()?;
    let time: SystemTime = match kind {
        FileTime::Created => metadata.created().ok()?,
        FileTime::Modified => metadata.modified().ok()?,
        FileTime::Accessed => metadata.accessed().ok()?,
    };
    Some(DateTime::<Local>::from(time).naive_local())
}

/// `yyyy-MM-dd HH:mm:ss.fffffff`, the format of the file time metadata.
pub fn format_file_time(dt: &NaiveDateTime) -> String {
    format!(
        "{}{:07}",
        dt.format("%Y-%m-%d %H:%M:%S."),
        dt.and_utc().timestamp_subsec_nanos() / 100
    )
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn directory_and_file_names() {
        assert_eq!(get_directory_name("a/b/c.txt").as_deref(), Some("a/b"));
        assert_eq!(get_directory_name("c.txt").as_deref(), Some(""));
        assert_eq!(get_directory_name("/c.txt").as_deref(), Some("/"));
        assert_eq!(get_directory_name("/"), None);
        assert_eq!(get_directory_name(r"dir\file.ext").as_deref(), Some("dir"));
        assert_eq!(get_file_name("a/b/c.txt"), "c.txt");
        assert_eq!(get_extension("a/b/c.tar.gz"), ".gz");
        assert_eq!(get_extension("a.b/c"), "");
        assert_eq!(get_file_name_without_extension("a/b/c.txt"), "c");
        assert_eq!(change_extension("a/b.txt", Some("cs")), "a/b.cs");
        assert_eq!(change_extension("a/b.txt", None), "a/b");
    }

    #[test]
    fn combine_and_normalize() -> Result<()> {
        assert_eq!(combine("a", "b"), "a/b");
        assert_eq!(combine("a/", "b"), "a/b");
        assert_eq!(combine("a", "/b"), "/b");
        assert_eq!(normalize("/a/./b/../c//d/"), "/a/c/d/");
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(get_full_path("x/../y", Some("/base"))?, "/base/y");
        Ok(())
    }

    #[test]
    fn relative_paths() -> Result<()> {
        assert_eq!(make_relative("/abc/def", "/abc/def/foo.cpp")?, "foo.cpp");
        assert_eq!(make_relative("/abc/def/", "/abc/ghi/x.cs")?, "../ghi/x.cs");
        assert_eq!(make_relative("/abc", "/abc")?, ".");
        Ok(())
    }

    #[test]
    fn long_paths_are_rejected() {
        let long = "a".repeat(MAX_PATH + 1);
        assert!(validate_path(&long).is_err());
        assert!(validate_path("bad\0path").is_err());
        assert!(validate_path("fine/path").is_ok());
    }
}
