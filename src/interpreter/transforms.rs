// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins::{self, CallContext};
use crate::error::{codes, ArgumentMismatch, ErrorKind, ExpansionError, Result};
use crate::escaping::{escape, split_semicolon_separated_list, unescape};
use crate::interpreter::{metadata_error, Entry, Interpreter, ELLIPSIS, MAX_ITEM_ENTRIES};
use crate::item::{reserved, Item};
use crate::lexer::*;
use crate::options::ExpanderOptions;
use crate::utils;
use crate::value::Value;
use crate::Rc;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

fn item_function_error(kind: ErrorKind, expr: &ItemExpr, function: &str, detail: impl core::fmt::Display) -> ExpansionError {
    ExpansionError::new(
        kind,
        codes::INVALID_ITEM_FUNCTION,
        expr.span.text(),
        format!(
            "The item function \"{function}\" in \"{}\" cannot be evaluated. {detail}",
            expr.span.text()
        ),
    )
}

fn check_argc(expr: &ItemExpr, function: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        return Ok(());
    }
    Err(item_function_error(
        ErrorKind::UnresolvedReference,
        expr,
        function,
        format!("It expects {expected} argument(s) but {} were supplied.", args.len()),
    ))
}

/// Metadata value of an entry, unescaped.
fn metadata_value(entry: &Entry, name: &str, span: &Span) -> Result<String> {
    entry
        .metadata_item()
        .get_metadata(name)
        .map(|v| unescape(&v).into_owned())
        .map_err(|e| metadata_error(span.text(), name, e))
}

impl Interpreter<'_> {
    /// Entries of an item list after every transform has run.
    pub fn eval_item_entries(&mut self, expr: &ItemExpr) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .lookup
            .get_items(expr.item_type.text())
            .iter()
            .map(|item| Entry::new(item.include(), Some(item.clone())))
            .collect();

        for transform in &expr.transforms {
            entries = match transform {
                Transform::Pattern { pattern, .. } => self.apply_pattern(pattern, entries)?,
                Transform::Function { span, name, args } => {
                    let args = self.eval_args(args)?;
                    self.apply_function(expr, span, name.text(), &args, entries)?
                }
            };
        }
        Ok(entries)
    }

    /// Join entries with the separator, evaluated against the metadata of
    /// the entry preceding it.
    pub fn join_entries(&mut self, expr: &ItemExpr, entries: &[Entry]) -> Result<String> {
        let truncate =
            self.options.contains(ExpanderOptions::TRUNCATE) && entries.len() > MAX_ITEM_ENTRIES;
        let kept = if truncate {
            &entries[..MAX_ITEM_ENTRIES]
        } else {
            entries
        };

        let mut out = String::new();
        for (idx, entry) in kept.iter().enumerate() {
            if idx > 0 {
                out.push_str(&self.separator(expr, &kept[idx - 1])?);
            }
            out.push_str(&entry.text);
        }
        if let (true, Some(last)) = (truncate, kept.last()) {
            out.push_str(&self.separator(expr, last)?);
            out.push_str(ELLIPSIS);
        }
        Ok(out)
    }

    fn separator(&mut self, expr: &ItemExpr, previous: &Entry) -> Result<String> {
        match &expr.separator {
            None => Ok(";".to_string()),
            Some(separator) if separator.is_literal() => self.eval_expression(separator),
            Some(separator) => {
                self.with_item(previous.metadata_item(), |this| this.eval_expression(separator))
            }
        }
    }

    /// `->'pattern'`: one entry per item, empty results are dropped.
    fn apply_pattern(&mut self, pattern: &Expression, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let text = self.with_item(entry.metadata_item(), |this| this.eval_expression(pattern))?;
            if !text.is_empty() {
                out.push(Entry::new(text, entry.source));
            }
        }
        Ok(out)
    }

    fn apply_function(
        &mut self,
        expr: &ItemExpr,
        span: &Span,
        function: &str,
        args: &[Value],
        entries: Vec<Entry>,
    ) -> Result<Vec<Entry>> {
        let string_arg = |idx: usize| args.get(idx).map(|v| v.to_string()).unwrap_or_default();

        match function.to_ascii_lowercase().as_str() {
            "count" => {
                check_argc(expr, function, args, 0)?;
                Ok(vec![Entry::new(entries.len().to_string(), None)])
            }
            "distinct" => {
                check_argc(expr, function, args, 0)?;
                let mut seen = HashSet::new();
                Ok(entries
                    .into_iter()
                    .filter(|e| seen.insert(e.text.to_lowercase()))
                    .collect())
            }
            "distinctwithcase" => {
                check_argc(expr, function, args, 0)?;
                let mut seen = HashSet::new();
                Ok(entries
                    .into_iter()
                    .filter(|e| seen.insert(e.text.clone()))
                    .collect())
            }
            "reverse" => {
                check_argc(expr, function, args, 0)?;
                Ok(entries.into_iter().rev().collect())
            }
            "metadata" => {
                check_argc(expr, function, args, 1)?;
                self.metadata(span, &string_arg(0), entries)
            }
            "directoryname" => {
                check_argc(expr, function, args, 0)?;
                self.directory_name(expr, function, entries)
            }
            "exists" => {
                check_argc(expr, function, args, 0)?;
                self.existing(expr, function, entries)
            }
            "combine" => {
                check_argc(expr, function, args, 1)?;
                let rest = string_arg(0);
                Ok(entries
                    .into_iter()
                    .map(|e| {
                        let combined = utils::combine(&unescape(&e.text), &rest);
                        Entry::new(escape(&combined).into_owned(), e.source)
                    })
                    .collect())
            }
            "getpathsofalldirectoriesabove" => {
                check_argc(expr, function, args, 0)?;
                self.directories_above(expr, function, entries)
            }
            "anyhavemetadatavalue" => {
                check_argc(expr, function, args, 2)?;
                let (name, wanted) = (string_arg(0), string_arg(1));
                let mut found = false;
                for entry in &entries {
                    if metadata_value(entry, &name, span)?.eq_ignore_ascii_case(&wanted) {
                        found = true;
                        break;
                    }
                }
                Ok(vec![Entry::new(if found { "true" } else { "false" }, None)])
            }
            "hasmetadata" => {
                check_argc(expr, function, args, 1)?;
                let name = string_arg(0);
                self.filter(entries, |e| Ok(!metadata_value(e, &name, span)?.is_empty()))
            }
            "withmetadatavalue" | "withoutmetadatavalue" => {
                check_argc(expr, function, args, 2)?;
                let keep_equal = function.eq_ignore_ascii_case("withmetadatavalue");
                let (name, wanted) = (string_arg(0), string_arg(1));
                self.filter(entries, |e| {
                    Ok(metadata_value(e, &name, span)?.eq_ignore_ascii_case(&wanted) == keep_equal)
                })
            }
            "clearmetadata" => {
                check_argc(expr, function, args, 0)?;
                Ok(entries
                    .into_iter()
                    .map(|e| {
                        let (item_type, project) = match &e.source {
                            Some(s) => (s.item_type().to_string(), s.defining_project().map(String::from)),
                            None => (expr.item_type.text().to_string(), None),
                        };
                        let item = Item::new(&item_type, &e.text).with_defining_project(project.as_deref());
                        Entry::new(e.text, Some(Rc::new(item)))
                    })
                    .collect())
            }
            _ => match reserved::canonical(function) {
                Some(modifier) => {
                    check_argc(expr, function, args, 0)?;
                    self.modifier(expr, function, modifier, entries)
                }
                None => self.string_function(expr, function, args, entries),
            },
        }
    }

    fn filter(
        &self,
        entries: Vec<Entry>,
        mut keep: impl FnMut(&Entry) -> Result<bool>,
    ) -> Result<Vec<Entry>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if keep(&entry)? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// `Metadata('M')`: a value holding several `;` separated entries fans
    /// out into one entry per value.
    fn metadata(&self, span: &Span, name: &str, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = vec![];
        for entry in entries {
            let value = entry
                .metadata_item()
                .get_metadata(name)
                .map_err(|e| metadata_error(span.text(), name, e))?;
            if value.is_empty() {
                continue;
            }
            if value.contains(';') {
                for piece in split_semicolon_separated_list(&value) {
                    out.push(Entry::new(piece, entry.source.clone()));
                }
            } else {
                out.push(Entry::new(value, entry.source));
            }
        }
        Ok(out)
    }

    /// Directory relative entries are resolved against: the defining
    /// project of their item, then the expansion base directory.
    fn entry_base_dir(&self, entry: &Entry) -> String {
        entry
            .source
            .as_ref()
            .and_then(|s| s.base_directory())
            .or_else(|| self.base_dir.map(String::from))
            .unwrap_or_else(utils::current_directory)
    }

    fn rooted_path(&self, entry: &Entry) -> anyhow::Result<String> {
        let path = unescape(&entry.text);
        utils::validate_path(&path)?;
        let fixed = utils::fix_file_path(&path);
        Ok(if utils::is_path_rooted(&fixed) {
            fixed.into_owned()
        } else {
            utils::combine(&self.entry_base_dir(entry), &fixed)
        })
    }

    fn directory_name(&self, expr: &ItemExpr, function: &str, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = vec![];
        for entry in entries.into_iter().filter(|e| !e.text.is_empty()) {
            let rooted = self
                .rooted_path(&entry)
                .map_err(|e| item_function_error(ErrorKind::InvalidOperand, expr, function, e))?;
            match utils::get_directory_name(&rooted) {
                Some(dir) if !dir.is_empty() => {
                    out.push(Entry::new(escape(&dir).into_owned(), entry.source))
                }
                _ => (),
            }
        }
        Ok(out)
    }

    fn existing(&self, expr: &ItemExpr, function: &str, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = vec![];
        for entry in entries.into_iter().filter(|e| !e.text.is_empty()) {
            let rooted = self
                .rooted_path(&entry)
                .map_err(|e| item_function_error(ErrorKind::InvalidOperand, expr, function, e))?;
            if Path::new(&rooted).exists() {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Every directory above every entry, sorted ignoring case. The result
    /// has no source items.
    fn directories_above(&self, expr: &ItemExpr, function: &str, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut directories = BTreeMap::new();
        for entry in entries.iter().filter(|e| !e.text.is_empty()) {
            let full = self
                .rooted_path(entry)
                .and_then(|p| utils::get_full_path(&p, None))
                .map_err(|e| item_function_error(ErrorKind::InvalidOperand, expr, function, e))?;
            let mut current = utils::get_directory_name(&full);
            while let Some(dir) = current.filter(|d| !d.is_empty()) {
                let parent = utils::get_directory_name(&dir).filter(|p| *p != dir);
                directories.entry(dir.to_lowercase()).or_insert(dir);
                current = parent;
            }
        }
        Ok(directories
            .into_values()
            .map(|dir| Entry::new(escape(&dir).into_owned(), None))
            .collect())
    }

    /// `->FullPath()`, `->Filename()`, ...
    fn modifier(
        &self,
        expr: &ItemExpr,
        function: &str,
        modifier: &str,
        entries: Vec<Entry>,
    ) -> Result<Vec<Entry>> {
        let mut out = vec![];
        for entry in entries.into_iter().filter(|e| !e.text.is_empty()) {
            let value = entry
                .metadata_item()
                .get_metadata(modifier)
                .map_err(|e| item_function_error(ErrorKind::InvalidOperand, expr, function, e))?;
            if !value.is_empty() {
                out.push(Entry::new(value, entry.source));
            }
        }
        Ok(out)
    }

    /// A string instance member applied to the text of every entry.
    fn string_function(
        &self,
        expr: &ItemExpr,
        function: &str,
        args: &[Value],
        entries: Vec<Entry>,
    ) -> Result<Vec<Entry>> {
        let receiver_type = Value::from("").type_name();
        let builtin = builtins::resolve("", Some(&Value::from("")), function, args.len(), self.widened)
            .map_err(|_| {
                item_function_error(
                    ErrorKind::UnresolvedReference,
                    expr,
                    function,
                    format!("\"{function}\" is not a known item function or a {receiver_type} member taking {} argument(s).", args.len()),
                )
            })?;
        let name = format!("{receiver_type}.{function}");
        let ctx = CallContext {
            function: &name,
            registry: self.registry,
            base_dir: self.base_dir,
        };

        let mut out = vec![];
        for entry in entries {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(Value::from(unescape(&entry.text).into_owned()));
            call_args.extend(args.iter().cloned());
            let result = builtin.0(&ctx, &call_args).map_err(|e| {
                let kind = match e.downcast_ref::<ArgumentMismatch>() {
                    Some(_) => ErrorKind::UnresolvedReference,
                    None => ErrorKind::InvalidOperand,
                };
                item_function_error(kind, expr, function, e)
            })?;
            let text = result.to_escaped_string();
            if !text.is_empty() {
                out.push(Entry::new(text, entry.source));
            }
        }
        Ok(out)
    }
}
