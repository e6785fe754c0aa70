// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins;
use crate::error::{codes, ElementLocation, ErrorKind, ExpansionError, Result};
use crate::escaping::{split_semicolon_separated_list, unescape};
use crate::interpreter::Interpreter;
use crate::item::{Item, ItemFactory};
use crate::lexer::*;
use crate::lookup::Lookup;
use crate::options::ExpanderOptions;
use crate::parser::*;
use crate::registry::{NoRegistry, RegistryProvider};
use crate::utils;
use crate::value::ExpressionResult;
use crate::Rc;

use std::borrow::Cow;

use log::trace;

/// Expands property, item and metadata references in build file text.
///
/// An `Expander` holds only ambient settings; every expansion call is a
/// pure function of its text, options and [`Lookup`].
#[derive(Clone)]
pub struct Expander {
    registry: Rc<dyn RegistryProvider>,
    location: Option<ElementLocation>,
    base_directory: Option<String>,
    defining_project: Option<String>,
    enable_all_functions: Option<bool>,
}

/// Create a default expander.
impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(NoRegistry),
            location: None,
            base_directory: None,
            defining_project: None,
            enable_all_functions: None,
        }
    }

    /// Location attached to every error raised by this expander.
    pub fn set_location(&mut self, location: Option<ElementLocation>) {
        self.location = location;
    }

    /// Registry read by `$(Registry:...)` and the registry intrinsics.
    pub fn set_registry(&mut self, registry: Rc<dyn RegistryProvider>) {
        self.registry = registry;
    }

    /// Directory relative paths are resolved against. Defaults to the
    /// directory of the defining project, then the current directory.
    pub fn set_base_directory(&mut self, directory: Option<&str>) {
        self.base_directory = directory.map(String::from);
    }

    /// Project file that defines the items created by
    /// [`Expander::expand_into_items`].
    pub fn set_defining_project(&mut self, project: Option<&str>) {
        self.defining_project = project.map(String::from);
    }

    /// Force the extended function table on or off. With `None` the
    /// `MSBUILDENABLEALLPROPERTYFUNCTIONS` environment variable decides.
    pub fn set_enable_all_functions(&mut self, enabled: Option<bool>) {
        self.enable_all_functions = enabled;
    }

    fn base_dir(&self) -> Option<String> {
        self.base_directory.clone().or_else(|| {
            self.defining_project
                .as_deref()
                .and_then(|p| utils::get_directory_name(&unescape(p)))
        })
    }

    fn parse(&self, text: &str, options: ExpanderOptions) -> Result<Expression> {
        let source = Source::from_contents(text);
        Parser::new(&source, options)
            .parse()
            .map_err(|e| e.with_location(self.location.as_ref()))
    }

    /// Run `f` with an interpreter configured from this expander.
    fn eval<T>(
        &self,
        options: ExpanderOptions,
        lookup: &Lookup,
        f: impl FnOnce(&mut Interpreter) -> Result<T>,
    ) -> Result<T> {
        let base_dir = self.base_dir();
        let mut interpreter = Interpreter::new(lookup, self.registry.as_ref(), options);
        interpreter.set_base_dir(base_dir.as_deref());
        interpreter.set_widened(builtins::all_functions_enabled(self.enable_all_functions));
        f(&mut interpreter).map_err(|e| e.with_location(self.location.as_ref()))
    }

    /// Expand `text` and unescape the result.
    ///
    /// Text without any reference to expand is returned borrowed when it
    /// contains no escape sequence either.
    pub fn expand<'t>(
        &self,
        text: &'t str,
        options: ExpanderOptions,
        lookup: &Lookup,
    ) -> Result<Cow<'t, str>> {
        Ok(match self.expand_leave_escaped(text, options, lookup)? {
            Cow::Borrowed(text) => unescape(text),
            Cow::Owned(expanded) => Cow::Owned(unescape(&expanded).into_owned()),
        })
    }

    /// Expand `text`, keeping the result in escaped form.
    pub fn expand_leave_escaped<'t>(
        &self,
        text: &'t str,
        options: ExpanderOptions,
        lookup: &Lookup,
    ) -> Result<Cow<'t, str>> {
        if !options.expands_anything() {
            return Ok(Cow::Borrowed(text));
        }
        let expr = self.parse(text, options)?;
        if expr.is_literal() {
            return Ok(Cow::Borrowed(text));
        }
        let expanded = self.eval(options, lookup, |i| i.eval_expression(&expr))?;
        trace!("expanded {text:?} into {expanded:?} ({options:?})");
        Ok(Cow::Owned(expanded))
    }

    /// Expand `text` and split the result on `;`. Entries are trimmed,
    /// unescaped and empty entries dropped.
    pub fn expand_into_list(
        &self,
        text: &str,
        options: ExpanderOptions,
        lookup: &Lookup,
    ) -> Result<Vec<String>> {
        let expanded = self.expand_leave_escaped(text, options, lookup)?;
        Ok(split_semicolon_separated_list(&expanded)
            .into_iter()
            .map(|entry| unescape(entry).into_owned())
            .collect())
    }

    /// Expand `text` into items minted by `factory`.
    ///
    /// Each `;` separated piece that is exactly one item list produces one
    /// item per entry, carrying the metadata of the item it came from.
    /// Other pieces are expanded as text. An item list mixed with other
    /// text in a piece is an error.
    pub fn expand_into_items(
        &self,
        text: &str,
        options: ExpanderOptions,
        lookup: &Lookup,
        factory: &dyn ItemFactory,
    ) -> Result<Vec<Item>> {
        let project = self.defining_project.as_deref();
        let mut items = vec![];
        for piece in split_top_level(text) {
            let expr = self.parse(piece, options)?;
            match expr.single_item() {
                Some(list) if list.separator.is_none() => {
                    let entries = self.eval(options, lookup, |i| i.eval_item_entries(list))?;
                    items.extend(
                        entries
                            .iter()
                            .filter(|e| !e.text.is_empty())
                            .map(|e| factory.create(&e.text, e.source.as_deref(), project)),
                    );
                    continue;
                }
                Some(_) => (),
                None if expr.has_items() => {
                    return Err(ExpansionError::new(
                        ErrorKind::Syntax,
                        codes::EMBEDDED_ITEM_LIST,
                        piece,
                        format!(
                            "The expression \"{piece}\" concatenates an item list with other text. An item list must be the only content of a list entry."
                        ),
                    )
                    .with_location(self.location.as_ref()));
                }
                None => (),
            }
            let expanded = if expr.is_literal() {
                piece.to_string()
            } else {
                self.eval(options, lookup, |i| i.eval_expression(&expr))?
            };
            items.extend(
                split_semicolon_separated_list(&expanded)
                    .into_iter()
                    .map(|include| factory.create(include, None, project)),
            );
        }
        trace!("expanded {text:?} into {} item(s)", items.len());
        Ok(items)
    }

    /// Expand `text`, keeping the native type of a lone property function.
    pub fn expand_typed(
        &self,
        text: &str,
        options: ExpanderOptions,
        lookup: &Lookup,
    ) -> Result<ExpressionResult> {
        if !options.expands_anything() {
            return Ok(ExpressionResult::String(text.into()));
        }
        let expr = self.parse(text, options)?;
        let result = self.eval(options, lookup, |i| i.eval_typed(&expr))?;
        trace!("expanded {text:?} into {result:?}");
        Ok(result)
    }
}

/// Split on `;` outside of parentheses and quotes. Pieces are trimmed and
/// empty pieces dropped.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = vec![];
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (idx, b) in text.bytes().enumerate() {
        match (quote, b) {
            (Some(q), _) if q == b => quote = None,
            (Some(_), _) => (),
            (None, b'\'' | b'`' | b'"') if depth > 0 => quote = Some(b),
            (None, b'(') => depth += 1,
            (None, b')') => depth = depth.saturating_sub(1),
            (None, b';') if depth == 0 => {
                pieces.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }
    pieces.push(&text[start..]);
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_split_respects_nesting() {
        assert_eq!(
            split_top_level(" a ;@(I, ';');$(P.Replace(';', 'x'));; b"),
            vec!["a", "@(I, ';')", "$(P.Replace(';', 'x'))", "b"]
        );
        assert!(split_top_level(" ; ").is_empty());
    }
}
