// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod transforms;

use crate::ast::*;
use crate::builtins::{self, intrinsics, CallContext};
use crate::error::{codes, ArgumentMismatch, ErrorKind, ExpansionError, Result};
use crate::escaping::unescape;
use crate::item::{Item, MetadataTable};
use crate::lexer::*;
use crate::lookup::Lookup;
use crate::options::ExpanderOptions;
use crate::registry::{split_key_and_value, RegistryProvider, RegistryView};
use crate::value::{ExpressionResult, Value};
use crate::Rc;

use log::debug;

/// Longest property value kept by [`ExpanderOptions::TRUNCATE`].
const MAX_PROPERTY_LENGTH: usize = 1024;
/// Item list entries kept by [`ExpanderOptions::TRUNCATE`].
const MAX_ITEM_ENTRIES: usize = 3;
const ELLIPSIS: &str = "...";

/// One entry of an item pipeline: escaped text and the item it was
/// produced from.
#[derive(Debug, Clone)]
pub struct Entry {
    pub text: Rc<str>,
    pub source: Option<Rc<Item>>,
}

impl Entry {
    pub fn new(text: impl Into<Rc<str>>, source: Option<Rc<Item>>) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }

    /// Item answering metadata references made on behalf of this entry.
    /// Custom metadata comes from the source item; reserved metadata is
    /// computed from the entry's own text.
    pub fn metadata_item(&self) -> Rc<Item> {
        match &self.source {
            Some(source) if source.include() == &*self.text => source.clone(),
            Some(source) => Rc::new(source.derive(source.item_type(), &self.text)),
            None => Rc::new(Item::new("", &self.text)),
        }
    }
}

fn cannot_evaluate(expression: &str, detail: impl std::fmt::Display) -> String {
    format!("The expression \"{expression}\" cannot be evaluated. {detail}")
}

/// Evaluates parsed expressions against a [`Lookup`].
///
/// All intermediate text is kept in escaped form; callers unescape the
/// final result.
pub struct Interpreter<'a> {
    lookup: &'a Lookup,
    registry: &'a dyn RegistryProvider,
    base_dir: Option<&'a str>,
    options: ExpanderOptions,
    widened: bool,
    /// Item whose metadata answers `%(...)` while a transform or separator
    /// is evaluated.
    current_item: Option<Rc<Item>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        lookup: &'a Lookup,
        registry: &'a dyn RegistryProvider,
        options: ExpanderOptions,
    ) -> Self {
        Self {
            lookup,
            registry,
            base_dir: None,
            options,
            widened: false,
            current_item: None,
        }
    }

    pub fn set_base_dir(&mut self, base_dir: Option<&'a str>) {
        self.base_dir = base_dir;
    }

    /// Make the extended function table reachable.
    pub fn set_widened(&mut self, widened: bool) {
        self.widened = widened;
    }

    /// Escaped text of `expr`.
    pub fn eval_expression(&mut self, expr: &Expression) -> Result<String> {
        let mut out = String::with_capacity(expr.span.text().len());
        for segment in &expr.segments {
            match segment {
                Segment::Literal(span) => out.push_str(span.text()),
                Segment::Property(property) => {
                    let value = self.eval_property(property)?.to_escaped_string();
                    out.push_str(&self.truncate_value(value));
                }
                Segment::Item(item) => {
                    let entries = self.eval_item_entries(item)?;
                    out.push_str(&self.join_entries(item, &entries)?);
                }
                Segment::Metadata(metadata) => out.push_str(&self.eval_metadata(metadata)?),
            }
        }
        Ok(out)
    }

    /// Like [`Interpreter::eval_expression`], but an expression made of a
    /// single property reference keeps the native type of its value.
    pub fn eval_typed(&mut self, expr: &Expression) -> Result<ExpressionResult> {
        match expr.single_property() {
            Some(property) => self.eval_property(property),
            None => Ok(ExpressionResult::String(self.eval_expression(expr)?.into())),
        }
    }

    fn truncate_value(&self, value: String) -> String {
        if !self.options.contains(ExpanderOptions::TRUNCATE)
            || value.chars().count() <= MAX_PROPERTY_LENGTH
        {
            return value;
        }
        let mut truncated: String = value
            .chars()
            .take(MAX_PROPERTY_LENGTH - ELLIPSIS.len())
            .collect();
        truncated.push_str(ELLIPSIS);
        truncated
    }

    /// Run `f` with `item` answering metadata references.
    fn with_item<T>(&mut self, item: Rc<Item>, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.current_item.replace(item);
        let result = f(self);
        self.current_item = saved;
        result
    }

    /// Escaped value of a property. The name is used exactly as written, so
    /// `$( Foo )` finds nothing.
    fn get_property(&self, name: &str) -> Rc<str> {
        if name.trim().is_empty() {
            return "".into();
        }
        match self.lookup.get_property(name) {
            Some(value) => value.into(),
            None => "".into(),
        }
    }

    fn eval_property(&mut self, property: &PropertyExpr) -> Result<ExpressionResult> {
        match &property.body {
            PropertyBody::Name(name) => Ok(ExpressionResult::String(self.get_property(name.text()))),
            PropertyBody::Registry(key) => self.eval_registry(property, key),
            PropertyBody::LegacyRegistry(path) => {
                debug!("unprefixed registry reference `{}` expands to nothing", path.text());
                Ok(ExpressionResult::String("".into()))
            }
            PropertyBody::Chain { receiver, accesses } => {
                let (value, raw) = self.eval_chain(property, receiver, accesses)?;
                Ok(if raw {
                    ExpressionResult::String(value.to_string().into())
                } else {
                    ExpressionResult::Typed(value)
                })
            }
        }
    }

    fn eval_registry(&self, property: &PropertyExpr, body: &Span) -> Result<ExpressionResult> {
        let (key, value_name) = split_key_and_value(body.text());
        let expression = property.span.text();
        let value = intrinsics::read_registry(self.registry, RegistryView::Default, key, value_name)
            .map_err(|e| {
                ExpansionError::new(
                    ErrorKind::InvalidOperand,
                    codes::INVALID_PROPERTY_FUNCTION,
                    expression,
                    cannot_evaluate(expression, e),
                )
            })?;
        Ok(ExpressionResult::String(value.to_escaped_string().into()))
    }

    /// Value of a member chain and whether it is raw text that must not be
    /// escaped again.
    fn eval_chain(
        &mut self,
        property: &PropertyExpr,
        receiver: &Receiver,
        accesses: &[MemberAccess],
    ) -> Result<(Value, bool)> {
        let (mut value, mut raw, rest) = match receiver {
            Receiver::Property(name) => {
                let escaped = self.get_property(name.text());
                (Value::from(unescape(&escaped).into_owned()), false, accesses)
            }
            Receiver::Static(type_name) => {
                let (member, args, rest) = match accesses.split_first() {
                    Some((MemberAccess::Method { name, args, .. }, rest)) => {
                        (name, self.eval_args(args)?, rest)
                    }
                    Some((MemberAccess::Property { name, .. }, rest)) => (name, vec![], rest),
                    _ => {
                        return Err(ExpansionError::invalid_static_syntax(
                            property.span.text(),
                            "The member name is missing.",
                        ))
                    }
                };
                let value = self.call(property, type_name.text(), None, member.text(), args)?;
                let raw = builtins::returns_raw_text(type_name.text(), member.text());
                (value, raw, rest)
            }
        };

        for access in rest {
            value = match access {
                MemberAccess::Method { name, args, .. } => {
                    let args = self.eval_args(args)?;
                    self.call(property, "", Some(value), name.text(), args)?
                }
                MemberAccess::Property { name, .. } => {
                    self.call(property, "", Some(value), name.text(), vec![])?
                }
                MemberAccess::Index { index, .. } => {
                    let member = match &value {
                        Value::String(_) => "Chars",
                        Value::Array(_) => "GetValue",
                        v => {
                            let expression = property.span.text();
                            return Err(ExpansionError::new(
                                ErrorKind::UnresolvedReference,
                                codes::INVALID_PROPERTY_FUNCTION,
                                expression,
                                cannot_evaluate(
                                    expression,
                                    format!("A value of type \"{}\" cannot be indexed.", v.type_name()),
                                ),
                            ));
                        }
                    };
                    let index = self.eval_argument(index)?;
                    self.call(property, "", Some(value), member, vec![index])?
                }
            };
            raw = false;
        }
        Ok((value, raw))
    }

    fn eval_args(&mut self, args: &[Argument]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval_argument(arg)).collect()
    }

    /// Arguments are passed unescaped. A bare argument made of a single
    /// property reference keeps its type.
    fn eval_argument(&mut self, arg: &Argument) -> Result<Value> {
        Ok(match arg {
            Argument::Null(_) => Value::Null,
            Argument::Quoted(expr) => {
                ExpressionResult::String(self.eval_expression(expr)?.into()).into_argument()
            }
            Argument::Bare(expr) => match expr.single_property() {
                Some(property) => self.eval_property(property)?.into_argument(),
                None => ExpressionResult::String(self.eval_expression(expr)?.into()).into_argument(),
            },
        })
    }

    /// Call a static member of `type_name`, or an instance member of
    /// `receiver`.
    fn call(
        &self,
        property: &PropertyExpr,
        type_name: &str,
        receiver: Option<Value>,
        member: &str,
        mut args: Vec<Value>,
    ) -> Result<Value> {
        let expression = property.span.text();
        let builtin = builtins::resolve(type_name, receiver.as_ref(), member, args.len(), self.widened)
            .map_err(|e| {
                ExpansionError::new(
                    ErrorKind::UnresolvedReference,
                    e.code(),
                    expression,
                    cannot_evaluate(expression, &e),
                )
            })?;

        let function = match &receiver {
            Some(v) => format!("{}.{member}", v.type_name()),
            None => format!("[{}]::{member}", type_name.trim()),
        };
        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }
        let ctx = CallContext {
            function: &function,
            registry: self.registry,
            base_dir: self.base_dir,
        };
        builtin.0(&ctx, &args).map_err(|e| {
            let kind = match e.downcast_ref::<ArgumentMismatch>() {
                Some(_) => ErrorKind::UnresolvedReference,
                None => ErrorKind::InvalidOperand,
            };
            ExpansionError::new(
                kind,
                codes::INVALID_PROPERTY_FUNCTION,
                expression,
                cannot_evaluate(expression, e),
            )
        })
    }

    /// `%(Name)` resolves against the item being transformed, otherwise
    /// against the lookup's metadata table. Without either it is empty.
    fn eval_metadata(&self, metadata: &MetadataExpr) -> Result<String> {
        let item_type = metadata.item_type.as_ref().map(|t| t.text());
        let name = metadata.name.text();
        let value = match (&self.current_item, self.lookup.metadata_table()) {
            (Some(item), _) => item.get_escaped_value(item_type, name),
            (None, Some(table)) => table.get_escaped_value(item_type, name),
            (None, None) => return Ok(String::new()),
        };
        value.map_err(|e| metadata_error(metadata.span.text(), name, e))
    }
}

fn metadata_error(expression: &str, name: &str, e: anyhow::Error) -> ExpansionError {
    ExpansionError::new(
        ErrorKind::InvalidOperand,
        codes::CANNOT_EVALUATE_METADATA,
        expression,
        format!("Cannot evaluate the item metadata \"%({name})\". {e}"),
    )
}
