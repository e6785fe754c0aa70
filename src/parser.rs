// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::{ExpansionError, Result};
use crate::lexer::*;
use crate::options::ExpanderOptions;

/// Roots accepted by the legacy `$(HKEY_...\Path)` form.
const LEGACY_HIVE_ROOTS: [&str; 11] = [
    "HKEY_LOCAL_MACHINE\\",
    "HKEY_CURRENT_USER\\",
    "HKEY_CLASSES_ROOT\\",
    "HKEY_USERS\\",
    "HKEY_CURRENT_CONFIG\\",
    "HKEY_PERFORMANCE_DATA\\",
    "HKLM\\",
    "HKCU\\",
    "HKCR\\",
    "HKU\\",
    "HKCC\\",
];

const REGISTRY_PREFIX: &str = "registry:";

fn is_legacy_registry(text: &str) -> bool {
    LEGACY_HIVE_ROOTS.iter().any(|root| {
        text.len() > root.len()
            && text
                .get(..root.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(root))
    })
}

#[derive(Clone)]
pub struct Parser<'source> {
    source: &'source Source,
    options: ExpanderOptions,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source, options: ExpanderOptions) -> Self {
        Self { source, options }
    }

    pub fn parse(&self) -> Result<Expression> {
        self.parse_range(0, self.source.len(), self.options)
    }

    fn flush_literal(&self, segments: &mut Vec<Segment>, start: usize, end: usize) {
        if start < end {
            segments.push(Segment::Literal(self.source.span(start, end)));
        }
    }

    /// Split `start..end` into literal runs and the references requested by
    /// `options`.
    pub fn parse_range(
        &self,
        start: usize,
        end: usize,
        options: ExpanderOptions,
    ) -> Result<Expression> {
        let scanner = Scanner::new(self.source, start, end);
        let bytes = self.source.contents().as_bytes();
        let mut segments = vec![];
        let mut literal_start = start;
        let mut idx = start;

        while idx + 1 < end {
            if bytes[idx + 1] != b'(' {
                idx += 1;
                continue;
            }
            match bytes[idx] {
                b'$' if options.contains(ExpanderOptions::EXPAND_PROPERTIES) => {
                    let close = scanner
                        .find_closing(idx + 1, b'(', b')')
                        .ok_or_else(|| {
                            self.source
                                .span(idx, end)
                                .error("Missing closing parenthesis.")
                        })?;
                    self.flush_literal(&mut segments, literal_start, idx);
                    let property = self.parse_property(idx, close, options)?;
                    segments.push(Segment::Property(Ref::new(property)));
                    idx = close + 1;
                    literal_start = idx;
                }
                b'@' if options.contains(ExpanderOptions::EXPAND_ITEMS) => {
                    let close = scanner
                        .find_closing(idx + 1, b'(', b')')
                        .ok_or_else(|| {
                            self.source
                                .span(idx, end)
                                .error("Missing closing parenthesis.")
                        })?;
                    self.flush_literal(&mut segments, literal_start, idx);
                    let item = self.parse_item(idx, close, options)?;
                    segments.push(Segment::Item(Ref::new(item)));
                    idx = close + 1;
                    literal_start = idx;
                }
                b'@' if options.contains(ExpanderOptions::EXPAND_METADATA) => {
                    // Metadata inside an item list belongs to its transforms.
                    match scanner.find_closing(idx + 1, b'(', b')') {
                        Some(close) => {
                            self.flush_literal(&mut segments, literal_start, idx + 2);
                            let inner = self.parse_range(
                                idx + 2,
                                close,
                                options.difference(ExpanderOptions::EXPAND_METADATA),
                            )?;
                            segments.extend(inner.segments);
                            literal_start = close;
                            idx = close + 1;
                        }
                        None => idx += 1,
                    }
                }
                b'%' if options.contains(ExpanderOptions::EXPAND_METADATA) => {
                    match self.parse_metadata(idx, end) {
                        Some(metadata) => {
                            self.flush_literal(&mut segments, literal_start, idx);
                            idx = metadata.span.end as usize;
                            literal_start = idx;
                            segments.push(Segment::Metadata(Ref::new(metadata)));
                        }
                        None => idx += 1,
                    }
                }
                _ => idx += 1,
            }
        }
        self.flush_literal(&mut segments, literal_start, end);

        Ok(Expression {
            span: self.source.span(start, end),
            segments,
        })
    }

    /// `%( [Type .] Name )`. Anything else is not a metadata reference.
    fn parse_metadata(&self, idx: usize, end: usize) -> Option<MetadataExpr> {
        let mut scanner = Scanner::new(self.source, idx + 2, end);
        scanner.skip_ws();
        let first = scanner.read_ident(true)?;
        scanner.skip_ws();
        let (item_type, name) = if scanner.peek() == b'.' {
            scanner.advance(1);
            scanner.skip_ws();
            let name = scanner.read_ident(true)?;
            scanner.skip_ws();
            (Some(first), name)
        } else {
            (None, first)
        };
        if scanner.peek() != b')' {
            return None;
        }
        Some(MetadataExpr {
            span: self.source.span(idx, scanner.pos() + 1),
            item_type,
            name,
        })
    }

    fn parse_property(
        &self,
        idx: usize,
        close: usize,
        options: ExpanderOptions,
    ) -> Result<PropertyExpr> {
        let span = self.source.span(idx, close + 1);
        let body = self.source.span(idx + 2, close);
        let text = body.text();

        if text.len() >= REGISTRY_PREFIX.len()
            && text.is_char_boundary(REGISTRY_PREFIX.len())
            && text[..REGISTRY_PREFIX.len()].eq_ignore_ascii_case(REGISTRY_PREFIX)
        {
            let key = self.source.span(idx + 2 + REGISTRY_PREFIX.len(), close);
            return Ok(PropertyExpr {
                span,
                body: PropertyBody::Registry(key),
            });
        }

        let trimmed = body.trimmed();
        if trimmed.text().starts_with('[') {
            let body = self.parse_static_chain(&span, &trimmed, options)?;
            return Ok(PropertyExpr { span, body });
        }

        if text.contains('\\') && is_legacy_registry(trimmed.text()) {
            return Ok(PropertyExpr {
                span,
                body: PropertyBody::LegacyRegistry(trimmed),
            });
        }

        if !text.contains(['.', '[', '(']) {
            if text.contains('\\') {
                return Err(span.error("The property name is not valid."));
            }
            return Ok(PropertyExpr {
                span,
                body: PropertyBody::Name(body),
            });
        }

        let mut scanner = Scanner::new(self.source, trimmed.start as usize, trimmed.end as usize);
        let name = scanner
            .read_ident(true)
            .ok_or_else(|| span.error("The property name is not valid."))?;
        let accesses = self.parse_chain(&span, &mut scanner, options)?;
        Ok(PropertyExpr {
            span,
            body: PropertyBody::Chain {
                receiver: Receiver::Property(name),
                accesses,
            },
        })
    }

    /// `[Type]::Member[(args)]` followed by an optional chain.
    fn parse_static_chain(
        &self,
        span: &Span,
        body: &Span,
        options: ExpanderOptions,
    ) -> Result<PropertyBody> {
        let invalid = |detail: &str| ExpansionError::invalid_static_syntax(span.text(), detail);

        let mut scanner = Scanner::new(self.source, body.start as usize, body.end as usize);
        let open = scanner.pos();
        let close = scanner
            .find_closing(open, b'[', b']')
            .ok_or_else(|| invalid("Missing closing bracket."))?;
        let type_name = self.source.span(open + 1, close).trimmed();
        if type_name.is_empty() {
            return Err(invalid("The type name is empty."));
        }

        scanner.set_pos(close + 1);
        scanner.skip_ws();
        if !scanner.starts_with("::") {
            return Err(invalid("Static method invocation should be of the form: $([FullTypeName]::Method())."));
        }
        let member_start = scanner.pos();
        scanner.advance(2);
        scanner.skip_ws();
        let name = scanner
            .read_ident(false)
            .ok_or_else(|| invalid("The member name is missing."))?;
        let first = self.parse_member_tail(span, &mut scanner, member_start, name, options)?;

        let mut accesses = vec![first];
        accesses.extend(self.parse_chain(span, &mut scanner, options)?);
        Ok(PropertyBody::Chain {
            receiver: Receiver::Static(type_name),
            accesses,
        })
    }

    fn parse_chain(
        &self,
        span: &Span,
        scanner: &mut Scanner,
        options: ExpanderOptions,
    ) -> Result<Vec<MemberAccess>> {
        let mut accesses = vec![];
        loop {
            scanner.skip_ws();
            if scanner.at_end() {
                break;
            }
            let start = scanner.pos();
            match scanner.peek() {
                b'.' => {
                    scanner.advance(1);
                    let name = scanner
                        .read_ident(false)
                        .ok_or_else(|| span.error("A member name is expected after '.'."))?;
                    accesses.push(self.parse_member_tail(span, scanner, start, name, options)?);
                }
                b'[' => {
                    let close = scanner
                        .find_closing(start, b'[', b']')
                        .ok_or_else(|| span.error("Missing closing bracket."))?;
                    let index = self.parse_argument(&self.source.span(start + 1, close), options)?;
                    scanner.set_pos(close + 1);
                    accesses.push(MemberAccess::Index {
                        span: self.source.span(start, close + 1),
                        index,
                    });
                }
                _ => {
                    return Err(span.error(&format!(
                        "Unexpected text \"{}\".",
                        scanner.rest().text()
                    )))
                }
            }
        }
        Ok(accesses)
    }

    fn parse_member_tail(
        &self,
        span: &Span,
        scanner: &mut Scanner,
        start: usize,
        name: Span,
        options: ExpanderOptions,
    ) -> Result<MemberAccess> {
        if scanner.peek() != b'(' {
            return Ok(MemberAccess::Property {
                span: self.source.span(start, scanner.pos()),
                name,
            });
        }
        let open = scanner.pos();
        let close = scanner
            .find_closing(open, b'(', b')')
            .ok_or_else(|| span.error("Missing closing parenthesis."))?;
        let args = self.parse_args(span, open + 1, close, options)?;
        scanner.set_pos(close + 1);
        Ok(MemberAccess::Method {
            span: self.source.span(start, close + 1),
            name,
            args,
        })
    }

    fn parse_args(
        &self,
        span: &Span,
        start: usize,
        end: usize,
        options: ExpanderOptions,
    ) -> Result<Vec<Argument>> {
        if self.source.span(start, end).trimmed().is_empty() {
            return Ok(vec![]);
        }
        let scanner = Scanner::new(self.source, start, end);
        let pieces = scanner
            .split_args(start, end)
            .ok_or_else(|| span.error("The argument list is not terminated."))?;
        pieces
            .iter()
            .map(|piece| self.parse_argument(piece, options))
            .collect()
    }

    /// Quoted text, the word `null`, or a bare expression. Item lists are
    /// not expanded inside function arguments.
    fn parse_argument(&self, piece: &Span, options: ExpanderOptions) -> Result<Argument> {
        let options = options.difference(ExpanderOptions::EXPAND_ITEMS);
        let arg = piece.trimmed();
        let (start, end) = (arg.start as usize, arg.end as usize);
        let bytes = self.source.contents().as_bytes();

        if end - start >= 2 && is_quote(bytes[start]) {
            let scanner = Scanner::new(self.source, start, end);
            if scanner.skip_quoted(start) == Some(end) {
                return Ok(Argument::Quoted(self.parse_range(start + 1, end - 1, options)?));
            }
        }
        if arg.text() == "null" {
            return Ok(Argument::Null(arg));
        }
        Ok(Argument::Bare(self.parse_range(start, end, options)?))
    }

    /// `@( ws Type (ws -> ws (quoted | Func(args)))* [ws , ws quoted] ws )`
    fn parse_item(&self, idx: usize, close: usize, options: ExpanderOptions) -> Result<ItemExpr> {
        let span = self.source.span(idx, close + 1);
        let nested = options
            .union(ExpanderOptions::EXPAND_METADATA)
            .difference(ExpanderOptions::EXPAND_ITEMS);

        let mut scanner = Scanner::new(self.source, idx + 2, close);
        scanner.skip_ws();
        let item_type = scanner
            .read_ident(true)
            .ok_or_else(|| span.error("The item type name is not valid."))?;

        let mut transforms = vec![];
        let mut separator = None;
        loop {
            scanner.skip_ws();
            if scanner.at_end() {
                break;
            }
            if scanner.starts_with("->") {
                let start = scanner.pos();
                scanner.advance(2);
                scanner.skip_ws();
                if is_quote(scanner.peek()) {
                    let open = scanner.pos();
                    let end = scanner
                        .skip_quoted(open)
                        .ok_or_else(|| span.error("The transform is not terminated."))?;
                    let pattern = self.parse_range(open + 1, end - 1, nested)?;
                    scanner.set_pos(end);
                    transforms.push(Transform::Pattern {
                        span: self.source.span(start, end),
                        pattern,
                    });
                } else {
                    let name = scanner
                        .read_ident(false)
                        .ok_or_else(|| span.error("An item function name is expected after '->'."))?;
                    scanner.skip_ws();
                    if scanner.peek() != b'(' {
                        return Err(span.error(&format!(
                            "The item function \"{}\" requires an argument list.",
                            name.text()
                        )));
                    }
                    let open = scanner.pos();
                    let end = scanner
                        .find_closing(open, b'(', b')')
                        .ok_or_else(|| span.error("Missing closing parenthesis."))?;
                    let args = self.parse_args(&span, open + 1, end, nested)?;
                    scanner.set_pos(end + 1);
                    transforms.push(Transform::Function {
                        span: self.source.span(start, end + 1),
                        name,
                        args,
                    });
                }
            } else if scanner.peek() == b',' && separator.is_none() {
                scanner.advance(1);
                scanner.skip_ws();
                if !is_quote(scanner.peek()) {
                    return Err(span.error("The separator must be a quoted string."));
                }
                let open = scanner.pos();
                let end = scanner
                    .skip_quoted(open)
                    .ok_or_else(|| span.error("The separator is not terminated."))?;
                separator = Some(self.parse_range(open + 1, end - 1, nested)?);
                scanner.set_pos(end);
            } else {
                return Err(span.error(&format!(
                    "Unexpected text \"{}\" in item list.",
                    scanner.rest().text()
                )));
            }
        }

        Ok(ItemExpr {
            span,
            item_type,
            transforms,
            separator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(text: &str, options: ExpanderOptions) -> Result<Expression> {
        let source = Source::from_contents(text);
        Parser::new(&source, options).parse()
    }

    #[test]
    fn literal_and_property_segments() -> Result<()> {
        let e = parse("a $(Foo) b", ExpanderOptions::EXPAND_ALL)?;
        assert_eq!(e.segments.len(), 3);
        match &e.segments[1] {
            Segment::Property(p) => match &p.body {
                PropertyBody::Name(n) => assert_eq!(n.text(), "Foo"),
                b => panic!("unexpected body {b:?}"),
            },
            s => panic!("unexpected segment {s:?}"),
        }
        Ok(())
    }

    #[test]
    fn unrequested_kinds_stay_literal() -> Result<()> {
        let e = parse("$(A)@(B)%(C)", ExpanderOptions::EXPAND_ITEMS)?;
        assert_eq!(e.segments.len(), 3);
        assert!(matches!(e.segments[1], Segment::Item(_)));
        assert!(parse("$(A)", ExpanderOptions::INVALID)?.is_literal());
        Ok(())
    }

    #[test]
    fn static_chain() -> Result<()> {
        let e = parse(
            "$([System.String]::Concat('a', $(B), null).Substring(1)[0])",
            ExpanderOptions::EXPAND_PROPERTIES,
        )?;
        let Some(p) = e.single_property() else {
            panic!("expected a property");
        };
        match &p.body {
            PropertyBody::Chain {
                receiver: Receiver::Static(t),
                accesses,
            } => {
                assert_eq!(t.text(), "System.String");
                assert_eq!(accesses.len(), 3);
                match &accesses[0] {
                    MemberAccess::Method { name, args, .. } => {
                        assert_eq!(name.text(), "Concat");
                        assert!(matches!(args[0], Argument::Quoted(_)));
                        assert!(matches!(args[1], Argument::Bare(_)));
                        assert!(matches!(args[2], Argument::Null(_)));
                    }
                    a => panic!("unexpected access {a:?}"),
                }
                assert!(matches!(accesses[2], MemberAccess::Index { .. }));
            }
            b => panic!("unexpected body {b:?}"),
        }
        Ok(())
    }

    #[test]
    fn item_transforms_and_separator() -> Result<()> {
        let e = parse(
            "@( Compile -> '%(Filename).obj' ->Distinct(), '|' )",
            ExpanderOptions::EXPAND_ITEMS,
        )?;
        let Some(item) = e.single_item() else {
            panic!("expected an item list");
        };
        assert_eq!(item.item_type.text(), "Compile");
        assert_eq!(item.transforms.len(), 2);
        match &item.transforms[0] {
            Transform::Pattern { pattern, .. } => {
                assert!(matches!(pattern.segments[0], Segment::Metadata(_)))
            }
            t => panic!("unexpected transform {t:?}"),
        }
        assert!(item.separator.is_some());
        Ok(())
    }

    #[test]
    fn metadata_inside_item_list_is_left_for_transforms() -> Result<()> {
        let e = parse("%(A) @(X->'%(B)')", ExpanderOptions::EXPAND_METADATA)?;
        let metadata = e
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Metadata(_)))
            .count();
        assert_eq!(metadata, 1);
        Ok(())
    }

    #[test]
    fn malformed_references() {
        let err = parse("$(Foo", ExpanderOptions::EXPAND_PROPERTIES).err();
        assert_eq!(err.map(|e| e.kind), Some(ErrorKind::Syntax));
        assert!(parse("@(Foo->)", ExpanderOptions::EXPAND_ITEMS).is_err());
        let err = parse("$([System.String]Concat())", ExpanderOptions::EXPAND_PROPERTIES).err();
        assert_eq!(err.map(|e| e.code), Some(crate::error::codes::INVALID_STATIC_SYNTAX));
        // An incomplete metadata reference is plain text.
        assert!(parse("%(Foo", ExpanderOptions::EXPAND_METADATA)
            .map(|e| e.is_literal())
            .unwrap_or(false));
    }

    #[test]
    fn legacy_registry_and_untrimmed_names() -> Result<()> {
        let e = parse(r"$(HKLM\Software\Foo@Bar)", ExpanderOptions::EXPAND_PROPERTIES)?;
        assert!(matches!(
            e.single_property().map(|p| &p.body),
            Some(PropertyBody::LegacyRegistry(_))
        ));
        let e = parse("$( Foo )", ExpanderOptions::EXPAND_PROPERTIES)?;
        match e.single_property().map(|p| &p.body) {
            Some(PropertyBody::Name(n)) => assert_eq!(n.text(), " Foo "),
            b => panic!("unexpected body {b:?}"),
        }
        Ok(())
    }
}
