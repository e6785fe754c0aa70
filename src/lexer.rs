// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::ExpansionError;
use crate::Rc;

use core::cmp;
use core::fmt::{self, Debug, Formatter};

#[derive(Clone)]
struct SourceInternal {
    pub contents: String,
}

/// Expression text shared by every span parsed out of it.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl cmp::PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.src, &other.src)
    }
}

impl cmp::Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.contents.fmt(f)
    }
}

impl Source {
    pub fn from_contents(contents: impl Into<String>) -> Source {
        Self {
            src: Rc::new(SourceInternal {
                contents: contents.into(),
            }),
        }
    }

    pub fn contents(&self) -> &str {
        &self.src.contents
    }

    pub fn len(&self) -> usize {
        self.src.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.contents.is_empty()
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        Span {
            source: self.clone(),
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn full_span(&self) -> Span {
        self.span(0, self.len())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    pub source: Source,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn trimmed(&self) -> Span {
        let text = self.text();
        let leading = text.len() - text.trim_start().len();
        let trailing = text.len() - text.trim_end().len();
        let start = self.start as usize + leading;
        let end = cmp::max(start, self.end as usize - trailing);
        self.source.span(start, end)
    }

    /// Syntax error reported against this span's text.
    pub fn error(&self, msg: &str) -> ExpansionError {
        ExpansionError::syntax(self.text(), msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = if t.len() > max {
            (&t[0..max], "...")
        } else {
            (t.as_str(), "")
        };

        f.write_fmt(format_args!(
            "{}:{}, \"{}{}\"",
            self.start, self.end, txt, trailer
        ))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(self.text())
    }
}

pub fn is_quote(ch: u8) -> bool {
    matches!(ch, b'\'' | b'`' | b'"')
}

/// Byte level cursor over a range of a [`Source`].
///
/// Every delimiter of the expression language is ASCII, so positions only
/// ever land on char boundaries.
#[derive(Clone)]
pub struct Scanner<'source> {
    source: &'source Source,
    pos: usize,
    end: usize,
}

impl<'source> Scanner<'source> {
    pub fn new(source: &'source Source, start: usize, end: usize) -> Self {
        Self {
            source,
            pos: start,
            end,
        }
    }

    fn bytes(&self) -> &'source [u8] {
        self.source.contents().as_bytes()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = cmp::min(pos, self.end);
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    pub fn peek(&self) -> u8 {
        self.peekahead(0)
    }

    pub fn peekahead(&self, n: usize) -> u8 {
        match self.pos + n {
            idx if idx < self.end => self.bytes()[idx],
            _ => 0,
        }
    }

    pub fn advance(&mut self, n: usize) {
        self.set_pos(self.pos + n);
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.bytes()[self.pos..self.end].starts_with(s.as_bytes())
    }

    pub fn skip_ws(&mut self) {
        while self.peek().is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        self.source.span(start, end)
    }

    pub fn rest(&self) -> Span {
        self.span(self.pos, self.end)
    }

    /// Read `[A-Za-z_][A-Za-z0-9_]*`, also accepting `-` after the first
    /// character when `allow_dash` is set.
    ///
    /// The span returned is always non-empty.
    pub fn read_ident(&mut self, allow_dash: bool) -> Option<Span> {
        let start = self.pos;
        let first = self.peek();
        if !(first.is_ascii_alphabetic() || first == b'_') {
            return None;
        }
        self.pos += 1;
        loop {
            let ch = self.peek();
            // `-` followed by `>` starts a transform.
            let dash = allow_dash && ch == b'-' && self.peekahead(1) != b'>';
            if ch.is_ascii_alphanumeric() || ch == b'_' || dash {
                self.pos += 1;
            } else {
                break;
            }
        }
        Some(self.span(start, self.pos))
    }

    /// Position just past the quote closing the one at the cursor.
    pub fn skip_quoted(&self, open_idx: usize) -> Option<usize> {
        let bytes = self.bytes();
        let quote = bytes[open_idx];
        (open_idx + 1..self.end)
            .find(|idx| bytes[*idx] == quote)
            .map(|idx| idx + 1)
    }

    /// Index of the `close` byte matching the `open` byte at `open_idx`.
    ///
    /// Nested pairs are counted and quoted runs are skipped.
    pub fn find_closing(&self, open_idx: usize, open: u8, close: u8) -> Option<usize> {
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut idx = open_idx;
        while idx < self.end {
            let ch = bytes[idx];
            if is_quote(ch) {
                idx = self.skip_quoted(idx)?;
                continue;
            }
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            idx += 1;
        }
        None
    }

    /// Split `start..end` on commas that are outside quotes, parentheses
    /// and brackets.
    pub fn split_args(&self, start: usize, end: usize) -> Option<Vec<Span>> {
        let bytes = self.bytes();
        let inner = Scanner::new(self.source, start, end);
        let mut pieces = vec![];
        let mut piece_start = start;
        let mut idx = start;
        while idx < end {
            match bytes[idx] {
                ch if is_quote(ch) => {
                    idx = inner.skip_quoted(idx)?;
                    continue;
                }
                b'(' => idx = inner.find_closing(idx, b'(', b')')?,
                b'[' => idx = inner.find_closing(idx, b'[', b']')?,
                b',' => {
                    pieces.push(self.span(piece_start, idx));
                    piece_start = idx + 1;
                }
                _ => (),
            }
            idx += 1;
        }
        pieces.push(self.span(piece_start, end));
        Some(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_paren_skips_quotes_and_nesting() {
        let source = Source::from_contents("$(a.b(')', (c)) )x");
        let scanner = Scanner::new(&source, 0, source.len());
        assert_eq!(scanner.find_closing(1, b'(', b')'), Some(16));
    }

    #[test]
    fn unterminated_quote_has_no_close() {
        let source = Source::from_contents("(a, 'b)");
        let scanner = Scanner::new(&source, 0, source.len());
        assert_eq!(scanner.find_closing(0, b'(', b')'), None);
    }

    #[test]
    fn split_on_top_level_commas() {
        let source = Source::from_contents("'a,b', f(1, 2), [x,y],");
        let scanner = Scanner::new(&source, 0, source.len());
        let pieces: Vec<String> = scanner
            .split_args(0, source.len())
            .unwrap_or_default()
            .iter()
            .map(|s| s.text().to_string())
            .collect();
        assert_eq!(pieces, vec!["'a,b'", " f(1, 2)", " [x,y]", ""]);
    }

    #[test]
    fn trimmed_span() {
        let source = Source::from_contents("  Foo  ");
        assert_eq!(source.full_span().trimmed().text(), "Foo");
        let blank = Source::from_contents("   ");
        assert_eq!(blank.full_span().trimmed().text(), "");
    }
}
