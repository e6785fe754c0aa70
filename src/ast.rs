// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;
use crate::Rc;

use core::{cmp, fmt, ops::Deref};

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

/// A parsed piece of text: literal runs interleaved with references.
#[derive(Debug)]
pub struct Expression {
    pub span: Span,
    pub segments: Vec<Segment>,
}

impl Expression {
    /// True if the text contains no reference that needs evaluating.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The single property reference this expression consists of, if any.
    pub fn single_property(&self) -> Option<&Ref<PropertyExpr>> {
        match self.segments.as_slice() {
            [Segment::Property(p)] => Some(p),
            _ => None,
        }
    }

    /// The single item reference this expression consists of, if any.
    pub fn single_item(&self) -> Option<&Ref<ItemExpr>> {
        match self.segments.as_slice() {
            [Segment::Item(i)] => Some(i),
            _ => None,
        }
    }

    pub fn has_items(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Item(_)))
    }
}

#[derive(Debug)]
pub enum Segment {
    /// Text copied through verbatim (still in escaped form).
    Literal(Span),
    Property(Ref<PropertyExpr>),
    Item(Ref<ItemExpr>),
    Metadata(Ref<MetadataExpr>),
}

impl Segment {
    pub fn span(&self) -> &Span {
        match self {
            Segment::Literal(span) => span,
            Segment::Property(p) => &p.span,
            Segment::Item(i) => &i.span,
            Segment::Metadata(m) => &m.span,
        }
    }
}

/// `$( ... )`
#[derive(Debug)]
pub struct PropertyExpr {
    pub span: Span,
    pub body: PropertyBody,
}

#[derive(Debug)]
pub enum PropertyBody {
    /// `$(Name)`. The name is looked up exactly as written.
    Name(Span),
    /// `$(Registry:Key[@Value])`
    Registry(Span),
    /// A bare hive-rooted path such as `$(HKEY_LOCAL_MACHINE\Software\X)`.
    LegacyRegistry(Span),
    /// A property or static type followed by member accesses.
    Chain {
        receiver: Receiver,
        accesses: Vec<MemberAccess>,
    },
}

#[derive(Debug)]
pub enum Receiver {
    /// `Name` in `$(Name.Member...)`
    Property(Span),
    /// `Type` in `$([Type]::Member...)`
    Static(Span),
}

#[derive(Debug)]
pub enum MemberAccess {
    /// `.Name(args)` or `::Name(args)`
    Method {
        span: Span,
        name: Span,
        args: Vec<Argument>,
    },
    /// `.Name` or `::Name` without an argument list.
    Property { span: Span, name: Span },
    /// `[index]`
    Index { span: Span, index: Argument },
}

impl MemberAccess {
    pub fn span(&self) -> &Span {
        match self {
            MemberAccess::Method { span, .. }
            | MemberAccess::Property { span, .. }
            | MemberAccess::Index { span, .. } => span,
        }
    }
}

#[derive(Debug)]
pub enum Argument {
    /// The literal word `null`.
    Null(Span),
    /// A quoted argument; always evaluates to a string.
    Quoted(Expression),
    /// An unquoted argument; a lone property function keeps its type.
    Bare(Expression),
}

impl Argument {
    pub fn span(&self) -> &Span {
        match self {
            Argument::Null(span) => span,
            Argument::Quoted(e) | Argument::Bare(e) => &e.span,
        }
    }
}

/// `@(Type->Transform...->Transform, 'separator')`
#[derive(Debug)]
pub struct ItemExpr {
    pub span: Span,
    pub item_type: Span,
    pub transforms: Vec<Transform>,
    pub separator: Option<Expression>,
}

#[derive(Debug)]
pub enum Transform {
    /// `->'%(Filename).obj'`
    Pattern { span: Span, pattern: Expression },
    /// `->Function(args)`
    Function {
        span: Span,
        name: Span,
        args: Vec<Argument>,
    },
}

impl Transform {
    pub fn span(&self) -> &Span {
        match self {
            Transform::Pattern { span, .. } | Transform::Function { span, .. } => span,
        }
    }
}

/// `%(Name)` or `%(Type.Name)`
#[derive(Debug)]
pub struct MetadataExpr {
    pub span: Span,
    pub item_type: Option<Span>,
    pub name: Span,
}
