// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

/// Stable diagnostic codes attached to every [`ExpansionError`].
pub mod codes {
    /// The property expression (or a property function) cannot be evaluated.
    pub const INVALID_PROPERTY_FUNCTION: &str = "MSB4184";
    /// The function exists but is not available as a property function.
    pub const FUNCTION_UNAVAILABLE: &str = "MSB4185";
    /// Malformed `[Type]::Member(...)` syntax.
    pub const INVALID_STATIC_SYNTAX: &str = "MSB4186";
    /// The static type could not be found.
    pub const TYPE_NOT_FOUND: &str = "MSB4212";
    /// An item function could not be evaluated.
    pub const INVALID_ITEM_FUNCTION: &str = "MSB4198";
    /// Built-in item metadata could not be computed.
    pub const CANNOT_EVALUATE_METADATA: &str = "MSB4023";
    /// An item list was concatenated with other text in an item context.
    pub const EMBEDDED_ITEM_LIST: &str = "MSB4012";
}

/// Coarse classification of a failed expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed reference: unbalanced parentheses or brackets, dangling
    /// operators, bad quoting.
    Syntax,
    /// Unknown type or member, disallowed function, wrong argument count or
    /// an argument that cannot be converted to the parameter type.
    UnresolvedReference,
    /// A function was called with a value it cannot accept (invalid path,
    /// out of range index, division by zero...).
    InvalidOperand,
}

/// Caller supplied location of the text being expanded. The engine only
/// forwards it into diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (0, _) => write!(f, "{}", self.file),
            (line, 0) => write!(f, "{}({line})", self.file),
            (line, column) => write!(f, "{}({line},{column})", self.file),
        }
    }
}

fn location_prefix(location: &Option<ElementLocation>) -> String {
    match location {
        Some(location) => format!("{location}: "),
        None => String::new(),
    }
}

/// The single error produced by a failed expansion call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}error {code}: {message}", location_prefix(.location))]
pub struct ExpansionError {
    pub kind: ErrorKind,
    pub code: &'static str,
    /// The sub-expression that failed, as written.
    pub expression: String,
    pub message: String,
    pub location: Option<ElementLocation>,
}

impl ExpansionError {
    pub fn new(
        kind: ErrorKind,
        code: &'static str,
        expression: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            expression: expression.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn syntax(expression: &str, detail: &str) -> Self {
        Self::new(
            ErrorKind::Syntax,
            codes::INVALID_PROPERTY_FUNCTION,
            expression,
            format!("The expression \"{expression}\" cannot be evaluated. {detail}"),
        )
    }

    pub fn invalid_static_syntax(expression: &str, detail: &str) -> Self {
        Self::new(
            ErrorKind::Syntax,
            codes::INVALID_STATIC_SYNTAX,
            expression,
            format!("Invalid static method invocation syntax: \"{expression}\". {detail}"),
        )
    }

    /// Attach a location unless one is already present.
    pub fn with_location(mut self, location: Option<&ElementLocation>) -> Self {
        if self.location.is_none() {
            self.location = location.cloned();
        }
        self
    }
}

/// Argument could not be converted to the type a function expects.
///
/// Raised by the argument coercion helpers of the builtins; the interpreter
/// reports it as [`ErrorKind::UnresolvedReference`] since no overload of the
/// function accepts the supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{function}` expects {expected} for argument {index}. Got `{actual}` instead.")]
pub struct ArgumentMismatch {
    pub function: String,
    pub index: usize,
    pub expected: &'static str,
    pub actual: String,
}

pub type Result<T> = core::result::Result<T, ExpansionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_code() {
        let err = ExpansionError::syntax("$(Foo", "Missing closing parenthesis.").with_location(
            Some(&ElementLocation {
                file: "proj.proj".to_string(),
                line: 3,
                column: 7,
            }),
        );
        assert_eq!(
            err.to_string(),
            "proj.proj(3,7): error MSB4184: The expression \"$(Foo\" cannot be evaluated. Missing closing parenthesis."
        );
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
