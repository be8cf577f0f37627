//! Error types for parsing, validation, argument coercion and execution.

use crate::span::{render_diagnostic, Span};
use thiserror::Error;

/// Error during lexing/parsing.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        let mut out = render_diagnostic(source, &format!("error: {}", self.message), self.span);
        if let Some(hint) = &self.hint {
            out.push_str(&format!("   = hint: {}\n", hint));
        }
        out
    }
}

/// The validation rule a [`ValidationError`] was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// The document has no executable operation.
    ExecutableDefinitions,
    /// An anonymous operation is mixed with other operations.
    LoneAnonymousOperation,
    /// Two operations share a name.
    UniqueOperationNames,
    /// The operation type is not declared by the schema.
    SupportedOperationType,
    /// A subscription selects more than one root field.
    SingleRootField,
    /// A selected field does not exist on its parent type.
    KnownFields,
    /// An argument is not declared on its field.
    KnownArguments,
    /// A required argument is missing.
    RequiredArguments,
    /// An argument literal does not fit its declared type.
    ArgumentTypes,
    /// A variable is used without being defined.
    DefinedVariables,
    /// A variable is defined and never used.
    UsedVariables,
    /// Leaf fields must not have selections, object fields must.
    LeafSelections,
}

/// A rule violation found while validating a document against a schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub span: Span,
    pub rule: ValidationRule,
}

impl ValidationError {
    pub fn new(rule: ValidationRule, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            rule,
        }
    }

    /// Format the error with source context.
    pub fn format_with_source(&self, source: &str) -> String {
        render_diagnostic(
            source,
            &format!("error[{:?}]: {}", self.rule, self.message),
            self.span,
        )
    }
}

/// An input value that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CoercionError {
    pub message: String,
}

impl CoercionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn expected(ty: impl std::fmt::Display, got: &serde_json::Value) -> Self {
        Self::new(format!("expected {}, got {}", ty, got))
    }
}

/// An error that aborts execution before any field is resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("document does not contain an operation")]
    NoOperation,

    #[error("unknown operation named '{0}'")]
    UnknownOperation(String),

    #[error("must provide an operation name when the document contains multiple operations")]
    AmbiguousOperation,

    #[error("schema does not support {0} operations")]
    UnsupportedOperation(String),

    #[error("unknown subscription field '{0}'")]
    UnknownField(String),

    #[error("invalid variable values: {0}")]
    InvalidVariables(String),
}

/// A combined error type for the public API.
#[derive(Debug, Clone, Error)]
pub enum LangError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid value: {0}")]
    Coercion(#[from] CoercionError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl LangError {
    /// Format the error with source context when it carries a span.
    pub fn format_with_source(&self, source: &str) -> String {
        match self {
            LangError::Parse(e) => e.format_with_source(source),
            other => format!("error: {}\n", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_formatting() {
        let source = "subscription { commentAdded(repoId 42) }";
        let err = ParseError::new("expected ':', found integer 42", Span::new(35, 37))
            .with_hint("arguments are written as name: value");

        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1:36"));
        assert!(formatted.contains("expected ':'"));
        assert!(formatted.contains("hint: arguments are written"));
    }

    #[test]
    fn test_validation_error_names_rule() {
        let source = "subscription { a b }";
        let err = ValidationError::new(
            ValidationRule::SingleRootField,
            "subscription must select only one top level field",
            Span::new(17, 18),
        );
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("SingleRootField"));
        assert!(formatted.contains("line 1:18"));
    }

    #[test]
    fn test_lang_error_display() {
        let err = LangError::from(ExecutionError::UnknownOperation("Missing".to_string()));
        assert_eq!(
            err.to_string(),
            "execution error: unknown operation named 'Missing'"
        );
    }
}
