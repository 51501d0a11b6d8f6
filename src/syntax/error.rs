//! Parser error types with global logging integration
//!
//! Every error carries the offending span and an expectation message so
//! callers can point at the exact tag that failed.

use crate::logging::{codes, Code};
use crate::utils::Span;

pub type ParseResult<T> = Result<T, ParseError>;

/// Token-to-AST transformation errors with proper error code mapping
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of template: expected {expected}")]
    UnexpectedEndOfInput { expected: String },

    #[error("Unclosed '{tag}' block starting at {span}")]
    UnclosedBlock { tag: String, span: Span },

    #[error("Duplicate else branch at {span}")]
    DuplicateElse { span: Span },

    #[error("'elseif' not allowed after 'else' at {span}")]
    ElseifAfterElse { span: Span },

    #[error("Unknown tag '{name}' at {span}")]
    UnknownTag { name: String, span: Span },

    #[error("Maximum expression nesting depth exceeded at {span}")]
    MaxRecursionDepth { span: Span },

    #[error("Malformed expression: {message} at {span}")]
    MalformedExpression { message: String, span: Span },

    #[error("Missing EOF token in token stream")]
    MissingEof,
}

impl ParseError {
    /// Create unexpected token error
    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        Self::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            span,
        }
    }

    /// Create unexpected end of input error
    pub fn unexpected_end_of_input(expected: &str) -> Self {
        Self::UnexpectedEndOfInput {
            expected: expected.to_string(),
        }
    }

    /// Create unclosed block error
    pub fn unclosed_block(tag: &str, span: Span) -> Self {
        Self::UnclosedBlock {
            tag: tag.to_string(),
            span,
        }
    }

    /// Create unknown tag error
    pub fn unknown_tag(name: &str, span: Span) -> Self {
        Self::UnknownTag {
            name: name.to_string(),
            span,
        }
    }

    /// Create malformed expression error
    pub fn malformed_expression(message: &str, span: Span) -> Self {
        Self::MalformedExpression {
            message: message.to_string(),
            span,
        }
    }

    /// Get error code for the global logging system
    pub fn error_code(&self) -> Code {
        match self {
            Self::UnexpectedToken { .. } => codes::syntax::UNEXPECTED_TOKEN,
            Self::UnexpectedEndOfInput { .. } => codes::syntax::UNEXPECTED_TOKEN,
            Self::UnclosedBlock { .. } => codes::syntax::UNCLOSED_BLOCK,
            Self::DuplicateElse { .. } => codes::syntax::DUPLICATE_ELSE,
            Self::ElseifAfterElse { .. } => codes::syntax::ELSEIF_AFTER_ELSE,
            Self::UnknownTag { .. } => codes::syntax::UNKNOWN_TAG,
            Self::MaxRecursionDepth { .. } => codes::syntax::MAX_RECURSION_DEPTH,
            Self::MalformedExpression { .. } => codes::syntax::MALFORMED_EXPRESSION,
            Self::MissingEof => codes::syntax::MISSING_EOF,
        }
    }

    /// Span of the offending token, when known
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. }
            | Self::UnclosedBlock { span, .. }
            | Self::DuplicateElse { span }
            | Self::ElseifAfterElse { span }
            | Self::UnknownTag { span, .. }
            | Self::MaxRecursionDepth { span }
            | Self::MalformedExpression { span, .. } => Some(*span),
            Self::UnexpectedEndOfInput { .. } | Self::MissingEof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let error = ParseError::unexpected_token("expression", "'%}'", Span::dummy());
        assert_eq!(error.error_code().as_str(), "E040");

        let error = ParseError::unclosed_block("if", Span::dummy());
        assert_eq!(error.error_code().as_str(), "E041");

        assert_eq!(ParseError::MissingEof.error_code().as_str(), "E045");
    }

    #[test]
    fn test_error_messages_carry_expectation() {
        let error = ParseError::unexpected_token("'endif'", "end of template", Span::dummy());
        let message = error.to_string();
        assert!(message.contains("endif"));
        assert!(message.contains("end of template"));
    }
}
