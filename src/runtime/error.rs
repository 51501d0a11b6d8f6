//! Evaluation error types with global logging integration
//!
//! Hard failures only: undefined variables and missing attributes are
//! soft failures that resolve to null and never reach this type.

use crate::lexical::LexerError;
use crate::logging::{codes, Code};
use crate::syntax::error::ParseError;
use crate::utils::Span;

pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that abort the current render
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("Division by zero at {span}")]
    DivisionByZero { span: Span },

    #[error("Unknown filter '{name}' at {span}")]
    UnknownFilter { name: String, span: Span },

    #[error("Unknown function '{name}' at {span}")]
    UnknownFunction { name: String, span: Span },

    #[error("Unknown test '{name}' at {span}")]
    UnknownTest { name: String, span: Span },

    #[error("Unknown macro '{name}' at {span}")]
    UnknownMacro { name: String, span: Span },

    #[error("Sandbox policy denies '{name}' at {span}")]
    SandboxViolation { name: String, span: Span },

    #[error("Invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    #[error("Type mismatch: {message} at {span}")]
    TypeMismatch { message: String, span: Span },

    #[error("Include depth exceeds maximum of {limit}")]
    MaxIncludeDepth { limit: usize },

    #[error("Template '{name}' not found: {message}")]
    TemplateNotFound { name: String, message: String },

    /// Tokenization failure in an included or extended template
    #[error("In included template: {0}")]
    Lex(#[from] LexerError),

    /// Parse failure in an included or extended template
    #[error("In included template: {0}")]
    Parse(#[from] ParseError),

    #[error("Attribute cache unavailable: lock poisoned")]
    CachePoisoned,
}

impl RenderError {
    pub fn type_mismatch(message: &str, span: Span) -> Self {
        Self::TypeMismatch {
            message: message.to_string(),
            span,
        }
    }

    pub fn unknown_filter(name: &str, span: Span) -> Self {
        Self::UnknownFilter {
            name: name.to_string(),
            span,
        }
    }

    pub fn unknown_function(name: &str, span: Span) -> Self {
        Self::UnknownFunction {
            name: name.to_string(),
            span,
        }
    }

    pub fn unknown_test(name: &str, span: Span) -> Self {
        Self::UnknownTest {
            name: name.to_string(),
            span,
        }
    }

    pub fn sandbox_violation(name: &str, span: Span) -> Self {
        Self::SandboxViolation {
            name: name.to_string(),
            span,
        }
    }

    pub fn invalid_range(message: &str) -> Self {
        Self::InvalidRange {
            message: message.to_string(),
        }
    }

    pub fn template_not_found(name: &str, message: &str) -> Self {
        Self::TemplateNotFound {
            name: name.to_string(),
            message: message.to_string(),
        }
    }

    /// Get error code for the global logging system
    pub fn error_code(&self) -> Code {
        match self {
            Self::DivisionByZero { .. } => codes::render::DIVISION_BY_ZERO,
            Self::UnknownFilter { .. } => codes::render::UNKNOWN_FILTER,
            Self::UnknownFunction { .. } => codes::render::UNKNOWN_FUNCTION,
            Self::UnknownTest { .. } => codes::render::UNKNOWN_TEST,
            Self::UnknownMacro { .. } => codes::render::UNKNOWN_MACRO,
            Self::SandboxViolation { .. } => codes::render::SANDBOX_VIOLATION,
            Self::InvalidRegex { .. } => codes::render::INVALID_REGEX,
            Self::InvalidRange { .. } => codes::render::INVALID_RANGE,
            Self::TypeMismatch { .. } => codes::render::TYPE_MISMATCH,
            Self::MaxIncludeDepth { .. } => codes::render::MAX_INCLUDE_DEPTH,
            Self::TemplateNotFound { .. } => codes::render::TEMPLATE_NOT_FOUND,
            Self::Lex(inner) => inner.error_code(),
            Self::Parse(inner) => inner.error_code(),
            Self::CachePoisoned => codes::cache::CACHE_POISONED,
        }
    }

    /// Span of the failing expression, when known
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::DivisionByZero { span }
            | Self::UnknownFilter { span, .. }
            | Self::UnknownFunction { span, .. }
            | Self::UnknownTest { span, .. }
            | Self::UnknownMacro { span, .. }
            | Self::SandboxViolation { span, .. }
            | Self::TypeMismatch { span, .. } => Some(*span),
            Self::Parse(inner) => inner.span(),
            _ => None,
        }
    }
}
