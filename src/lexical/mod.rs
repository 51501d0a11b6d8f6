//! Lexical analysis for template source
//!
//! [`scanner`] splits template source into text, tags, and comments;
//! [`expression`] is the single expression tokenizer that every tag body
//! funnels into.

pub mod expression;
pub mod scanner;

pub use scanner::Scanner;

use crate::logging::codes;

pub type LexerResult<T> = Result<T, LexerError>;

/// Tokenization errors with proper error code mapping
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexerError {
    #[error("Invalid character '{character}' in tag at line {line}")]
    InvalidCharacter { character: char, line: u32 },

    #[error("Unterminated string literal at line {line}")]
    UnterminatedString { line: u32 },

    #[error("Invalid number literal '{literal}' at line {line}")]
    InvalidNumber { literal: String, line: u32 },

    #[error("Unclosed tag starting at line {line}")]
    UnclosedTag { line: u32 },

    #[error("Unclosed comment starting at line {line}")]
    UnclosedComment { line: u32 },

    #[error("Template source too large: {size} bytes")]
    SourceTooLarge { size: usize },

    #[error("Too many tokens: {count}")]
    TooManyTokens { count: usize },

    #[error("String literal too large: {length} bytes at line {line}")]
    StringTooLarge { length: usize, line: u32 },
}

impl LexerError {
    /// Get error code for the global logging system
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LexerError::InvalidCharacter { .. } => codes::lexical::INVALID_CHARACTER,
            LexerError::UnterminatedString { .. } => codes::lexical::UNTERMINATED_STRING,
            LexerError::InvalidNumber { .. } => codes::lexical::INVALID_NUMBER,
            LexerError::UnclosedTag { .. } => codes::lexical::UNCLOSED_TAG,
            LexerError::UnclosedComment { .. } => codes::lexical::UNCLOSED_COMMENT,
            LexerError::SourceTooLarge { .. } => codes::lexical::SOURCE_TOO_LARGE,
            LexerError::TooManyTokens { .. } => codes::lexical::TOO_MANY_TOKENS,
            LexerError::StringTooLarge { .. } => codes::lexical::STRING_TOO_LARGE,
        }
    }

    /// The source line the error refers to, when known
    pub fn line(&self) -> Option<u32> {
        match self {
            LexerError::InvalidCharacter { line, .. }
            | LexerError::UnterminatedString { line }
            | LexerError::InvalidNumber { line, .. }
            | LexerError::UnclosedTag { line }
            | LexerError::UnclosedComment { line }
            | LexerError::StringTooLarge { line, .. } => Some(*line),
            LexerError::SourceTooLarge { .. } | LexerError::TooManyTokens { .. } => None,
        }
    }
}
