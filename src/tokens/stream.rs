//! Span-accurate token stream management for the parser
//!
//! Maintains precise source locations so parse errors can point at the
//! exact tag and column that caused them.

use crate::tokens::token::{SpannedToken, Token};
use crate::utils::{SourceMap, Span};

/// Cursor over a tokenized template
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<SpannedToken>,
    /// Current position in tokens
    position: usize,
    /// Source map for error reporting
    source_map: Option<SourceMap>,
}

impl TokenStream {
    /// Create a new token stream
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            position: 0,
            source_map: None,
        }
    }

    /// Create stream with source map for enhanced error reporting
    pub fn with_source_map(tokens: Vec<SpannedToken>, source_map: SourceMap) -> Self {
        Self {
            tokens,
            position: 0,
            source_map: Some(source_map),
        }
    }

    // === CORE NAVIGATION ===

    /// Get the current token with its span
    pub fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.position)
    }

    /// Get the current token value (without span)
    pub fn current_token(&self) -> Option<&Token> {
        self.current().map(|spanned| &spanned.token)
    }

    /// Get the span of the current token
    pub fn current_span(&self) -> Option<Span> {
        self.current().map(|spanned| spanned.span)
    }

    /// Peek at the next token without advancing
    pub fn peek(&self) -> Option<&SpannedToken> {
        self.peek_ahead(1)
    }

    /// Peek ahead by n positions
    pub fn peek_ahead(&self, n: usize) -> Option<&SpannedToken> {
        self.tokens.get(self.position + n)
    }

    /// Advance to the next token
    pub fn advance(&mut self) -> Option<&SpannedToken> {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        self.current()
    }

    /// Check if we're at the end of the stream
    pub fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Some(Token::Eof) | None)
    }

    /// Get the number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if the stream has no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Consume the stream, recovering the token vector for pooling
    pub fn into_tokens(self) -> Vec<SpannedToken> {
        self.tokens
    }

    /// Get the current position (for checkpointing)
    pub fn position(&self) -> usize {
        self.position
    }

    /// Restore a previously saved position
    pub fn restore(&mut self, position: usize) {
        self.position = position.min(self.tokens.len());
    }

    // === SPAN ACCURACY METHODS ===

    /// Get span at a specific token position
    pub fn span_at_position(&self, position: usize) -> Option<Span> {
        self.tokens.get(position).map(|spanned| spanned.span)
    }

    /// Get span covering from a start position to the current position
    pub fn span_from(&self, start_position: usize) -> Span {
        match (self.span_at_position(start_position), self.current_span()) {
            (Some(start), Some(current)) => start.merge(current),
            (Some(start), None) => start,
            (None, Some(current)) => current,
            (None, None) => Span::dummy(),
        }
    }

    // === ERROR REPORTING ===

    /// Format an error at the current position with source context
    pub fn format_error_at_current(&self, message: &str) -> String {
        let line = self
            .current_span()
            .map(|span| span.start.line)
            .unwrap_or(1);

        match &self.source_map {
            Some(map) => map.format_error(line, message),
            None => format!("Error: {} (line {})", message, line),
        }
    }

    /// Access the source map, if one was attached
    pub fn source_map(&self) -> Option<&SourceMap> {
        self.source_map.as_ref()
    }
}
