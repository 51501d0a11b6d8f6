//! Template scanner with tag recognition and whitespace control
//!
//! Splits source text into literal text, variable tags, block tags, and
//! comments. Block-tag bodies are cut apart by specialized per-tag
//! splitters (`for`, `set`, `include`) that reproduce the documented
//! splitting rules exactly; every piece of expression text then funnels
//! into [`super::expression::tokenize_expr_into`].

use crate::config::constants::lexical::{MAX_SOURCE_SIZE, MAX_TOKEN_COUNT};
use crate::lexical::expression::tokenize_expr_into;
use crate::lexical::{LexerError, LexerResult};
use crate::tokens::{SpannedToken, Token};
use crate::utils::{Position, Span};
use crate::{log_debug, log_error, log_success};

/// Tokenize template source into a fresh token vector
pub fn tokenize(source: &str) -> LexerResult<Vec<SpannedToken>> {
    let mut tokens = Vec::new();
    tokenize_into(source, &mut tokens)?;
    Ok(tokens)
}

/// Tokenize template source into a caller-supplied (typically pooled) vector
pub fn tokenize_into(source: &str, tokens: &mut Vec<SpannedToken>) -> LexerResult<()> {
    let mut scanner = Scanner::new(source, tokens);
    match scanner.run() {
        Ok(()) => {
            log_success!(
                crate::logging::codes::success::TOKENIZATION_COMPLETE,
                "Template tokenized",
                "tokens" => tokens.len(),
                "source_bytes" => source.len()
            );
            Ok(())
        }
        Err(error) => {
            log_error!(error.error_code(), &error.to_string(),
                "source_bytes" => source.len()
            );
            Err(error)
        }
    }
}

/// Core template scanner
pub struct Scanner<'src, 'out> {
    source: &'src str,
    pos: Position,
    tokens: &'out mut Vec<SpannedToken>,
    /// A closing `-}}`/`-%}`/`-#}` requested trimming of the following text
    pending_trim: bool,
}

impl<'src, 'out> Scanner<'src, 'out> {
    pub fn new(source: &'src str, tokens: &'out mut Vec<SpannedToken>) -> Self {
        Self {
            source,
            pos: Position::start(),
            tokens,
            pending_trim: false,
        }
    }

    fn run(&mut self) -> LexerResult<()> {
        if self.source.len() > MAX_SOURCE_SIZE {
            return Err(LexerError::SourceTooLarge {
                size: self.source.len(),
            });
        }

        log_debug!("Starting tokenization",
            "source_bytes" => self.source.len(),
            "max_tokens_allowed" => MAX_TOKEN_COUNT
        );

        // Literal text accumulates here across escaped openers; spans for
        // the emitted Text token cover the consumed source region.
        let mut text_buf = String::new();
        let mut text_start = self.pos;

        loop {
            let from = self.pos.offset;
            match self.find_opener(from) {
                None => {
                    text_buf.push_str(&self.source[from..]);
                    self.advance_over(&self.source[from..]);
                    self.emit_text(&text_buf, text_start, false);
                    break;
                }
                Some((opener_idx, opener)) => {
                    // Escaped opener: drop the backslash, keep the opener
                    // characters as literal text, and continue scanning.
                    if opener_idx > from && self.source.as_bytes()[opener_idx - 1] == b'\\' {
                        text_buf.push_str(&self.source[from..opener_idx - 1]);
                        text_buf.push_str(opener.as_str());
                        self.advance_over(&self.source[from..opener_idx + 2]);
                        continue;
                    }

                    text_buf.push_str(&self.source[from..opener_idx]);
                    let tag_start_pos = {
                        let mut p = self.pos;
                        p = p.advance_str(&self.source[from..opener_idx]);
                        p
                    };

                    // Look one char past the opener for a trim marker
                    let start_trim = opener.supports_trim()
                        && self.source.as_bytes().get(opener_idx + 2) == Some(&b'-');

                    self.emit_text(&text_buf, text_start, start_trim);
                    text_buf.clear();

                    self.advance_over(&self.source[from..opener_idx]);
                    self.scan_tag(opener, tag_start_pos, start_trim)?;
                    text_start = self.pos;
                }
            }

            if self.tokens.len() >= MAX_TOKEN_COUNT {
                return Err(LexerError::TooManyTokens {
                    count: self.tokens.len(),
                });
            }
        }

        self.tokens.push(SpannedToken::new(
            Token::Eof,
            Span::new(self.pos, self.pos),
        ));
        Ok(())
    }

    /// Find the earliest tag opener at or after `from`
    fn find_opener(&self, from: usize) -> Option<(usize, Opener)> {
        let rest = &self.source[from..];
        let candidates = [
            (rest.find("{{"), Opener::Variable),
            (rest.find("{%"), Opener::Block),
            (rest.find("{#"), Opener::Comment),
        ];

        candidates
            .into_iter()
            .filter_map(|(idx, opener)| idx.map(|i| (from + i, opener)))
            .min_by_key(|(idx, _)| *idx)
    }

    fn advance_over(&mut self, consumed: &str) {
        self.pos = self.pos.advance_str(consumed);
    }

    /// Emit accumulated literal text, honoring trim requests on both sides
    fn emit_text(&mut self, text: &str, start: Position, trim_trailing: bool) {
        let mut content: &str = text;
        if self.pending_trim {
            content = content.trim_start();
        }
        if trim_trailing {
            content = content.trim_end();
        }
        self.pending_trim = false;

        if content.is_empty() {
            return;
        }

        let end = start.advance_str(text);
        self.tokens.push(SpannedToken::new(
            Token::Text(content.to_string()),
            Span::new(start, end),
        ));
    }

    /// Scan one complete tag starting at the current position
    fn scan_tag(&mut self, opener: Opener, tag_start: Position, start_trim: bool) -> LexerResult<()> {
        let line = tag_start.line;
        let opener_len = 2 + usize::from(start_trim && opener.supports_trim());
        let body_start_idx = tag_start.offset + opener_len;

        // Comment bodies are opaque; expression tags may carry the closer
        // characters inside a string literal
        let closer = opener.closer();
        let found = match opener {
            Opener::Comment => self.source[body_start_idx..].find(closer),
            _ => find_closer(&self.source[body_start_idx..], closer),
        };
        let close_idx = match found {
            Some(i) => body_start_idx + i,
            None => {
                return Err(match opener {
                    Opener::Comment => LexerError::UnclosedComment { line },
                    _ => LexerError::UnclosedTag { line },
                });
            }
        };

        match opener {
            Opener::Comment => {
                // Comment bodies are opaque; the literal keeps any trim
                // dashes so verbatim replay stays byte-exact.
                let body = &self.source[body_start_idx..close_idx];
                if body.starts_with('-') {
                    self.trim_previous_text();
                }
                self.pending_trim = body.ends_with('-');

                let consumed = &self.source[tag_start.offset..close_idx + 2];
                let end_pos = tag_start.advance_str(consumed);
                self.tokens.push(SpannedToken::new(
                    Token::Comment(body.to_string()),
                    Span::new(tag_start, end_pos),
                ));
                self.pos = end_pos;
            }
            Opener::Variable | Opener::Block => {
                // Trimmed closer wins when the char before the closer is '-'
                let end_trim =
                    close_idx > body_start_idx && self.source.as_bytes()[close_idx - 1] == b'-';
                let body_end_idx = if end_trim { close_idx - 1 } else { close_idx };
                let raw_body = &self.source[body_start_idx..body_end_idx];

                let opener_end =
                    tag_start.advance_str(&self.source[tag_start.offset..body_start_idx]);
                let body_pos = opener_end;

                let start_token = match opener {
                    Opener::Variable => Token::VariableStart {
                        trim: start_trim,
                        raw_body: raw_body.to_string(),
                    },
                    _ => Token::BlockStart {
                        trim: start_trim,
                        raw_body: raw_body.to_string(),
                    },
                };
                self.tokens
                    .push(SpannedToken::new(start_token, Span::new(tag_start, opener_end)));

                match opener {
                    Opener::Variable => {
                        tokenize_expr_into(raw_body, body_pos, self.tokens)?;
                    }
                    _ => {
                        tokenize_block_body(raw_body, body_pos, self.tokens)?;
                    }
                }

                let closer_pos = body_pos.advance_str(raw_body);
                let end_pos =
                    closer_pos.advance_str(&self.source[body_end_idx..close_idx + 2]);
                let end_token = match opener {
                    Opener::Variable => Token::VariableEnd { trim: end_trim },
                    _ => Token::BlockEnd { trim: end_trim },
                };
                self.tokens
                    .push(SpannedToken::new(end_token, Span::new(closer_pos, end_pos)));

                self.pending_trim = end_trim;
                self.pos = end_pos;
            }
        }

        Ok(())
    }

    /// Strip trailing whitespace from the most recent Text token
    fn trim_previous_text(&mut self) {
        if let Some(last) = self.tokens.last_mut() {
            if let Token::Text(text) = &mut last.token {
                let trimmed = text.trim_end().to_string();
                if trimmed.is_empty() {
                    self.tokens.pop();
                } else {
                    *text = trimmed;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    Variable,
    Block,
    Comment,
}

impl Opener {
    fn as_str(&self) -> &'static str {
        match self {
            Opener::Variable => "{{",
            Opener::Block => "{%",
            Opener::Comment => "{#",
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            Opener::Variable => "}}",
            Opener::Block => "%}",
            Opener::Comment => "#}",
        }
    }

    fn supports_trim(&self) -> bool {
        !matches!(self, Opener::Comment)
    }
}

/// Tokenize a block-tag body: tag name first, then the specialized split
fn tokenize_block_body(
    raw_body: &str,
    body_pos: Position,
    tokens: &mut Vec<SpannedToken>,
) -> LexerResult<()> {
    let leading_ws = raw_body.len() - raw_body.trim_start().len();
    let trimmed = raw_body.trim_start();
    if trimmed.is_empty() {
        return Ok(());
    }

    let name_len = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let name = &trimmed[..name_len];
    let name_pos = body_pos.advance_str(&raw_body[..leading_ws]);
    let name_end = name_pos.advance_str(name);

    tokens.push(SpannedToken::new(
        Token::Name(name.to_string()),
        Span::new(name_pos, name_end),
    ));

    let rest_offset = leading_ws + name_len;
    let rest = &raw_body[rest_offset..];
    let rest_pos = body_pos.advance_str(&raw_body[..rest_offset]);

    match name {
        "for" => tokenize_for_body(rest, rest_pos, tokens),
        "set" => tokenize_set_body(rest, rest_pos, tokens),
        "include" => tokenize_include_body(rest, rest_pos, tokens),
        // do / if / elseif / extends / block / macro and all end tags take
        // a plain expression remainder (possibly empty)
        _ => tokenize_expr_into(rest, rest_pos, tokens),
    }
}

/// Split a `for` body at the `in` keyword: iteration variable(s), then the
/// collection expression (call expression or bare name alike)
fn tokenize_for_body(
    rest: &str,
    rest_pos: Position,
    tokens: &mut Vec<SpannedToken>,
) -> LexerResult<()> {
    match find_keyword(rest, "in") {
        Some(in_idx) => {
            let vars = &rest[..in_idx];
            tokenize_expr_into(vars, rest_pos, tokens)?;

            let in_pos = rest_pos.advance_str(vars);
            let in_end = in_pos.advance_str("in");
            tokens.push(SpannedToken::new(
                Token::Operator(crate::tokens::Operator::In),
                Span::new(in_pos, in_end),
            ));

            let collection = &rest[in_idx + 2..];
            tokenize_expr_into(collection, in_end, tokens)
        }
        // Malformed for tag: emit what we can, the parser reports it
        None => tokenize_expr_into(rest, rest_pos, tokens),
    }
}

/// Split a `set` body at the first top-level `=`
fn tokenize_set_body(
    rest: &str,
    rest_pos: Position,
    tokens: &mut Vec<SpannedToken>,
) -> LexerResult<()> {
    match find_top_level(rest, '=') {
        Some(eq_idx) => {
            let target = &rest[..eq_idx];
            tokenize_expr_into(target, rest_pos, tokens)?;

            let eq_pos = rest_pos.advance_str(target);
            let eq_end = eq_pos.advance_str("=");
            tokens.push(SpannedToken::new(
                Token::Operator(crate::tokens::Operator::Assign),
                Span::new(eq_pos, eq_end),
            ));

            tokenize_expr_into(&rest[eq_idx + 1..], eq_end, tokens)
        }
        None => tokenize_expr_into(rest, rest_pos, tokens),
    }
}

/// Split an `include` body at the `with` keyword: template name (quoted or
/// bare expression), then the parameter hash
fn tokenize_include_body(
    rest: &str,
    rest_pos: Position,
    tokens: &mut Vec<SpannedToken>,
) -> LexerResult<()> {
    match find_keyword(rest, "with") {
        Some(with_idx) => {
            let name_part = &rest[..with_idx];
            tokenize_expr_into(name_part, rest_pos, tokens)?;

            let with_pos = rest_pos.advance_str(name_part);
            let with_end = with_pos.advance_str("with");
            tokens.push(SpannedToken::new(
                Token::Name("with".to_string()),
                Span::new(with_pos, with_end),
            ));

            tokenize_expr_into(&rest[with_idx + 4..], with_end, tokens)
        }
        None => tokenize_expr_into(rest, rest_pos, tokens),
    }
}

/// Find a whitespace-delimited keyword outside string literals
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;

    while i + keyword.len() <= bytes.len() {
        let b = bytes[i];
        match in_quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    in_quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    in_quote = Some(b);
                } else if text[i..].starts_with(keyword) {
                    let before_ok = i == 0 || bytes[i - 1].is_ascii_whitespace();
                    let after = bytes.get(i + keyword.len());
                    let after_ok = after.map(|b| b.is_ascii_whitespace()).unwrap_or(true);
                    if before_ok && after_ok {
                        return Some(i);
                    }
                }
            }
        }
        i += 1;
    }
    None
}

/// Find the tag closer outside string literals
fn find_closer(text: &str, closer: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match in_quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    in_quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    in_quote = Some(b);
                } else if text[i..].starts_with(closer) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Find a character outside string literals
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match in_quote {
            Some(q) => {
                if b == q && (i == 0 || bytes[i - 1] != b'\\') {
                    in_quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    in_quote = Some(b);
                } else if b == target as u8 {
                    // '==' is comparison, not assignment
                    if target == '=' && bytes.get(i + 1) == Some(&b'=') {
                        continue;
                    }
                    return Some(i);
                }
            }
        }
    }
    None
}
