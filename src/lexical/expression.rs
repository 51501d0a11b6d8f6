//! The shared expression tokenizer
//!
//! Every tag body, whether it reaches us through the generic variable-tag
//! path or one of the specialized block-tag splitters, is scanned by this
//! single tokenizer. The splitters differ only in how they cut the body
//! apart, never in how expression text becomes tokens.

use crate::config::constants::lexical::MAX_STRING_SIZE;
use crate::lexical::{LexerError, LexerResult};
use crate::tokens::{Operator, SpannedToken, Token};
use crate::utils::{Position, Span};

/// Cursor over a tag-body slice that tracks absolute source positions
struct Cursor<'a> {
    body: &'a str,
    offset: usize,
    pos: Position,
}

impl<'a> Cursor<'a> {
    fn new(body: &'a str, start: Position) -> Self {
        Self {
            body,
            offset: 0,
            pos: start,
        }
    }

    fn peek(&self) -> Option<char> {
        self.body[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.body[self.offset..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        self.pos = self.pos.advance(ch);
        Some(ch)
    }

    /// Consume `ch` if it is next
    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Peek the next whitespace-separated word without consuming anything
    fn peek_word_ahead(&self) -> Option<&'a str> {
        let rest = self.body[self.offset..].trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        if end == 0 {
            None
        } else {
            Some(&rest[..end])
        }
    }

    /// Consume whitespace followed by the given word
    fn eat_word(&mut self, word: &str) {
        while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.bump();
        }
        for _ in word.chars() {
            self.bump();
        }
    }
}

/// Tokenize an expression body, appending tokens with absolute spans
///
/// `start` must be the source position of the first byte of `body`. The
/// previously pushed token (typically the enclosing tag-start token) feeds
/// the one-token look-behind that disambiguates negative number literals
/// from subtraction.
pub fn tokenize_expr_into(
    body: &str,
    start: Position,
    tokens: &mut Vec<SpannedToken>,
) -> LexerResult<()> {
    let mut cursor = Cursor::new(body, start);

    while let Some(ch) = cursor.peek() {
        if ch.is_whitespace() {
            cursor.bump();
            continue;
        }

        let token_start = cursor.pos;

        if ch == '\'' || ch == '"' {
            let token = scan_string(&mut cursor, ch)?;
            tokens.push(SpannedToken::new(token, Span::new(token_start, cursor.pos)));
            continue;
        }

        if ch.is_ascii_digit() {
            let token = scan_number(&mut cursor, false)?;
            tokens.push(SpannedToken::new(token, Span::new(token_start, cursor.pos)));
            continue;
        }

        // A '-' directly followed by a digit begins a negative literal
        // only when the previous token cannot end a value expression.
        if ch == '-' && cursor.peek_second().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            let prev_is_value = tokens
                .last()
                .map(|t| t.token.is_value_end())
                .unwrap_or(false);
            if !prev_is_value {
                cursor.bump(); // consume '-'
                let token = scan_number(&mut cursor, true)?;
                tokens.push(SpannedToken::new(token, Span::new(token_start, cursor.pos)));
                continue;
            }
        }

        if ch.is_alphabetic() || ch == '_' {
            let token = scan_word(&mut cursor);
            tokens.push(SpannedToken::new(token, Span::new(token_start, cursor.pos)));
            continue;
        }

        let token = scan_symbol(&mut cursor)?;
        tokens.push(SpannedToken::new(token, Span::new(token_start, cursor.pos)));
    }

    Ok(())
}

fn scan_string(cursor: &mut Cursor<'_>, quote: char) -> LexerResult<Token> {
    let line = cursor.pos.line;
    cursor.bump(); // opening quote

    let mut content = String::new();
    loop {
        match cursor.bump() {
            Some(c) if c == quote => break,
            Some('\\') => match cursor.bump() {
                Some('n') => content.push('\n'),
                Some('t') => content.push('\t'),
                Some('r') => content.push('\r'),
                Some('\\') => content.push('\\'),
                Some(c) if c == quote => content.push(c),
                Some(c) => {
                    // Unknown escape: keep both characters
                    content.push('\\');
                    content.push(c);
                }
                None => return Err(LexerError::UnterminatedString { line }),
            },
            Some(c) => content.push(c),
            None => return Err(LexerError::UnterminatedString { line }),
        }

        if content.len() > MAX_STRING_SIZE {
            return Err(LexerError::StringTooLarge {
                length: content.len(),
                line,
            });
        }
    }

    Ok(Token::Str(content))
}

fn scan_number(cursor: &mut Cursor<'_>, negative: bool) -> LexerResult<Token> {
    let line = cursor.pos.line;
    let start = cursor.offset;

    while cursor.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        cursor.bump();
    }

    let mut is_float = false;
    if cursor.peek() == Some('.')
        && cursor
            .peek_second()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
    {
        is_float = true;
        cursor.bump(); // '.'
        while cursor.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            cursor.bump();
        }
    }

    let digits = &cursor.body[start..cursor.offset];

    if is_float {
        let value: f64 = digits.parse().map_err(|_| LexerError::InvalidNumber {
            literal: digits.to_string(),
            line,
        })?;
        Ok(Token::Float(if negative { -value } else { value }))
    } else {
        let value: i64 = digits.parse().map_err(|_| LexerError::InvalidNumber {
            literal: digits.to_string(),
            line,
        })?;
        Ok(Token::Integer(if negative { -value } else { value }))
    }
}

fn scan_word(cursor: &mut Cursor<'_>) -> Token {
    let start = cursor.offset;
    while cursor
        .peek()
        .map(|c| c.is_alphanumeric() || c == '_')
        .unwrap_or(false)
    {
        cursor.bump();
    }
    let word = &cursor.body[start..cursor.offset];

    match word {
        "and" => Token::Operator(Operator::And),
        "or" => Token::Operator(Operator::Or),
        "in" => Token::Operator(Operator::In),
        "matches" => Token::Operator(Operator::Matches),
        "not" => {
            if cursor.peek_word_ahead() == Some("in") {
                cursor.eat_word("in");
                Token::Operator(Operator::NotIn)
            } else {
                Token::Operator(Operator::Not)
            }
        }
        "is" => {
            if cursor.peek_word_ahead() == Some("not") {
                cursor.eat_word("not");
                Token::Operator(Operator::IsNot)
            } else {
                Token::Operator(Operator::Is)
            }
        }
        "starts" => {
            if cursor.peek_word_ahead() == Some("with") {
                cursor.eat_word("with");
                Token::Operator(Operator::StartsWith)
            } else {
                Token::Name(word.to_string())
            }
        }
        "ends" => {
            if cursor.peek_word_ahead() == Some("with") {
                cursor.eat_word("with");
                Token::Operator(Operator::EndsWith)
            } else {
                Token::Name(word.to_string())
            }
        }
        _ => Token::Name(word.to_string()),
    }
}

fn scan_symbol(cursor: &mut Cursor<'_>) -> LexerResult<Token> {
    let line = cursor.pos.line;
    let ch = match cursor.bump() {
        Some(c) => c,
        None => return Err(LexerError::InvalidCharacter {
            character: '\0',
            line,
        }),
    };

    let token = match ch {
        '+' => Token::Operator(Operator::Add),
        '-' => Token::Operator(Operator::Sub),
        '*' => Token::Operator(Operator::Mul),
        '/' => Token::Operator(Operator::Div),
        '%' => Token::Operator(Operator::Mod),
        '^' => Token::Operator(Operator::Pow),
        '~' => Token::Operator(Operator::Concat),
        '=' => {
            if cursor.eat('=') {
                Token::Operator(Operator::Eq)
            } else {
                Token::Operator(Operator::Assign)
            }
        }
        '!' => {
            if cursor.eat('=') {
                Token::Operator(Operator::Ne)
            } else {
                Token::Operator(Operator::Not)
            }
        }
        '<' => {
            if cursor.eat('=') {
                Token::Operator(Operator::Le)
            } else {
                Token::Operator(Operator::Lt)
            }
        }
        '>' => {
            if cursor.eat('=') {
                Token::Operator(Operator::Ge)
            } else {
                Token::Operator(Operator::Gt)
            }
        }
        '?' => {
            if cursor.eat('?') {
                Token::Operator(Operator::NullCoalesce)
            } else {
                Token::Operator(Operator::Question)
            }
        }
        '&' => {
            if cursor.eat('&') {
                Token::Operator(Operator::And)
            } else {
                return Err(LexerError::InvalidCharacter {
                    character: '&',
                    line,
                });
            }
        }
        '|' => {
            if cursor.eat('|') {
                Token::Operator(Operator::Or)
            } else {
                Token::Pipe
            }
        }
        '(' => Token::LeftParen,
        ')' => Token::RightParen,
        '[' => Token::LeftBracket,
        ']' => Token::RightBracket,
        '{' => Token::LeftBrace,
        '}' => Token::RightBrace,
        ',' => Token::Comma,
        ':' => Token::Colon,
        '.' => Token::Dot,
        other => {
            return Err(LexerError::InvalidCharacter {
                character: other,
                line,
            })
        }
    };

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(body: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        tokenize_expr_into(body, Position::start(), &mut tokens).unwrap();
        tokens.into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_simple_expression() {
        let tokens = tokenize("user.name | upper");
        assert_eq!(
            tokens,
            vec![
                Token::Name("user".to_string()),
                Token::Dot,
                Token::Name("name".to_string()),
                Token::Pipe,
                Token::Name("upper".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.5 100");
        assert_eq!(
            tokens,
            vec![Token::Integer(1), Token::Float(2.5), Token::Integer(100)]
        );
    }

    #[test]
    fn test_negative_literal_in_prefix_position() {
        // After '(' or ',' a -digit run is a negative literal
        let tokens = tokenize("range(5, 1, -1)");
        assert_eq!(
            tokens,
            vec![
                Token::Name("range".to_string()),
                Token::LeftParen,
                Token::Integer(5),
                Token::Comma,
                Token::Integer(1),
                Token::Comma,
                Token::Integer(-1),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_minus_after_value_is_subtraction() {
        let tokens = tokenize("x -1");
        assert_eq!(
            tokens,
            vec![
                Token::Name("x".to_string()),
                Token::Operator(Operator::Sub),
                Token::Integer(1),
            ]
        );

        let tokens = tokenize("(a) -2");
        assert_eq!(tokens[2], Token::Operator(Operator::Sub));
        assert_eq!(tokens[3], Token::Integer(2));
    }

    #[test]
    fn test_string_literals() {
        let tokens = tokenize(r#"'hello' "world" 'it\'s'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Str("hello".to_string()),
                Token::Str("world".to_string()),
                Token::Str("it's".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"'a\nb\tc'"#);
        assert_eq!(tokens, vec![Token::Str("a\nb\tc".to_string())]);
    }

    #[test]
    fn test_unterminated_string() {
        let mut tokens = Vec::new();
        let result = tokenize_expr_into("'open", Position::start(), &mut tokens);
        assert!(matches!(result, Err(LexerError::UnterminatedString { .. })));
    }

    #[test]
    fn test_word_operators() {
        let tokens = tokenize("a and b or not c");
        assert_eq!(tokens[1], Token::Operator(Operator::And));
        assert_eq!(tokens[3], Token::Operator(Operator::Or));
        assert_eq!(tokens[4], Token::Operator(Operator::Not));
    }

    #[test]
    fn test_multi_word_operators() {
        let tokens = tokenize("x not in items");
        assert_eq!(tokens[1], Token::Operator(Operator::NotIn));

        let tokens = tokenize("name starts with 'a'");
        assert_eq!(tokens[1], Token::Operator(Operator::StartsWith));

        let tokens = tokenize("name ends with 'z'");
        assert_eq!(tokens[1], Token::Operator(Operator::EndsWith));

        let tokens = tokenize("x is not defined");
        assert_eq!(tokens[1], Token::Operator(Operator::IsNot));
        assert_eq!(tokens[2], Token::Name("defined".to_string()));
    }

    #[test]
    fn test_symbolic_aliases() {
        let tokens = tokenize("a && b || !c");
        assert_eq!(tokens[1], Token::Operator(Operator::And));
        assert_eq!(tokens[3], Token::Operator(Operator::Or));
        assert_eq!(tokens[4], Token::Operator(Operator::Not));
    }

    #[test]
    fn test_comparison_and_coalesce() {
        let tokens = tokenize("a <= b ?? c ? d : e");
        assert_eq!(tokens[1], Token::Operator(Operator::Le));
        assert_eq!(tokens[3], Token::Operator(Operator::NullCoalesce));
        assert_eq!(tokens[5], Token::Operator(Operator::Question));
        assert_eq!(tokens[7], Token::Colon);
    }

    #[test]
    fn test_hash_literal() {
        let tokens = tokenize("{'a': 1, 'b': 2}");
        assert_eq!(tokens[0], Token::LeftBrace);
        assert_eq!(tokens[2], Token::Colon);
        assert_eq!(tokens[4], Token::Comma);
        assert_eq!(tokens[8], Token::RightBrace);
    }

    #[test]
    fn test_invalid_character() {
        let mut tokens = Vec::new();
        let result = tokenize_expr_into("a @ b", Position::start(), &mut tokens);
        assert!(matches!(
            result,
            Err(LexerError::InvalidCharacter { character: '@', .. })
        ));
    }

    #[test]
    fn test_spans_track_position() {
        let mut tokens = Vec::new();
        tokenize_expr_into("ab + cd", Position::start(), &mut tokens).unwrap();
        assert_eq!(tokens[0].span.start.offset, 0);
        assert_eq!(tokens[0].span.end.offset, 2);
        assert_eq!(tokens[2].span.start.offset, 5);
        assert_eq!(tokens[2].span.end.offset, 7);
    }
}
