//! Token system for the template tokenizer
//!
//! All operators are dedicated symbol tokens with no context sensitivity;
//! the parser determines semantic meaning from grammatical position. Tag
//! start tokens carry the raw tag body so verbatim replay can reproduce
//! the original source byte for byte.

use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expression operators recognized inside tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    // Arithmetic operators
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    Mod,    // %
    Pow,    // ^
    Concat, // ~

    // Comparison operators
    Eq, // ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Logical operators
    And,
    Or,
    Not,

    // Membership and string operators
    In,
    NotIn,
    Matches,
    StartsWith,
    EndsWith,
    Is,
    IsNot,

    // Conditional operators
    Question,     // ?
    NullCoalesce, // ??

    // Assignment (set tags and keyword arguments)
    Assign, // =
}

impl Operator {
    /// Source representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Pow => "^",
            Operator::Concat => "~",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Matches => "matches",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::Question => "?",
            Operator::NullCoalesce => "??",
            Operator::Assign => "=",
        }
    }

    /// Check if this operator compares two values
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tokens produced from template source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    // === TAG DELIMITERS ===
    /// Start of a variable tag ({{ or {{-)
    ///
    /// `raw_body` holds the untrimmed text between the delimiters so the
    /// verbatim tag can replay the tag exactly as written.
    VariableStart { trim: bool, raw_body: String },
    /// End of a variable tag (}} or -}})
    VariableEnd { trim: bool },
    /// Start of a block tag ({% or {%-)
    BlockStart { trim: bool, raw_body: String },
    /// End of a block tag (%} or -%})
    BlockEnd { trim: bool },

    // === LITERALS ===
    /// String literal (single or double quoted)
    Str(String),
    /// Integer literal (64-bit signed)
    Integer(i64),
    /// Float literal (IEEE 754 double precision)
    Float(f64),

    // === NAMES AND OPERATORS ===
    /// Identifier, tag name, filter name, or keyword-like name
    Name(String),
    /// Dedicated operator token
    Operator(Operator),

    // === PUNCTUATION ===
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Comma,        // ,
    Colon,        // :
    Dot,          // .
    Pipe,         // |

    // === TEMPLATE CONTENT ===
    /// Literal text between tags
    Text(String),
    /// Comment body ({# ... #})
    Comment(String),

    /// End of template marker
    Eof,
}

impl Token {
    /// Check if this token can end a value expression
    ///
    /// Used by the tokenizer's one-token look-behind: a `-` after a
    /// value-ending token is subtraction, otherwise it may begin a
    /// negative number literal.
    pub fn is_value_end(&self) -> bool {
        matches!(
            self,
            Token::Str(_)
                | Token::Integer(_)
                | Token::Float(_)
                | Token::Name(_)
                | Token::RightParen
                | Token::RightBracket
        )
    }

    /// Check if this token closes a tag
    pub fn is_tag_end(&self) -> bool {
        matches!(
            self,
            Token::VariableEnd { .. } | Token::BlockEnd { .. } | Token::Eof
        )
    }

    /// Check if this is a specific name token
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Token::Name(n) if n == name)
    }

    /// Check if this is a specific operator token
    pub fn is_operator(&self, op: Operator) -> bool {
        matches!(self, Token::Operator(o) if *o == op)
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::VariableStart { trim: false, .. } => "'{{'".to_string(),
            Token::VariableStart { trim: true, .. } => "'{{-'".to_string(),
            Token::VariableEnd { trim: false } => "'}}'".to_string(),
            Token::VariableEnd { trim: true } => "'-}}'".to_string(),
            Token::BlockStart { trim: false, .. } => "'{%'".to_string(),
            Token::BlockStart { trim: true, .. } => "'{%-'".to_string(),
            Token::BlockEnd { trim: false } => "'%}'".to_string(),
            Token::BlockEnd { trim: true } => "'-%}'".to_string(),
            Token::Str(s) => format!("string {:?}", s),
            Token::Integer(n) => format!("integer {}", n),
            Token::Float(n) => format!("float {}", n),
            Token::Name(n) => format!("name '{}'", n),
            Token::Operator(op) => format!("operator '{}'", op),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Text(_) => "template text".to_string(),
            Token::Comment(_) => "comment".to_string(),
            Token::Eof => "end of template".to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A token paired with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self { token, span }
    }
}
