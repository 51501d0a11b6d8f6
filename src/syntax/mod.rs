//! Syntax analysis: token stream to AST

pub mod error;
pub mod expressions;
pub mod parser;

pub use error::{ParseError, ParseResult};
pub use parser::{parse, parse_recycling, Parser};
