//! Abstract syntax tree types

pub mod nodes;

pub use nodes::{BinaryOp, Branch, Literal, MacroParam, Node, Template, UnaryOp};
