//! Grammar definitions for the template language

pub mod ast;

pub use ast::{BinaryOp, Branch, Literal, MacroParam, Node, Template, UnaryOp};
