//! AST node definitions for parsed templates
//!
//! The node set is a closed enum: every evaluation site matches
//! exhaustively so adding a variant is a compile error until each
//! consumer handles it. Trees own their children outright and are
//! immutable after parsing; evaluation never mutates nodes.

use crate::tokens::Operator;
use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal values that appear directly in template expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Binary operators in expression nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
    NotIn,
    Matches,
    StartsWith,
    EndsWith,
    NullCoalesce,
}

impl BinaryOp {
    /// Symbol used for custom-operator table lookups and error messages
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "~",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Matches => "matches",
            BinaryOp::StartsWith => "starts with",
            BinaryOp::EndsWith => "ends with",
            BinaryOp::NullCoalesce => "??",
        }
    }

    /// Map a token-level operator to its AST counterpart
    pub fn from_token_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Add => Some(BinaryOp::Add),
            Operator::Sub => Some(BinaryOp::Sub),
            Operator::Mul => Some(BinaryOp::Mul),
            Operator::Div => Some(BinaryOp::Div),
            Operator::Mod => Some(BinaryOp::Mod),
            Operator::Pow => Some(BinaryOp::Pow),
            Operator::Concat => Some(BinaryOp::Concat),
            Operator::Eq => Some(BinaryOp::Eq),
            Operator::Ne => Some(BinaryOp::Ne),
            Operator::Lt => Some(BinaryOp::Lt),
            Operator::Le => Some(BinaryOp::Le),
            Operator::Gt => Some(BinaryOp::Gt),
            Operator::Ge => Some(BinaryOp::Ge),
            Operator::And => Some(BinaryOp::And),
            Operator::Or => Some(BinaryOp::Or),
            Operator::In => Some(BinaryOp::In),
            Operator::NotIn => Some(BinaryOp::NotIn),
            Operator::Matches => Some(BinaryOp::Matches),
            Operator::StartsWith => Some(BinaryOp::StartsWith),
            Operator::EndsWith => Some(BinaryOp::EndsWith),
            Operator::NullCoalesce => Some(BinaryOp::NullCoalesce),
            _ => None,
        }
    }
}

/// Unary operators in expression nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation (`-x`)
    Neg,
    /// Logical negation (`not x`, `!x`)
    Not,
}

/// A macro parameter with optional default value expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroParam {
    pub name: String,
    pub default: Option<Node>,
}

/// One `if`/`elseif` branch: condition and body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Node,
    pub body: Vec<Node>,
}

/// Closed set of template AST nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Literal template text
    Text(String),

    /// Literal value in an expression
    Literal(Literal),

    /// Variable lookup by name
    Variable { name: String },

    /// Attribute access (`object.name`)
    GetAttr {
        object: Box<Node>,
        name: String,
        span: Span,
    },

    /// Index access (`object[index]`)
    GetItem {
        object: Box<Node>,
        index: Box<Node>,
    },

    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<Node> },

    /// Ternary conditional (`cond ? a : b`)
    Conditional {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },

    /// Array literal (`[a, b, c]`)
    Array(Vec<Node>),

    /// Hash literal (`{'k': v}`)
    Hash(Vec<(Node, Node)>),

    /// Function, macro, or method call
    Call {
        target: Box<Node>,
        args: Vec<Node>,
        span: Span,
    },

    /// Filter application (`value | name(args)`)
    Filter {
        value: Box<Node>,
        name: String,
        args: Vec<Node>,
        span: Span,
    },

    /// Test application (`value is name(args)`)
    Test {
        value: Box<Node>,
        name: String,
        args: Vec<Node>,
        negated: bool,
        span: Span,
    },

    /// Conditional block with elseif chain and optional else
    If {
        branches: Vec<Branch>,
        else_body: Option<Vec<Node>>,
    },

    /// Loop over a collection, with optional `key, value` iteration and
    /// an optional else body rendered when the collection is empty
    For {
        key_var: Option<String>,
        value_var: String,
        collection: Box<Node>,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },

    /// Named block (inheritance override point)
    Block { name: String, body: Vec<Node> },

    /// Macro definition
    Macro {
        name: String,
        params: Vec<MacroParam>,
        body: Vec<Node>,
    },

    /// Raw text replayed exactly as written, tags included
    Verbatim(String),

    /// Parent template reference
    Extends { name: Box<Node>, span: Span },

    /// Template inclusion with optional parameter hash
    Include {
        name: Box<Node>,
        with: Option<Vec<(Node, Node)>>,
        span: Span,
    },

    /// Assignment into the nearest scope
    Set { target: String, value: Box<Node> },

    /// Expression evaluated for side effects, value discarded
    Do { expr: Box<Node> },
}

impl Node {
    /// Variant name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Text(_) => "text",
            Node::Literal(_) => "literal",
            Node::Variable { .. } => "variable",
            Node::GetAttr { .. } => "attribute access",
            Node::GetItem { .. } => "index access",
            Node::Binary { .. } => "binary operation",
            Node::Unary { .. } => "unary operation",
            Node::Conditional { .. } => "conditional expression",
            Node::Array(_) => "array literal",
            Node::Hash(_) => "hash literal",
            Node::Call { .. } => "call",
            Node::Filter { .. } => "filter",
            Node::Test { .. } => "test",
            Node::If { .. } => "if block",
            Node::For { .. } => "for loop",
            Node::Block { .. } => "block",
            Node::Macro { .. } => "macro definition",
            Node::Verbatim(_) => "verbatim block",
            Node::Extends { .. } => "extends",
            Node::Include { .. } => "include",
            Node::Set { .. } => "set",
            Node::Do { .. } => "do",
        }
    }
}

/// A parsed template: the root statement list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub body: Vec<Node>,
}

impl Template {
    pub fn new(body: Vec<Node>) -> Self {
        Self { body }
    }

    /// The parent template expression, when this template extends one
    pub fn extends(&self) -> Option<&Node> {
        self.body.iter().find_map(|node| match node {
            Node::Extends { name, .. } => Some(name.as_ref()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_symbols() {
        assert_eq!(BinaryOp::Add.symbol(), "+");
        assert_eq!(BinaryOp::NotIn.symbol(), "not in");
        assert_eq!(BinaryOp::NullCoalesce.symbol(), "??");
    }

    #[test]
    fn test_operator_mapping() {
        assert_eq!(
            BinaryOp::from_token_operator(Operator::Concat),
            Some(BinaryOp::Concat)
        );
        assert_eq!(BinaryOp::from_token_operator(Operator::Question), None);
        assert_eq!(BinaryOp::from_token_operator(Operator::Assign), None);
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Null.to_string(), "null");
        assert_eq!(Literal::Int(42).to_string(), "42");
        assert_eq!(Literal::Str("hi".to_string()).to_string(), "\"hi\"");
    }

    #[test]
    fn test_template_extends_lookup() {
        let template = Template::new(vec![
            Node::Extends {
                name: Box::new(Node::Literal(Literal::Str("base.html".to_string()))),
                span: Span::dummy(),
            },
            Node::Text("child".to_string()),
        ]);
        assert!(template.extends().is_some());

        let plain = Template::new(vec![Node::Text("plain".to_string())]);
        assert!(plain.extends().is_none());
    }

    #[test]
    fn test_kind_names() {
        let node = Node::Variable {
            name: "x".to_string(),
        };
        assert_eq!(node.kind_name(), "variable");
        assert_eq!(Node::Verbatim(String::new()).kind_name(), "verbatim block");
    }
}
