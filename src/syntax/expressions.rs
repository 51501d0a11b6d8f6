//! Expression parsing by precedence climbing
//!
//! One method per precedence level, loosest first: ternary, `??`, `or`,
//! `and`, `not`, comparisons and tests, `~`, additive, multiplicative,
//! `^` (right-associative), unary minus, then postfix attribute access,
//! indexing, calls, and filters. Every entry point passes through the
//! shared depth guard.

use crate::grammar::{BinaryOp, Literal, Node, UnaryOp};
use crate::syntax::error::{ParseError, ParseResult};
use crate::syntax::parser::Parser;
use crate::tokens::{Operator, Token};

impl Parser {
    /// Parse a full expression at the lowest precedence level
    pub(super) fn parse_expression(&mut self) -> ParseResult<Node> {
        self.enter()?;
        let result = self.parse_ternary();
        self.exit();
        result
    }

    fn parse_ternary(&mut self) -> ParseResult<Node> {
        let condition = self.parse_null_coalesce()?;

        if self.eat_operator(Operator::Question) {
            let then_branch = self.parse_expression()?;
            self.expect_token(&Token::Colon, "':'")?;
            let else_branch = self.parse_expression()?;
            return Ok(Node::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(condition)
    }

    fn parse_null_coalesce(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_or()?;

        loop {
            let span = self.current_span();
            if self.eat_operator(Operator::NullCoalesce) {
                let right = self.parse_or()?;
                left = Node::Binary {
                    op: BinaryOp::NullCoalesce,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_or(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_and()?;

        loop {
            let span = self.current_span();
            if self.eat_operator(Operator::Or) {
                let right = self.parse_and()?;
                left = Node::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_not()?;

        loop {
            let span = self.current_span();
            if self.eat_operator(Operator::And) {
                let right = self.parse_not()?;
                left = Node::Binary {
                    op: BinaryOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_not(&mut self) -> ParseResult<Node> {
        if self.eat_operator(Operator::Not) {
            self.enter()?;
            let operand = self.parse_not();
            self.exit();
            return Ok(Node::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_concat()?;

        loop {
            let span = self.current_span();
            let op = match self.stream.current_token() {
                Some(Token::Operator(op)) => *op,
                _ => return Ok(left),
            };

            match op {
                Operator::Is | Operator::IsNot => {
                    self.stream.advance();
                    let negated = op == Operator::IsNot;
                    let name = self.expect_name("test name")?;
                    let args = if self.eat_token(&Token::LeftParen) {
                        self.parse_args()?
                    } else {
                        Vec::new()
                    };
                    left = Node::Test {
                        value: Box::new(left),
                        name,
                        args,
                        negated,
                        span,
                    };
                }
                Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::In
                | Operator::NotIn
                | Operator::Matches
                | Operator::StartsWith
                | Operator::EndsWith => {
                    self.stream.advance();
                    let binary_op = BinaryOp::from_token_operator(op).ok_or_else(|| {
                        ParseError::malformed_expression(
                            &format!("'{}' is not a binary operator", op),
                            span,
                        )
                    })?;
                    let right = self.parse_concat()?;
                    left = Node::Binary {
                        op: binary_op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    };
                }
                _ => return Ok(left),
            }
        }
    }

    fn parse_concat(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_additive()?;

        loop {
            let span = self.current_span();
            if self.eat_operator(Operator::Concat) {
                let right = self.parse_additive()?;
                left = Node::Binary {
                    op: BinaryOp::Concat,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let span = self.current_span();
            let op = match self.stream.current_token() {
                Some(Token::Operator(Operator::Add)) => BinaryOp::Add,
                Some(Token::Operator(Operator::Sub)) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.stream.advance();
            let right = self.parse_multiplicative()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_power()?;

        loop {
            let span = self.current_span();
            let op = match self.stream.current_token() {
                Some(Token::Operator(Operator::Mul)) => BinaryOp::Mul,
                Some(Token::Operator(Operator::Div)) => BinaryOp::Div,
                Some(Token::Operator(Operator::Mod)) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.stream.advance();
            let right = self.parse_power()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
    }

    // Right-associative: 2 ^ 3 ^ 2 is 2 ^ (3 ^ 2)
    fn parse_power(&mut self) -> ParseResult<Node> {
        let left = self.parse_unary()?;

        let span = self.current_span();
        if self.eat_operator(Operator::Pow) {
            self.enter()?;
            let right = self.parse_power();
            self.exit();
            return Ok(Node::Binary {
                op: BinaryOp::Pow,
                left: Box::new(left),
                right: Box::new(right?),
                span,
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        if self.eat_operator(Operator::Sub) {
            self.enter()?;
            let operand = self.parse_unary();
            self.exit();
            return Ok(Node::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand?),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_primary()?;

        loop {
            let span = self.current_span();
            match self.stream.current_token() {
                Some(Token::Dot) => {
                    self.stream.advance();
                    let name = self.expect_name("attribute name")?;
                    node = Node::GetAttr {
                        object: Box::new(node),
                        name,
                        span,
                    };
                }
                Some(Token::LeftBracket) => {
                    self.stream.advance();
                    let index = self.parse_expression()?;
                    self.expect_token(&Token::RightBracket, "']'")?;
                    node = Node::GetItem {
                        object: Box::new(node),
                        index: Box::new(index),
                    };
                }
                Some(Token::LeftParen) => {
                    self.stream.advance();
                    let args = self.parse_args()?;
                    node = Node::Call {
                        target: Box::new(node),
                        args,
                        span,
                    };
                }
                Some(Token::Pipe) => {
                    self.stream.advance();
                    let name = self.expect_name("filter name")?;
                    let args = if self.eat_token(&Token::LeftParen) {
                        self.parse_args()?
                    } else {
                        Vec::new()
                    };
                    node = Node::Filter {
                        value: Box::new(node),
                        name,
                        args,
                        span,
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    /// Parse a comma-separated argument list; the opening paren is
    /// already consumed
    fn parse_args(&mut self) -> ParseResult<Vec<Node>> {
        let mut args = Vec::new();

        if self.eat_token(&Token::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.eat_token(&Token::Comma) {
                continue;
            }
            self.expect_token(&Token::RightParen, "')' or ','")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let current = match self.stream.current() {
            Some(spanned) => spanned.clone(),
            None => return Err(ParseError::unexpected_end_of_input("expression")),
        };

        match current.token {
            Token::Integer(n) => {
                self.stream.advance();
                Ok(Node::Literal(Literal::Int(n)))
            }
            Token::Float(n) => {
                self.stream.advance();
                Ok(Node::Literal(Literal::Float(n)))
            }
            Token::Str(s) => {
                self.stream.advance();
                Ok(Node::Literal(Literal::Str(s)))
            }
            Token::Name(name) => {
                self.stream.advance();
                match name.as_str() {
                    "true" => Ok(Node::Literal(Literal::Bool(true))),
                    "false" => Ok(Node::Literal(Literal::Bool(false))),
                    "null" | "none" => Ok(Node::Literal(Literal::Null)),
                    _ => Ok(Node::Variable { name }),
                }
            }
            Token::LeftParen => {
                self.stream.advance();
                let expr = self.parse_expression()?;
                self.expect_token(&Token::RightParen, "')'")?;
                Ok(expr)
            }
            Token::LeftBracket => {
                self.stream.advance();
                let mut elements = Vec::new();
                loop {
                    if self.eat_token(&Token::RightBracket) {
                        return Ok(Node::Array(elements));
                    }
                    elements.push(self.parse_expression()?);
                    if self.eat_token(&Token::Comma) {
                        continue;
                    }
                    self.expect_token(&Token::RightBracket, "']' or ','")?;
                    return Ok(Node::Array(elements));
                }
            }
            Token::LeftBrace => {
                self.stream.advance();
                let mut pairs = Vec::new();
                loop {
                    if self.eat_token(&Token::RightBrace) {
                        return Ok(Node::Hash(pairs));
                    }
                    let key = self.parse_expression()?;
                    self.expect_token(&Token::Colon, "':'")?;
                    let value = self.parse_expression()?;
                    pairs.push((key, value));
                    if self.eat_token(&Token::Comma) {
                        continue;
                    }
                    self.expect_token(&Token::RightBrace, "'}' or ','")?;
                    return Ok(Node::Hash(pairs));
                }
            }
            other => Err(ParseError::unexpected_token(
                "expression",
                &other.describe(),
                current.span,
            )),
        }
    }
}
