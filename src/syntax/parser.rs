//! Recursive-descent parser for the template language
//!
//! Consumes the token stream and produces the AST. Statement parsing
//! lives here; expression precedence climbing lives in
//! [`super::expressions`]. Recursion is bounded by `MAX_PARSE_DEPTH`.

use crate::config::constants::syntax::MAX_PARSE_DEPTH;
use crate::grammar::{Branch, MacroParam, Node, Template};
use crate::syntax::error::{ParseError, ParseResult};
use crate::tokens::{Operator, SpannedToken, Token, TokenStream};
use crate::utils::Span;
use crate::{log_debug, log_error, log_success};

/// Parse a token stream into a template AST
pub fn parse(tokens: Vec<SpannedToken>) -> ParseResult<Template> {
    parse_recycling(tokens).0
}

/// Parse and hand the token vector back so the caller can return it to
/// a token pool
pub fn parse_recycling(tokens: Vec<SpannedToken>) -> (ParseResult<Template>, Vec<SpannedToken>) {
    let token_count = tokens.len();

    match tokens.last() {
        Some(spanned) if spanned.token == Token::Eof => {}
        _ => {
            let error = ParseError::MissingEof;
            log_error!(error.error_code(), &error.to_string());
            return (Err(error), tokens);
        }
    }

    log_debug!("Starting parse", "tokens" => token_count);

    let mut parser = Parser::new(TokenStream::new(tokens));
    let result = match parser.parse_template() {
        Ok(template) => {
            log_success!(
                crate::logging::codes::success::PARSE_COMPLETE,
                "Template parsed",
                "tokens" => token_count,
                "root_nodes" => template.body.len()
            );
            Ok(template)
        }
        Err(error) => {
            match error.span() {
                Some(span) => {
                    log_error!(error.error_code(), &error.to_string(), span = span);
                }
                None => {
                    log_error!(error.error_code(), &error.to_string());
                }
            }
            Err(error)
        }
    };
    (result, parser.stream.into_tokens())
}

/// Recursive-descent parser state
pub struct Parser {
    pub(super) stream: TokenStream,
    pub(super) depth: usize,
}

impl Parser {
    pub fn new(stream: TokenStream) -> Self {
        Self { stream, depth: 0 }
    }

    fn parse_template(&mut self) -> ParseResult<Template> {
        let (body, _) = self.parse_statements(&[])?;
        Ok(Template::new(body))
    }

    /// Parse statements until EOF or one of the given end tags.
    ///
    /// When an end tag is matched, its name token is consumed but nothing
    /// after it: the caller finishes the tag, since tags like `elseif`
    /// carry an expression before their `%}`. Returns the collected nodes
    /// and the matched end tag name (empty at top-level EOF).
    fn parse_statements(&mut self, end_tags: &[&str]) -> ParseResult<(Vec<Node>, String)> {
        let mut nodes = Vec::new();

        loop {
            let current = match self.stream.current() {
                Some(spanned) => spanned.clone(),
                None => return self.end_of_statements(end_tags, nodes),
            };

            match current.token {
                Token::Eof => return self.end_of_statements(end_tags, nodes),
                Token::Text(text) => {
                    self.stream.advance();
                    nodes.push(Node::Text(text));
                }
                Token::Comment(_) => {
                    self.stream.advance();
                }
                Token::VariableStart { .. } => {
                    self.stream.advance();
                    let expr = self.parse_expression()?;
                    self.expect_variable_end()?;
                    nodes.push(expr);
                }
                Token::BlockStart { .. } => {
                    let tag_span = current.span;
                    self.stream.advance();
                    let name = self.expect_name("tag name")?;

                    if end_tags.contains(&name.as_str()) {
                        return Ok((nodes, name));
                    }

                    nodes.push(self.parse_block_tag(&name, tag_span)?);
                }
                other => {
                    return Err(ParseError::unexpected_token(
                        "template text or tag",
                        &other.describe(),
                        current.span,
                    ));
                }
            }
        }
    }

    fn end_of_statements(
        &self,
        end_tags: &[&str],
        nodes: Vec<Node>,
    ) -> ParseResult<(Vec<Node>, String)> {
        if end_tags.is_empty() {
            Ok((nodes, String::new()))
        } else {
            Err(ParseError::unexpected_end_of_input(&format!(
                "one of: {}",
                end_tags.join(", ")
            )))
        }
    }

    /// Parse a block body, mapping a bare end-of-input into an unclosed
    /// block error pointing at the opening tag
    fn parse_body(
        &mut self,
        block: &str,
        tag_span: Span,
        end_tags: &[&str],
    ) -> ParseResult<(Vec<Node>, String)> {
        self.parse_statements(end_tags).map_err(|e| match e {
            ParseError::UnexpectedEndOfInput { .. } => ParseError::unclosed_block(block, tag_span),
            other => other,
        })
    }

    fn parse_block_tag(&mut self, name: &str, tag_span: Span) -> ParseResult<Node> {
        match name {
            "if" => self.parse_if(tag_span),
            "for" => self.parse_for(tag_span),
            "set" => self.parse_set(),
            "do" => self.parse_do(),
            "block" => self.parse_block(tag_span),
            "macro" => self.parse_macro(tag_span),
            "verbatim" => self.parse_verbatim(tag_span),
            "extends" => self.parse_extends(tag_span),
            "include" => self.parse_include(tag_span),
            other => Err(ParseError::unknown_tag(other, tag_span)),
        }
    }

    // === STATEMENT PARSERS ===

    fn parse_if(&mut self, tag_span: Span) -> ParseResult<Node> {
        let mut branches = Vec::new();
        let mut else_body = None;

        loop {
            let condition = self.parse_expression()?;
            self.expect_block_end()?;

            let (body, terminator) =
                self.parse_body("if", tag_span, &["elseif", "else", "endif"])?;
            branches.push(Branch { condition, body });

            match terminator.as_str() {
                "elseif" => continue,
                "else" => {
                    self.expect_block_end()?;
                    let (body, terminator) =
                        self.parse_body("if", tag_span, &["else", "elseif", "endif"])?;
                    match terminator.as_str() {
                        "else" => {
                            return Err(ParseError::DuplicateElse {
                                span: self.current_span(),
                            });
                        }
                        "elseif" => {
                            return Err(ParseError::ElseifAfterElse {
                                span: self.current_span(),
                            });
                        }
                        _ => {}
                    }
                    self.expect_block_end()?;
                    else_body = Some(body);
                    break;
                }
                _ => {
                    // endif
                    self.expect_block_end()?;
                    break;
                }
            }
        }

        Ok(Node::If {
            branches,
            else_body,
        })
    }

    fn parse_for(&mut self, tag_span: Span) -> ParseResult<Node> {
        let first_var = self.expect_name("iteration variable")?;
        let (key_var, value_var) = if self.eat_token(&Token::Comma) {
            let second = self.expect_name("value variable")?;
            (Some(first_var), second)
        } else {
            (None, first_var)
        };

        self.expect_operator(Operator::In, "'in'")?;
        let collection = self.parse_expression()?;
        self.expect_block_end()?;

        let (body, terminator) = self.parse_body("for", tag_span, &["else", "endfor"])?;
        let else_body = if terminator == "else" {
            self.expect_block_end()?;
            let (nodes, _) = self.parse_body("for", tag_span, &["endfor"])?;
            self.expect_block_end()?;
            Some(nodes)
        } else {
            self.expect_block_end()?;
            None
        };

        Ok(Node::For {
            key_var,
            value_var,
            collection: Box::new(collection),
            body,
            else_body,
        })
    }

    fn parse_set(&mut self) -> ParseResult<Node> {
        let target = self.expect_name("assignment target")?;
        self.expect_operator(Operator::Assign, "'='")?;
        let value = self.parse_expression()?;
        self.expect_block_end()?;

        Ok(Node::Set {
            target,
            value: Box::new(value),
        })
    }

    fn parse_do(&mut self) -> ParseResult<Node> {
        let expr = self.parse_expression()?;
        self.expect_block_end()?;

        Ok(Node::Do {
            expr: Box::new(expr),
        })
    }

    fn parse_block(&mut self, tag_span: Span) -> ParseResult<Node> {
        let name = self.expect_name("block name")?;
        self.expect_block_end()?;

        let (body, _) = self.parse_body("block", tag_span, &["endblock"])?;
        self.skip_optional_name();
        self.expect_block_end()?;

        Ok(Node::Block { name, body })
    }

    fn parse_macro(&mut self, tag_span: Span) -> ParseResult<Node> {
        let name = self.expect_name("macro name")?;
        self.expect_token(&Token::LeftParen, "'('")?;

        let mut params = Vec::new();
        if !self.eat_token(&Token::RightParen) {
            loop {
                let param_name = self.expect_name("parameter name")?;
                let default = if self.eat_operator(Operator::Assign) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                params.push(MacroParam {
                    name: param_name,
                    default,
                });

                if self.eat_token(&Token::Comma) {
                    continue;
                }
                self.expect_token(&Token::RightParen, "')' or ','")?;
                break;
            }
        }
        self.expect_block_end()?;

        let (body, _) = self.parse_body("macro", tag_span, &["endmacro"])?;
        self.skip_optional_name();
        self.expect_block_end()?;

        Ok(Node::Macro { name, params, body })
    }

    /// Reconstruct everything up to `endverbatim` as literal text,
    /// rebuilding tag syntax character for character from the raw bodies
    /// the tokenizer preserved
    fn parse_verbatim(&mut self, tag_span: Span) -> ParseResult<Node> {
        self.expect_block_end()?;

        let mut text = String::new();
        loop {
            let current = match self.stream.current() {
                Some(spanned) => spanned.clone(),
                None => return Err(ParseError::unclosed_block("verbatim", tag_span)),
            };

            match current.token {
                Token::Eof => {
                    return Err(ParseError::unclosed_block("verbatim", tag_span));
                }
                Token::Text(t) => {
                    text.push_str(&t);
                    self.stream.advance();
                }
                Token::Comment(body) => {
                    text.push_str("{#");
                    text.push_str(&body);
                    text.push_str("#}");
                    self.stream.advance();
                }
                Token::VariableStart { trim, raw_body } => {
                    text.push_str(if trim { "{{-" } else { "{{" });
                    text.push_str(&raw_body);
                    let end_trim = self.skip_tag_body(false)?;
                    text.push_str(if end_trim { "-}}" } else { "}}" });
                }
                Token::BlockStart { trim, raw_body } => {
                    if raw_body.trim() == "endverbatim" {
                        self.stream.advance();
                        self.expect_name("'endverbatim'")?;
                        self.expect_block_end()?;
                        return Ok(Node::Verbatim(text));
                    }

                    text.push_str(if trim { "{%-" } else { "{%" });
                    text.push_str(&raw_body);
                    let end_trim = self.skip_tag_body(true)?;
                    text.push_str(if end_trim { "-%}" } else { "%}" });
                }
                _ => {
                    // Stray in-tag token; already covered by a raw body
                    self.stream.advance();
                }
            }
        }
    }

    /// Skip a tag's body tokens through its end token, returning the end
    /// token's trim flag
    fn skip_tag_body(&mut self, block: bool) -> ParseResult<bool> {
        self.stream.advance(); // past the start token
        loop {
            let current = match self.stream.current() {
                Some(spanned) => spanned,
                None => return Err(ParseError::unexpected_end_of_input("tag end")),
            };
            match (&current.token, block) {
                (Token::VariableEnd { trim }, false) | (Token::BlockEnd { trim }, true) => {
                    let trim = *trim;
                    self.stream.advance();
                    return Ok(trim);
                }
                (Token::Eof, _) => {
                    return Err(ParseError::unexpected_end_of_input("tag end"));
                }
                _ => {
                    self.stream.advance();
                }
            }
        }
    }

    fn parse_extends(&mut self, tag_span: Span) -> ParseResult<Node> {
        let name = self.parse_expression()?;
        self.expect_block_end()?;

        Ok(Node::Extends {
            name: Box::new(name),
            span: tag_span,
        })
    }

    fn parse_include(&mut self, tag_span: Span) -> ParseResult<Node> {
        let name = self.parse_expression()?;

        let with = if self.eat_name("with") {
            let params = self.parse_expression()?;
            match params {
                Node::Hash(pairs) => Some(pairs),
                other => {
                    return Err(ParseError::malformed_expression(
                        &format!(
                            "include parameters must be a hash literal, found {}",
                            other.kind_name()
                        ),
                        tag_span,
                    ));
                }
            }
        } else {
            None
        };
        self.expect_block_end()?;

        Ok(Node::Include {
            name: Box::new(name),
            with,
            span: tag_span,
        })
    }

    // === TOKEN HELPERS ===

    pub(super) fn current_span(&self) -> Span {
        self.stream.current_span().unwrap_or_else(Span::dummy)
    }

    pub(super) fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(ParseError::MaxRecursionDepth {
                span: self.current_span(),
            });
        }
        Ok(())
    }

    pub(super) fn exit(&mut self) {
        self.depth -= 1;
    }

    pub(super) fn expect_name(&mut self, expected: &str) -> ParseResult<String> {
        match self.stream.current() {
            Some(spanned) => match &spanned.token {
                Token::Name(name) => {
                    let name = name.clone();
                    self.stream.advance();
                    Ok(name)
                }
                other => Err(ParseError::unexpected_token(
                    expected,
                    &other.describe(),
                    spanned.span,
                )),
            },
            None => Err(ParseError::unexpected_end_of_input(expected)),
        }
    }

    pub(super) fn expect_token(&mut self, token: &Token, expected: &str) -> ParseResult<()> {
        match self.stream.current() {
            Some(spanned) if spanned.token == *token => {
                self.stream.advance();
                Ok(())
            }
            Some(spanned) => Err(ParseError::unexpected_token(
                expected,
                &spanned.token.describe(),
                spanned.span,
            )),
            None => Err(ParseError::unexpected_end_of_input(expected)),
        }
    }

    pub(super) fn expect_operator(&mut self, op: Operator, expected: &str) -> ParseResult<()> {
        self.expect_token(&Token::Operator(op), expected)
    }

    pub(super) fn expect_block_end(&mut self) -> ParseResult<()> {
        match self.stream.current() {
            Some(spanned) if matches!(spanned.token, Token::BlockEnd { .. }) => {
                self.stream.advance();
                Ok(())
            }
            Some(spanned) => Err(ParseError::unexpected_token(
                "'%}'",
                &spanned.token.describe(),
                spanned.span,
            )),
            None => Err(ParseError::unexpected_end_of_input("'%}'")),
        }
    }

    pub(super) fn expect_variable_end(&mut self) -> ParseResult<()> {
        match self.stream.current() {
            Some(spanned) if matches!(spanned.token, Token::VariableEnd { .. }) => {
                self.stream.advance();
                Ok(())
            }
            Some(spanned) => Err(ParseError::unexpected_token(
                "'}}'",
                &spanned.token.describe(),
                spanned.span,
            )),
            None => Err(ParseError::unexpected_end_of_input("'}}'")),
        }
    }

    pub(super) fn eat_token(&mut self, token: &Token) -> bool {
        if self.stream.current_token() == Some(token) {
            self.stream.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn eat_operator(&mut self, op: Operator) -> bool {
        self.eat_token(&Token::Operator(op))
    }

    pub(super) fn eat_name(&mut self, name: &str) -> bool {
        match self.stream.current_token() {
            Some(token) if token.is_name(name) => {
                self.stream.advance();
                true
            }
            _ => false,
        }
    }

    /// Consume an optional trailing name (e.g. `{% endblock header %}`)
    fn skip_optional_name(&mut self) {
        if matches!(self.stream.current_token(), Some(Token::Name(_))) {
            self.stream.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{BinaryOp, Literal};
    use crate::lexical;

    fn parse_source(source: &str) -> ParseResult<Template> {
        let tokens = lexical::scanner::tokenize(source).unwrap();
        parse(tokens)
    }

    #[test]
    fn test_text_and_variable() {
        let template = parse_source("Hello {{ name }}!").unwrap();
        assert_eq!(template.body.len(), 3);
        assert_eq!(template.body[0], Node::Text("Hello ".to_string()));
        assert_eq!(
            template.body[1],
            Node::Variable {
                name: "name".to_string()
            }
        );
        assert_eq!(template.body[2], Node::Text("!".to_string()));
    }

    #[test]
    fn test_comments_are_dropped() {
        let template = parse_source("a{# note #}b").unwrap();
        assert_eq!(template.body.len(), 2);
        assert_eq!(template.body[0], Node::Text("a".to_string()));
        assert_eq!(template.body[1], Node::Text("b".to_string()));
    }

    #[test]
    fn test_if_elseif_else() {
        let template = parse_source("{% if a %}1{% elseif b %}2{% else %}3{% endif %}").unwrap();
        assert_eq!(template.body.len(), 1);
        match &template.body[0] {
            Node::If {
                branches,
                else_body,
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].body, vec![Node::Text("1".to_string())]);
                assert_eq!(branches[1].body, vec![Node::Text("2".to_string())]);
                assert_eq!(
                    else_body.as_deref(),
                    Some(&[Node::Text("3".to_string())][..])
                );
            }
            other => panic!("expected if node, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_else_rejected() {
        let error = parse_source("{% if a %}1{% else %}2{% else %}3{% endif %}").unwrap_err();
        assert!(matches!(error, ParseError::DuplicateElse { .. }));
    }

    #[test]
    fn test_elseif_after_else_rejected() {
        let error =
            parse_source("{% if a %}1{% else %}2{% elseif b %}3{% endif %}").unwrap_err();
        assert!(matches!(error, ParseError::ElseifAfterElse { .. }));
    }

    #[test]
    fn test_for_loop_with_key_value() {
        let template = parse_source("{% for k, v in items %}x{% endfor %}").unwrap();
        match &template.body[0] {
            Node::For {
                key_var,
                value_var,
                else_body,
                ..
            } => {
                assert_eq!(key_var.as_deref(), Some("k"));
                assert_eq!(value_var, "v");
                assert!(else_body.is_none());
            }
            other => panic!("expected for node, got {:?}", other),
        }
    }

    #[test]
    fn test_for_else() {
        let template = parse_source("{% for i in items %}x{% else %}empty{% endfor %}").unwrap();
        match &template.body[0] {
            Node::For { else_body, .. } => {
                assert_eq!(
                    else_body.as_deref(),
                    Some(&[Node::Text("empty".to_string())][..])
                );
            }
            other => panic!("expected for node, got {:?}", other),
        }
    }

    #[test]
    fn test_set_and_do() {
        let template = parse_source("{% set x = 1 + 2 %}{% do x %}").unwrap();
        match &template.body[0] {
            Node::Set { target, value } => {
                assert_eq!(target, "x");
                assert!(matches!(
                    **value,
                    Node::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected set node, got {:?}", other),
        }
        assert!(matches!(template.body[1], Node::Do { .. }));
    }

    #[test]
    fn test_block_with_named_end() {
        let template = parse_source("{% block header %}hi{% endblock header %}").unwrap();
        match &template.body[0] {
            Node::Block { name, body } => {
                assert_eq!(name, "header");
                assert_eq!(body, &[Node::Text("hi".to_string())]);
            }
            other => panic!("expected block node, got {:?}", other),
        }
    }

    #[test]
    fn test_macro_definition() {
        let template =
            parse_source("{% macro input(name, size = 20) %}<input>{% endmacro %}").unwrap();
        match &template.body[0] {
            Node::Macro { name, params, body } => {
                assert_eq!(name, "input");
                assert_eq!(params.len(), 2);
                assert_eq!(params[0].name, "name");
                assert!(params[0].default.is_none());
                assert_eq!(params[1].name, "size");
                assert_eq!(params[1].default, Some(Node::Literal(Literal::Int(20))));
                assert_eq!(body, &[Node::Text("<input>".to_string())]);
            }
            other => panic!("expected macro node, got {:?}", other),
        }
    }

    #[test]
    fn test_verbatim_replays_tags_exactly() {
        let source = "{% verbatim %}keep {{ this }} and {% that %} raw{% endverbatim %}";
        let template = parse_source(source).unwrap();
        assert_eq!(
            template.body[0],
            Node::Verbatim("keep {{ this }} and {% that %} raw".to_string())
        );
    }

    #[test]
    fn test_verbatim_preserves_trim_markers() {
        let source = "{% verbatim %}{{- x -}}{% endverbatim %}";
        let template = parse_source(source).unwrap();
        assert_eq!(template.body[0], Node::Verbatim("{{- x -}}".to_string()));
    }

    #[test]
    fn test_unclosed_verbatim() {
        let error = parse_source("{% verbatim %}never closed").unwrap_err();
        assert!(matches!(error, ParseError::UnclosedBlock { .. }));
    }

    #[test]
    fn test_extends_and_include_with() {
        let template =
            parse_source("{% extends 'base.html' %}{% include 'part.html' with {'a': 1} %}")
                .unwrap();
        assert!(matches!(template.body[0], Node::Extends { .. }));
        match &template.body[1] {
            Node::Include { with, .. } => {
                let pairs = with.as_ref().unwrap();
                assert_eq!(pairs.len(), 1);
            }
            other => panic!("expected include node, got {:?}", other),
        }
    }

    #[test]
    fn test_include_with_requires_hash() {
        let error = parse_source("{% include 'part.html' with 42 %}").unwrap_err();
        assert!(matches!(error, ParseError::MalformedExpression { .. }));
    }

    #[test]
    fn test_unknown_tag() {
        let error = parse_source("{% bogus %}").unwrap_err();
        match error {
            ParseError::UnknownTag { name, .. } => assert_eq!(name, "bogus"),
            other => panic!("expected unknown tag error, got {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_if_points_at_opening_tag() {
        let error = parse_source("text\n{% if a %}body").unwrap_err();
        match error {
            ParseError::UnclosedBlock { tag, span } => {
                assert_eq!(tag, "if");
                assert_eq!(span.start.line, 2);
            }
            other => panic!("expected unclosed block error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_blocks() {
        let template =
            parse_source("{% for i in items %}{% if i %}{{ i }}{% endif %}{% endfor %}").unwrap();
        match &template.body[0] {
            Node::For { body, .. } => {
                assert!(matches!(body[0], Node::If { .. }));
            }
            other => panic!("expected for node, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_eof_rejected() {
        let error = parse(vec![]).unwrap_err();
        assert!(matches!(error, ParseError::MissingEof));
    }
}
