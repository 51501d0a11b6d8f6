//! The evaluator: walks the AST against a render context and writes
//! output text
//!
//! Soft-failure semantics: undefined variables, missing map keys, and
//! missing attributes resolve to null, never an error. Hard failures
//! (division by zero, unknown callables, sandbox violations, invalid
//! regular expressions) abort the render. `and`/`or` short-circuit and
//! are the only constructs that skip evaluation of a subtree.

use crate::config::constants::render::MAX_INCLUDE_DEPTH;
use crate::grammar::{BinaryOp, Literal, Node, Template};
use crate::logging::codes;
use crate::pool::Buffer;
use crate::runtime::attr_cache::Accessor;
use crate::runtime::context::{MacroDef, RenderContext};
use crate::runtime::environment::Environment;
use crate::runtime::error::{RenderError, RenderResult};
use crate::runtime::ops;
use crate::runtime::value::{PendingCall, Value};
use crate::utils::Span;
use crate::{log_error, log_success};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Render a parsed template into the output buffer
pub fn render(
    template: &Template,
    env: &Environment,
    ctx: &mut RenderContext,
    out: &mut Buffer,
) -> RenderResult<()> {
    let mut renderer = Renderer::new(env);
    match renderer.render_template(template, ctx, out) {
        Ok(()) => {
            log_success!(
                codes::success::RENDER_COMPLETE,
                "Template rendered",
                "output_bytes" => out.len()
            );
            Ok(())
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
    }
}

struct Renderer<'env> {
    env: &'env Environment,
    include_depth: usize,
    cache_attributes: bool,
}

impl<'env> Renderer<'env> {
    fn new(env: &'env Environment) -> Self {
        Self {
            env,
            include_depth: 0,
            cache_attributes: crate::config::runtime::preferences().cache_attributes,
        }
    }

    /// Render a template, following its `extends` chain. The child's
    /// blocks and macros are registered before the parent renders, so
    /// the most-derived override wins.
    fn render_template(
        &mut self,
        template: &Template,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        self.hoist_definitions(&template.body, ctx);

        if let Some(parent_expr) = template.extends() {
            if self.include_depth >= MAX_INCLUDE_DEPTH {
                return Err(RenderError::MaxIncludeDepth {
                    limit: MAX_INCLUDE_DEPTH,
                });
            }
            let name = self.eval(parent_expr, ctx)?.render_string();
            let source = self.env.load_template(&name)?;
            let tokens = crate::lexical::scanner::tokenize(&source)?;
            let parent = crate::syntax::parse(tokens)?;
            self.include_depth += 1;
            let result = self.render_template(&parent, ctx, out);
            self.include_depth -= 1;
            return result;
        }

        self.render_nodes(&template.body, ctx, out)
    }

    /// Register block bodies and macro definitions before rendering.
    /// Blocks register first-wins, so a child template's overrides
    /// shadow the parent's defaults.
    fn hoist_definitions(&self, nodes: &[Node], ctx: &mut RenderContext) {
        for node in nodes {
            match node {
                Node::Block { name, body } => {
                    ctx.register_block(name, Arc::new(body.clone()));
                    self.hoist_definitions(body, ctx);
                }
                Node::Macro { name, params, body } => {
                    ctx.register_macro(
                        name,
                        Arc::new(MacroDef {
                            params: params.clone(),
                            body: body.clone(),
                        }),
                    );
                }
                _ => {}
            }
        }
    }

    fn render_nodes(
        &mut self,
        nodes: &[Node],
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        for node in nodes {
            self.render_node(node, ctx, out)?;
        }
        Ok(())
    }

    fn render_node(
        &mut self,
        node: &Node,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        match node {
            Node::Text(text) => {
                out.write_str(text);
                Ok(())
            }
            Node::Verbatim(text) => {
                out.write_str(text);
                Ok(())
            }
            Node::If {
                branches,
                else_body,
            } => {
                for branch in branches {
                    if self.eval(&branch.condition, ctx)?.is_truthy() {
                        return self.render_nodes(&branch.body, ctx, out);
                    }
                }
                if let Some(body) = else_body {
                    return self.render_nodes(body, ctx, out);
                }
                Ok(())
            }
            Node::For {
                key_var,
                value_var,
                collection,
                body,
                else_body,
            } => self.render_for(key_var.as_deref(), value_var, collection, body, else_body.as_deref(), ctx, out),
            Node::Block { name, body } => {
                // A registered override (from a more-derived template)
                // replaces the inline body
                let override_body = ctx.lookup_block(name);
                ctx.push_scope();
                let result = match &override_body {
                    Some(owned) => self.render_nodes(owned, ctx, out),
                    None => self.render_nodes(body, ctx, out),
                };
                ctx.pop_scope();
                result
            }
            // Hoisting only walks top-level and block bodies; a macro
            // nested inside a statement body registers when rendering
            // reaches its definition site. Renders nothing either way.
            Node::Macro { name, params, body } => {
                ctx.register_macro(
                    name,
                    Arc::new(MacroDef {
                        params: params.clone(),
                        body: body.clone(),
                    }),
                );
                Ok(())
            }
            Node::Set { target, value } => {
                let value = self.eval(value, ctx)?;
                ctx.set(target, value);
                Ok(())
            }
            Node::Do { expr } => {
                self.eval(expr, ctx)?;
                Ok(())
            }
            Node::Include { name, with, .. } => {
                self.render_include(name, with.as_deref(), ctx, out)
            }
            // The extends chain is resolved at template level
            Node::Extends { .. } => Ok(()),
            expr => {
                let value = self.eval(expr, ctx)?;
                self.write_value(&value, ctx, out)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_for(
        &mut self,
        key_var: Option<&str>,
        value_var: &str,
        collection: &Node,
        body: &[Node],
        else_body: Option<&[Node]>,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        let collection = self.eval(collection, ctx)?;

        enum Iteration {
            Empty,
            Array(Arc<Vec<Value>>),
            Map(Arc<BTreeMap<String, Value>>),
            Chars(Vec<char>),
        }

        let iteration = match &collection {
            Value::Array(items) if !items.is_empty() => Iteration::Array(Arc::clone(items)),
            Value::Map(entries) if !entries.is_empty() => Iteration::Map(Arc::clone(entries)),
            Value::Str(s) if !s.is_empty() => Iteration::Chars(s.chars().collect()),
            _ => Iteration::Empty,
        };

        if let Iteration::Empty = iteration {
            if let Some(body) = else_body {
                return self.render_nodes(body, ctx, out);
            }
            return Ok(());
        }

        ctx.push_scope();
        let result = (|| {
            match iteration {
                Iteration::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        if let Some(key_var) = key_var {
                            ctx.set(key_var, Value::Int(index as i64));
                        }
                        ctx.set(value_var, item.clone());
                        self.render_nodes(body, ctx, out)?;
                    }
                }
                Iteration::Map(entries) => {
                    for (key, value) in entries.iter() {
                        if let Some(key_var) = key_var {
                            ctx.set(key_var, Value::string(key.clone()));
                        }
                        ctx.set(value_var, value.clone());
                        self.render_nodes(body, ctx, out)?;
                    }
                }
                Iteration::Chars(chars) => {
                    for (index, c) in chars.into_iter().enumerate() {
                        if let Some(key_var) = key_var {
                            ctx.set(key_var, Value::Int(index as i64));
                        }
                        ctx.set(value_var, Value::string(c.to_string()));
                        self.render_nodes(body, ctx, out)?;
                    }
                }
                Iteration::Empty => {}
            }
            Ok(())
        })();
        ctx.pop_scope();
        result
    }

    fn render_include(
        &mut self,
        name: &Node,
        with: Option<&[(Node, Node)]>,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(RenderError::MaxIncludeDepth {
                limit: MAX_INCLUDE_DEPTH,
            });
        }
        let name = self.eval(name, ctx)?.render_string();
        let source = self.env.load_template(&name)?;
        let tokens = crate::lexical::scanner::tokenize(&source)?;
        let template = crate::syntax::parse(tokens)?;

        ctx.push_scope();
        let result = (|| {
            if let Some(pairs) = with {
                for (key, value) in pairs {
                    let key = self.eval(key, ctx)?.render_string();
                    let value = self.eval(value, ctx)?;
                    ctx.set(&key, value);
                }
            }
            self.include_depth += 1;
            let rendered = self.render_template(&template, ctx, out);
            self.include_depth -= 1;
            rendered
        })();
        ctx.pop_scope();
        result
    }

    /// Write an evaluated value to output, rendering deferred macro
    /// calls through their bodies
    fn write_value(
        &mut self,
        value: &Value,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        match value {
            Value::Null => Ok(()),
            Value::Int(n) => {
                out.write_int(*n);
                Ok(())
            }
            Value::Float(n) => {
                out.write_float(*n);
                Ok(())
            }
            Value::Str(s) => {
                out.write_str(s);
                Ok(())
            }
            Value::MacroCall(call) => self.render_macro_call(call, ctx, out),
            other => {
                out.write_str(&other.render_string());
                Ok(())
            }
        }
    }

    fn render_macro_call(
        &mut self,
        call: &PendingCall,
        ctx: &mut RenderContext,
        out: &mut Buffer,
    ) -> RenderResult<()> {
        let def = ctx
            .lookup_macro(&call.macro_name)
            .ok_or_else(|| RenderError::UnknownMacro {
                name: call.macro_name.clone(),
                span: Span::dummy(),
            })?;

        ctx.push_scope();
        let result = (|| {
            for (index, param) in def.params.iter().enumerate() {
                let value = match call.args.get(index) {
                    Some(arg) => arg.clone(),
                    None => match &param.default {
                        Some(default) => self.eval(default, ctx)?,
                        None => Value::Null,
                    },
                };
                ctx.set(&param.name, value);
            }
            self.render_nodes(&def.body, ctx, out)
        })();
        ctx.pop_scope();
        result
    }

    // === EXPRESSION EVALUATION ===

    fn eval(&mut self, node: &Node, ctx: &mut RenderContext) -> RenderResult<Value> {
        match node {
            Node::Literal(literal) => Ok(literal_value(literal)),
            Node::Variable { name } => Ok(self.lookup_variable(name, ctx)),
            Node::GetAttr { object, name, span } => {
                let object = self.eval(object, ctx)?;
                self.get_attribute(&object, name, *span)
            }
            Node::GetItem { object, index } => {
                let object = self.eval(object, ctx)?;
                let index = self.eval(index, ctx)?;
                Ok(get_item(&object, &index))
            }
            Node::Binary {
                op,
                left,
                right,
                span,
            } => self.eval_binary(*op, left, right, *span, ctx),
            Node::Unary { op, operand } => {
                let operand = self.eval(operand, ctx)?;
                ops::unary(*op, &operand, Span::dummy())
            }
            Node::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, ctx)?.is_truthy() {
                    self.eval(then_branch, ctx)
                } else {
                    self.eval(else_branch, ctx)
                }
            }
            Node::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element, ctx)?);
                }
                Ok(Value::array(items))
            }
            Node::Hash(pairs) => {
                let mut entries = BTreeMap::new();
                for (key, value) in pairs {
                    let key = self.eval(key, ctx)?.render_string();
                    let value = self.eval(value, ctx)?;
                    entries.insert(key, value);
                }
                Ok(Value::map(entries))
            }
            Node::Call { target, args, span } => self.eval_call(target, args, *span, ctx),
            Node::Filter {
                value,
                name,
                args,
                span,
            } => self.eval_filter(value, name, args, *span, ctx),
            Node::Test {
                value,
                name,
                args,
                negated,
                span,
            } => self.eval_test(value, name, args, *negated, *span, ctx),
            // Statement nodes never appear in expression position; the
            // parser only produces them at statement level
            _ => Ok(Value::Null),
        }
    }

    /// Resolution order: innermost scope, then environment globals, then
    /// the outer scope chain
    fn lookup_variable(&self, name: &str, ctx: &RenderContext) -> Value {
        if let Some(value) = ctx.lookup_local(name) {
            return value.clone();
        }
        if let Some(value) = self.env.global(name) {
            return value.clone();
        }
        if let Some(value) = ctx.lookup(name) {
            return value.clone();
        }
        // Undefined variables are a soft failure
        Value::Null
    }

    fn get_attribute(&self, object: &Value, name: &str, _span: Span) -> RenderResult<Value> {
        match object {
            Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
            Value::Object(obj) => {
                let accessor = if self.cache_attributes {
                    self.env.attr_cache.resolve(obj.as_ref(), name)
                } else {
                    obj.resolve(name)
                };
                match accessor {
                    Some(Accessor::Field) => Ok(obj.get_field(name).unwrap_or(Value::Null)),
                    Some(Accessor::Method) => obj.call_method(name, &[]),
                    // Missing attributes are a soft failure
                    None => Ok(Value::Null),
                }
            }
            _ => Ok(Value::Null),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        span: Span,
        ctx: &mut RenderContext,
    ) -> RenderResult<Value> {
        // Short-circuit forms skip the right subtree entirely, including
        // any error it would raise. Custom operator overrides disable
        // the short circuit since both operands are required.
        match op {
            BinaryOp::And if self.env.operator("and").is_none() => {
                if !self.eval(left, ctx)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let right = self.eval(right, ctx)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            BinaryOp::Or if self.env.operator("or").is_none() => {
                if self.eval(left, ctx)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let right = self.eval(right, ctx)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            BinaryOp::NullCoalesce if self.env.operator("??").is_none() => {
                let left = self.eval(left, ctx)?;
                if !matches!(left, Value::Null) {
                    return Ok(left);
                }
                return self.eval(right, ctx);
            }
            _ => {}
        }

        let left = self.eval(left, ctx)?;
        let right = self.eval(right, ctx)?;
        ops::binary(self.env, op, &left, &right, span)
    }

    /// Dispatch a call: macros in scope, then environment functions,
    /// then built-ins. Sandbox denial fires before arguments are
    /// evaluated.
    fn eval_call(
        &mut self,
        target: &Node,
        args: &[Node],
        span: Span,
        ctx: &mut RenderContext,
    ) -> RenderResult<Value> {
        match target {
            Node::Variable { name } => {
                if self.env.is_denied(name) {
                    return Err(RenderError::sandbox_violation(name, span));
                }

                if ctx.lookup_macro(name).is_some() {
                    let args = self.eval_args(args, ctx)?;
                    return Ok(Value::MacroCall(Arc::new(PendingCall {
                        macro_name: name.clone(),
                        args,
                    })));
                }

                if let Some(function) = self.env.function(name) {
                    let args = self.eval_args(args, ctx)?;
                    return function(&args);
                }

                if crate::runtime::builtins::is_builtin(name) {
                    let args = self.eval_args(args, ctx)?;
                    return crate::runtime::builtins::call_builtin(name, &args, span)
                        .unwrap_or(Ok(Value::Null));
                }

                Err(RenderError::unknown_function(name, span))
            }
            Node::GetAttr { object, name, .. } => {
                if self.env.is_denied(name) {
                    return Err(RenderError::sandbox_violation(name, span));
                }
                let object = self.eval(object, ctx)?;
                match &object {
                    Value::Object(obj) => {
                        let accessor = if self.cache_attributes {
                            self.env.attr_cache.resolve(obj.as_ref(), name)
                        } else {
                            obj.resolve(name)
                        };
                        match accessor {
                            Some(Accessor::Method) => {
                                let args = self.eval_args(args, ctx)?;
                                obj.call_method(name, &args)
                            }
                            Some(Accessor::Field) => Err(RenderError::type_mismatch(
                                &format!("'{}' is a field, not a method", name),
                                span,
                            )),
                            None => Ok(Value::Null),
                        }
                    }
                    other => Err(RenderError::type_mismatch(
                        &format!("cannot call a method on {}", other.type_name()),
                        span,
                    )),
                }
            }
            other => Err(RenderError::type_mismatch(
                &format!("{} is not callable", other.kind_name()),
                span,
            )),
        }
    }

    fn eval_filter(
        &mut self,
        value: &Node,
        name: &str,
        args: &[Node],
        span: Span,
        ctx: &mut RenderContext,
    ) -> RenderResult<Value> {
        if self.env.is_denied(name) {
            return Err(RenderError::sandbox_violation(name, span));
        }
        let filter = self
            .env
            .filter(name)
            .ok_or_else(|| RenderError::unknown_filter(name, span))?;
        let value = self.eval(value, ctx)?;
        let args = self.eval_args(args, ctx)?;
        filter(&value, &args)
    }

    fn eval_test(
        &mut self,
        value: &Node,
        name: &str,
        args: &[Node],
        negated: bool,
        span: Span,
        ctx: &mut RenderContext,
    ) -> RenderResult<Value> {
        let test = self
            .env
            .test(name)
            .ok_or_else(|| RenderError::unknown_test(name, span))?;
        let value = self.eval(value, ctx)?;
        let args = self.eval_args(args, ctx)?;
        let outcome = test(&value, &args)?;
        Ok(Value::Bool(outcome != negated))
    }

    fn eval_args(&mut self, args: &[Node], ctx: &mut RenderContext) -> RenderResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, ctx)?);
        }
        Ok(values)
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Str(s) => Value::string(s.clone()),
    }
}

/// Index access: arrays by integer, maps by rendered key, strings by
/// character position. Anything missing is a soft failure.
fn get_item(object: &Value, index: &Value) -> Value {
    match (object, index) {
        (Value::Array(items), Value::Int(n)) => {
            if *n < 0 {
                return Value::Null;
            }
            items.get(*n as usize).cloned().unwrap_or(Value::Null)
        }
        (Value::Map(entries), key) => entries
            .get(&key.render_string())
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Str(s), Value::Int(n)) => {
            if *n < 0 {
                return Value::Null;
            }
            s.chars()
                .nth(*n as usize)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}
