//! Render context: the scope chain, block and macro tables, and the
//! context pool
//!
//! A context belongs to exactly one render call at a time. Scopes are
//! recycled in place: popping a scope clears its maps and parks the
//! allocation for the next push, so steady-state rendering allocates
//! nothing for scope management.

use crate::config::constants::pool::CONTEXT_POOL_RETAIN;
use crate::grammar::{MacroParam, Node};
use crate::runtime::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A macro body with its parameter list
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub params: Vec<MacroParam>,
    pub body: Vec<Node>,
}

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    blocks: HashMap<String, Arc<Vec<Node>>>,
    macros: HashMap<String, Arc<MacroDef>>,
}

impl Scope {
    fn clear(&mut self) {
        self.vars.clear();
        self.blocks.clear();
        self.macros.clear();
    }

    fn is_cleared(&self) -> bool {
        self.vars.is_empty() && self.blocks.is_empty() && self.macros.is_empty()
    }
}

/// Per-render scope chain and lookup tables
#[derive(Debug)]
pub struct RenderContext {
    scopes: Vec<Scope>,
    spare: Vec<Scope>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            spare: Vec::new(),
        }
    }

    /// Enter a nested scope (loop body, macro call, block render)
    pub fn push_scope(&mut self) {
        let scope = self.spare.pop().unwrap_or_default();
        debug_assert!(scope.is_cleared());
        self.scopes.push(scope);
    }

    /// Leave the innermost scope, recycling its allocation. The root
    /// scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(mut scope) = self.scopes.pop() {
                scope.clear();
                self.spare.push(scope);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Variable lookup in the innermost scope only
    pub fn lookup_local(&self, name: &str) -> Option<&Value> {
        self.scopes.last().and_then(|scope| scope.vars.get(name))
    }

    /// Variable lookup, innermost scope first
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name))
    }

    /// Bind a variable in the innermost scope
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name.to_string(), value);
        }
    }

    pub fn register_macro(&mut self, name: &str, def: Arc<MacroDef>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.macros.insert(name.to_string(), def);
        }
    }

    pub fn lookup_macro(&self, name: &str) -> Option<Arc<MacroDef>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.macros.get(name).cloned())
    }

    /// Register a block body unless a more-derived template already
    /// registered one: in an inheritance chain the child's blocks are
    /// registered first and win
    pub fn register_block(&mut self, name: &str, body: Arc<Vec<Node>>) {
        if self.lookup_block(name).is_some() {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.blocks.insert(name.to_string(), body);
        }
    }

    pub fn lookup_block(&self, name: &str) -> Option<Arc<Vec<Node>>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.blocks.get(name).cloned())
    }

    /// Reset to a single empty scope, keeping all map allocations
    fn clear_for_reuse(&mut self) {
        while self.scopes.len() > 1 {
            self.pop_scope();
        }
        if let Some(root) = self.scopes.first_mut() {
            root.clear();
        }
    }
}

/// Pool of render contexts for reuse across render calls
#[derive(Default)]
pub struct ContextPool {
    contexts: Mutex<Vec<RenderContext>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared context from the pool, or make a fresh one
    pub fn acquire(&self) -> RenderContext {
        match self.contexts.lock() {
            Ok(mut contexts) => contexts.pop().unwrap_or_default(),
            Err(_) => RenderContext::new(),
        }
    }

    /// Return a context to the pool. All maps are cleared before the
    /// context becomes available again.
    pub fn release(&self, mut context: RenderContext) {
        context.clear_for_reuse();
        if let Ok(mut contexts) = self.contexts.lock() {
            if contexts.len() < CONTEXT_POOL_RETAIN {
                contexts.push(context);
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.contexts.lock().map(|contexts| contexts.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing() {
        let mut ctx = RenderContext::new();
        ctx.set("x", Value::Int(1));
        ctx.push_scope();
        ctx.set("x", Value::Int(2));
        assert_eq!(ctx.lookup("x"), Some(&Value::Int(2)));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_outer_scope_visible_from_inner() {
        let mut ctx = RenderContext::new();
        ctx.set("outer", Value::string("yes"));
        ctx.push_scope();
        assert_eq!(ctx.lookup("outer"), Some(&Value::string("yes")));
        assert_eq!(ctx.lookup("missing"), None);
    }

    #[test]
    fn test_lookup_local_ignores_outer_scopes() {
        let mut ctx = RenderContext::new();
        ctx.set("x", Value::Int(1));
        ctx.push_scope();
        assert_eq!(ctx.lookup_local("x"), None);
        assert_eq!(ctx.lookup("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_root_scope_never_popped() {
        let mut ctx = RenderContext::new();
        ctx.pop_scope();
        ctx.pop_scope();
        assert_eq!(ctx.depth(), 1);
        ctx.set("x", Value::Int(1));
        assert_eq!(ctx.lookup("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_block_child_registration_wins() {
        let mut ctx = RenderContext::new();
        let child = Arc::new(vec![Node::Text("child".to_string())]);
        let parent = Arc::new(vec![Node::Text("parent".to_string())]);
        ctx.register_block("header", Arc::clone(&child));
        ctx.register_block("header", parent);
        assert_eq!(ctx.lookup_block("header"), Some(child));
    }

    #[test]
    fn test_macro_visible_across_scopes() {
        let mut ctx = RenderContext::new();
        let def = Arc::new(MacroDef {
            params: vec![],
            body: vec![],
        });
        ctx.register_macro("greet", Arc::clone(&def));
        ctx.push_scope();
        assert_eq!(ctx.lookup_macro("greet"), Some(def));
    }

    #[test]
    fn test_pool_release_clears_everything() {
        let pool = ContextPool::new();
        let mut ctx = pool.acquire();
        ctx.set("x", Value::Int(1));
        ctx.push_scope();
        ctx.set("y", Value::Int(2));
        ctx.register_block("b", Arc::new(vec![]));
        ctx.register_macro(
            "m",
            Arc::new(MacroDef {
                params: vec![],
                body: vec![],
            }),
        );
        pool.release(ctx);

        let reused = pool.acquire();
        assert_eq!(reused.depth(), 1);
        assert_eq!(reused.lookup("x"), None);
        assert_eq!(reused.lookup("y"), None);
        assert!(reused.lookup_block("b").is_none());
        assert!(reused.lookup_macro("m").is_none());
    }

    #[test]
    fn test_pool_reuses_contexts() {
        let pool = ContextPool::new();
        let ctx = pool.acquire();
        assert_eq!(pool.idle_count(), 0);
        pool.release(ctx);
        assert_eq!(pool.idle_count(), 1);
        let _ctx = pool.acquire();
        assert_eq!(pool.idle_count(), 0);
    }
}
