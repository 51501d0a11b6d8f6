//! Engine environment: registered callables, globals, sandbox policy,
//! template loader, and the shared attribute cache
//!
//! One environment is shared across concurrent renders; everything
//! mutable at render time lives in the per-render context instead.

use crate::runtime::attr_cache::AttributeCache;
use crate::runtime::builtins;
use crate::runtime::error::{RenderError, RenderResult};
use crate::runtime::value::Value;
use std::collections::{HashMap, HashSet};

/// A filter: input value plus arguments to output value
pub type FilterFn = Box<dyn Fn(&Value, &[Value]) -> RenderResult<Value> + Send + Sync>;

/// A test: input value plus arguments to boolean
pub type TestFn = Box<dyn Fn(&Value, &[Value]) -> RenderResult<bool> + Send + Sync>;

/// A function: arguments to output value
pub type FunctionFn = Box<dyn Fn(&[Value]) -> RenderResult<Value> + Send + Sync>;

/// A custom binary operator keyed by its symbol, consulted before the
/// built-in operator semantics
pub type OperatorFn = Box<dyn Fn(&Value, &Value) -> RenderResult<Value> + Send + Sync>;

/// Source of template text for `include` and `extends`
pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> RenderResult<String>;
}

/// A bundle of filters/tests/functions registered as a unit
pub trait Extension {
    fn register(&self, env: &mut Environment);
}

/// Shared engine configuration and callable registry
pub struct Environment {
    filters: HashMap<String, FilterFn>,
    tests: HashMap<String, TestFn>,
    functions: HashMap<String, FunctionFn>,
    operators: HashMap<&'static str, OperatorFn>,
    globals: HashMap<String, Value>,
    denied: HashSet<String>,
    sandboxed: bool,
    loader: Option<Box<dyn Loader>>,
    pub(crate) attr_cache: AttributeCache,
}

impl Default for Environment {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Environment {
    /// An empty environment with no registered callables
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
            tests: HashMap::new(),
            functions: HashMap::new(),
            operators: HashMap::new(),
            globals: HashMap::new(),
            denied: HashSet::new(),
            sandboxed: false,
            loader: None,
            attr_cache: AttributeCache::new(),
        }
    }

    /// An environment with the standard filters, tests, and functions
    pub fn with_defaults() -> Self {
        let mut env = Self::new();
        builtins::register_default_filters(&mut env);
        builtins::register_default_tests(&mut env);
        env
    }

    pub fn add_filter<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&Value, &[Value]) -> RenderResult<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Box::new(filter));
    }

    pub fn add_test<F>(&mut self, name: &str, test: F)
    where
        F: Fn(&Value, &[Value]) -> RenderResult<bool> + Send + Sync + 'static,
    {
        self.tests.insert(name.to_string(), Box::new(test));
    }

    pub fn add_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> RenderResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Box::new(function));
    }

    /// Override or extend a binary operator by its symbol (e.g. `"+"`)
    pub fn add_operator<F>(&mut self, symbol: &'static str, operator: F)
    where
        F: Fn(&Value, &Value) -> RenderResult<Value> + Send + Sync + 'static,
    {
        self.operators.insert(symbol, Box::new(operator));
    }

    pub fn add_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn add_extension(&mut self, extension: &dyn Extension) {
        extension.register(self);
    }

    /// Enable sandboxed evaluation and deny the given callable name
    pub fn deny(&mut self, name: &str) {
        self.sandboxed = true;
        self.denied.insert(name.to_string());
    }

    pub fn set_sandboxed(&mut self, sandboxed: bool) {
        self.sandboxed = sandboxed;
    }

    pub fn is_sandboxed(&self) -> bool {
        self.sandboxed
    }

    /// Whether the sandbox denies this callable name. Checked before
    /// arguments are evaluated.
    pub fn is_denied(&self, name: &str) -> bool {
        self.sandboxed && self.denied.contains(name)
    }

    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Some(Box::new(loader));
    }

    /// Load template source by name through the configured loader
    pub fn load_template(&self, name: &str) -> RenderResult<String> {
        match &self.loader {
            Some(loader) => loader.load(name),
            None => Err(RenderError::template_not_found(
                name,
                "no template loader configured",
            )),
        }
    }

    pub fn filter(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&TestFn> {
        self.tests.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionFn> {
        self.functions.get(name)
    }

    pub fn operator(&self, symbol: &str) -> Option<&OperatorFn> {
        self.operators.get(symbol)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn attribute_cache(&self) -> &AttributeCache {
        &self.attr_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_register_standard_callables() {
        let env = Environment::with_defaults();
        assert!(env.filter("upper").is_some());
        assert!(env.filter("default").is_some());
        assert!(env.test("defined").is_some());
        assert!(env.test("divisibleby").is_some());
        assert!(env.filter("bogus").is_none());
    }

    #[test]
    fn test_custom_filter_registration() {
        let mut env = Environment::new();
        env.add_filter("double", |value, _args| match value {
            Value::Int(n) => Ok(Value::Int(n * 2)),
            other => Ok(other.clone()),
        });
        let filter = env.filter("double").unwrap();
        assert_eq!(filter(&Value::Int(21), &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_sandbox_denial() {
        let mut env = Environment::new();
        assert!(!env.is_denied("secret"));
        env.deny("secret");
        assert!(env.is_sandboxed());
        assert!(env.is_denied("secret"));
        assert!(!env.is_denied("open"));
    }

    #[test]
    fn test_custom_operator() {
        let mut env = Environment::new();
        env.add_operator("+", |left, right| {
            Ok(Value::string(format!("{}{}", left, right)))
        });
        let op = env.operator("+").unwrap();
        assert_eq!(
            op(&Value::Int(1), &Value::Int(2)).unwrap(),
            Value::string("12")
        );
    }

    #[test]
    fn test_missing_loader() {
        let env = Environment::new();
        let error = env.load_template("page.html").unwrap_err();
        assert!(matches!(error, RenderError::TemplateNotFound { .. }));
    }

    struct UpperExtension;

    impl Extension for UpperExtension {
        fn register(&self, env: &mut Environment) {
            env.add_function("shout", |args| {
                let text = args.first().map(|v| v.render_string()).unwrap_or_default();
                Ok(Value::string(text.to_uppercase()))
            });
        }
    }

    #[test]
    fn test_extension_registration() {
        let mut env = Environment::new();
        env.add_extension(&UpperExtension);
        assert!(env.function("shout").is_some());
    }
}
