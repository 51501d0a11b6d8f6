//! stencil: a pooled template-language engine
//!
//! Templates mix literal text with `{{ expression }}` output tags,
//! `{% statement %}` control tags, and `{# comment #}` blocks. The
//! pipeline is tokenize -> parse -> render; buffers, token vectors, and
//! render contexts are pooled so repeated renders stay allocation-light.
//!
//! ```no_run
//! use stencil::{Engine, Value};
//!
//! let engine = Engine::new();
//! let output = engine
//!     .render_str("Hello {{ name }}!", [("name".to_string(), Value::from("Ada"))])
//!     .unwrap();
//! assert_eq!(output, "Hello Ada!");
//! ```

// Internal modules
pub mod config;
pub mod grammar;
pub mod lexical;
#[macro_use]
pub mod logging;
pub mod pool;
pub mod runtime;
pub mod syntax;
pub mod tokens;
pub mod utils;

// Re-export key types for library consumers
pub use config::EnginePreferences;
pub use grammar::Template;
pub use lexical::LexerError;
pub use runtime::{Attributes, Environment, Extension, Loader, RenderError, Value};
pub use syntax::ParseError;

use pool::{BufferPool, TokenPool};
use runtime::ContextPool;

/// Any failure across the tokenize/parse/render pipeline
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Lex(#[from] LexerError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl EngineError {
    pub fn error_code(&self) -> logging::Code {
        match self {
            EngineError::Lex(error) => error.error_code(),
            EngineError::Parse(error) => error.error_code(),
            EngineError::Render(error) => error.error_code(),
        }
    }
}

/// The engine: an environment plus the pools that back repeated renders
///
/// Cheap to use from multiple threads behind a shared reference; all
/// interior state is the pools and the environment's attribute cache.
pub struct Engine {
    environment: Environment,
    buffers: BufferPool,
    contexts: ContextPool,
    token_vecs: TokenPool,
}

impl Engine {
    /// Engine with the default filter/test set registered
    pub fn new() -> Self {
        Self::with_environment(Environment::with_defaults())
    }

    /// Engine around a caller-configured environment
    pub fn with_environment(environment: Environment) -> Self {
        // First engine in the process installs the global logger
        let _ = logging::init_global_logging();
        Self {
            environment,
            buffers: BufferPool::new(),
            contexts: ContextPool::new(),
            token_vecs: TokenPool::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    /// Tokenize and parse template source into a reusable template
    pub fn compile(&self, source: &str) -> Result<Template, EngineError> {
        let mut tokens = self.token_vecs.acquire();
        if let Err(error) = lexical::scanner::tokenize_into(source, &mut tokens) {
            self.token_vecs.release(tokens);
            return Err(error.into());
        }

        let (result, recovered) = syntax::parse_recycling(tokens);
        self.token_vecs.release(recovered);
        Ok(result?)
    }

    /// Render a compiled template with the given variables
    pub fn render(
        &self,
        template: &Template,
        vars: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, EngineError> {
        let mut context = self.contexts.acquire();
        for (name, value) in vars {
            context.set(&name, value);
        }

        let mut buffer = self.buffers.acquire();
        let result = runtime::render(template, &self.environment, &mut context, &mut buffer);
        let output = buffer.take_string();

        self.contexts.release(context);
        self.buffers.release(buffer);

        result?;
        Ok(output)
    }

    /// Compile and render in one step
    pub fn render_str(
        &self,
        source: &str,
        vars: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, EngineError> {
        let template = self.compile(source)?;
        self.render(&template, vars)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
