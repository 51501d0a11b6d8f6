//! Runtime evaluation: values, environment, render context, operator
//! semantics, built-ins, and the attribute cache

pub mod attr_cache;
pub mod builtins;
pub mod context;
pub mod environment;
pub mod error;
pub mod eval;
pub mod ops;
pub mod value;

pub use attr_cache::{Accessor, AttributeCache, Attributes};
pub use context::{ContextPool, MacroDef, RenderContext};
pub use environment::{Environment, Extension, Loader};
pub use error::{RenderError, RenderResult};
pub use eval::render;
pub use value::{Number, PendingCall, Value};
