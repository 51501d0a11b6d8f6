//! Configuration module for the stencil engine
//!
//! Compile-time limits live in [`constants`]; user-tunable behavior lives in
//! [`runtime`].

pub mod constants;
pub mod runtime;

pub use runtime::EnginePreferences;
