//! Shared utility types for the stencil engine

pub mod span;

pub use span::{Position, SourceMap, Span};
