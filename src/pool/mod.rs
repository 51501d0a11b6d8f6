//! Object pools backing allocation-free repeated rendering
//!
//! All pools support concurrent acquire/release behind a mutex. Pooled
//! objects must never be used after release and never double-released.

pub mod buffer;
pub mod tokens;

pub use buffer::{Buffer, BufferPool};
pub use tokens::TokenPool;
