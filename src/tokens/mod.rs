//! Token types and stream management

pub mod stream;
pub mod token;

pub use stream::TokenStream;
pub use token::{Operator, SpannedToken, Token};
