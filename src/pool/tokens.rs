//! Token vector pool
//!
//! Tokenizing into a pooled vector keeps repeated parses of short
//! templates allocation-free once the pool is warm.

use crate::config::constants::pool::TOKEN_POOL_RETAIN;
use crate::tokens::SpannedToken;
use std::sync::Mutex;

/// Pool of token vectors for reuse across tokenize calls
#[derive(Default)]
pub struct TokenPool {
    vectors: Mutex<Vec<Vec<SpannedToken>>>,
}

impl TokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an empty token vector from the pool, or allocate one
    pub fn acquire(&self) -> Vec<SpannedToken> {
        match self.vectors.lock() {
            Ok(mut vectors) => vectors.pop().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Return a token vector to the pool, cleared
    pub fn release(&self, mut tokens: Vec<SpannedToken>) {
        tokens.clear();
        if let Ok(mut vectors) = self.vectors.lock() {
            if vectors.len() < TOKEN_POOL_RETAIN {
                vectors.push(tokens);
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.vectors.lock().map(|vectors| vectors.len()).unwrap_or(0)
    }
}
