//! Compile-time engine limits
//!
//! Resource boundaries are fixed at compile time and cannot be loosened by
//! runtime configuration. Runtime preferences may only tune behavior within
//! these limits.

pub mod lexical {
    /// Maximum template source size (1MB)
    /// SECURITY: Prevents DoS attacks via enormous templates
    pub const MAX_SOURCE_SIZE: usize = 1024 * 1024;

    /// Maximum number of tokens produced from a single template
    /// SECURITY: Prevents DoS via token explosion attacks
    pub const MAX_TOKEN_COUNT: usize = 1_000_000;

    /// Maximum string literal size inside a tag
    /// SECURITY: Limits resource consumption per literal
    pub const MAX_STRING_SIZE: usize = 65_536;
}

pub mod syntax {
    /// Maximum parser recursion depth to prevent stack overflow
    /// SECURITY: Prevents DoS attacks via deeply nested expressions
    pub const MAX_PARSE_DEPTH: usize = 100;
}

pub mod render {
    /// Maximum include/extends nesting depth
    /// SECURITY: Prevents infinite include cycles
    pub const MAX_INCLUDE_DEPTH: usize = 16;

    /// Containment checks below this haystack length use a linear scan;
    /// longer sequences build a temporary hash set
    /// PERFORMANCE: Linear scan beats hashing for short sequences
    pub const CONTAINMENT_HASH_THRESHOLD: usize = 50;
}

pub mod cache {
    /// Maximum number of attribute accessor entries retained
    /// RESOURCE: Bounds cache memory for long-running processes
    pub const ATTRIBUTE_CACHE_CAPACITY: usize = 1000;

    /// Fraction of entries removed per eviction pass (1/N of capacity)
    /// PERFORMANCE: Batch eviction amortizes the scan cost
    pub const ATTRIBUTE_CACHE_EVICT_DIVISOR: usize = 10;
}

pub mod pool {
    /// Initial capacity for freshly allocated render buffers
    pub const BUFFER_INITIAL_CAPACITY: usize = 256;

    /// Below this size buffers double on growth
    pub const BUFFER_SMALL_LIMIT: usize = 1024;

    /// Between the small limit and this size buffers grow by 1.5x;
    /// above it they grow by 1.25x
    pub const BUFFER_MEDIUM_LIMIT: usize = 64 * 1024;

    /// Maximum idle buffers retained by the buffer pool
    /// RESOURCE: Bounds pooled memory between renders
    pub const BUFFER_POOL_RETAIN: usize = 32;

    /// Maximum idle render contexts retained by the context pool
    /// RESOURCE: Bounds pooled memory between renders
    pub const CONTEXT_POOL_RETAIN: usize = 32;

    /// Maximum idle token vectors retained by the token pool
    /// RESOURCE: Bounds pooled memory between tokenizations
    pub const TOKEN_POOL_RETAIN: usize = 32;
}

pub mod logging {
    /// Maximum events retained by the in-memory test logger
    /// RESOURCE: Controls memory usage for event capture
    pub const LOG_BUFFER_SIZE: usize = 1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_sane() {
        assert!(lexical::MAX_SOURCE_SIZE >= 1024);
        assert!(lexical::MAX_TOKEN_COUNT >= 1000);
        assert!(syntax::MAX_PARSE_DEPTH >= 16);
        assert!(render::MAX_INCLUDE_DEPTH >= 2);
        assert!(cache::ATTRIBUTE_CACHE_CAPACITY > cache::ATTRIBUTE_CACHE_EVICT_DIVISOR);
        assert!(pool::BUFFER_SMALL_LIMIT < pool::BUFFER_MEDIUM_LIMIT);
    }
}
