//! Attribute resolution trait and the bounded concurrent accessor cache
//!
//! Host values expose fields and methods to templates by implementing
//! [`Attributes`]. The cache maps (concrete type, attribute name) to the
//! resolution strategy only, never to values, so two instances of the
//! same type share one cached descriptor but keep their own data.
//!
//! Concurrency: read-mostly under an `RwLock`. A miss takes the
//! exclusive path, re-checks for a racing insert, and only then resolves
//! and stores. Eviction runs synchronously inside the exclusive path
//! when the bound is reached, dropping roughly a tenth of the entries,
//! preferring low access counts and old last-access ticks.

use crate::config::constants::cache::{ATTRIBUTE_CACHE_CAPACITY, ATTRIBUTE_CACHE_EVICT_DIVISOR};
use crate::log_success;
use crate::logging::codes;
use crate::runtime::error::RenderResult;
use crate::runtime::value::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Capability interface for host objects exposed to templates
pub trait Attributes: Any + Send + Sync + fmt::Debug {
    /// Concrete type name for diagnostics and cache keys
    fn type_name(&self) -> &'static str;

    /// Resolve an attribute name to its access strategy, if the name
    /// exists on this type
    fn resolve(&self, name: &str) -> Option<Accessor>;

    /// Read a field by name
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Invoke a method by name
    fn call_method(&self, name: &str, args: &[Value]) -> RenderResult<Value>;

    /// Upcast for concrete type identification
    fn as_any(&self) -> &dyn Any;
}

/// Cached resolution strategy for one (type, attribute) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Field,
    Method,
}

struct CacheEntry {
    accessor: Accessor,
    access_count: AtomicU64,
    last_access: AtomicU64,
}

/// Bounded concurrent cache of attribute accessors keyed by concrete
/// type and attribute name
pub struct AttributeCache {
    entries: RwLock<HashMap<TypeId, HashMap<String, CacheEntry>>>,
    capacity: usize,
    tick: AtomicU64,
}

impl Default for AttributeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::with_capacity(ATTRIBUTE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            tick: AtomicU64::new(0),
        }
    }

    /// Resolve an attribute through the cache. A poisoned lock degrades
    /// to uncached resolution rather than failing the render.
    pub fn resolve(&self, object: &dyn Attributes, name: &str) -> Option<Accessor> {
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let type_id = object.as_any().type_id();

        {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(_) => {
                    crate::logging::safe_log_error(
                        codes::cache::CACHE_POISONED,
                        "Attribute cache read lock poisoned, resolving uncached",
                    );
                    return object.resolve(name);
                }
            };
            if let Some(entry) = entries.get(&type_id).and_then(|by_name| by_name.get(name)) {
                entry.access_count.fetch_add(1, Ordering::Relaxed);
                entry.last_access.store(now, Ordering::Relaxed);
                return Some(entry.accessor);
            }
        }

        let accessor = object.resolve(name)?;

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(_) => {
                crate::logging::safe_log_error(
                    codes::cache::CACHE_POISONED,
                    "Attribute cache write lock poisoned, resolving uncached",
                );
                return Some(accessor);
            }
        };

        // Re-check: another thread may have inserted while we resolved
        if let Some(entry) = entries.get(&type_id).and_then(|by_name| by_name.get(name)) {
            entry.access_count.fetch_add(1, Ordering::Relaxed);
            entry.last_access.store(now, Ordering::Relaxed);
            return Some(entry.accessor);
        }

        if count_entries(&entries) >= self.capacity {
            self.evict(&mut entries);
        }

        entries.entry(type_id).or_default().insert(
            name.to_string(),
            CacheEntry {
                accessor,
                access_count: AtomicU64::new(1),
                last_access: AtomicU64::new(now),
            },
        );

        Some(accessor)
    }

    /// Drop roughly a tenth of the entries, preferring low access counts
    /// and oldest last-access ticks. Caller holds the write lock.
    fn evict(&self, entries: &mut HashMap<TypeId, HashMap<String, CacheEntry>>) {
        let target = (self.capacity / ATTRIBUTE_CACHE_EVICT_DIVISOR).max(1);

        let mut ranked: Vec<(TypeId, String, u64, u64)> = entries
            .iter()
            .flat_map(|(type_id, by_name)| {
                by_name.iter().map(move |(name, entry)| {
                    (
                        *type_id,
                        name.clone(),
                        entry.access_count.load(Ordering::Relaxed),
                        entry.last_access.load(Ordering::Relaxed),
                    )
                })
            })
            .collect();
        ranked.sort_by(|a, b| (a.2, a.3).cmp(&(b.2, b.3)));

        let mut evicted = 0usize;
        for (type_id, name, _, _) in ranked.into_iter().take(target) {
            if let Some(by_name) = entries.get_mut(&type_id) {
                by_name.remove(&name);
                if by_name.is_empty() {
                    entries.remove(&type_id);
                }
                evicted += 1;
            }
        }

        log_success!(
            codes::success::CACHE_EVICTION_COMPLETE,
            "Attribute cache eviction completed",
            "evicted" => evicted,
            "capacity" => self.capacity
        );
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| count_entries(&entries))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

fn count_entries(entries: &HashMap<TypeId, HashMap<String, CacheEntry>>) -> usize {
    entries.values().map(|by_name| by_name.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl Attributes for Point {
        fn type_name(&self) -> &'static str {
            "Point"
        }

        fn resolve(&self, name: &str) -> Option<Accessor> {
            match name {
                "x" | "y" => Some(Accessor::Field),
                "sum" => Some(Accessor::Method),
                _ => None,
            }
        }

        fn get_field(&self, name: &str) -> Option<Value> {
            match name {
                "x" => Some(Value::Int(self.x)),
                "y" => Some(Value::Int(self.y)),
                _ => None,
            }
        }

        fn call_method(&self, name: &str, _args: &[Value]) -> RenderResult<Value> {
            match name {
                "sum" => Ok(Value::Int(self.x + self.y)),
                _ => Ok(Value::Null),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_cache_stores_strategy_not_values() {
        let cache = AttributeCache::new();
        let a = Point { x: 1, y: 2 };
        let b = Point { x: 10, y: 20 };

        assert_eq!(cache.resolve(&a, "x"), Some(Accessor::Field));
        assert_eq!(cache.resolve(&b, "x"), Some(Accessor::Field));
        assert_eq!(cache.len(), 1);

        // Each instance still reads its own data
        assert_eq!(a.get_field("x"), Some(Value::Int(1)));
        assert_eq!(b.get_field("x"), Some(Value::Int(10)));
    }

    #[test]
    fn test_unknown_attribute_is_not_cached() {
        let cache = AttributeCache::new();
        let point = Point { x: 0, y: 0 };
        assert_eq!(cache.resolve(&point, "missing"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_method_resolution() {
        let cache = AttributeCache::new();
        let point = Point { x: 3, y: 4 };
        assert_eq!(cache.resolve(&point, "sum"), Some(Accessor::Method));
        assert_eq!(point.call_method("sum", &[]).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_eviction_prefers_cold_entries() {
        let cache = AttributeCache::with_capacity(2);
        let point = Point { x: 0, y: 0 };

        cache.resolve(&point, "x");
        // Make x hot
        for _ in 0..10 {
            cache.resolve(&point, "x");
        }
        cache.resolve(&point, "y");
        assert_eq!(cache.len(), 2);

        // Inserting a third entry forces eviction of the coldest
        cache.resolve(&point, "sum");
        assert!(cache.len() <= 2);

        // The hot entry survives: resolving it again is still a hit and
        // the cache does not grow
        let before = cache.len();
        cache.resolve(&point, "x");
        assert_eq!(cache.len(), before);
    }

    #[test]
    fn test_concurrent_resolution() {
        let cache = Arc::new(AttributeCache::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                let point = Point { x: 1, y: 2 };
                for _ in 0..100 {
                    assert_eq!(cache.resolve(&point, "x"), Some(Accessor::Field));
                    assert_eq!(cache.resolve(&point, "sum"), Some(Accessor::Method));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
