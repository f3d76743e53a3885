//! Process-wide memo tables for deterministic numeric tables.
//!
//! Coefficient tables and quadrature rules depend only on their key, so they
//! are computed once and shared read-only for the rest of the process.
//!
//! # Example
//! ```ignore
//! let table: MemoTable<usize, Vec<f64>> = MemoTable::new();
//! let rows = table.get_or_insert_with(4, || expensive_rows(4));
//! let stats = table.stats();
//! println!("entries: {}, hits: {}", stats.entries, stats.hits);
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Read-through cache: lookups take a shared lock, a miss computes the value
/// under the exclusive lock so each key is built exactly once.
#[derive(Debug)]
pub struct MemoTable<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Memo table statistics for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Lookups answered from the table.
    pub hits: usize,
    /// Lookups that had to compute the value.
    pub misses: usize,
}

impl MemoStats {
    /// Returns the hit rate as a value between 0.0 and 1.0.
    /// Returns 0.0 if no lookups have been made.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl<K, V> Default for MemoTable<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

impl<K: Eq + Hash + Copy, V> MemoTable<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, calling `make` only on the first
    /// lookup of that key.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> Arc<V> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(cached);
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have filled the slot between the two locks.
        if let Some(cached) = entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(make());
        entries.insert(key, Arc::clone(&value));
        value
    }

    /// Checks whether `key` is cached without computing it.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[must_use]
    pub fn stats(&self) -> MemoStats {
        MemoStats {
            entries: self.entries.read().unwrap_or_else(PoisonError::into_inner).len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
