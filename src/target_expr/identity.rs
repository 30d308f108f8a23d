//! Identity-keyed map over `Arc`-shared values.
//!
//! The expression model's default comparison is structural, which is exactly
//! wrong for two caches in this crate: per-occurrence parameter expansion and
//! per-projection binding memoization both key on *which instance* a node is,
//! not on what it looks like. Two value-equal raw templates carrying different
//! runtime parameter names must expand independently. This map makes that
//! exception explicit in the type instead of quietly reusing a structural
//! `HashMap` key.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Hashes and compares by allocation address. Holding the `Arc` keeps the
/// allocation alive, so an address can never be reused while it is a key.
#[derive(Debug, Clone)]
struct ByAddress<T>(Arc<T>);

impl<T> PartialEq for ByAddress<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for ByAddress<T> {}

impl<T> Hash for ByAddress<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct IdentityMap<K, V> {
    entries: HashMap<ByAddress<K>, V>,
}

impl<K, V> Default for IdentityMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> IdentityMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Arc<K>) -> Option<&V> {
        self.entries.get(&ByAddress(Arc::clone(key)))
    }

    pub fn get_mut(&mut self, key: &Arc<K>) -> Option<&mut V> {
        self.entries.get_mut(&ByAddress(Arc::clone(key)))
    }

    pub fn insert(&mut self, key: Arc<K>, value: V) -> Option<V> {
        self.entries.insert(ByAddress(key), value)
    }

    pub fn entry_or_default(&mut self, key: &Arc<K>) -> &mut V
    where
        V: Default,
    {
        self.entries
            .entry(ByAddress(Arc::clone(key)))
            .or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
