//! Persisted key/value store
//!
//! The one thing a global reset leaves behind. The kernel keeps its record
//! under a single key; domain tasks keep their own bookkeeping under others.
//!
//! - `MemoryStore`: in-process map, for tests and native hosts
//! - `HostStore` (wasm32): the host's global `Memory` object, see
//!   [`platform`](crate::platform)

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("value at {0:?} is not a string")]
    Encoding(String),
}

/// String-valued persistent store
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;

    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> bool;

    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory store. Cloning it is how tests model "everything but the store
/// was lost".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStore::new();
        assert!(store.get("a").is_none());

        store.set("a", "1".into()).unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert!(store.contains("a"));

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_sorted() {
        let mut store = MemoryStore::new();
        store.set("unit:b", String::new()).unwrap();
        store.set("kernel", String::new()).unwrap();
        store.set("unit:a", String::new()).unwrap();
        assert_eq!(store.keys(), ["kernel", "unit:a", "unit:b"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut store = MemoryStore::new();
        store.set("k", "v".into()).unwrap();
        let copy = store.clone();
        store.set("k", "changed".into()).unwrap();
        assert_eq!(copy.get("k").as_deref(), Some("v"));
    }
}
