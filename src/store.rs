//! The resource store seam.
//!
//! The rule engine resolves each state entry's `resource` template into a
//! byte payload through this trait. Production deployments back it with
//! whatever the app bundle ships with (an embedded asset bundle, a KV
//! store, a remote fetch); this crate ships only [`InMemoryStore`], an
//! illustrative/test implementation — how a resource is actually stored
//! is explicitly out of scope.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves a resource key into bytes for the rule engine to deserialize.
///
/// A single key may resolve to more than one payload (e.g. a store that
/// shards a resource across pages); callers concatenate or otherwise
/// combine the returned chunks as the bundle's rule configuration
/// expects.
pub trait ResourceStore: Send + Sync {
    /// Loads the bytes for `key`. `Err` means "unknown resource" —
    /// callers should not distinguish finer-grained failures from this
    /// seam.
    fn load(&self, key: &str) -> Result<Vec<Bytes>, StoreError>;
}

/// The resource store couldn't resolve a key. Carries no further detail:
/// the rule engine maps every failure to the same `{"error":"unknown
/// resource"}` fallback regardless of cause.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown resource")]
pub struct StoreError;

/// An illustrative, in-memory [`ResourceStore`] keyed by exact string match.
#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Vec<Bytes>>>,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the payload for `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data
            .write()
            .expect("resource store lock poisoned")
            .insert(key.into(), vec![value.into()]);
    }
}

impl ResourceStore for InMemoryStore {
    fn load(&self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        self.data
            .read()
            .expect("resource store lock poisoned")
            .get(key)
            .cloned()
            .ok_or(StoreError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key_loads() {
        let store = InMemoryStore::new();
        store.insert("greeting", Bytes::from_static(b"hi"));
        assert_eq!(store.load("greeting").unwrap(), vec![Bytes::from_static(b"hi")]);
    }

    #[test]
    fn unknown_key_fails() {
        let store = InMemoryStore::new();
        assert_eq!(store.load("missing"), Err(StoreError));
    }

    #[test]
    fn insert_replaces_existing() {
        let store = InMemoryStore::new();
        store.insert("k", Bytes::from_static(b"a"));
        store.insert("k", Bytes::from_static(b"b"));
        assert_eq!(store.load("k").unwrap(), vec![Bytes::from_static(b"b")]);
    }
}
