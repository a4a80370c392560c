//! Session-owned rulebook cache
//!
//! Rulebooks are expensive to build and are shared across paired layers
//! (a downsampling convolution and the inverse convolution that mirrors
//! it). The cache is an explicit object owned by the network or session
//! and passed into operator invocations; there is no ambient global
//! state. Published rulebooks are immutable; a changed geometry must go
//! under a new key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Rulebook;

/// Keyed store of immutable, shareable rulebooks
#[derive(Default)]
pub struct RulebookCache {
    map: RwLock<HashMap<String, Arc<Rulebook>>>,
}

impl RulebookCache {
    /// An empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the rulebook stored under `key`
    pub fn get(&self, key: &str) -> Option<Arc<Rulebook>> {
        self.map.read().get(key).cloned()
    }

    /// Publish a rulebook under `key`, returning the shared handle
    ///
    /// An existing entry under the same key is replaced; callers that
    /// reuse keys across geometries get the mismatch error at the next
    /// reuse attempt, not silent stale connectivity.
    pub fn insert(&self, key: impl Into<String>, rulebook: Rulebook) -> Arc<Rulebook> {
        let handle = Arc::new(rulebook);
        self.map.write().insert(key.into(), Arc::clone(&handle));
        handle
    }

    /// Whether a rulebook is stored under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.read().contains_key(key)
    }

    /// Number of stored rulebooks
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Drop every stored rulebook
    ///
    /// Outstanding `Arc` handles stay valid; pending backward passes are
    /// unaffected.
    pub fn clear(&self) {
        self.map.write().clear();
    }
}

impl std::fmt::Debug for RulebookCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulebookCache")
            .field("len", &self.len())
            .finish()
    }
}
