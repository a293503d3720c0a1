//! Write generations
//!
//! Every invalidation advances a monotonic counter and stamps the affected
//! scope (one key, one namespace, or everything). A key's generation is the
//! newest stamp covering it. A write started under an older generation is
//! stale and must not land.

use std::collections::HashMap;

use crate::cache::key::namespace_of;

#[derive(Debug, Default)]
pub(crate) struct Generations {
    counter: u64,
    keys: HashMap<String, u64>,
    namespaces: HashMap<String, u64>,
    cleared: u64,
}

impl Generations {
    /// Current generation of `key`.
    pub(crate) fn of(&self, key: &str) -> u64 {
        let mut generation = self.cleared;
        if let Some(stamp) = self.keys.get(key) {
            generation = generation.max(*stamp);
        }
        if let Some(stamp) = namespace_of(key).and_then(|ns| self.namespaces.get(ns)) {
            generation = generation.max(*stamp);
        }
        generation
    }

    pub(crate) fn advance_key(&mut self, key: &str) -> u64 {
        self.counter += 1;
        self.keys.insert(key.to_string(), self.counter);
        self.counter
    }

    pub(crate) fn advance_namespace(&mut self, namespace: &str) {
        self.counter += 1;
        self.namespaces.insert(namespace.to_string(), self.counter);
    }

    /// Supersedes every key. Older per-key stamps are dominated and dropped.
    pub(crate) fn advance_all(&mut self) {
        self.counter += 1;
        self.cleared = self.counter;
        self.keys.clear();
        self.namespaces.clear();
    }
}
