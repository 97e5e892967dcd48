// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live instance index: component id → current props.
//!
//! All props of the session live behind a single lock so a batch of writes is
//! one transition: readers see the state before the batch or after it, never
//! in between.

use crate::payload::{ComponentId, Props};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Shared, lock-guarded props of every registered component.
#[derive(Debug, Default)]
pub struct PropStore {
    props: RwLock<HashMap<ComponentId, Props>>,
}

impl PropStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the props of `id`.
    pub fn register(&self, id: ComponentId, props: Props) {
        self.props
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, props);
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.props
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.props.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every prop of `id`.
    pub fn props(&self, id: ComponentId) -> Option<Props> {
        self.props
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Current value of one prop.
    pub fn get(&self, id: ComponentId, prop: &str) -> Option<Value> {
        self.props
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .and_then(|props| props.get(prop))
            .cloned()
    }

    /// Apply `writes` in order under one write lock.
    ///
    /// Writes for unregistered ids are skipped; returns how many were applied.
    pub fn apply<I>(&self, writes: I) -> usize
    where
        I: IntoIterator<Item = (ComponentId, String, Value)>,
    {
        let mut props = self.props.write().unwrap_or_else(|e| e.into_inner());
        let mut applied = 0;
        for (id, prop, value) in writes {
            if let Some(target) = props.get_mut(&id) {
                target.insert(prop, value);
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_is_ordered_and_skips_unknown_ids() {
        let store = PropStore::new();
        store.register(1, Props::new());
        let applied = store.apply([
            (1, "value".to_owned(), json!("a")),
            (9, "value".to_owned(), json!("x")),
            (1, "value".to_owned(), json!("b")),
        ]);
        assert_eq!(applied, 2);
        assert_eq!(store.get(1, "value"), Some(json!("b")));
        assert!(!store.contains(9));
    }
}
