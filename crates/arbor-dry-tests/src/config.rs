// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use arbor_app_core::config::{ConfigError, ConfigStore, OPTIONS_KEY};
use arbor_app_core::options::AppOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory [`ConfigStore`] that counts calls and can be told to fail.
///
/// Clones share state, so a test can hand one clone to a
/// [`ConfigService`](arbor_app_core::config::ConfigService) and inspect
/// the other.
///
/// # Example
///
/// ```
/// use arbor_dry_tests::InMemoryConfigStore;
/// use arbor_app_core::config::ConfigService;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// let options = service.load_options().unwrap();
///
/// assert!(!options.fill_height);
/// assert_eq!(store.load_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with serialized `options` under the options key.
    pub fn with_options(options: &AppOptions) -> Self {
        let store = Self::new();
        if let Ok(bytes) = serde_json::to_vec(options) {
            store.lock().data.insert(OPTIONS_KEY.to_owned(), bytes);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later `load_raw` fail (or stop failing).
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make every later `save_raw` fail (or stop failing).
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// `load_raw` attempts so far, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// `save_raw` attempts so far, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Raw bytes stored under `key`, bypassing the counters.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut state = self.lock();
        state.load_count += 1;
        if state.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        state
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(key.to_owned()))
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut state = self.lock();
        state.save_count += 1;
        if state.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        state.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use arbor_app_core::config::ConfigService;

    #[test]
    fn options_round_trip_through_the_service() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());
        let options = AppOptions {
            fill_height: true,
            frame_interval_ms: 4,
            composite_kinds: vec!["gallery".into()],
        };
        service.save_options(&options).unwrap();
        assert_eq!(service.load_options().unwrap(), options);
        assert_eq!(store.save_count(), 1);
        assert!(store.raw(OPTIONS_KEY).is_some());
    }

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let service = ConfigService::new(InMemoryConfigStore::new());
        assert_eq!(service.load_options().unwrap(), AppOptions::default());
    }

    #[test]
    fn prepopulated_options_are_loaded() {
        let options = AppOptions {
            fill_height: true,
            ..AppOptions::default()
        };
        let service = ConfigService::new(InMemoryConfigStore::with_options(&options));
        assert!(service.load_options().unwrap().fill_height);
    }

    #[test]
    fn failures_still_count_and_store_nothing() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_save(true);
        assert!(matches!(store.save_raw("k", b"v"), Err(ConfigError::Other(_))));
        assert_eq!(store.save_count(), 1);
        assert!(store.raw("k").is_none());

        store.set_fail_on_save(false);
        store.save_raw("k", b"v").unwrap();
        store.set_fail_on_load(true);
        let service = ConfigService::new(store.clone());
        assert!(service.load_options().is_err());
        assert_eq!(store.load_count(), 1);
    }
}
