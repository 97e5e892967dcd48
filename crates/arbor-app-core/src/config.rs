// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted host settings for Arbor sessions.
//!
//! Hosts keep [`AppOptions`] (and anything else they like) as JSON blobs keyed
//! by a logical name. The store decides where blobs live; the service owns the
//! JSON encoding and the "nothing stored yet means defaults" rule.

use crate::options::AppOptions;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Logical key under which [`AppOptions`] are persisted.
pub const OPTIONS_KEY: &str = "app-options";

/// Where a host keeps its settings blobs.
pub trait ConfigStore {
    /// Load the blob stored under `key`; [`ConfigError::NotFound`] when absent.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw blob, replacing any previous value.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failure reading or writing host settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing has been stored under this key yet.
    #[error("no settings stored under `{0}`")]
    NotFound(String),
    /// The stored blob under `key` is not the expected JSON shape.
    #[error("settings under `{key}` are malformed: {source}")]
    Malformed {
        /// Key whose blob failed to decode.
        key: String,
        /// Decoder diagnostic.
        source: serde_json::Error,
    },
    /// The backing storage failed.
    #[error("settings storage failed: {0}")]
    Io(#[from] std::io::Error),
    /// A value could not be encoded for storage.
    #[error("settings could not be encoded: {0}")]
    Serde(#[from] serde_json::Error),
    /// The store is unusable for a host-specific reason.
    #[error("settings store unavailable: {0}")]
    Other(String),
}

/// Serializes typed config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize the value stored under `key`.
    ///
    /// Missing keys and empty blobs both yield `Ok(None)`; a blob that does
    /// not decode is [`ConfigError::Malformed`].
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        let bytes = match self.store.load_raw(key) {
            Ok(bytes) => bytes,
            Err(ConfigError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Malformed {
                key: key.to_owned(),
                source,
            })
    }

    /// Serialize `value` as pretty JSON and persist it under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Session options under [`OPTIONS_KEY`], or defaults when none are stored.
    pub fn load_options(&self) -> Result<AppOptions, ConfigError> {
        Ok(self.load(OPTIONS_KEY)?.unwrap_or_default())
    }

    /// Persist [`AppOptions`] under [`OPTIONS_KEY`].
    pub fn save_options(&self, options: &AppOptions) -> Result<(), ConfigError> {
        self.save(OPTIONS_KEY, options)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::NotFound(key.to_owned()))
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_owned(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let service = ConfigService::new(MapStore::default());
        assert_eq!(service.load_options().unwrap(), AppOptions::default());
    }

    #[test]
    fn malformed_options_name_their_key() {
        let store = MapStore::default();
        store.save_raw(OPTIONS_KEY, b"{\"fill_height\": 3}").unwrap();
        let err = ConfigService::new(store).load_options().unwrap_err();
        assert!(matches!(&err, ConfigError::Malformed { key, .. } if key == OPTIONS_KEY));
        assert!(err.to_string().contains("`app-options`"));
    }
}
