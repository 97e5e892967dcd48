// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lazy, memoized resolution of component implementations.
//!
//! Implementations are keyed by `(class id, variant)`. Each key is loaded at
//! most once per session: the first request starts the fetch, concurrent
//! requests for the same key join it, and the outcome (success or failure) is
//! cached for every later lookup.

use crate::payload::ComponentMeta;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

/// Opaque implementation module produced by a [`ModuleSource`].
pub type ModuleHandle = Arc<dyn Any + Send + Sync>;

/// Which flavour of an implementation to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    /// The full interactive component.
    Component,
    /// The compact rendering used inside composite (dataset) rows.
    Example,
}

impl Variant {
    /// Wire name of the variant.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Example => "example",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to resolve an implementation module. Non-fatal for assembly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The module source has nothing for this class/variant.
    #[error("no {variant} module for class `{class_id}`")]
    NotFound {
        /// Requested class id.
        class_id: String,
        /// Requested variant.
        variant: Variant,
    },
    /// The module was retrieved but could not be parsed.
    #[error("module for class `{class_id}` is malformed: {message}")]
    Parse {
        /// Requested class id.
        class_id: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The module source itself failed (I/O, transport).
    #[error("module source failed: {0}")]
    Source(String),
}

/// What a [`ModuleSource`] hands back for one fetch.
pub struct LoadedModule {
    /// The implementation itself.
    pub implementation: ModuleHandle,
    /// Canonical type name reported by the source.
    pub resolved_type_name: String,
}

/// External module-resolution service.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetch the implementation for `class_id` from the source rooted at `root_url`.
    async fn fetch_module(
        &self,
        root_url: &str,
        type_name: &str,
        class_id: &str,
        variant: Variant,
    ) -> Result<LoadedModule, LoadError>;
}

/// A resolved implementation, shared read-only by every instance of its class.
#[derive(Clone)]
pub struct ResolvedComponent {
    /// Resolved type name.
    pub name: String,
    /// Class id it was resolved for.
    pub class_id: String,
    /// Variant that was fetched.
    pub variant: Variant,
    /// The implementation module.
    pub implementation: ModuleHandle,
}

impl ResolvedComponent {
    /// Downcast the implementation to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.implementation.downcast_ref::<T>()
    }
}

impl fmt::Debug for ResolvedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedComponent")
            .field("name", &self.name)
            .field("class_id", &self.class_id)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// Outcome of one load, cached as-is.
pub type LoadResult = Result<Arc<ResolvedComponent>, LoadError>;

/// Example-variant implementations keyed by component type name.
pub type ExampleComponents = BTreeMap<String, Arc<ResolvedComponent>>;

/// Everything [`ComponentLoader::resolve`] knows about one component.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    /// The component implementation, or why it could not be loaded.
    pub component: LoadResult,
    /// Resolved type name (falls back to the requested type on failure).
    pub name: String,
    /// Example sub-components, present only for composite kinds.
    pub example_components: Option<ExampleComponents>,
}

type CacheKey = (String, Variant);

/// Per-session implementation cache in front of a [`ModuleSource`].
pub struct ComponentLoader {
    source: Arc<dyn ModuleSource>,
    root_url: String,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<LoadResult>>>>,
}

impl ComponentLoader {
    /// New, empty cache over `source`.
    pub fn new(source: Arc<dyn ModuleSource>, root_url: impl Into<String>) -> Self {
        Self {
            source,
            root_url: root_url.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Root URL handed to the module source.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Load (or join, or reuse) the implementation for `class_id`.
    pub async fn load(&self, type_name: &str, class_id: &str, variant: Variant) -> LoadResult {
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            let key = (class_id.to_owned(), variant);
            if let Some(cell) = cache.get(&key) {
                debug!(class_id, %variant, ready = cell.initialized(), "component cache hit");
                Arc::clone(cell)
            } else {
                let cell = Arc::new(OnceCell::new());
                cache.insert(key, Arc::clone(&cell));
                cell
            }
        };
        cell.get_or_init(|| self.fetch(type_name, class_id, variant))
            .await
            .clone()
    }

    async fn fetch(&self, type_name: &str, class_id: &str, variant: Variant) -> LoadResult {
        debug!(type_name, class_id, %variant, "loading component module");
        match self
            .source
            .fetch_module(&self.root_url, type_name, class_id, variant)
            .await
        {
            Ok(loaded) => Ok(Arc::new(ResolvedComponent {
                name: loaded.resolved_type_name,
                class_id: class_id.to_owned(),
                variant,
                implementation: loaded.implementation,
            })),
            Err(err) => {
                warn!(type_name, class_id, %variant, error = %err, "component failed to load");
                Err(err)
            }
        }
    }

    /// Completed load for `class_id` (component variant), if any.
    ///
    /// Returns `None` while the load is still in flight or was never requested.
    pub fn cached(&self, class_id: &str) -> Option<LoadResult> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(&(class_id.to_owned(), Variant::Component))
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of distinct `(class id, variant)` keys requested so far.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every distinct class id in `components`, concurrently, once each.
    #[instrument(skip_all, fields(components = components.len()))]
    pub async fn preload_all(&self, components: &[ComponentMeta]) -> HashMap<String, LoadResult> {
        let mut seen = HashMap::new();
        for meta in components {
            seen.entry(meta.class_id().to_owned())
                .or_insert_with(|| meta.kind.clone());
        }
        let loads = seen.iter().map(|(class_id, kind)| async move {
            let result = self.load(kind, class_id, Variant::Component).await;
            (class_id.clone(), result)
        });
        join_all(loads).await.into_iter().collect()
    }

    /// Resolve a component and, for composites, its example sub-components.
    pub async fn resolve(
        &self,
        kind: &str,
        class_id: &str,
        all_components: &[ComponentMeta],
        example_type_names: Option<&[String]>,
    ) -> ResolvedEntry {
        let component = self.load(kind, class_id, Variant::Component).await;
        let name = component
            .as_ref()
            .map_or_else(|_| kind.to_owned(), |c| c.name.clone());
        let example_components = match example_type_names {
            Some(names) => Some(self.example_components(names, all_components).await),
            None => None,
        };
        ResolvedEntry {
            component,
            name,
            example_components,
        }
    }

    /// Example-variant implementation for each distinct name in `names`.
    ///
    /// Each name resolves through the first component of that type; names with
    /// no matching component, or whose load fails, are skipped.
    pub async fn example_components(
        &self,
        names: &[String],
        all_components: &[ComponentMeta],
    ) -> ExampleComponents {
        let mut wanted: Vec<(&str, &ComponentMeta)> = Vec::new();
        for name in names {
            if wanted.iter().any(|(n, _)| *n == name.as_str()) {
                continue;
            }
            if let Some(meta) = all_components.iter().find(|c| c.kind == *name) {
                wanted.push((name.as_str(), meta));
            }
        }
        let loads = wanted.into_iter().map(|(name, meta)| async move {
            let result = self.load(&meta.kind, meta.class_id(), Variant::Example).await;
            (name.to_owned(), result)
        });
        join_all(loads)
            .await
            .into_iter()
            .filter_map(|(name, result)| result.ok().map(|c| (name, c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ModuleSource for CountingSource {
        async fn fetch_module(
            &self,
            _root_url: &str,
            type_name: &str,
            class_id: &str,
            variant: Variant,
        ) -> Result<LoadedModule, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if class_id == "broken" {
                return Err(LoadError::NotFound {
                    class_id: class_id.to_owned(),
                    variant,
                });
            }
            Ok(LoadedModule {
                implementation: Arc::new(format!("{class_id}:{variant}")),
                resolved_type_name: type_name.to_owned(),
            })
        }
    }

    fn loader() -> (Arc<CountingSource>, ComponentLoader) {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let loader = ComponentLoader::new(source.clone(), "http://localhost");
        (source, loader)
    }

    #[tokio::test]
    async fn concurrent_requests_join_one_load() {
        let (source, loader) = loader();
        let (a, b) = tokio::join!(
            loader.load("textbox", "tb", Variant::Component),
            loader.load("textbox", "tb", Variant::Component)
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_cached_not_retried() {
        let (source, loader) = loader();
        assert!(loader.load("x", "broken", Variant::Component).await.is_err());
        assert!(loader.load("x", "broken", Variant::Component).await.is_err());
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(matches!(
            loader.cached("broken"),
            Some(Err(LoadError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn example_names_without_match_are_skipped() {
        let (_source, loader) = loader();
        let components = vec![
            ComponentMeta::new(1, "image", Map::new()).with_class("img"),
            ComponentMeta::new(2, "image", Map::new()).with_class("img2"),
        ];
        let names = vec!["image".to_owned(), "audio".to_owned(), "image".to_owned()];
        let map = loader.example_components(&names, &components).await;
        assert_eq!(map.len(), 1);
        let image = &map["image"];
        assert_eq!(image.class_id, "img");
        assert_eq!(image.variant, Variant::Example);
        assert_eq!(image.downcast::<String>().map(String::as_str), Some("img:example"));
    }
}
