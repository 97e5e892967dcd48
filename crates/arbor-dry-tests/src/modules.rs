// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted module source: counts loads, fails on demand, holds loads open.

use arbor_core::{LoadError, LoadedModule, ModuleSource, Variant};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Implementation handed out by [`ScriptedModuleSource`]: `"<class_id>:<variant>"`.
pub type FakeImplementation = String;

/// [`ModuleSource`] fake driven entirely by the test.
///
/// Every fetch succeeds with a [`FakeImplementation`] unless its class id was
/// marked failing. A gated class id suspends its fetch until
/// [`release`](Self::release) is called.
#[derive(Clone, Default)]
pub struct ScriptedModuleSource {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    started: HashMap<(String, Variant), usize>,
    finished: HashMap<(String, Variant), usize>,
    failing: HashSet<String>,
    gates: HashMap<String, watch::Sender<bool>>,
    root_urls: Vec<String>,
}

impl ScriptedModuleSource {
    /// Source where everything loads immediately.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches for `class_id` fail with [`LoadError::NotFound`].
    pub fn fail(&self, class_id: &str) -> &Self {
        self.lock().failing.insert(class_id.to_owned());
        self
    }

    /// Fetches for `class_id` wait until [`release`](Self::release).
    pub fn gate(&self, class_id: &str) -> &Self {
        let (tx, _rx) = watch::channel(false);
        self.lock().gates.insert(class_id.to_owned(), tx);
        self
    }

    /// Let gated fetches for `class_id` complete.
    pub fn release(&self, class_id: &str) {
        if let Some(tx) = self.lock().gates.get(class_id) {
            tx.send_replace(true);
        }
    }

    /// Fetches started for `(class_id, Component)`.
    pub fn loads(&self, class_id: &str) -> usize {
        self.loads_of(class_id, Variant::Component)
    }

    /// Fetches started for `(class_id, variant)`.
    pub fn loads_of(&self, class_id: &str, variant: Variant) -> usize {
        self.lock()
            .started
            .get(&(class_id.to_owned(), variant))
            .copied()
            .unwrap_or(0)
    }

    /// Fetches finished for `(class_id, Component)`.
    pub fn completed(&self, class_id: &str) -> usize {
        self.lock()
            .finished
            .get(&(class_id.to_owned(), Variant::Component))
            .copied()
            .unwrap_or(0)
    }

    /// Fetches started across every class and variant.
    pub fn total_loads(&self) -> usize {
        self.lock().started.values().sum()
    }

    /// Root URLs seen, one per fetch.
    pub fn root_urls(&self) -> Vec<String> {
        self.lock().root_urls.clone()
    }
}

#[async_trait]
impl ModuleSource for ScriptedModuleSource {
    async fn fetch_module(
        &self,
        root_url: &str,
        type_name: &str,
        class_id: &str,
        variant: Variant,
    ) -> Result<LoadedModule, LoadError> {
        let key = (class_id.to_owned(), variant);
        let (gate, failing) = {
            let mut state = self.lock();
            *state.started.entry(key.clone()).or_default() += 1;
            state.root_urls.push(root_url.to_owned());
            (
                state.gates.get(class_id).map(watch::Sender::subscribe),
                state.failing.contains(class_id),
            )
        };
        if let Some(mut gate) = gate {
            if gate.wait_for(|open| *open).await.is_err() {
                return Err(LoadError::Source(format!("gate for `{class_id}` dropped")));
            }
        }
        *self.lock().finished.entry(key).or_default() += 1;
        if failing {
            return Err(LoadError::NotFound {
                class_id: class_id.to_owned(),
                variant,
            });
        }
        let implementation: FakeImplementation = format!("{class_id}:{variant}");
        Ok(LoadedModule {
            implementation: Arc::new(implementation),
            resolved_type_name: type_name.to_owned(),
        })
    }
}
