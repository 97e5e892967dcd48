// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Loading-status tracker for dependencies and the components they write.

use crate::observable::Observable;
use crate::payload::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Progress stage of one dependency run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Queued or running.
    Pending,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Error,
}

/// One status report for a dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Dependency index this report is about.
    pub fn_index: usize,
    /// Current stage.
    pub stage: Stage,
    /// Position in the remote queue, if known.
    #[serde(default)]
    pub queue_position: Option<usize>,
    /// Size of the remote queue, if known.
    #[serde(default)]
    pub queue_size: Option<usize>,
    /// Estimated seconds until completion.
    #[serde(default)]
    pub eta: Option<f64>,
    /// Human-readable detail, typically an error message.
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusUpdate {
    /// Report with only a stage set.
    pub fn new(fn_index: usize, stage: Stage) -> Self {
        Self {
            fn_index,
            stage,
            queue_position: None,
            queue_size: None,
            eta: None,
            message: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Latest status of a component, as observed by the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Current stage.
    pub stage: Stage,
    /// Dependency that last reported, or `None` for implementation load failures.
    pub fn_index: Option<usize>,
    /// Detail message.
    pub message: Option<String>,
}

/// Immutable view of every known status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    /// Last report per dependency.
    pub dependencies: BTreeMap<usize, StatusUpdate>,
    /// Last status per component.
    pub components: BTreeMap<ComponentId, ComponentStatus>,
}

/// Tracks dependency progress and mirrors it onto output components.
#[derive(Debug, Default)]
pub struct LoadingStatus {
    outputs: Mutex<HashMap<usize, Vec<ComponentId>>>,
    snapshot: Observable<StatusSnapshot>,
}

impl LoadingStatus {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember which components dependency `fn_index` writes.
    pub fn register(&self, fn_index: usize, outputs: &[ComponentId]) {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fn_index, outputs.to_vec());
    }

    /// Record `update` for its dependency and every registered output.
    pub fn update(&self, update: StatusUpdate) {
        let outputs = self
            .outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&update.fn_index)
            .cloned()
            .unwrap_or_default();
        self.snapshot.update(|snap| {
            for id in outputs {
                snap.components.insert(
                    id,
                    ComponentStatus {
                        stage: update.stage,
                        fn_index: Some(update.fn_index),
                        message: update.message.clone(),
                    },
                );
            }
            snap.dependencies.insert(update.fn_index, update);
        });
    }

    /// Mark component `id` as failed to load its implementation.
    pub fn load_failed(&self, id: ComponentId, message: impl Into<String>) {
        let message = message.into();
        self.snapshot.update(|snap| {
            snap.components.insert(
                id,
                ComponentStatus {
                    stage: Stage::Error,
                    fn_index: None,
                    message: Some(message),
                },
            );
        });
    }

    /// Latest status of component `id`.
    pub fn component(&self, id: ComponentId) -> Option<ComponentStatus> {
        self.snapshot.get().components.get(&id).cloned()
    }

    /// Latest report for dependency `fn_index`.
    pub fn dependency(&self, fn_index: usize) -> Option<StatusUpdate> {
        self.snapshot.get().dependencies.get(&fn_index).cloned()
    }

    /// Observable snapshot of everything tracked.
    pub fn observable(&self) -> &Observable<StatusSnapshot> {
        &self.snapshot
    }
}
