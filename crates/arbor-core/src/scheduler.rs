// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Update scheduler: batches of prop writes coalesced into one flush per frame.
//!
//! `submit` enqueues a batch and, when no flush is pending, asks the
//! [`FramePort`] for exactly one. The flush applies every queued batch in
//! submission order (and each batch in array order) to the [`PropStore`] as a
//! single transition, so a later write to the same `(id, prop)` wins.
//!
//! Batches are owned by the scheduler once submitted. Values are moved in,
//! never shared with the caller, so mutating the caller's copy afterwards has
//! no effect on what gets stored.

use crate::observable::Observable;
use crate::payload::ComponentId;
use crate::store::PropStore;
use arbor_app_core::frame_port::FramePort;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// "Set component `id`'s prop `prop` to `value`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTransaction {
    /// Target component.
    pub id: ComponentId,
    /// Prop name.
    pub prop: String,
    /// New value.
    pub value: Value,
}

impl UpdateTransaction {
    /// Convenience constructor.
    pub fn new(id: ComponentId, prop: impl Into<String>, value: Value) -> Self {
        Self {
            id,
            prop: prop.into(),
            value,
        }
    }
}

#[derive(Default)]
struct Queue {
    batches: Vec<Vec<UpdateTransaction>>,
    pending: bool,
}

struct Inner {
    store: Arc<PropStore>,
    frames: Arc<dyn FramePort>,
    queue: Mutex<Queue>,
    flush_pending: Observable<bool>,
    revision: Observable<u64>,
}

/// Per-session scheduler owning its queue and flush handle.
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Arc<Inner>,
}

impl UpdateScheduler {
    /// Scheduler writing into `store`, flushing via `frames`.
    pub fn new(store: Arc<PropStore>, frames: Arc<dyn FramePort>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                frames,
                queue: Mutex::new(Queue::default()),
                flush_pending: Observable::new(false),
                revision: Observable::new(0),
            }),
        }
    }

    /// Enqueue `batch`; schedules a flush unless one is already pending.
    ///
    /// If the frame port cannot take the task the flush runs immediately.
    pub fn submit(&self, batch: Vec<UpdateTransaction>) {
        {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.batches.push(batch);
            if std::mem::replace(&mut queue.pending, true) {
                return;
            }
            // Set under the queue lock; must agree with `pending`.
            self.inner.flush_pending.set(true);
        }
        let inner = Arc::clone(&self.inner);
        if let Err(err) = self
            .inner
            .frames
            .request_frame(Box::new(move || inner.flush()))
        {
            warn!(error = %err, "frame port rejected flush; flushing inline");
            self.inner.flush();
        }
    }

    /// Apply everything queued right now.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Whether a flush has been requested but not yet run.
    pub fn is_pending(&self) -> bool {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
    }

    /// Observable mirror of [`Self::is_pending`].
    pub fn flush_pending(&self) -> &Observable<bool> {
        &self.inner.flush_pending
    }

    /// Number of completed flushes.
    pub fn revision(&self) -> &Observable<u64> {
        &self.inner.revision
    }

    /// The store this scheduler writes into.
    pub fn store(&self) -> &Arc<PropStore> {
        &self.inner.store
    }
}

impl Inner {
    fn flush(&self) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let batches = std::mem::take(&mut queue.batches);
        let total: usize = batches.iter().map(Vec::len).sum();
        let applied = self.store.apply(
            batches
                .into_iter()
                .flatten()
                .map(|tx| (tx.id, tx.prop, tx.value)),
        );
        queue.pending = false;
        self.revision.update(|r| *r += 1);
        self.flush_pending.set(false);
        drop(queue);
        debug!(transactions = total, applied, "flushed prop updates");
    }
}
