// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port trait for "run this once before the next paint" without depending on
//! a specific windowing or rendering crate.

use thiserror::Error;

/// Deferred unit of work handed to a [`FramePort`].
pub type FrameTask = Box<dyn FnOnce() + Send + 'static>;

/// Failure to schedule a frame task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The port has no live executor to run the task on.
    #[error("frame port unavailable: {0}")]
    Unavailable(String),
}

/// Minimal deferred-execution port. Implementations run each task exactly once,
/// after the current cooperative turn and before the next paint.
pub trait FramePort: Send + Sync {
    /// Schedule `task` to run before the next paint.
    fn request_frame(&self, task: FrameTask) -> Result<(), FrameError>;
}
