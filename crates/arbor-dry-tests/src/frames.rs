// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frame port that runs nothing until the test says a frame happened.

use arbor_app_core::frame_port::{FrameError, FramePort, FrameTask};
use std::sync::{Arc, Mutex};

/// [`FramePort`] fake that queues tasks until [`run_frame`](Self::run_frame).
///
/// # Example
///
/// ```
/// use arbor_app_core::frame_port::FramePort;
/// use arbor_dry_tests::ManualFramePort;
///
/// let frames = ManualFramePort::new();
/// frames.request_frame(Box::new(|| {})).unwrap();
/// assert_eq!(frames.pending(), 1);
/// assert_eq!(frames.run_frame(), 1);
/// assert_eq!(frames.requested(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ManualFramePort {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    queue: Vec<FrameTask>,
    requested: usize,
    closed: bool,
}

impl ManualFramePort {
    /// Open port with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run every queued task; returns how many ran.
    ///
    /// Tasks queued while the frame runs wait for the next frame.
    pub fn run_frame(&self) -> usize {
        let tasks = std::mem::take(&mut self.lock().queue);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Tasks waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Frame requests accepted so far.
    pub fn requested(&self) -> usize {
        self.lock().requested
    }

    /// Reject every later request with [`FrameError::Unavailable`].
    pub fn close(&self) {
        self.lock().closed = true;
    }
}

impl FramePort for ManualFramePort {
    fn request_frame(&self, task: FrameTask) -> Result<(), FrameError> {
        let mut state = self.lock();
        if state.closed {
            return Err(FrameError::Unavailable("manual frame port closed".into()));
        }
        state.requested += 1;
        state.queue.push(task);
        Ok(())
    }
}
