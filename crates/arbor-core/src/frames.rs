// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tokio-backed [`FramePort`]: runs each task after a fixed frame interval.

use arbor_app_core::frame_port::{FrameError, FramePort, FrameTask};
use std::time::Duration;
use tokio::runtime::Handle;

/// Frame port that sleeps for one frame interval on a tokio runtime, then runs the task.
#[derive(Debug, Clone)]
pub struct TokioFramePort {
    handle: Handle,
    interval: Duration,
}

impl TokioFramePort {
    /// Bind to the runtime driving the current task.
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current(interval: Duration) -> Result<Self, FrameError> {
        let handle =
            Handle::try_current().map_err(|e| FrameError::Unavailable(e.to_string()))?;
        Ok(Self { handle, interval })
    }

    /// Bind to an explicit runtime handle.
    pub fn with_handle(handle: Handle, interval: Duration) -> Self {
        Self { handle, interval }
    }

    /// Delay between a request and the task running.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FramePort for TokioFramePort {
    fn request_frame(&self, task: FrameTask) -> Result<(), FrameError> {
        let interval = self.interval;
        self.handle.spawn(async move {
            if interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(interval).await;
            }
            task();
        });
        Ok(())
    }
}
