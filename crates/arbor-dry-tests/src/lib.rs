// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Arbor crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`frames`] - Manually driven frame port
//! - [`modules`] - Scripted module source (load counts, failures, gates)
//! - [`payload`] - Payload and dependency builders, static value accessor
//! - [`remote`] - Recording remote client

pub mod config;
pub mod frames;
pub mod modules;
pub mod payload;
pub mod remote;

// Re-export commonly used items at crate root for convenience
pub use config::InMemoryConfigStore;
pub use frames::ManualFramePort;
pub use modules::{FakeImplementation, ScriptedModuleSource};
pub use payload::{DependencyBuilder, PayloadBuilder, StaticValue};
pub use remote::{InvokeCall, RecordingRemote};
