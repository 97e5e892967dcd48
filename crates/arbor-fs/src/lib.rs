// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem adapters for Arbor hosts: config store and module source.

mod config;
mod modules;

pub use config::FsConfigStore;
pub use modules::{FsModuleSource, ModuleManifest};
