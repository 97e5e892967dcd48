// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Arbor hosts (options, config, frame port).
//! Keeps rendering adapters thin and framework-agnostic.

pub mod config;
pub mod frame_port;
pub mod options;
