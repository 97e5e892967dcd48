// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session-wide options shared by every Arbor host.

use serde::{Deserialize, Serialize};

/// Default delay between a flush request and the flush itself (~one 60 Hz frame).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Options for one app session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    /// Let the synthetic root column grow to fill the viewport height.
    pub fill_height: bool,
    /// Delay used by timer-backed frame ports before running a flush.
    pub frame_interval_ms: u64,
    /// Component kinds treated as composites carrying example sub-components.
    pub composite_kinds: Vec<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            fill_height: false,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            composite_kinds: vec!["dataset".to_owned()],
        }
    }
}

impl AppOptions {
    /// Whether `kind` names a composite ("dataset"-like) component.
    pub fn is_composite(&self, kind: &str) -> bool {
        self.composite_kinds.iter().any(|k| k == kind)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let opts: AppOptions = serde_json::from_str(r#"{"fill_height": true}"#).unwrap();
        assert!(opts.fill_height);
        assert_eq!(opts.frame_interval_ms, DEFAULT_FRAME_INTERVAL_MS);
        assert!(opts.is_composite("dataset"));
        assert!(!opts.is_composite("column"));
    }
}
