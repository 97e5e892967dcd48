// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Component modules served from a directory tree.

use arbor_core::{LoadError, LoadedModule, ModuleSource, Variant};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Parsed module manifest; the implementation handed to the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Canonical type name of the component.
    pub name: String,
    /// Every other manifest field, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// [`ModuleSource`] reading `<root>/<class_id>/<variant>.json`.
///
/// The `root_url` passed by the loader is used as the root directory, so a
/// session's root URL is simply a filesystem path.
#[derive(Debug, Clone, Default)]
pub struct FsModuleSource;

impl FsModuleSource {
    /// New source.
    pub fn new() -> Self {
        Self
    }

    /// Manifest path for `class_id`/`variant` under `root`.
    pub fn manifest_path(root: &Path, class_id: &str, variant: Variant) -> PathBuf {
        root.join(class_id).join(format!("{variant}.json"))
    }
}

#[async_trait]
impl ModuleSource for FsModuleSource {
    async fn fetch_module(
        &self,
        root_url: &str,
        type_name: &str,
        class_id: &str,
        variant: Variant,
    ) -> Result<LoadedModule, LoadError> {
        if class_id.is_empty() || class_id.contains(['/', '\\']) || class_id.contains("..") {
            return Err(LoadError::NotFound {
                class_id: class_id.to_owned(),
                variant,
            });
        }
        let path = Self::manifest_path(Path::new(root_url), class_id, variant);
        debug!(path = %path.display(), type_name, "reading module manifest");
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound {
                    class_id: class_id.to_owned(),
                    variant,
                })
            }
            Err(err) => return Err(LoadError::Source(format!("{}: {err}", path.display()))),
        };
        let manifest: ModuleManifest =
            serde_json::from_slice(&bytes).map_err(|err| LoadError::Parse {
                class_id: class_id.to_owned(),
                message: err.to_string(),
            })?;
        Ok(LoadedModule {
            resolved_type_name: manifest.name.clone(),
            implementation: Arc::new(manifest),
        })
    }
}
