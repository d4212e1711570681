//! Filesystem confinement for `fs.readText`.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::NativeConfig;
use crate::errors::BridgeError;

/// Allow-listed roots plus a size cap.
#[derive(Clone, Debug)]
pub struct FsPolicy {
    roots: Vec<PathBuf>,
    max_bytes: u64,
}

impl FsPolicy {
    /// Roots that cannot be canonicalized are dropped with a warning.
    pub fn new(roots: &[PathBuf], max_bytes: u64) -> Self {
        let roots = roots
            .iter()
            .filter_map(|root| match std::fs::canonicalize(root) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "Ignoring unusable allowed root");
                    None
                }
            })
            .collect();
        Self { roots, max_bytes }
    }

    pub fn from_config(config: &NativeConfig) -> Self {
        Self::new(&config.allowed_roots, config.max_file_bytes)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Canonical path of `requested` if it lies under an allowed root.
    pub async fn resolve(&self, requested: &str) -> Result<PathBuf, BridgeError> {
        let raw = Path::new(requested.trim());
        if raw.as_os_str().is_empty() {
            return Err(BridgeError::InvalidParams("path is required".to_string()));
        }
        if raw.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(BridgeError::PathDenied(format!(
                "{requested}: path traversal is not allowed"
            )));
        }
        if !raw.is_absolute() {
            return Err(BridgeError::PathDenied(format!(
                "{requested}: path must be absolute"
            )));
        }

        let canonical = tokio::fs::canonicalize(raw)
            .await
            .map_err(|err| BridgeError::PathDenied(format!("{requested}: {err}")))?;
        if self.roots.iter().any(|root| canonical.starts_with(root)) {
            Ok(canonical)
        } else {
            Err(BridgeError::PathDenied(format!(
                "{requested}: outside the allowed roots"
            )))
        }
    }

    pub async fn read_text(&self, requested: &str) -> Result<String, BridgeError> {
        let path = self.resolve(requested).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(BridgeError::PathDenied(format!("{requested}: not a file")));
        }
        if metadata.len() > self.max_bytes {
            return Err(BridgeError::FileTooLarge {
                size: metadata.len(),
                max: self.max_bytes,
            });
        }
        let bytes = tokio::fs::read(&path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read text file");
        String::from_utf8(bytes)
            .map_err(|_| BridgeError::InvalidParams(format!("{requested}: not UTF-8 text")))
    }
}
