//! Native companion limits.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 512 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    /// Directories `fs.readText` may read from. Empty denies every path.
    pub allowed_roots: Vec<PathBuf>,

    /// Largest file `fs.readText` returns
    pub max_file_bytes: u64,

    /// Largest frame accepted or sent, excluding the length prefix
    pub max_frame_bytes: usize,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl NativeConfig {
    /// Small limits for tests.
    pub fn minimal() -> Self {
        Self {
            allowed_roots: Vec::new(),
            max_file_bytes: 4 * 1024,
            max_frame_bytes: 16 * 1024,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.allowed_roots.push(root.into());
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }
}
