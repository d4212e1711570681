use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::BridgeError;

/// System clipboard seam.
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    async fn read_text(&self) -> Result<String, BridgeError>;
    async fn write_text(&self, text: &str) -> Result<(), BridgeError>;
}

/// Process-local clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(text.into()),
        }
    }
}

#[async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn read_text(&self) -> Result<String, BridgeError> {
        Ok(self.content.lock().clone())
    }

    async fn write_text(&self, text: &str) -> Result<(), BridgeError> {
        *self.content.lock() = text.to_string();
        Ok(())
    }
}
