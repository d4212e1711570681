use thiserror::Error;

/// Errors surfaced by the native bridge.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid json: {0}")]
    Json(String),
    #[error("unknown op: {0}")]
    UnknownOp(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("path denied: {0}")]
    PathDenied(String),
    #[error("file of {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("companion error: {0}")]
    Remote(String),
    #[error("timeout")]
    Timeout,
    #[error("interrupted")]
    Interrupted,
    #[error("channel closed")]
    ChannelClosed,
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Json(err.to_string())
    }
}
