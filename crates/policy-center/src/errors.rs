use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("invalid rule pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("audit sink failed: {0}")]
    Sink(String),
}
