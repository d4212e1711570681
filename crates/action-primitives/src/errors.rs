//! Error types for action primitives

use thiserror::Error;

/// Failure modes of a single action. The engine renders every variant into
/// `ExecutionResult::error` with its `Display` text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Selector resolved to nothing
    #[error("Element not found: {0}")]
    TargetNotFound(String),

    /// Required value missing or malformed
    #[error("{0}")]
    InvalidInput(String),

    /// No option matched at any select tier
    #[error("Option not found")]
    OptionNotFound { requested: String },

    /// Element exists but cannot be interacted with
    #[error("Element not enabled: {0}")]
    NotEnabled(String),

    /// A wait strategy or deadline exceeded its bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Page does not accept script-driven actions
    #[error("Page is restricted, only navigate is allowed: {0}")]
    RestrictedPage(String),

    /// Privileged action with no handler installed
    #[error("No handler available for {0}")]
    Unsupported(String),

    /// Live page transport error
    #[error("Page I/O error: {0}")]
    PageIo(String),

    /// Privileged handler reported a failure
    #[error("{0}")]
    Handler(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::Timeout(_) | ActionError::NotEnabled(_) | ActionError::PageIo(_)
        )
    }

    /// Short machine-friendly taxonomy label.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::TargetNotFound(_) => "target_not_found",
            ActionError::InvalidInput(_) | ActionError::OptionNotFound { .. } => "invalid_input",
            ActionError::NotEnabled(_) => "not_enabled",
            ActionError::Timeout(_) => "execution_timeout",
            ActionError::Interrupted(_) => "aborted",
            ActionError::RestrictedPage(_) => "restricted_page",
            ActionError::Unsupported(_) => "unsupported",
            ActionError::PageIo(_) => "page_io",
            ActionError::Handler(_) => "handler",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_reported_strings() {
        assert_eq!(
            ActionError::TargetNotFound("#buy".into()).to_string(),
            "Element not found: #buy"
        );
        assert_eq!(
            ActionError::OptionNotFound {
                requested: "gold".into()
            }
            .to_string(),
            "Option not found"
        );
        assert_eq!(
            ActionError::InvalidInput("Input action requires a value".into()).to_string(),
            "Input action requires a value"
        );
    }

    #[test]
    fn retryable_kinds() {
        assert!(ActionError::Timeout("x".into()).is_retryable());
        assert!(!ActionError::TargetNotFound("x".into()).is_retryable());
        assert_eq!(ActionError::Interrupted("x".into()).kind(), "aborted");
    }
}
