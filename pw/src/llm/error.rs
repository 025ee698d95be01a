//! Model call error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a model call
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection failure: {0}")]
    Connection(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed reply: {0}")]
    Parse(String),

    #[error("Credential ${0} is not set")]
    MissingCredential(String),
}

/// Coarse failure classification used by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ConnectionFailure,
    ParseFailure,
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::Timeout(_) => FailureKind::Timeout,
            LlmError::Connection(_) | LlmError::ApiError { .. } | LlmError::MissingCredential(_) => {
                FailureKind::ConnectionFailure
            }
            LlmError::Parse(_) => FailureKind::ParseFailure,
        }
    }

    /// Check if another attempt against the same model could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Connection(_) => true,
            LlmError::ApiError { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            LlmError::Parse(_) => true,
            LlmError::MissingCredential(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(LlmError::Timeout(Duration::from_secs(1)).kind(), FailureKind::Timeout);
        assert_eq!(LlmError::Connection("reset".into()).kind(), FailureKind::ConnectionFailure);
        assert_eq!(
            LlmError::ApiError {
                status: 503,
                message: "unavailable".into()
            }
            .kind(),
            FailureKind::ConnectionFailure
        );
        assert_eq!(LlmError::Parse("no choices".into()).kind(), FailureKind::ParseFailure);
    }

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(LlmError::Connection("refused".into()).is_retryable());
        assert!(LlmError::Parse("bad body".into()).is_retryable());

        // 5xx and throttling are transient
        assert!(
            LlmError::ApiError {
                status: 502,
                message: "Bad gateway".into()
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 429,
                message: "slow down".into()
            }
            .is_retryable()
        );

        // Other 4xx are not
        assert!(
            !LlmError::ApiError {
                status: 401,
                message: "Unauthorized".into()
            }
            .is_retryable()
        );
        assert!(!LlmError::MissingCredential("OPENAI_API_KEY".into()).is_retryable());
    }

    #[test]
    fn test_missing_credential_message() {
        let msg = LlmError::MissingCredential("OPENAI_API_KEY".into()).to_string();
        assert!(msg.contains("$OPENAI_API_KEY"));
    }
}
