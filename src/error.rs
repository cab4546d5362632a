//! Error types for Cadence.

use std::time::Duration;

/// Top-level error type for the coach.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Document error: {0}")]
    Doc(#[from] DocError),

    #[error("Recap error: {0}")]
    Recap(#[from] RecapError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Messaging channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Text-generation oracle errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} rate limited us, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("{provider} returned HTTP {status}: {reason}")]
    ServerError {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("unusable response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} rejected our credentials")]
    AuthFailed { provider: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl LlmError {
    /// Transport failures and transient server statuses are retryable;
    /// auth failures and malformed requests/responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::RateLimited { .. } => true,
            LlmError::ServerError { status, .. } => is_retryable_status(*status),
            LlmError::RequestFailed { .. }
            | LlmError::InvalidResponse { .. }
            | LlmError::AuthFailed { .. } => false,
        }
    }
}

/// Document store errors.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("Document {doc_id} request failed: {reason}")]
    RequestFailed { doc_id: String, reason: String },

    #[error("Document store rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Document store returned HTTP {status}: {reason}")]
    ServerError { status: u16, reason: String },

    #[error("Invalid document payload: {0}")]
    InvalidPayload(String),

    #[error("Authentication failed for document store: {0}")]
    AuthFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl DocError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DocError::Transport(_) | DocError::RateLimited { .. } => true,
            DocError::ServerError { status, .. } => is_retryable_status(*status),
            DocError::RequestFailed { .. }
            | DocError::InvalidPayload(_)
            | DocError::AuthFailed(_) => false,
        }
    }
}

/// Weekly recap errors.
#[derive(Debug, thiserror::Error)]
pub enum RecapError {
    /// No daily records were available for the window. Distinct from oracle
    /// failure so the caller can message the user instead of rendering an
    /// empty recap.
    #[error("No daily records available for the recap window")]
    InsufficientData,
}

/// Conversation controller errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to persist entry: {0}")]
    Persist(#[from] DocError),

    #[error("Failed to reach the user: {0}")]
    Send(#[from] ChannelError),
}

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression for {name}: {reason}")]
    InvalidCron { name: String, reason: String },
}

/// HTTP statuses worth retrying: rate limiting and transient server errors.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the coach.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::MissingEnvVar("TELEGRAM_TOKEN".to_string());
        let msg = err.to_string();
        assert!(
            msg.contains("TELEGRAM_TOKEN"),
            "Should mention the variable name: {msg}"
        );

        let err = ConfigError::InvalidValue {
            key: "USER_CHAT_ID".to_string(),
            message: "must be an integer".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("USER_CHAT_ID"), "Should mention the key: {msg}");
    }

    #[test]
    fn channel_error_display() {
        let err = ChannelError::SendFailed {
            name: "telegram".to_string(),
            reason: "invalid token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("telegram"), "Should mention channel: {msg}");
        assert!(msg.contains("invalid token"), "Should mention reason: {msg}");
    }

    #[test]
    fn llm_retryability_classification() {
        assert!(LlmError::Transport("connection reset".into()).is_retryable());
        assert!(
            LlmError::RateLimited {
                provider: "anthropic".into(),
                retry_after: None,
            }
            .is_retryable()
        );
        assert!(
            LlmError::ServerError {
                provider: "anthropic".into(),
                status: 503,
                reason: "overloaded".into(),
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ServerError {
                provider: "anthropic".into(),
                status: 400,
                reason: "bad request".into(),
            }
            .is_retryable()
        );
        assert!(
            !LlmError::AuthFailed {
                provider: "anthropic".into(),
            }
            .is_retryable()
        );
        assert!(
            !LlmError::InvalidResponse {
                provider: "anthropic".into(),
                reason: "truncated JSON".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn doc_retryability_classification() {
        assert!(DocError::Transport("timeout".into()).is_retryable());
        assert!(
            DocError::ServerError {
                status: 502,
                reason: "bad gateway".into(),
            }
            .is_retryable()
        );
        assert!(!DocError::AuthFailed("expired token".into()).is_retryable());
        assert!(
            !DocError::ServerError {
                status: 403,
                reason: "forbidden".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn retryable_status_set() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn top_level_error_from_conversions() {
        let config_err = ConfigError::MissingEnvVar("TEST".to_string());
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));

        let recap_err = RecapError::InsufficientData;
        let err: Error = recap_err.into();
        assert!(matches!(err, Error::Recap(_)));
    }
}
