//! Error types for dockhand-core.

use dockhand_transport::TransportError;
use thiserror::Error;

/// Result type alias for dockhand-core operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or contradictory endpoint/TLS settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection-level failure on TCP, TLS or the Unix socket
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed HTTP framing or a corrupt multiplexed stream
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Malformed tar entry, JSON document or credential
    #[error("format error: {0}")]
    Format(String),

    /// The engine answered with a non-success status
    #[error("{context}: engine returned status {status}: {body}")]
    Operation {
        /// What the caller was trying to do
        context: String,
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },
}

impl ClientError {
    /// HTTP status of an [`ClientError::Operation`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Operation { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Configuration(msg) => Self::Configuration(msg),
            TransportError::Protocol(msg) => Self::Protocol(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<hyper::Error> for ClientError {
    fn from(e: hyper::Error) -> Self {
        TransportError::from(e).into()
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(format!("invalid JSON: {e}"))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(format!("I/O error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_keep_their_category() {
        let err: ClientError = TransportError::Configuration("no host".into()).into();
        assert!(matches!(err, ClientError::Configuration(_)));

        let err: ClientError = TransportError::Protocol("bad status line".into()).into();
        assert!(matches!(err, ClientError::Protocol(_)));

        let err: ClientError = TransportError::Http("reset".into()).into();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn test_operation_error_display() {
        let err = ClientError::Operation {
            context: "pull busybox:latest".into(),
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "pull busybox:latest: engine returned status 500: boom"
        );
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_json_errors_are_format_errors() {
        let err: ClientError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ClientError::Format(_)));
    }
}
