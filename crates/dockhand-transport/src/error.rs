//! Error types for dockhand-transport.

use thiserror::Error;

/// Result type alias for dockhand-transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while resolving an endpoint or talking to it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Missing or contradictory endpoint/TLS settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Could not open a connection to the engine
    #[error("failed to connect to {target}: {source}")]
    Connect {
        /// Socket path or `host:port` that was dialed
        target: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded or the handshake failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// The engine sent something that is not valid HTTP
    #[error("malformed HTTP response: {0}")]
    Protocol(String),

    /// The HTTP exchange failed after the connection was open
    #[error("HTTP exchange failed: {0}")]
    Http(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hyper::Error> for TransportError {
    fn from(e: hyper::Error) -> Self {
        if e.is_parse() || e.is_incomplete_message() {
            Self::Protocol(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}
