//! Unix domain socket transport.

use crate::connection::exchange;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::Transport;
use async_trait::async_trait;
use hyper::{Body, Request, Response};
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// Sends each request over a fresh connection to a local socket.
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    endpoint: Endpoint,
    path: PathBuf,
}

impl UnixSocketTransport {
    /// Create a transport for the socket at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            endpoint: Endpoint::Unix { path: path.clone() },
            path,
        }
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for UnixSocketTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let path = self.path();
        let start = std::time::Instant::now();
        tracing::debug!(
            socket = %path.display(),
            method = %request.method(),
            uri = %request.uri(),
            "Sending request over unix socket"
        );

        let stream = UnixStream::connect(path).await.map_err(|source| {
            tracing::error!(socket = %path.display(), error = %source, "Unix socket connect failed");
            TransportError::Connect {
                target: path.display().to_string(),
                source,
            }
        })?;

        let response = exchange(stream, request, &self.endpoint.authority()).await?;
        tracing::debug!(
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Unix socket response headers received"
        );
        Ok(response)
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
