//! Plain TCP transport.

use crate::connection::exchange;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::Transport;
use async_trait::async_trait;
use hyper::{Body, Request, Response};
use tokio::net::TcpStream;

/// Sends each request over a fresh TCP connection.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: Endpoint,
    host: String,
    port: u16,
}

impl TcpTransport {
    /// Create a transport for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            endpoint: Endpoint::Tcp {
                host: host.clone(),
                port,
            },
            host,
            port,
        }
    }
}

/// Open a TCP connection, mapping failures to [`TransportError::Connect`].
pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| TransportError::Connect {
            target: format!("{host}:{port}"),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        tracing::debug!(
            host = %self.host,
            port = self.port,
            method = %request.method(),
            uri = %request.uri(),
            "Sending request over tcp"
        );
        let stream = connect_tcp(&self.host, self.port).await?;
        exchange(stream, request, &self.endpoint.authority()).await
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
