//! # dockhand-transport
//!
//! Connection layer for the dockhand container-engine client.
//!
//! This crate turns a host specification into a typed [`Endpoint`] and
//! provides one [`Transport`] per endpoint kind. Every call to
//! [`Transport::send`] opens a dedicated connection, performs a single
//! HTTP/1.1 exchange on it and hands back the response with its body still
//! attached to that connection. Nothing is pooled or reused.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dockhand_transport::{DefaultTransportFactory, EndpointResolver, TransportFactory};
//! use hyper::{Body, Request};
//!
//! # async fn example() -> dockhand_transport::Result<()> {
//! let endpoint = EndpointResolver::new().resolve(Some("unix:///var/run/docker.sock"), None, None)?;
//! let transport = DefaultTransportFactory.transport(&endpoint)?;
//!
//! let request = Request::get("/_ping").body(Body::empty()).expect("valid request");
//! let response = transport.send(request).await?;
//! assert!(response.status().is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Endpoint Resolution**: `tcp://`, `http://`, `https://` and `unix://` host specs
//! - **TLS Heuristic**: TLS-verify setting, cert directories and the conventional TLS port
//! - **Unix Sockets**: HTTP over a local socket path
//! - **TLS**: client-certificate authentication from a cert directory

mod connection;
mod endpoint;
mod error;
mod tcp;
mod tls;
#[cfg(unix)]
mod unix;

pub use endpoint::{
    Endpoint, EndpointKind, EndpointResolver, TlsVerify, DEFAULT_CERT_DIR_NAME, DEFAULT_TCP_PORT,
    DEFAULT_TLS_PORT,
};
pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
pub use tls::{TlsTransport, CA_FILE, CERT_FILE, KEY_FILE};
#[cfg(unix)]
pub use unix::UnixSocketTransport;

use async_trait::async_trait;
use hyper::{Body, Request, Response};
use std::sync::Arc;

/// A way of delivering one HTTP request to the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request over a fresh connection.
    ///
    /// The request URI carries only the path and query; the transport fills
    /// in `Host` and `Connection: close`. The returned body keeps the
    /// connection open until it is read to the end or dropped.
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>>;

    /// The endpoint this transport talks to.
    fn endpoint(&self) -> &Endpoint;
}

/// Builds the [`Transport`] implied by an [`Endpoint`].
pub trait TransportFactory: Send + Sync {
    /// Create a transport for `endpoint`.
    ///
    /// # Errors
    /// Returns an error if the endpoint's transport cannot be set up, e.g.
    /// TLS material is missing.
    fn transport(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>>;
}

/// Picks [`UnixSocketTransport`], [`TcpTransport`] or [`TlsTransport`] by endpoint kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn transport(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        tracing::debug!(%endpoint, "Creating transport");
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix { path } => Ok(Arc::new(UnixSocketTransport::new(path.clone()))),
            #[cfg(not(unix))]
            Endpoint::Unix { path } => Err(TransportError::Configuration(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
            Endpoint::Tcp { host, port } => Ok(Arc::new(TcpTransport::new(host.clone(), *port))),
            Endpoint::Tls {
                host,
                port,
                cert_dir,
            } => Ok(Arc::new(TlsTransport::new(host.clone(), *port, cert_dir)?)),
        }
    }
}
