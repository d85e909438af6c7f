//! TLS transport with client-certificate authentication.
//!
//! The certificate directory follows the engine CLI layout:
//! `ca.pem` (trust root), `cert.pem` (client chain) and `key.pem`
//! (client private key, PKCS#8, RSA or SEC1).

use crate::connection::exchange;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::tcp::connect_tcp;
use crate::Transport;
use async_trait::async_trait;
use hyper::{Body, Request, Response};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerName};
use rustls_pemfile::Item;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// CA bundle file name inside the cert directory.
pub const CA_FILE: &str = "ca.pem";
/// Client certificate file name inside the cert directory.
pub const CERT_FILE: &str = "cert.pem";
/// Client key file name inside the cert directory.
pub const KEY_FILE: &str = "key.pem";

/// Sends each request over a fresh TLS connection.
#[derive(Clone)]
pub struct TlsTransport {
    endpoint: Endpoint,
    host: String,
    port: u16,
    server_name: ServerName,
    connector: TlsConnector,
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TlsTransport {
    /// Create a transport for `host:port`, loading TLS material from `cert_dir`.
    ///
    /// # Errors
    /// Returns [`TransportError::Configuration`] if a PEM file is missing and
    /// [`TransportError::Tls`] if the material cannot be parsed or used.
    pub fn new(host: impl Into<String>, port: u16, cert_dir: &Path) -> Result<Self> {
        let host = host.into();
        tracing::debug!(cert_dir = %cert_dir.display(), "Loading TLS client material");

        let mut roots = RootCertStore::empty();
        for ca in load_certs(&cert_dir.join(CA_FILE))? {
            roots
                .add(&ca)
                .map_err(|e| TransportError::Tls(format!("invalid CA certificate: {e}")))?;
        }
        let chain = load_certs(&cert_dir.join(CERT_FILE))?;
        let key = load_key(&cert_dir.join(KEY_FILE))?;

        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)
            .map_err(|e| TransportError::Tls(format!("invalid client certificate: {e}")))?;

        let server_name = ServerName::try_from(host.as_str())
            .map_err(|e| TransportError::Tls(format!("invalid server name {host:?}: {e}")))?;

        Ok(Self {
            endpoint: Endpoint::Tls {
                host: host.clone(),
                port,
                cert_dir: cert_dir.to_path_buf(),
            },
            host,
            port,
            server_name,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }
}

#[async_trait]
impl Transport for TlsTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        tracing::debug!(
            host = %self.host,
            port = self.port,
            method = %request.method(),
            uri = %request.uri(),
            "Sending request over tls"
        );
        let tcp = connect_tcp(&self.host, self.port).await?;
        let stream = self
            .connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(|e| {
                tracing::error!(host = %self.host, error = %e, "TLS handshake failed");
                TransportError::Tls(format!("handshake with {} failed: {e}", self.host))
            })?;
        exchange(stream, request, &self.endpoint.authority()).await
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

fn open_pem(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        TransportError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .map_err(|e| TransportError::Tls(format!("invalid PEM in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(TransportError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_key(path: &Path) -> Result<PrivateKey> {
    let mut reader = open_pem(path)?;
    loop {
        let item = rustls_pemfile::read_one(&mut reader)
            .map_err(|e| TransportError::Tls(format!("invalid PEM in {}: {e}", path.display())))?;
        match item {
            Some(Item::PKCS8Key(key) | Item::RSAKey(key) | Item::ECKey(key)) => {
                return Ok(PrivateKey(key))
            }
            Some(_) => continue,
            None => break,
        }
    }
    Err(TransportError::Tls(format!(
        "no private key found in {}",
        path.display()
    )))
}
