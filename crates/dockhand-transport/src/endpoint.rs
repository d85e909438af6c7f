//! Engine endpoint resolution.
//!
//! Turns a host specification such as `tcp://10.0.0.5:2376` or
//! `unix:///var/run/docker.sock` plus the TLS-verify and cert-path settings
//! into a typed [`Endpoint`].
//!
//! The TLS decision for TCP endpoints follows the engine CLI's behaviour:
//!
//! 1. TLS-verify `0`/`no`/`false` disables TLS outright.
//! 2. TLS-verify `1`/`yes`/`true` requires TLS and a certificate directory.
//! 3. Otherwise TLS is used only when a certificate directory exists *and*
//!    the port is the conventional TLS port (2376). This is a guess, not a
//!    security guarantee.

use crate::error::{Result, TransportError};
use std::fmt;
use std::path::{Path, PathBuf};
use url::{Host, Url};

/// Conventional TLS port of the engine API.
pub const DEFAULT_TLS_PORT: u16 = 2376;

/// Conventional plain-TCP port of the engine API.
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Name of the per-user configuration directory under `$HOME`.
pub const DEFAULT_CERT_DIR_NAME: &str = ".docker";

/// Kind of connection an [`Endpoint`] needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Plain TCP
    Tcp,
    /// TCP wrapped in TLS with client certificates
    Tls,
    /// Local Unix domain socket
    UnixSocket,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Tcp => write!(f, "tcp"),
            EndpointKind::Tls => write!(f, "tls"),
            EndpointKind::UnixSocket => write!(f, "unix"),
        }
    }
}

/// A resolved, immutable connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain TCP endpoint.
    Tcp {
        /// Host name or IP address
        host: String,
        /// TCP port
        port: u16,
    },
    /// TLS-secured TCP endpoint.
    Tls {
        /// Host name or IP address
        host: String,
        /// TCP port
        port: u16,
        /// Directory holding `ca.pem`, `cert.pem` and `key.pem`
        cert_dir: PathBuf,
    },
    /// Unix domain socket endpoint.
    Unix {
        /// Absolute path of the socket
        path: PathBuf,
    },
}

impl Endpoint {
    /// Get the connection kind.
    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Tcp { .. } => EndpointKind::Tcp,
            Endpoint::Tls { .. } => EndpointKind::Tls,
            Endpoint::Unix { .. } => EndpointKind::UnixSocket,
        }
    }

    /// Check whether this endpoint uses TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self, Endpoint::Tls { .. })
    }

    /// Host for TCP/TLS endpoints.
    pub fn host(&self) -> Option<&str> {
        match self {
            Endpoint::Tcp { host, .. } | Endpoint::Tls { host, .. } => Some(host.as_str()),
            Endpoint::Unix { .. } => None,
        }
    }

    /// Port for TCP/TLS endpoints.
    pub fn port(&self) -> Option<u16> {
        match self {
            Endpoint::Tcp { port, .. } | Endpoint::Tls { port, .. } => Some(*port),
            Endpoint::Unix { .. } => None,
        }
    }

    /// Socket path for Unix endpoints.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Endpoint::Unix { path } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Value for the HTTP `Host` header.
    pub fn authority(&self) -> String {
        match self {
            Endpoint::Tcp { host, port } | Endpoint::Tls { host, port, .. } => {
                format!("{}:{port}", bracket_ipv6(host))
            }
            Endpoint::Unix { .. } => "localhost".to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { .. } => write!(f, "http://{}", self.authority()),
            Endpoint::Tls { .. } => write!(f, "https://{}", self.authority()),
            Endpoint::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

fn bracket_ipv6(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Parsed TLS-verify setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVerify {
    /// `0`, `no` or `false`
    Disabled,
    /// `1`, `yes` or `true`
    Required,
    /// Unset or any other value
    Unset,
}

impl TlsVerify {
    /// Parse from the raw setting (case-insensitive).
    pub fn parse(setting: Option<&str>) -> Self {
        match setting.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("0" | "no" | "false") => Self::Disabled,
            Some("1" | "yes" | "true") => Self::Required,
            _ => Self::Unset,
        }
    }
}

/// Resolves host specifications into [`Endpoint`]s.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    default_cert_dir: Option<PathBuf>,
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver {
    /// Create a resolver whose default cert directory is `<home>/.docker`.
    pub fn new() -> Self {
        Self {
            default_cert_dir: dirs::home_dir().map(|home| home.join(DEFAULT_CERT_DIR_NAME)),
        }
    }

    /// Override the default per-user cert directory (`None` disables it).
    pub fn with_default_cert_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.default_cert_dir = dir;
        self
    }

    /// Resolve a host specification.
    ///
    /// # Errors
    /// Returns [`TransportError::Configuration`] if `host_spec` is absent,
    /// a Unix socket path is malformed, a TCP host cannot be parsed, or TLS
    /// is required but no cert directory exists.
    pub fn resolve(
        &self,
        host_spec: Option<&str>,
        tls_verify: Option<&str>,
        cert_path: Option<&Path>,
    ) -> Result<Endpoint> {
        let host_spec = host_spec
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TransportError::Configuration("engine host is not set".into()))?;

        let (scheme, remainder) = match host_spec.split_once("://") {
            Some((scheme, remainder)) => (scheme.to_lowercase(), remainder),
            None => ("tcp".to_string(), host_spec),
        };

        let endpoint = match scheme.as_str() {
            "unix" => Self::resolve_unix(remainder)?,
            "tcp" | "http" | "https" => {
                let (host, port) = parse_authority(remainder)?;
                let tls = self.should_use_tls(port, tls_verify, cert_path)?;
                self.tcp_endpoint(host, port, tls, cert_path)
            }
            other => {
                tracing::warn!(
                    scheme = %other,
                    host = %host_spec,
                    "Unrecognised engine host scheme, treating as plain TCP"
                );
                let (host, port) = parse_authority(remainder)?;
                Endpoint::Tcp {
                    host,
                    port: port.unwrap_or(DEFAULT_TCP_PORT),
                }
            }
        };

        tracing::debug!(%endpoint, kind = %endpoint.kind(), "Resolved engine endpoint");
        Ok(endpoint)
    }

    /// Decide whether a TCP endpoint on `port` should use TLS.
    ///
    /// # Errors
    /// Returns [`TransportError::Configuration`] when TLS-verify demands TLS
    /// but neither the configured nor the default cert directory exists.
    pub fn should_use_tls(
        &self,
        port: Option<u16>,
        tls_verify: Option<&str>,
        cert_path: Option<&Path>,
    ) -> Result<bool> {
        let verify = TlsVerify::parse(tls_verify);
        if verify == TlsVerify::Disabled {
            return Ok(false);
        }

        let certs_path_exists = self.cert_dir(cert_path).is_some();
        match verify {
            TlsVerify::Required if !certs_path_exists => Err(TransportError::Configuration(
                "tlsverify requested but cert path missing".into(),
            )),
            TlsVerify::Required => Ok(true),
            _ => Ok(certs_path_exists && port == Some(DEFAULT_TLS_PORT)),
        }
    }

    /// The cert directory TLS would use: the configured one if it exists,
    /// else the default one if it exists.
    pub fn cert_dir(&self, cert_path: Option<&Path>) -> Option<PathBuf> {
        cert_path
            .filter(|p| p.is_dir())
            .map(Path::to_path_buf)
            .or_else(|| self.default_cert_dir.clone().filter(|p| p.is_dir()))
    }

    fn tcp_endpoint(
        &self,
        host: String,
        port: Option<u16>,
        tls: bool,
        cert_path: Option<&Path>,
    ) -> Endpoint {
        match (tls, self.cert_dir(cert_path)) {
            (true, Some(cert_dir)) => Endpoint::Tls {
                host,
                port: port.unwrap_or(DEFAULT_TLS_PORT),
                cert_dir,
            },
            _ => Endpoint::Tcp {
                host,
                port: port.unwrap_or(DEFAULT_TCP_PORT),
            },
        }
    }

    fn resolve_unix(remainder: &str) -> Result<Endpoint> {
        let path = PathBuf::from(remainder);
        if remainder.is_empty() || !path.is_absolute() {
            return Err(TransportError::Configuration(format!(
                "invalid unix socket path: {remainder:?}"
            )));
        }
        Ok(Endpoint::Unix { path })
    }
}

/// Split `host[:port][/path]` into host and optional port.
fn parse_authority(remainder: &str) -> Result<(String, Option<u16>)> {
    let url = Url::parse(&format!("tcp://{remainder}")).map_err(|e| {
        TransportError::Configuration(format!("invalid engine address {remainder:?}: {e}"))
    })?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        _ => {
            return Err(TransportError::Configuration(format!(
                "engine address {remainder:?} has no host"
            )))
        }
    };

    Ok((host, url.port()))
}
