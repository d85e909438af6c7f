//! Client configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use crate::credentials::CredentialStore;
use crate::error::Result;
use dockhand_transport::{Endpoint, EndpointResolver, DEFAULT_CERT_DIR_NAME};
use std::path::PathBuf;

/// Engine address used when `DOCKER_HOST` is not set.
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

/// Configuration for an [`EngineClient`](crate::EngineClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host specification, e.g. `unix:///var/run/docker.sock` or `tcp://host:2376`.
    pub host: Option<String>,
    /// Raw TLS-verify setting (`0`/`no`/`false`, `1`/`yes`/`true`, or unset).
    pub tls_verify: Option<String>,
    /// Explicit certificate directory.
    pub cert_path: Option<PathBuf>,
    /// Per-user certificate directory consulted when `cert_path` is absent.
    pub default_cert_dir: Option<PathBuf>,
    /// Credential store file.
    pub credential_store: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: Some(DEFAULT_HOST.to_string()),
            tls_verify: None,
            cert_path: None,
            default_cert_dir: dirs::home_dir().map(|home| home.join(DEFAULT_CERT_DIR_NAME)),
            credential_store: CredentialStore::default_path(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DOCKER_HOST` | `unix:///var/run/docker.sock` |
    /// | `DOCKER_TLS_VERIFY` | unset |
    /// | `DOCKER_CERT_PATH` | unset (falls back to `~/.docker`) |
    /// | `DOCKHAND_CREDENTIALS` | `~/.dockercfg` |
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: std::env::var("DOCKER_HOST")
                .ok()
                .filter(|v| !v.is_empty())
                .or(default.host),
            tls_verify: std::env::var("DOCKER_TLS_VERIFY").ok(),
            cert_path: std::env::var("DOCKER_CERT_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            default_cert_dir: default.default_cert_dir,
            credential_store: std::env::var("DOCKHAND_CREDENTIALS")
                .map(PathBuf::from)
                .ok()
                .or(default.credential_store),
        }
    }

    /// Resolve the configured host into an [`Endpoint`].
    ///
    /// # Errors
    /// Returns a configuration error if the host is missing or the TLS
    /// settings are contradictory.
    pub fn resolve_endpoint(&self) -> Result<Endpoint> {
        let endpoint = EndpointResolver::new()
            .with_default_cert_dir(self.default_cert_dir.clone())
            .resolve(
                self.host.as_deref(),
                self.tls_verify.as_deref(),
                self.cert_path.as_deref(),
            )?;
        Ok(endpoint)
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the host specification.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Set the TLS-verify setting.
    pub fn tls_verify(mut self, setting: impl Into<String>) -> Self {
        self.config.tls_verify = Some(setting.into());
        self
    }

    /// Set the certificate directory.
    pub fn cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cert_path = Some(path.into());
        self
    }

    /// Set (or clear) the per-user certificate directory.
    pub fn default_cert_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.default_cert_dir = dir;
        self
    }

    /// Set the credential store file.
    pub fn credential_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credential_store = Some(path.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
