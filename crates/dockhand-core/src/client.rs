//! The engine client.
//!
//! [`EngineClient`] resolves its [`Endpoint`] and builds its [`Transport`]
//! once, on first use, and then sends every [`EngineRequest`] over a fresh
//! connection from that transport.

use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::Result;
use crate::request::EngineRequest;
use crate::response::EngineResponse;
use dockhand_transport::{DefaultTransportFactory, Endpoint, Transport, TransportFactory};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

/// Header carrying the registry credential blob.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Client for a container engine's HTTP API.
///
/// Cloning is not supported; share a client behind an [`Arc`] instead. Calls
/// made concurrently through one client use independent connections.
pub struct EngineClient {
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    endpoint: OnceCell<Endpoint>,
    transport: OnceCell<Arc<dyn Transport>>,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint.get())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl EngineClient {
    /// Create a client using the default transports.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultTransportFactory))
    }

    /// Create a client configured from the environment.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Create a client with an injected transport factory.
    pub fn with_factory(config: ClientConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            config,
            factory,
            endpoint: OnceCell::new(),
            transport: OnceCell::new(),
            credentials: None,
        }
    }

    /// Attach registry credentials, sent with pull and push.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Attach credentials for `registry` from the configured credential store,
    /// if it has any.
    pub async fn with_stored_credentials(mut self, registry: Option<&str>) -> Result<Self> {
        if let Some(path) = &self.config.credential_store {
            let store = CredentialStore::load(path).await?;
            if let Some(credentials) = store.get(registry)? {
                tracing::debug!(registry = %credentials.server_address, "Using stored credentials");
                self.credentials = Some(credentials);
            }
        }
        Ok(self)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attached registry credentials.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// The resolved endpoint. Resolved once, on first call.
    ///
    /// # Errors
    /// Returns a configuration error if the host settings are invalid. A
    /// failed resolution is not cached.
    pub async fn endpoint(&self) -> Result<&Endpoint> {
        self.endpoint
            .get_or_try_init(|| async {
                let endpoint = self.config.resolve_endpoint()?;
                tracing::info!(%endpoint, kind = %endpoint.kind(), "Engine endpoint ready");
                Ok(endpoint)
            })
            .await
    }

    async fn transport(&self) -> Result<&Arc<dyn Transport>> {
        let endpoint = self.endpoint().await?;
        self.transport
            .get_or_try_init(|| async { Ok(self.factory.transport(endpoint)?) })
            .await
    }

    /// Send a request and return the response without checking its status.
    pub async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        let transport = self.transport().await?;
        let method = request.method().clone();
        let path = request.path().to_string();
        let start = Instant::now();

        let response = transport.send(request.into_http()?).await?;
        tracing::debug!(
            %method,
            %path,
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Engine call"
        );
        Ok(EngineResponse::new(response))
    }

    /// Send, require success and decode a JSON body.
    pub(crate) async fn call_json<T: DeserializeOwned>(
        &self,
        request: EngineRequest,
        context: impl Into<String>,
    ) -> Result<T> {
        self.send(request).await?.ensure_success(context).await?.json().await
    }

    /// Send, require success and discard the body.
    pub(crate) async fn call_unit(&self, request: EngineRequest, context: impl Into<String>) -> Result<()> {
        self.send(request).await?.ensure_success(context).await?.bytes().await?;
        Ok(())
    }

    /// Add the `X-Registry-Auth` header when credentials are attached.
    pub(crate) fn authenticated(&self, request: EngineRequest) -> Result<EngineRequest> {
        match &self.credentials {
            Some(credentials) => {
                Ok(request.header(REGISTRY_AUTH_HEADER, credentials.registry_auth_header()?))
            }
            None => Ok(request),
        }
    }
}
