//! System endpoints: ping, version, info, login.

use crate::client::EngineClient;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::request::EngineRequest;
use serde_json::Value;

impl EngineClient {
    /// `GET /_ping`; returns the body (normally `OK`).
    pub async fn ping(&self) -> Result<String> {
        let body = self
            .send(EngineRequest::get("/_ping"))
            .await?
            .ensure_success("ping engine")
            .await?
            .text()
            .await?;
        Ok(body.trim().to_string())
    }

    /// `GET /version`
    pub async fn version(&self) -> Result<Value> {
        self.call_json(EngineRequest::get("/version"), "read engine version")
            .await
    }

    /// `GET /info`
    pub async fn info(&self) -> Result<Value> {
        self.call_json(EngineRequest::get("/info"), "read engine info")
            .await
    }

    /// `POST /auth`: check credentials against a registry.
    pub async fn login(&self, credentials: &Credentials) -> Result<Value> {
        let request = EngineRequest::post("/auth").json(credentials)?;
        let context = format!("log in to {}", credentials.server_address);
        self.call_json(request, context).await
    }
}
