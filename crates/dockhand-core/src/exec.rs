//! Exec endpoints.

use crate::client::EngineClient;
use crate::demux::Demuxer;
use crate::error::Result;
use crate::request::EngineRequest;
use crate::response::RawStream;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Body of an exec-create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecConfig {
    /// Command and arguments
    pub cmd: Vec<String>,
    /// Attach stdin
    pub attach_stdin: bool,
    /// Attach stdout
    pub attach_stdout: bool,
    /// Attach stderr
    pub attach_stderr: bool,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Extra environment, `KEY=value`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    /// Working directory inside the container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl ExecConfig {
    /// Run `cmd` with stdout and stderr attached.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            attach_stdout: true,
            attach_stderr: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecCreated {
    #[serde(rename = "Id")]
    id: String,
}

impl EngineClient {
    /// `POST /containers/{id}/exec`; returns the exec id.
    pub async fn create_exec(&self, container_id: &str, config: &ExecConfig) -> Result<String> {
        let request = EngineRequest::post(format!("/containers/{container_id}/exec")).json(config)?;
        let created: ExecCreated = self
            .call_json(request, format!("create exec in container {container_id}"))
            .await?;
        tracing::debug!(container_id, exec_id = %created.id, "Exec created");
        Ok(created.id)
    }

    /// `POST /exec/{id}/start`, attached.
    ///
    /// `tty` must match the exec's configuration: it decides whether the
    /// output is demultiplexed.
    pub async fn start_exec(&self, exec_id: &str, tty: bool) -> Result<Demuxer<RawStream>> {
        let request = EngineRequest::post(format!("/exec/{exec_id}/start"))
            .json(&json!({ "Detach": false, "Tty": tty }))?;
        let response = self
            .send(request)
            .await?
            .ensure_success(format!("start exec {exec_id}"))
            .await?;
        Ok(response.demux(!tty))
    }
}
