//! Container endpoints.

use crate::archive::{extract_single_entry, TarEntry};
use crate::client::EngineClient;
use crate::demux::Demuxer;
use crate::error::Result;
use crate::request::EngineRequest;
use crate::response::RawStream;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct WaitResponse {
    #[serde(rename = "StatusCode")]
    status_code: i64,
}

/// Options for [`EngineClient::attach_container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
    /// Replay output produced before attaching
    pub logs: bool,
    /// Keep streaming new output
    pub stream: bool,
    /// Attach stdout
    pub stdout: bool,
    /// Attach stderr
    pub stderr: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            logs: true,
            stream: true,
            stdout: true,
            stderr: true,
        }
    }
}

/// Options for [`EngineClient::logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsOptions {
    /// Keep the stream open for new output
    pub follow: bool,
    /// Include stdout
    pub stdout: bool,
    /// Include stderr
    pub stderr: bool,
    /// Prefix lines with timestamps
    pub timestamps: bool,
    /// Number of trailing lines, or `all`
    pub tail: Option<String>,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            follow: false,
            stdout: true,
            stderr: true,
            timestamps: false,
            tail: None,
        }
    }
}

impl EngineClient {
    /// `GET /containers/json`
    pub async fn list_containers(&self, all: bool, filters: Option<&Value>) -> Result<Vec<Value>> {
        let mut request = EngineRequest::get("/containers/json").query_flag("all", all);
        if let Some(filters) = filters {
            request = request.query_json("filters", filters)?;
        }
        self.call_json(request, "list containers").await
    }

    /// `GET /containers/{id}/json`
    pub async fn inspect_container(&self, id: &str) -> Result<Value> {
        self.call_json(
            EngineRequest::get(format!("/containers/{id}/json")),
            format!("inspect container {id}"),
        )
        .await
    }

    /// `GET /containers/{id}/changes`
    pub async fn container_changes(&self, id: &str) -> Result<Vec<Value>> {
        let changes: Option<Vec<Value>> = self
            .call_json(
                EngineRequest::get(format!("/containers/{id}/changes")),
                format!("list changes of container {id}"),
            )
            .await?;
        Ok(changes.unwrap_or_default())
    }

    /// `POST /containers/{id}/start`
    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.call_unit(
            EngineRequest::post(format!("/containers/{id}/start")),
            format!("start container {id}"),
        )
        .await
    }

    /// `POST /containers/{id}/restart`
    pub async fn restart_container(&self, id: &str, timeout_secs: Option<u64>) -> Result<()> {
        let request =
            EngineRequest::post(format!("/containers/{id}/restart")).query_opt("t", timeout_secs);
        self.call_unit(request, format!("restart container {id}")).await
    }

    /// `POST /containers/{id}/stop`
    pub async fn stop_container(&self, id: &str, timeout_secs: Option<u64>) -> Result<()> {
        let request =
            EngineRequest::post(format!("/containers/{id}/stop")).query_opt("t", timeout_secs);
        self.call_unit(request, format!("stop container {id}")).await
    }

    /// `POST /containers/{id}/kill`
    pub async fn kill_container(&self, id: &str, signal: Option<&str>) -> Result<()> {
        let request =
            EngineRequest::post(format!("/containers/{id}/kill")).query_opt("signal", signal);
        self.call_unit(request, format!("kill container {id}")).await
    }

    /// `POST /containers/{id}/wait`; returns the exit status.
    pub async fn wait_container(&self, id: &str) -> Result<i64> {
        let body: WaitResponse = self
            .call_json(
                EngineRequest::post(format!("/containers/{id}/wait")),
                format!("wait for container {id}"),
            )
            .await?;
        Ok(body.status_code)
    }

    /// `POST /containers/{id}/pause`
    pub async fn pause_container(&self, id: &str) -> Result<()> {
        self.call_unit(
            EngineRequest::post(format!("/containers/{id}/pause")),
            format!("pause container {id}"),
        )
        .await
    }

    /// `POST /containers/{id}/unpause`
    pub async fn unpause_container(&self, id: &str) -> Result<()> {
        self.call_unit(
            EngineRequest::post(format!("/containers/{id}/unpause")),
            format!("unpause container {id}"),
        )
        .await
    }

    /// `POST /containers/{id}/rename`
    pub async fn rename_container(&self, id: &str, new_name: &str) -> Result<()> {
        let request = EngineRequest::post(format!("/containers/{id}/rename")).query("name", new_name);
        self.call_unit(request, format!("rename container {id} to {new_name}"))
            .await
    }

    /// `DELETE /containers/{id}`
    pub async fn remove_container(&self, id: &str, force: bool, volumes: bool) -> Result<()> {
        let request = EngineRequest::delete(format!("/containers/{id}"))
            .query_flag("force", force)
            .query_flag("v", volumes);
        self.call_unit(request, format!("remove container {id}")).await
    }

    /// Whether the container was created with a pseudo-terminal.
    async fn container_tty(&self, id: &str) -> Result<bool> {
        let info = self.inspect_container(id).await?;
        Ok(info["Config"]["Tty"].as_bool().unwrap_or(false))
    }

    /// `POST /containers/{id}/attach`
    ///
    /// The output is demultiplexed unless the container has a pseudo-terminal.
    /// The returned demuxer owns the connection.
    pub async fn attach_container(&self, id: &str, options: AttachOptions) -> Result<Demuxer<RawStream>> {
        let tty = self.container_tty(id).await?;
        let request = EngineRequest::post(format!("/containers/{id}/attach"))
            .query_flag("logs", options.logs)
            .query_flag("stream", options.stream)
            .query_flag("stdout", options.stdout)
            .query_flag("stderr", options.stderr);
        let response = self
            .send(request)
            .await?
            .ensure_success(format!("attach to container {id}"))
            .await?;
        tracing::debug!(id, tty, "Attached to container");
        Ok(response.demux(!tty))
    }

    /// `GET /containers/{id}/logs`
    pub async fn logs(&self, id: &str, options: &LogsOptions) -> Result<Demuxer<RawStream>> {
        let tty = self.container_tty(id).await?;
        let request = EngineRequest::get(format!("/containers/{id}/logs"))
            .query_flag("follow", options.follow)
            .query_flag("stdout", options.stdout)
            .query_flag("stderr", options.stderr)
            .query_flag("timestamps", options.timestamps)
            .query_opt("tail", options.tail.as_deref());
        let response = self
            .send(request)
            .await?
            .ensure_success(format!("read logs of container {id}"))
            .await?;
        Ok(response.demux(!tty))
    }

    /// `POST /containers/{id}/copy`: read one file out of a container.
    pub async fn copy_file_from_container(&self, id: &str, path: &str) -> Result<TarEntry> {
        let request = EngineRequest::post(format!("/containers/{id}/copy"))
            .json(&json!({ "Resource": path }))?;
        let archive = self
            .send(request)
            .await?
            .ensure_success(format!("copy {path} from container {id}"))
            .await?
            .bytes()
            .await?;
        let entry = extract_single_entry(&archive[..], path)?;
        tracing::debug!(id, path, size = entry.size, "Copied file from container");
        Ok(entry)
    }
}
