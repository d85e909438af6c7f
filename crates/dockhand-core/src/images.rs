//! Image endpoints.

use crate::client::EngineClient;
use crate::error::{ClientError, Result};
use crate::json_stream::JsonStream;
use crate::request::EngineRequest;
use serde_json::Value;

/// Options for [`EngineClient::build_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Name and optional tag for the result (`t`)
    pub tag: Option<String>,
    /// Path of the Dockerfile inside the context
    pub dockerfile: Option<String>,
    /// Do not use the build cache
    pub no_cache: bool,
    /// Remove intermediate containers
    pub remove: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tag: None,
            dockerfile: None,
            no_cache: false,
            remove: true,
        }
    }
}

/// Error reported inside a progress document, if any.
pub fn progress_error(document: &Value) -> Option<String> {
    let error = document.get("error")?;
    let message = document
        .pointer("/errorDetail/message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(message)
}

/// Drain a progress stream, failing on the first document that reports an error.
pub async fn drain_progress(mut stream: JsonStream, context: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    while let Some(document) = stream.next_value().await? {
        if let Some(message) = progress_error(&document) {
            return Err(ClientError::Operation {
                context: context.to_string(),
                status: 200,
                body: message,
            });
        }
        if let Some(status) = document.get("status").and_then(Value::as_str) {
            tracing::trace!(%status, "Progress");
        }
        documents.push(document);
    }
    Ok(documents)
}

impl EngineClient {
    /// `GET /images/json`
    pub async fn list_images(&self, all: bool) -> Result<Vec<Value>> {
        let request = EngineRequest::get("/images/json").query_flag("all", all);
        self.call_json(request, "list images").await
    }

    /// `GET /images/{name}/json`
    pub async fn inspect_image(&self, name: &str) -> Result<Value> {
        self.call_json(
            EngineRequest::get(format!("/images/{name}/json")),
            format!("inspect image {name}"),
        )
        .await
    }

    /// `GET /images/{name}/history`
    pub async fn image_history(&self, name: &str) -> Result<Vec<Value>> {
        self.call_json(
            EngineRequest::get(format!("/images/{name}/history")),
            format!("read history of image {name}"),
        )
        .await
    }

    /// `GET /images/search`
    ///
    /// The engine may answer with one array or several documents; results
    /// are flattened into one list.
    pub async fn search_images(&self, term: &str) -> Result<Vec<Value>> {
        let request = EngineRequest::get("/images/search").query("term", term);
        let mut stream = self
            .send(request)
            .await?
            .ensure_success(format!("search images for {term}"))
            .await?
            .json_stream();

        let mut results = Vec::new();
        while let Some(document) = stream.next_value().await? {
            match document {
                Value::Array(items) => results.extend(items),
                other => results.push(other),
            }
        }
        Ok(results)
    }

    /// `POST /images/create`, returning the progress stream unread.
    pub async fn pull_image_stream(&self, repository: &str, tag: Option<&str>) -> Result<JsonStream> {
        let request = self.authenticated(
            EngineRequest::post("/images/create")
                .query("fromImage", repository)
                .query_opt("tag", tag),
        )?;
        let response = self
            .send(request)
            .await?
            .ensure_success(pull_context(repository, tag))
            .await?;
        Ok(response.json_stream())
    }

    /// `POST /images/create`: pull an image and wait for the pull to finish.
    ///
    /// Returns the progress documents.
    pub async fn pull_image(&self, repository: &str, tag: Option<&str>) -> Result<Vec<Value>> {
        tracing::info!(repository, tag, "Pulling image");
        let stream = self.pull_image_stream(repository, tag).await?;
        let progress = drain_progress(stream, &pull_context(repository, tag)).await?;
        tracing::info!(repository, tag, "Image pulled");
        Ok(progress)
    }

    /// `POST /images/{name}/push`
    pub async fn push_image(&self, name: &str, tag: Option<&str>) -> Result<Vec<Value>> {
        let request = self.authenticated(
            EngineRequest::post(format!("/images/{name}/push")).query_opt("tag", tag),
        )?;
        let context = format!("push image {name}");
        let stream = self
            .send(request)
            .await?
            .ensure_success(context.as_str())
            .await?
            .json_stream();
        drain_progress(stream, &context).await
    }

    /// `POST /images/{name}/tag`
    pub async fn tag_image(&self, name: &str, repository: &str, tag: Option<&str>, force: bool) -> Result<()> {
        let mut request = EngineRequest::post(format!("/images/{name}/tag"))
            .query("repo", repository)
            .query_opt("tag", tag);
        if force {
            request = request.query("force", "1");
        }
        self.call_unit(request, format!("tag image {name} as {repository}"))
            .await
    }

    /// `DELETE /images/{name}`
    pub async fn remove_image(&self, name: &str, force: bool, no_prune: bool) -> Result<Vec<Value>> {
        let request = EngineRequest::delete(format!("/images/{name}"))
            .query_flag("force", force)
            .query_flag("noprune", no_prune);
        self.call_json(request, format!("remove image {name}")).await
    }

    /// `POST /build` with a tar build context; returns the progress stream.
    pub async fn build_image(&self, context_tar: Vec<u8>, options: &BuildOptions) -> Result<JsonStream> {
        let request = EngineRequest::post("/build")
            .query_opt("t", options.tag.as_deref())
            .query_opt("dockerfile", options.dockerfile.as_deref())
            .query_flag("nocache", options.no_cache)
            .query_flag("rm", options.remove)
            .tar(context_tar);
        let response = self
            .send(request)
            .await?
            .ensure_success("build image")
            .await?;
        Ok(response.json_stream())
    }
}

fn pull_context(repository: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("pull image {repository}:{tag}"),
        None => format!("pull image {repository}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Body;
    use serde_json::json;

    #[test]
    fn test_progress_error_prefers_detail() {
        let doc = json!({"error": "short", "errorDetail": {"message": "manifest unknown"}});
        assert_eq!(progress_error(&doc).as_deref(), Some("manifest unknown"));

        let doc = json!({"error": "pull access denied"});
        assert_eq!(progress_error(&doc).as_deref(), Some("pull access denied"));

        assert!(progress_error(&json!({"status": "Downloading"})).is_none());
    }

    #[tokio::test]
    async fn test_drain_progress_fails_on_error_document() {
        let stream = JsonStream::new(Body::from(
            "{\"status\":\"Pulling fs layer\"}\n{\"error\":\"no space left on device\"}\n",
        ));
        let err = drain_progress(stream, "pull image busybox:latest")
            .await
            .unwrap_err();
        match err {
            ClientError::Operation { context, body, .. } => {
                assert_eq!(context, "pull image busybox:latest");
                assert_eq!(body, "no space left on device");
            }
            other => panic!("expected operation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drain_progress_collects_documents() {
        let stream = JsonStream::new(Body::from("{\"status\":\"a\"}{\"status\":\"b\"}"));
        let docs = drain_progress(stream, "pull").await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_pull_context() {
        assert_eq!(pull_context("busybox", Some("1.36")), "pull image busybox:1.36");
        assert_eq!(pull_context("busybox@sha256:ab", None), "pull image busybox@sha256:ab");
    }
}
