//! Container creation with implicit image pull, and `run`.
//!
//! A create call answered with 404 means the image is not present locally.
//! [`EngineClient::create_container`] then pulls the image once and retries
//! the create once. Nothing else is retried, and nothing is rolled back: a
//! container that was created but failed to start stays in place.

use crate::client::EngineClient;
use crate::error::{ClientError, Result};
use crate::request::EngineRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag pulled when an image reference has none.
pub const DEFAULT_TAG: &str = "latest";

/// Body of a create-container call.
///
/// Only `Image` is typed; everything else passes through as engine JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference, e.g. `busybox:1.36`
    #[serde(rename = "Image")]
    pub image: String,
    /// Remaining engine fields (`Cmd`, `Env`, `HostConfig`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContainerConfig {
    /// Config for `image` with no other fields.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            extra: Map::new(),
        }
    }

    /// Set an arbitrary engine field.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Set the command (`Cmd`).
    pub fn cmd<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<Value> = args.into_iter().map(|a| Value::String(a.into())).collect();
        self.with("Cmd", Value::Array(args))
    }

    /// Whether `Tty` is set.
    pub fn tty(&self) -> bool {
        self.extra.get("Tty").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Successful create-container response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedContainer {
    /// Container id
    #[serde(rename = "Id")]
    pub id: String,
    /// Engine warnings, if any
    #[serde(rename = "Warnings", default)]
    pub warnings: Option<Vec<String>>,
}

/// Result of a single create attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The container exists.
    Created(CreatedContainer),
    /// The engine does not have the image (404).
    ImageMissing {
        /// Response body
        detail: String,
    },
    /// Any other non-success status.
    Failed {
        /// HTTP status
        status: u16,
        /// Response body
        detail: String,
    },
}

/// An image reference split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Repository, including any registry host
    pub repository: String,
    /// Tag; `None` for digest references
    pub tag: Option<String>,
}

impl ImageReference {
    /// Split `repository[:tag]`.
    ///
    /// A `:` only marks a tag when it comes after the last `/`, so registry
    /// ports survive (`registry.local:5000/app` has tag `latest`). Digest
    /// references (`app@sha256:...`) are kept whole.
    pub fn parse(reference: &str) -> Self {
        if reference.contains('@') {
            return Self {
                repository: reference.to_string(),
                tag: None,
            };
        }

        let name_start = reference.rfind('/').map_or(0, |i| i + 1);
        match reference[name_start..].rfind(':') {
            Some(i) => {
                let split = name_start + i;
                Self {
                    repository: reference[..split].to_string(),
                    tag: Some(reference[split + 1..].to_string()),
                }
            }
            None => Self {
                repository: reference.to_string(),
                tag: Some(DEFAULT_TAG.to_string()),
            },
        }
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{tag}", self.repository),
            None => write!(f, "{}", self.repository),
        }
    }
}

impl EngineClient {
    /// One create attempt, classified by status.
    ///
    /// Transport and decoding failures are errors; engine refusals are
    /// reported through [`CreateOutcome`].
    pub async fn try_create_container(
        &self,
        config: &ContainerConfig,
        name: Option<&str>,
    ) -> Result<CreateOutcome> {
        let request = EngineRequest::post("/containers/create")
            .query_opt("name", name)
            .json(config)?;
        let response = self.send(request).await?;
        let status = response.status().as_u16();

        if status == 404 {
            return Ok(CreateOutcome::ImageMissing {
                detail: response.text().await?.trim().to_string(),
            });
        }
        if !response.is_success() {
            return Ok(CreateOutcome::Failed {
                status,
                detail: response.text().await?.trim().to_string(),
            });
        }
        Ok(CreateOutcome::Created(response.json().await?))
    }

    /// Create a container, pulling its image once if the engine lacks it.
    ///
    /// # Errors
    /// Returns [`ClientError::Operation`] if the first attempt fails with
    /// anything but 404, if the pull fails, or if the retried create fails.
    pub async fn create_container(
        &self,
        config: &ContainerConfig,
        name: Option<&str>,
    ) -> Result<CreatedContainer> {
        let context = format!("create container from {}", config.image);

        let first_detail = match self.try_create_container(config, name).await? {
            CreateOutcome::Created(created) => {
                tracing::info!(id = %created.id, image = %config.image, "Container created");
                return Ok(created);
            }
            CreateOutcome::Failed { status, detail } => {
                return Err(ClientError::Operation {
                    context,
                    status,
                    body: detail,
                })
            }
            CreateOutcome::ImageMissing { detail } => detail,
        };

        tracing::warn!(image = %config.image, "Container image not found, pulling");
        let reference = ImageReference::parse(&config.image);
        self.pull_image(&reference.repository, reference.tag.as_deref())
            .await?;

        match self.try_create_container(config, name).await? {
            CreateOutcome::Created(created) => {
                tracing::info!(id = %created.id, image = %config.image, "Container created after pull");
                Ok(created)
            }
            CreateOutcome::ImageMissing { detail } => Err(retry_failed(context, &first_detail, 404, detail)),
            CreateOutcome::Failed { status, detail } => {
                Err(retry_failed(context, &first_detail, status, detail))
            }
        }
    }

    /// Create a container from `image[:tag]` and start it.
    ///
    /// Returns the container id. If the start fails, the created container
    /// is left in place and the start error is returned.
    pub async fn run(
        &self,
        image: &str,
        config: ContainerConfig,
        tag: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        let config = ContainerConfig {
            image: match tag {
                Some(tag) => format!("{image}:{tag}"),
                None => image.to_string(),
            },
            ..config
        };

        let created = self.create_container(&config, name).await?;
        for warning in created.warnings.iter().flatten() {
            tracing::warn!(id = %created.id, %warning, "Engine warning");
        }

        self.start_container(&created.id).await?;
        tracing::info!(id = %created.id, image = %config.image, "Container started");
        Ok(created.id)
    }
}

fn retry_failed(context: String, first_detail: &str, status: u16, detail: String) -> ClientError {
    ClientError::Operation {
        context: format!("{context} (retried after pull; first attempt: 404 {first_detail})"),
        status,
        body: detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_repository_and_tag() {
        assert_eq!(
            ImageReference::parse("busybox:1.36"),
            ImageReference {
                repository: "busybox".into(),
                tag: Some("1.36".into())
            }
        );
    }

    #[test]
    fn test_parse_defaults_to_latest() {
        let reference = ImageReference::parse("library/busybox");
        assert_eq!(reference.repository, "library/busybox");
        assert_eq!(reference.tag.as_deref(), Some(DEFAULT_TAG));
    }

    #[test]
    fn test_parse_keeps_registry_port() {
        let reference = ImageReference::parse("registry.local:5000/team/app");
        assert_eq!(reference.repository, "registry.local:5000/team/app");
        assert_eq!(reference.tag.as_deref(), Some("latest"));

        let reference = ImageReference::parse("registry.local:5000/team/app:v2");
        assert_eq!(reference.repository, "registry.local:5000/team/app");
        assert_eq!(reference.tag.as_deref(), Some("v2"));
        assert_eq!(reference.to_string(), "registry.local:5000/team/app:v2");
    }

    #[test]
    fn test_parse_digest_reference() {
        let digest = "busybox@sha256:3fbc632167424a6d997e74f52b878d7cc478225cffac6bc977eedfe51c7f4e79";
        let reference = ImageReference::parse(digest);
        assert_eq!(reference.repository, digest);
        assert!(reference.tag.is_none());
        assert_eq!(reference.to_string(), digest);
    }

    #[test]
    fn test_container_config_serialization() {
        let config = ContainerConfig::new("busybox")
            .cmd(["echo", "hi"])
            .with("Tty", json!(true));
        assert!(config.tty());
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"Image": "busybox", "Cmd": ["echo", "hi"], "Tty": true})
        );

        let parsed: ContainerConfig =
            serde_json::from_value(json!({"Image": "alpine", "Env": ["A=1"]})).unwrap();
        assert_eq!(parsed.image, "alpine");
        assert_eq!(parsed.extra["Env"], json!(["A=1"]));
        assert!(!parsed.tty());
    }

    #[test]
    fn test_created_container_decoding() {
        let created: CreatedContainer =
            serde_json::from_value(json!({"Id": "abc123", "Warnings": null})).unwrap();
        assert_eq!(created.id, "abc123");
        assert!(created.warnings.is_none());
    }
}
