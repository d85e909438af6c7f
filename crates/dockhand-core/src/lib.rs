//! # dockhand-core
//!
//! Client for a container engine's HTTP API.
//!
//! This crate builds requests, sends them through `dockhand-transport`, and
//! interprets the responses: single JSON documents, lazy JSON progress
//! streams, multiplexed stdout/stderr streams and tar archives.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      dockhand-core                       │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐    │
//! │  │  EngineClient   │────▶│  run / create_container  │    │
//! │  │  - endpoint()   │     │  (pull once, retry once) │    │
//! │  │  - send()       │     └──────────────────────────┘    │
//! │  └─────────────────┘                                     │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐    │
//! │  │ EngineResponse  │────▶│  JsonStream  (progress)  │    │
//! │  │  - json()       │     │  Demuxer     (attach/exec│    │
//! │  │  - bytes()      │     │               /logs)     │    │
//! │  └─────────────────┘     │  extract_single_entry    │    │
//! │                          │               (copy)     │    │
//! │                          └──────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                   dockhand-transport                     │
//! │        Unix socket · TCP · TLS, one connection per call  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use dockhand_core::{ContainerConfig, EngineClient};
//!
//! # async fn example() -> dockhand_core::Result<()> {
//! let client = EngineClient::from_env();
//! println!("engine says {}", client.ping().await?);
//!
//! // Pulls busybox:latest first if the engine does not have it
//! let config = ContainerConfig::new("busybox").cmd(["echo", "hello"]);
//! let id = client.run("busybox", config, Some("latest"), None).await?;
//!
//! let logs = client.logs(&id, &Default::default()).await?;
//! let (stdout, _stderr) = logs.collect_output().await?;
//! println!("{}", String::from_utf8_lossy(&stdout));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Endpoint Caching**: the endpoint and transport are resolved once per client
//! - **Implicit Pull**: a create answered with 404 pulls the image and retries once
//! - **Stream Demultiplexing**: stdout/stderr frames from attach, exec and logs
//! - **Progress Streams**: lazily parsed build, pull and push output
//! - **Registry Credentials**: a JSON credential store and the `X-Registry-Auth` header

mod archive;
mod client;
mod config;
mod containers;
mod credentials;
mod demux;
mod error;
mod exec;
mod images;
mod json_stream;
mod lifecycle;
mod request;
mod response;
mod system;

pub use archive::{extract_single_entry, TarEntry};
pub use client::{EngineClient, REGISTRY_AUTH_HEADER};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_HOST};
pub use containers::{AttachOptions, LogsOptions};
pub use credentials::{
    decode_auth, encode_auth, AuthEntry, CredentialStore, Credentials, DEFAULT_REGISTRY,
    DEFAULT_STORE_FILE,
};
pub use demux::{Demuxer, StreamChannel, StreamFrame};
pub use error::{ClientError, Result};
pub use exec::ExecConfig;
pub use images::{drain_progress, progress_error, BuildOptions};
pub use json_stream::JsonStream;
pub use lifecycle::{ContainerConfig, CreateOutcome, CreatedContainer, ImageReference, DEFAULT_TAG};
pub use request::{
    EngineRequest, QueryValue, RequestBody, JSON_CONTENT_TYPE, OCTET_STREAM_CONTENT_TYPE,
    TAR_CONTENT_TYPE,
};
pub use response::{EngineResponse, RawStream};

pub use dockhand_transport::{Endpoint, EndpointKind, EndpointResolver, Transport, TransportFactory};
