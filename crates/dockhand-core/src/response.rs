//! Engine responses.

use crate::demux::Demuxer;
use crate::error::{ClientError, Result};
use crate::json_stream::JsonStream;
use bytes::Bytes;
use futures::TryStreamExt;
use hyper::{Body, HeaderMap, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

/// A response from the engine.
///
/// The body is still attached to the connection that carried the request.
/// Every consuming method takes `self`; dropping the response closes the
/// connection.
#[derive(Debug)]
pub struct EngineResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl EngineResponse {
    /// Wrap a raw HTTP response.
    pub fn new(response: Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the status is in `200..=399`.
    pub fn is_success(&self) -> bool {
        (200..=399).contains(&self.status.as_u16())
    }

    /// Fail with [`ClientError::Operation`] unless the status is a success.
    ///
    /// On failure the body is read and attached to the error.
    pub async fn ensure_success(self, context: impl Into<String>) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status.as_u16();
        let context = context.into();
        let body = self.text().await.unwrap_or_default();
        tracing::debug!(%context, status, "Engine call failed");
        Err(ClientError::Operation {
            context,
            status,
            body: body.trim().to_string(),
        })
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes> {
        Ok(hyper::body::to_bytes(self.body).await?)
    }

    /// Read the whole body as (lossy) UTF-8.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode the body as a single JSON document.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Decode the body lazily as a sequence of JSON documents.
    pub fn json_stream(self) -> JsonStream {
        JsonStream::new(self.body)
    }

    /// Split the body into stdout/stderr frames.
    ///
    /// `multiplexed` is false when the remote side allocated a pseudo-terminal.
    pub fn demux(self, multiplexed: bool) -> Demuxer<RawStream> {
        Demuxer::new(self.into_raw(), multiplexed)
    }

    /// Hand over the unparsed body as an [`AsyncRead`].
    pub fn into_raw(self) -> RawStream {
        RawStream::new(self.body)
    }

    /// Hand over the underlying body.
    pub fn into_body(self) -> Body {
        self.body
    }
}

type BodyReader = StreamReader<futures::stream::MapErr<Body, fn(hyper::Error) -> io::Error>, Bytes>;

/// Open byte stream over a response body.
///
/// Owning a `RawStream` keeps the connection open; dropping it closes it.
pub struct RawStream {
    inner: BodyReader,
}

impl RawStream {
    fn new(body: Body) -> Self {
        let to_io: fn(hyper::Error) -> io::Error = |e| io::Error::new(io::ErrorKind::Other, e);
        Self {
            inner: StreamReader::new(body.map_err(to_io)),
        }
    }
}

impl std::fmt::Debug for RawStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStream").finish_non_exhaustive()
    }
}

impl AsyncRead for RawStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
