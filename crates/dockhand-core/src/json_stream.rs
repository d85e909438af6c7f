//! Lazy multi-document JSON streams.
//!
//! Progress output from build and pull, and some search results, arrive as a
//! sequence of JSON documents separated by newlines, other whitespace, or
//! nothing at all. [`JsonStream`] parses them one at a time as body chunks
//! arrive. It is forward-only: consuming it drains the connection.
//!
//! An incomplete document is re-parsed from its start, but only after a chunk
//! that could finish it (one holding a newline, or ending in `}`, `]` or `"`)
//! or once the buffer has doubled, so a large document split into many small
//! chunks is not rescanned for every chunk.

use crate::error::{ClientError, Result};
use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use hyper::Body;
use serde_json::Value;

/// Forward-only sequence of JSON documents read from a response body.
#[derive(Debug)]
pub struct JsonStream {
    body: Body,
    buffer: BytesMut,
    /// Buffer length at the last parse that needed more bytes
    stalled_at: Option<usize>,
    done: bool,
    failed: bool,
}

impl JsonStream {
    /// Wrap a response body.
    pub fn new(body: Body) -> Self {
        Self {
            body,
            buffer: BytesMut::new(),
            stalled_at: None,
            done: false,
            failed: false,
        }
    }

    /// Read the next document, or `None` once the body is exhausted.
    ///
    /// After an error the stream yields `None`.
    ///
    /// # Errors
    /// Returns [`ClientError::Format`] for an unparsable document, including
    /// a partial document left at end of body.
    pub async fn next_value(&mut self) -> Result<Option<Value>> {
        if self.failed {
            return Ok(None);
        }
        match self.advance().await {
            Err(e) => {
                self.failed = true;
                Err(e)
            }
            ok => ok,
        }
    }

    async fn advance(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(value) = self.parse_buffered()? {
                return Ok(Some(value));
            }

            if self.done {
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    self.buffer.clear();
                    return Ok(None);
                }
                return Err(ClientError::Format(format!(
                    "truncated JSON document at end of stream ({} bytes)",
                    self.buffer.len()
                )));
            }

            self.fill().await?;
        }
    }

    /// Append chunks until one is worth another parse attempt.
    async fn fill(&mut self) -> Result<()> {
        loop {
            let Some(chunk) = self.body.next().await else {
                self.done = true;
                return Ok(());
            };
            let chunk: Bytes = chunk?;
            tracing::trace!(len = chunk.len(), "JSON stream chunk");
            self.buffer.extend_from_slice(&chunk);
            if self.worth_parsing(&chunk) {
                return Ok(());
            }
        }
    }

    fn worth_parsing(&self, chunk: &[u8]) -> bool {
        let Some(stalled_at) = self.stalled_at else {
            return true;
        };
        let closes = chunk.contains(&b'\n')
            || matches!(
                chunk.iter().rev().find(|b| !b.is_ascii_whitespace()),
                Some(b'}' | b']' | b'"')
            );
        closes || self.buffer.len() >= stalled_at.saturating_mul(2)
    }

    /// Parse one complete document from the front of the buffer.
    fn parse_buffered(&mut self) -> Result<Option<Value>> {
        let mut documents = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();
        match documents.next() {
            Some(Ok(value)) => {
                let consumed = documents.byte_offset();
                // A number running to the end of the buffer may continue in the next chunk.
                if value.is_number() && consumed == self.buffer.len() && !self.done {
                    return Ok(self.stall());
                }
                self.buffer.advance(consumed);
                self.stalled_at = None;
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => Ok(self.stall()),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn stall(&mut self) -> Option<Value> {
        self.stalled_at = Some(self.buffer.len());
        None
    }

    /// Collect every remaining document.
    pub async fn collect_values(mut self) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        while let Some(value) = self.next_value().await? {
            values.push(value);
        }
        Ok(values)
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next_value().await {
                Ok(Some(value)) => Some((Ok(value), stream)),
                Ok(None) => None,
                Err(e) => Some((Err(e), stream)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunked(chunks: &[&'static str]) -> Body {
        let chunks: Vec<std::result::Result<&'static str, std::io::Error>> =
            chunks.iter().map(|c| Ok(*c)).collect();
        Body::wrap_stream(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_newline_delimited_documents() {
        let stream = JsonStream::new(Body::from(
            "{\"status\":\"Pulling\"}\n{\"status\":\"Done\"}\n",
        ));
        let values = stream.collect_values().await.unwrap();
        assert_eq!(
            values,
            vec![json!({"status": "Pulling"}), json!({"status": "Done"})]
        );
    }

    #[tokio::test]
    async fn test_concatenated_documents() {
        let stream = JsonStream::new(Body::from("{\"a\":1}{\"b\":2}[3]"));
        let values = stream.collect_values().await.unwrap();
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2}), json!([3])]);
    }

    #[tokio::test]
    async fn test_document_split_across_chunks() {
        let stream = JsonStream::new(chunked(&["{\"stream\":\"Step 1", "/2\"}\r\n{\"str", "eam\":\"ok\"}"]));
        let values = stream.collect_values().await.unwrap();
        assert_eq!(
            values,
            vec![json!({"stream": "Step 1/2"}), json!({"stream": "ok"})]
        );
    }

    #[tokio::test]
    async fn test_number_split_across_chunks() {
        let values = JsonStream::new(chunked(&["12", "3\n", "4"]))
            .collect_values()
            .await
            .unwrap();
        assert_eq!(values, vec![json!(123), json!(4)]);
    }

    #[tokio::test]
    async fn test_document_in_many_small_chunks() {
        let stream = JsonStream::new(chunked(&["{\"id\":", "4", "2,\"tags\":[", "\"a", "b", "\"]", "}"]));
        let values = stream.collect_values().await.unwrap();
        assert_eq!(values, vec![json!({"id": 42, "tags": ["ab"]})]);
    }

    #[tokio::test]
    async fn test_trailing_partial_document_is_format_error() {
        let mut stream = JsonStream::new(Body::from("{\"a\":1}\n{\"b\":"));
        assert_eq!(stream.next_value().await.unwrap(), Some(json!({"a": 1})));
        let err = stream.next_value().await.unwrap_err();
        assert!(matches!(err, ClientError::Format(_)));
        assert!(stream.next_value().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_document_is_format_error() {
        let mut stream = JsonStream::new(Body::from("{\"a\":1} nonsense"));
        assert!(stream.next_value().await.unwrap().is_some());
        assert!(matches!(
            stream.next_value().await,
            Err(ClientError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_body_yields_nothing() {
        let values = JsonStream::new(Body::from("  \n")).collect_values().await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let stream = JsonStream::new(Body::from("1 2 3")).into_stream();
        let values: Vec<Value> = stream.map(|v| v.unwrap()).collect().await;
        assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    }
}
