//! Stdout/stderr demultiplexing for attach, exec and logs streams.
//!
//! Without a pseudo-terminal the engine frames its output as
//!
//! ```text
//! [1 byte channel][3 bytes zero][4 bytes big-endian length][payload]
//! ```
//!
//! with channel 1 for stdout and 2 for stderr. With a pseudo-terminal the
//! bytes are passed through unframed.

use crate::error::{ClientError, Result};
use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

const HEADER_LEN: usize = 8;
const RAW_CHUNK_SIZE: usize = 8 * 1024;

/// Output channel of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl StreamChannel {
    fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// One demultiplexed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Which channel the payload belongs to
    pub channel: StreamChannel,
    /// Frame payload
    pub payload: Bytes,
}

/// Splits a byte stream into [`StreamFrame`]s.
///
/// The sequence is lazy and forward-only. A corrupt frame ends it: the
/// error is returned once and every later call yields `None`.
#[derive(Debug)]
pub struct Demuxer<R> {
    reader: R,
    multiplexed: bool,
    finished: bool,
}

impl<R: AsyncRead + Unpin> Demuxer<R> {
    /// Create a demuxer. Pass `multiplexed = false` for pseudo-terminal output.
    pub fn new(reader: R, multiplexed: bool) -> Self {
        Self {
            reader,
            multiplexed,
            finished: false,
        }
    }

    /// Whether the input is framed.
    pub fn is_multiplexed(&self) -> bool {
        self.multiplexed
    }

    /// Read the next frame, or `None` at end of stream.
    ///
    /// # Errors
    /// Returns [`ClientError::Protocol`] for an unknown channel id or a
    /// stream that ends inside a header or payload.
    pub async fn next_frame(&mut self) -> Result<Option<StreamFrame>> {
        if self.finished {
            return Ok(None);
        }
        let result = if self.multiplexed {
            self.read_framed().await
        } else {
            self.read_raw().await
        };
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn read_raw(&mut self) -> Result<Option<StreamFrame>> {
        let mut buf = vec![0u8; RAW_CHUNK_SIZE];
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(StreamFrame {
            channel: StreamChannel::Stdout,
            payload: Bytes::from(buf),
        }))
    }

    async fn read_framed(&mut self) -> Result<Option<StreamFrame>> {
        loop {
            let Some(header) = self.read_header().await? else {
                return Ok(None);
            };
            let id = header[0];
            let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            let channel = match id {
                0 => None,
                _ => Some(StreamChannel::from_id(id).ok_or_else(|| {
                    ClientError::Protocol(format!("unknown stream channel id {id}"))
                })?),
            };

            let mut payload = Vec::with_capacity((len as usize).min(RAW_CHUNK_SIZE));
            let read = (&mut self.reader)
                .take(u64::from(len))
                .read_to_end(&mut payload)
                .await?;
            if read < len as usize {
                return Err(ClientError::Protocol(format!(
                    "stream ended inside a frame payload ({read} of {len} bytes)"
                )));
            }

            let Some(channel) = channel else {
                tracing::trace!(len, "Skipping stdin frame");
                continue;
            };
            tracing::trace!(?channel, len, "Demuxed frame");
            return Ok(Some(StreamFrame {
                channel,
                payload: Bytes::from(payload),
            }));
        }
    }

    /// Read a full header; `None` on a clean end of stream.
    async fn read_header(&mut self) -> Result<Option<[u8; HEADER_LEN]>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self.reader.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ClientError::Protocol(format!(
                    "stream ended inside a frame header ({filled} of {HEADER_LEN} bytes)"
                )));
            }
            filled += n;
        }
        Ok(Some(header))
    }

    /// Drain the stream into `(stdout, stderr)`.
    pub async fn collect_output(mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(frame) = self.next_frame().await? {
            match frame.channel {
                StreamChannel::Stdout => stdout.extend_from_slice(&frame.payload),
                StreamChannel::Stderr => stderr.extend_from_slice(&frame.payload),
            }
        }
        Ok((stdout, stderr))
    }
}

impl<R: AsyncRead + Unpin + Send + 'static> Demuxer<R> {
    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamFrame>> + Send {
        futures::stream::unfold(self, |mut demuxer| async move {
            match demuxer.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), demuxer)),
                Ok(None) => None,
                Err(e) => Some((Err(e), demuxer)),
            }
        })
    }
}
