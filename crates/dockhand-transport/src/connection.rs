//! Single-request HTTP/1.1 exchange over an already-open stream.

use crate::error::Result;
use hyper::header::{HeaderValue, CONNECTION, HOST};
use hyper::{Body, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};

/// Send one request over `io` and return the response.
///
/// The connection is driven by a spawned task that ends when the response
/// body has been read to completion or dropped. `Connection: close` is always
/// sent, so the connection is never reused.
pub(crate) async fn exchange<S>(
    io: S,
    mut request: Request<Body>,
    authority: &str,
) -> Result<Response<Body>>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, conn) = hyper::client::conn::handshake(io).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "Engine connection ended with error");
        }
    });

    let headers = request.headers_mut();
    if !headers.contains_key(HOST) {
        if let Ok(value) = HeaderValue::from_str(authority) {
            headers.insert(HOST, value);
        }
    }
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    tracing::trace!(
        method = %request.method(),
        uri = %request.uri(),
        "Writing request"
    );
    let response = sender.send_request(request).await?;
    Ok(response)
}
