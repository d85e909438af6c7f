//! Engine request builder.

use crate::error::{ClientError, Result};
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Method, Request};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

/// Content type for JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type for raw byte bodies.
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";
/// Content type for tar build contexts.
pub const TAR_CONTENT_TYPE: &str = "application/x-tar";

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// `key=value`
    Single(String),
    /// `key=a&key=b`, one pair per element
    List(Vec<String>),
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document, sent as `application/json`.
    Json(Value),
    /// Raw bytes, sent as `application/octet-stream` unless overridden.
    Bytes(Vec<u8>),
}

/// One HTTP call against the engine API.
///
/// ```
/// use dockhand_core::EngineRequest;
///
/// let request = EngineRequest::get("/containers/json")
///     .query("all", "1")
///     .query_list("status", ["running", "paused"]);
/// assert_eq!(
///     request.path_and_query(),
///     "/containers/json?all=1&status=running&status=paused"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EngineRequest {
    method: Method,
    path: String,
    query: Vec<(String, QueryValue)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
    content_type: Option<String>,
}

impl EngineRequest {
    /// Create a request with an arbitrary method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            content_type: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a query parameter, replacing an earlier value for the same key.
    pub fn query(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_query(key.into(), QueryValue::Single(value.to_string()))
    }

    /// Set a boolean query parameter, sent as `1` or `0`.
    pub fn query_flag(self, key: impl Into<String>, value: bool) -> Self {
        self.query(key, if value { "1" } else { "0" })
    }

    /// Set a query parameter that repeats once per value.
    pub fn query_list<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.set_query(key.into(), QueryValue::List(values))
    }

    /// Set a query parameter to the JSON encoding of `value` (e.g. `filters`).
    ///
    /// # Errors
    /// Returns [`ClientError::Format`] if `value` cannot be serialized.
    pub fn query_json<T: Serialize + ?Sized>(self, key: impl Into<String>, value: &T) -> Result<Self> {
        let encoded = serde_json::to_string(value)?;
        Ok(self.set_query(key.into(), QueryValue::Single(encoded)))
    }

    /// Set a query parameter only when `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    fn set_query(mut self, key: String, value: QueryValue) -> Self {
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send `value` as a JSON body.
    ///
    /// # Errors
    /// Returns [`ClientError::Format`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Send raw bytes as `application/octet-stream`.
    pub fn raw(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Bytes(bytes.into());
        self
    }

    /// Send a tar archive as `application/x-tar`.
    pub fn tar(mut self, archive: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Bytes(archive.into());
        self.content_type = Some(TAR_CONTENT_TYPE.to_string());
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    pub fn query_params(&self) -> &[(String, QueryValue)] {
        &self.query
    }

    /// Request body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Path with the encoded query string appended.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            match value {
                QueryValue::Single(v) => {
                    serializer.append_pair(key, v);
                }
                QueryValue::List(values) => {
                    for v in values {
                        serializer.append_pair(key, v);
                    }
                }
            }
        }
        format!("{}?{}", self.path, serializer.finish())
    }

    /// Effective content type, if the request has a body.
    pub fn content_type(&self) -> Option<&str> {
        match (&self.body, &self.content_type) {
            (RequestBody::Empty, _) => None,
            (_, Some(ct)) => Some(ct.as_str()),
            (RequestBody::Json(_), None) => Some(JSON_CONTENT_TYPE),
            (RequestBody::Bytes(_), None) => Some(OCTET_STREAM_CONTENT_TYPE),
        }
    }

    /// Convert into an origin-form [`hyper::Request`].
    ///
    /// # Errors
    /// Returns [`ClientError::Configuration`] for an invalid path or header.
    pub fn into_http(self) -> Result<Request<Body>> {
        let uri = self.path_and_query();
        let content_type = self.content_type().map(str::to_string);
        let is_post = self.method == Method::POST;

        let mut builder = Request::builder().method(self.method).uri(uri.as_str());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Configuration(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Configuration(format!("invalid header value: {e}")))?;
            builder = builder.header(name, value);
        }

        let body = match self.body {
            RequestBody::Empty => Vec::new(),
            RequestBody::Json(value) => serde_json::to_vec(&value)?,
            RequestBody::Bytes(bytes) => bytes,
        };
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        // POST without a body still carries an explicit zero length.
        if !body.is_empty() || is_post {
            builder = builder.header(CONTENT_LENGTH, body.len());
        }

        builder
            .body(Body::from(body))
            .map_err(|e| ClientError::Configuration(format!("invalid request {uri}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_without_query() {
        assert_eq!(EngineRequest::get("/_ping").path_and_query(), "/_ping");
    }

    #[test]
    fn test_query_replaces_existing_key() {
        let request = EngineRequest::post("/containers/abc/stop")
            .query("t", 5)
            .query("t", 10);
        assert_eq!(request.path_and_query(), "/containers/abc/stop?t=10");
    }

    #[test]
    fn test_boolean_flags() {
        let request = EngineRequest::delete("/containers/abc")
            .query_flag("force", true)
            .query_flag("v", false);
        assert_eq!(request.path_and_query(), "/containers/abc?force=1&v=0");
    }

    #[test]
    fn test_query_values_are_encoded() {
        let request = EngineRequest::post("/images/create")
            .query("fromImage", "registry.local:5000/team/app")
            .query("tag", "v1 beta");
        assert_eq!(
            request.path_and_query(),
            "/images/create?fromImage=registry.local%3A5000%2Fteam%2Fapp&tag=v1+beta"
        );
    }

    #[test]
    fn test_filters_are_json_encoded() {
        let request = EngineRequest::get("/containers/json")
            .query_json("filters", &json!({"status": ["exited"]}))
            .unwrap();
        let (_, value) = &request.query_params()[0];
        assert_eq!(
            value,
            &QueryValue::Single(r#"{"status":["exited"]}"#.to_string())
        );
        assert!(request
            .path_and_query()
            .starts_with("/containers/json?filters=%7B%22status%22"));
    }

    #[test]
    fn test_query_opt_skips_none() {
        let request = EngineRequest::post("/containers/abc/kill").query_opt("signal", None::<&str>);
        assert_eq!(request.path_and_query(), "/containers/abc/kill");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(EngineRequest::get("/info").content_type(), None);
        assert_eq!(
            EngineRequest::post("/containers/create")
                .json(&json!({"Image": "busybox"}))
                .unwrap()
                .content_type(),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(
            EngineRequest::post("/build").tar(vec![0u8; 4]).content_type(),
            Some(TAR_CONTENT_TYPE)
        );
        assert_eq!(
            EngineRequest::post("/upload").raw(b"abc".to_vec()).content_type(),
            Some(OCTET_STREAM_CONTENT_TYPE)
        );
    }

    #[test]
    fn test_into_http() {
        let request = EngineRequest::post("/containers/create")
            .query("name", "web")
            .header("X-Registry-Auth", "e30=")
            .json(&json!({"Image": "busybox"}))
            .unwrap()
            .into_http()
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), "/containers/create?name=web");
        assert_eq!(request.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(request.headers()[CONTENT_LENGTH], "19");
        assert_eq!(request.headers()["x-registry-auth"], "e30=");
    }

    #[test]
    fn test_empty_post_has_zero_length() {
        let request = EngineRequest::post("/containers/abc/start").into_http().unwrap();
        assert_eq!(request.headers()[CONTENT_LENGTH], "0");
        assert!(request.headers().get(CONTENT_TYPE).is_none());

        let request = EngineRequest::get("/info").into_http().unwrap();
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let err = EngineRequest::get("/info")
            .header("bad header", "x")
            .into_http()
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
