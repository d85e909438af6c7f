//! Create-container retry behaviour, against a scripted fake transport.

use async_trait::async_trait;
use dockhand_core::{ClientConfig, ClientError, ContainerConfig, EngineClient};
use dockhand_transport::{Endpoint, Transport, TransportFactory};
use hyper::{Body, Request, Response};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers each request with the next scripted `(status, body)` and records
/// `METHOD path?query` for every call.
#[derive(Default)]
struct Script {
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    calls: Mutex<Vec<String>>,
}

impl Script {
    fn new(responses: &[(u16, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().copied().collect()),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.split('?').next().unwrap().to_string())
            .collect()
    }
}

struct FakeTransport {
    endpoint: Endpoint,
    script: Arc<Script>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: Request<Body>) -> dockhand_transport::Result<Response<Body>> {
        self.script
            .calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method(), request.uri()));
        let (status, body) = self
            .script
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected extra request");
        Ok(Response::builder()
            .status(status)
            .body(Body::from(body))
            .unwrap())
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

struct FakeFactory(Arc<Script>);

impl TransportFactory for FakeFactory {
    fn transport(&self, endpoint: &Endpoint) -> dockhand_transport::Result<Arc<dyn Transport>> {
        Ok(Arc::new(FakeTransport {
            endpoint: endpoint.clone(),
            script: Arc::clone(&self.0),
        }))
    }
}

fn client(script: &Arc<Script>) -> EngineClient {
    let config = ClientConfig::builder()
        .host("unix:///run/engine.sock")
        .build();
    EngineClient::with_factory(config, Arc::new(FakeFactory(Arc::clone(script))))
}

const CREATED: (u16, &str) = (201, r#"{"Id":"c0ffee","Warnings":[]}"#);
const NO_SUCH_IMAGE: (u16, &str) = (404, r#"{"message":"No such image: busybox:latest"}"#);
const PULLED: (u16, &str) = (
    200,
    "{\"status\":\"Pulling from library/busybox\"}\n{\"status\":\"Download complete\"}\n",
);

#[tokio::test]
async fn test_missing_image_is_pulled_then_created() {
    let script = Script::new(&[NO_SUCH_IMAGE, PULLED, CREATED]);
    let created = client(&script)
        .create_container(&ContainerConfig::new("busybox"), Some("web"))
        .await
        .unwrap();

    assert_eq!(created.id, "c0ffee");
    assert_eq!(
        script.calls(),
        vec![
            "POST /containers/create?name=web",
            "POST /images/create?fromImage=busybox&tag=latest",
            "POST /containers/create?name=web",
        ]
    );
}

#[tokio::test]
async fn test_retry_failure_is_fatal_after_one_retry() {
    let script = Script::new(&[
        NO_SUCH_IMAGE,
        PULLED,
        (500, r#"{"message":"disk quota exceeded"}"#),
    ]);
    let err = client(&script)
        .create_container(&ContainerConfig::new("busybox:1.36"), None)
        .await
        .unwrap_err();

    match err {
        ClientError::Operation {
            context,
            status,
            body,
        } => {
            assert_eq!(status, 500);
            assert!(body.contains("disk quota exceeded"));
            assert!(context.contains("busybox:1.36"));
            assert!(context.contains("No such image"), "first failure missing: {context}");
        }
        other => panic!("expected operation error, got {other:?}"),
    }
    assert_eq!(
        script.paths(),
        vec!["POST /containers/create", "POST /images/create", "POST /containers/create"]
    );
}

#[tokio::test]
async fn test_second_404_is_not_retried_again() {
    let script = Script::new(&[NO_SUCH_IMAGE, PULLED, NO_SUCH_IMAGE]);
    let err = client(&script)
        .create_container(&ContainerConfig::new("busybox"), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(script.calls().len(), 3);
}

#[tokio::test]
async fn test_other_failures_do_not_pull() {
    let script = Script::new(&[(409, r#"{"message":"name already in use"}"#)]);
    let err = client(&script)
        .create_container(&ContainerConfig::new("busybox"), Some("web"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(script.paths(), vec!["POST /containers/create"]);
}

#[tokio::test]
async fn test_pull_failure_stops_before_retry() {
    let script = Script::new(&[
        NO_SUCH_IMAGE,
        (200, "{\"status\":\"Pulling\"}\n{\"error\":\"pull access denied\"}\n"),
    ]);
    let err = client(&script)
        .create_container(&ContainerConfig::new("private/app:v1"), None)
        .await
        .unwrap_err();

    match err {
        ClientError::Operation { context, body, .. } => {
            assert_eq!(context, "pull image private/app:v1");
            assert_eq!(body, "pull access denied");
        }
        other => panic!("expected operation error, got {other:?}"),
    }
    assert_eq!(
        script.calls(),
        vec![
            "POST /containers/create",
            "POST /images/create?fromImage=private%2Fapp&tag=v1",
        ]
    );
}

#[tokio::test]
async fn test_run_creates_and_starts() {
    let script = Script::new(&[CREATED, (204, "")]);
    let id = client(&script)
        .run("busybox", ContainerConfig::new("ignored"), Some("1.36"), Some("job"))
        .await
        .unwrap();

    assert_eq!(id, "c0ffee");
    assert_eq!(
        script.calls(),
        vec!["POST /containers/create?name=job", "POST /containers/c0ffee/start"]
    );
}

#[tokio::test]
async fn test_run_leaves_container_when_start_fails() {
    let script = Script::new(&[CREATED, (500, "cannot start")]);
    let err = client(&script)
        .run("busybox", ContainerConfig::default(), None, None)
        .await
        .unwrap_err();

    match err {
        ClientError::Operation { context, body, .. } => {
            assert_eq!(context, "start container c0ffee");
            assert_eq!(body, "cannot start");
        }
        other => panic!("expected operation error, got {other:?}"),
    }
    // No delete call follows the failed start.
    assert_eq!(
        script.paths(),
        vec!["POST /containers/create", "POST /containers/c0ffee/start"]
    );
}
