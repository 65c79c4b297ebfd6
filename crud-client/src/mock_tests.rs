use crate::KubeStore;
use crud_core::{
    deployment::{self, DeploymentChange},
    ObjectKey, ResourceStore, RetryOnConflict, RetryPolicy, StoreError,
};
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{DeleteParams, DynamicObject},
    client::Body,
    Client,
};
use serde_json::{json, Value};

const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/default/deployments";

fn web(version: &str, image: &str) -> Deployment {
    let mut d = deployment::deployment("web", image);
    d.metadata.namespace = Some("default".into());
    d.metadata.resource_version = Some(version.into());
    d
}

fn dynamic_web(version: &str) -> DynamicObject {
    let mut obj = deployment::dynamic_deployment("web", "nginx:1.12").within("default");
    obj.metadata.resource_version = Some(version.into());
    obj
}

#[tokio::test]
async fn conflicting_update_is_retried_on_a_fresh_read() {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::ConflictThenAccept);

    let store = KubeStore::<Deployment>::new(client);
    let key = ObjectKey::new("default", "web");
    let updated = RetryOnConflict::new(&store, RetryPolicy::default().jitter(false))
        .try_update(&key, |d| DeploymentChange::default().replicas(1).apply_typed(d))
        .await
        .unwrap();

    assert_eq!(updated.metadata.resource_version.as_deref(), Some("3"));
    let spec = updated.spec.unwrap();
    assert_eq!(spec.replicas, Some(1));
    // the concurrent image change survived the retry
    assert_eq!(
        spec.template.spec.unwrap().containers[0].image.as_deref(),
        Some("nginx:1.8")
    );
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn dynamic_update_edits_nested_fields() {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::DynamicReplace);

    let store = KubeStore::dynamic(client, deployment::api_resource());
    let key = ObjectKey::new("default", "web");
    let change = DeploymentChange::default().replicas(1).image("nginx:1.13").container_port(88);
    let updated = RetryOnConflict::new(&store, RetryPolicy::never())
        .try_update(&key, |obj| change.apply_dynamic(obj))
        .await
        .unwrap();

    assert_eq!(updated.metadata.resource_version.as_deref(), Some("6"));
    assert_eq!(deployment::dynamic_replicas(&updated), Ok(Some(1)));
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn delete_sends_propagation_policy() {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::ForegroundDelete);

    let store = KubeStore::<Deployment>::new(client);
    store
        .delete(&ObjectKey::new("default", "web"), &DeleteParams::foreground())
        .await
        .unwrap();
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn list_returns_namespace_items() {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::DynamicList);

    let store = KubeStore::dynamic(client, deployment::api_resource());
    let items = store.list("default").await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].metadata.name.as_deref(), Some("web"));
    assert_eq!(deployment::dynamic_replicas(&items[0]), Ok(Some(2)));
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let (store, mocksrv) = failing(StatusCode::NOT_FOUND, "NotFound");
    let err = store.fetch(&ObjectKey::new("default", "web")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn name_collision_maps_to_already_exists() {
    let (store, mocksrv) = failing(StatusCode::CONFLICT, "AlreadyExists");
    let err = store
        .create("default", deployment::deployment("web", "nginx:1.7.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }), "{err}");
    assert!(!err.is_conflict());
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn stale_version_maps_to_conflict() {
    let (store, mocksrv) = failing(StatusCode::CONFLICT, "Conflict");
    let err = store.update(web("1", "nginx:1.7.9")).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn rejected_object_maps_to_invalid() {
    let (store, mocksrv) = failing(StatusCode::UNPROCESSABLE_ENTITY, "Invalid");
    let err = store.update(web("1", "nginx:1.7.9")).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid { .. }), "{err}");
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn server_failure_maps_to_backend() {
    let (store, mocksrv) = failing(StatusCode::INTERNAL_SERVER_ERROR, "InternalError");
    let err = store.fetch(&ObjectKey::new("default", "web")).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)), "{err}");
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn list_failures_are_backend_errors_without_a_key() {
    let (store, mocksrv) = failing(StatusCode::FORBIDDEN, "Forbidden");
    let err = store.list("default").await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)), "{err}");
    assert!(!err.to_string().contains("default/"), "{err}");
    timeout_after_1s(mocksrv).await;
}

#[tokio::test]
async fn unversioned_update_is_refused_locally() {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::RadioSilence);

    let store = KubeStore::<Deployment>::new(client);
    let mut d = web("1", "nginx:1.7.9");
    d.metadata.resource_version = None;
    let err = store.update(d).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid { .. }), "{err}");
    timeout_after_1s(mocksrv).await;
}

// ------------------------------------------------------------------------
// mock test setup cruft
// ------------------------------------------------------------------------

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
struct ApiServerVerifier(ApiServerHandle);

async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

/// Scenarios we test for in ApiServerVerifier above
enum Scenario {
    ConflictThenAccept,
    DynamicReplace,
    DynamicList,
    ForegroundDelete,
    Fail(StatusCode, &'static str),
    RadioSilence,
}

impl ApiServerVerifier {
    /// Tests only get to run specific scenarios that have matching handlers
    ///
    /// A test making more calls than its scenario handles sees a `Service(Closed)` error.
    fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match scenario {
                Scenario::ConflictThenAccept => self.handle_conflict_then_accept().await,
                Scenario::DynamicReplace => self.handle_dynamic_replace().await,
                Scenario::DynamicList => self.handle_dynamic_list().await,
                Scenario::ForegroundDelete => self.handle_foreground_delete().await,
                Scenario::Fail(code, reason) => self.handle_failure(code, reason).await,
                Scenario::RadioSilence => self,
            };
        })
    }

    async fn handle_conflict_then_accept(mut self) -> Self {
        {
            let (request, send) = self.0.next_request().await.expect("service not called 1");
            assert_eq!(request.method(), Method::GET);
            assert_eq!(request.uri().path(), format!("{DEPLOYMENTS}/web"));
            send.send_response(respond(json!(web("1", "nginx:1.7.9"))));
        }
        {
            let (request, send) = self.0.next_request().await.expect("service not called 2");
            assert_eq!(request.method(), Method::PUT);
            let body = body_json(request).await;
            assert_eq!(body["metadata"]["resourceVersion"], "1");
            assert_eq!(body["spec"]["replicas"], 1);
            // somebody else wrote in between
            send.send_response(status(StatusCode::CONFLICT, "Conflict"));
        }
        {
            let (request, send) = self.0.next_request().await.expect("service not called 3");
            assert_eq!(request.method(), Method::GET);
            send.send_response(respond(json!(web("2", "nginx:1.8"))));
        }
        {
            let (request, send) = self.0.next_request().await.expect("service not called 4");
            assert_eq!(request.method(), Method::PUT);
            let mut body = body_json(request).await;
            assert_eq!(body["metadata"]["resourceVersion"], "2");
            assert_eq!(body["spec"]["replicas"], 1);
            assert_eq!(body["spec"]["template"]["spec"]["containers"][0]["image"], "nginx:1.8");
            body["metadata"]["resourceVersion"] = json!("3");
            send.send_response(respond(body));
        }
        self
    }

    async fn handle_dynamic_replace(mut self) -> Self {
        {
            let (request, send) = self.0.next_request().await.expect("service not called 1");
            assert_eq!(request.method(), Method::GET);
            assert_eq!(request.uri().path(), format!("{DEPLOYMENTS}/web"));
            send.send_response(respond(json!(dynamic_web("5"))));
        }
        {
            let (request, send) = self.0.next_request().await.expect("service not called 2");
            assert_eq!(request.method(), Method::PUT);
            let mut body = body_json(request).await;
            assert_eq!(body["metadata"]["resourceVersion"], "5");
            let container = &body["spec"]["template"]["spec"]["containers"][0];
            assert_eq!(container["image"], "nginx:1.13");
            assert_eq!(container["ports"][0]["containerPort"], 88);
            body["metadata"]["resourceVersion"] = json!("6");
            send.send_response(respond(body));
        }
        self
    }

    async fn handle_dynamic_list(mut self) -> Self {
        let (request, send) = self.0.next_request().await.expect("service not called 1");
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), DEPLOYMENTS);
        send.send_response(respond(json!({
            "kind": "DeploymentList",
            "apiVersion": "apps/v1",
            "metadata": { "resourceVersion": "7" },
            "items": [dynamic_web("5")],
        })));
        self
    }

    async fn handle_foreground_delete(mut self) -> Self {
        let (request, send) = self.0.next_request().await.expect("service not called 1");
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.uri().path(), format!("{DEPLOYMENTS}/web"));
        let body = body_json(request).await;
        assert_eq!(body["propagationPolicy"], "Foreground");
        // deletion is pending while dependents are cleaned up
        send.send_response(respond(json!(web("4", "nginx:1.7.9"))));
        self
    }

    async fn handle_failure(mut self, code: StatusCode, reason: &str) -> Self {
        let (_request, send) = self.0.next_request().await.expect("service not called 1");
        send.send_response(status(code, reason));
        self
    }
}

fn respond(body: Value) -> Response<Body> {
    let data = serde_json::to_vec(&body).unwrap();
    Response::builder().body(Body::from(data)).unwrap()
}

/// A failure `Status` as the apiserver would send it
fn status(code: StatusCode, reason: &str) -> Response<Body> {
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("mock apiserver says {reason}"),
        "reason": reason,
        "code": code.as_u16(),
    });
    let data = serde_json::to_vec(&body).unwrap();
    Response::builder().status(code).body(Body::from(data)).unwrap()
}

async fn body_json(request: Request<Body>) -> Value {
    let bytes = request.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn failing(code: StatusCode, reason: &'static str) -> (KubeStore<Deployment>, tokio::task::JoinHandle<()>) {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::Fail(code, reason));
    (KubeStore::new(client), mocksrv)
}

// Create a test context with a mocked kube client
fn testcontext() -> (Client, ApiServerVerifier) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let mock_client = Client::new(mock_service, "default");
    (mock_client, ApiServerVerifier(handle))
}
