//! End-to-end behaviour of services mounted on the HTTP server, exercised through
//! the axum bridge.

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Body;
use http::{header, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Value};
use svckit::{
    AuthChallenge, Dependencies, ErrorLog, Handler, HttpServer, Logger, Request, RequestScope,
    Response, Route, Service, ServiceDefinition, StepError, StepResult,
};
use tower::ServiceExt;

#[derive(Default)]
struct CountingLog {
    lines: Mutex<Vec<String>>,
}

impl ErrorLog for CountingLog {
    fn error(&self, err: &dyn Display) {
        self.lines.lock().push(err.to_string());
    }
}

struct Alpha;

#[svckit::async_trait]
impl Handler for Alpha {
    fn route(&self) -> Route {
        Route::get("/alpha")
    }

    async fn handle(&self, _req: Request, res: Response, _service: Arc<Service>) {
        let _ = res.json(&json!({ "fake": "data" }));
    }
}

/// Validates a body, then authorizes, then answers; each step may end the chain.
struct Submit;

#[svckit::async_trait]
impl Handler for Submit {
    fn route(&self) -> Route {
        Route::many([Method::POST, Method::PUT], "/submit/:kind")
    }

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
        let scope = RequestScope::new(req, res, service);
        let outcome = submit(&scope).await;
        scope.finish(outcome);
    }
}

async fn submit(scope: &RequestScope) -> StepResult {
    let body: Value = match scope.req().json() {
        Ok(body) => body,
        Err(_) => {
            return scope.bad_request(&json!({
                "error": "invalid_request",
                "error_description": "body must be JSON"
            }))
        }
    };

    if scope.req().header("authorization").is_none() {
        scope.unauthorized(&AuthChallenge::new().realm("api").error("invalid_token"))?;
    }

    if scope.req().param("kind") == Some("explode") {
        return Err(StepError::msg("storage unavailable"));
    }

    scope
        .res()
        .status(StatusCode::CREATED)
        .json(&json!({ "kind": scope.req().param("kind"), "body": body }))
        .map_err(StepError::failed)?;
    Ok(())
}

/// Same path as [`Submit`], different verb.
struct Purge;

#[svckit::async_trait]
impl Handler for Purge {
    fn route(&self) -> Route {
        Route::delete("/submit/:kind")
    }

    async fn handle(&self, req: Request, res: Response, _service: Arc<Service>) {
        let kind = req.param("kind").unwrap_or_default().to_owned();
        res.send(format!("purged {kind}"));
    }
}

struct Api;

impl ServiceDefinition for Api {
    fn name(&self) -> &'static str {
        "Api"
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        vec![Arc::new(Alpha), Arc::new(Submit), Arc::new(Purge)]
    }
}

struct Setup {
    server: Arc<HttpServer>,
    service: Arc<Service>,
    log: Arc<CountingLog>,
}

fn setup() -> Setup {
    let server = Arc::new(HttpServer::new());
    let log = Arc::new(CountingLog::default());
    let logger: Logger = log.clone();
    let service = Service::create(
        Api,
        Value::Null,
        Dependencies::new()
            .server(Arc::clone(&server))
            .log(logger),
    )
    .unwrap();
    Setup {
        server,
        service,
        log,
    }
}

async fn call(server: &Arc<HttpServer>, req: http::Request<Body>) -> (StatusCode, http::HeaderMap, Vec<u8>) {
    let resp = server.axum_router().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn post(path: &str, body: &str, auth: bool) -> http::Request<Body> {
    let mut builder = http::Request::builder().method(Method::POST).uri(path);
    if auth {
        builder = builder.header("authorization", "Bearer t0k3n");
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test]
async fn router_has_one_entry_per_verb_and_path() {
    let s = setup();
    let router = s.service.router().unwrap();
    assert_eq!(router.len(), 4);
    assert!(router.contains(&Method::GET, "/alpha"));
    assert!(router.contains(&Method::POST, "/submit/:kind"));
    assert!(router.contains(&Method::PUT, "/submit/:kind"));
    assert!(router.contains(&Method::DELETE, "/submit/:kind"));
}

#[tokio::test]
async fn distinct_handlers_share_a_path_under_different_verbs() {
    let s = setup();
    s.service.mount().unwrap();

    let req = http::Request::builder()
        .method(Method::DELETE)
        .uri("/submit/note")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(&s.server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"purged note");

    let (status, _, _) = call(&s.server, post("/submit/note", "{}", true)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn mounted_service_answers_and_unmount_restores_server() {
    let s = setup();
    let before = s.server.mounted();

    s.service.mount().unwrap();
    let (status, headers, body) = call(
        &s.server,
        http::Request::get("/alpha").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "fake": "data" }));

    s.service.unmount();
    assert_eq!(s.server.mounted(), before);
    let (status, _, body) = call(
        &s.server,
        http::Request::get("/alpha").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn unmount_before_mount_is_harmless() {
    let s = setup();
    s.service.unmount();
    assert!(s.server.mounted().is_empty());
}

#[tokio::test]
async fn bad_request_stops_the_chain() {
    let s = setup();
    s.service.mount().unwrap();

    let (status, headers, body) = call(&s.server, post("/submit/note", "not json", true)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({ "error": "invalid_request", "error_description": "body must be JSON" })
    );
    assert!(!headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(s.log.lines.lock().len(), 1);
}

#[tokio::test]
async fn unauthorized_carries_bearer_challenge() {
    let s = setup();
    s.service.mount().unwrap();

    let (status, headers, body) = call(&s.server, post("/submit/note", "{}", false)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        headers[header::WWW_AUTHENTICATE],
        "Bearer realm=api error=invalid_token "
    );
    assert!(body.is_empty());
}

#[tokio::test]
async fn unexpected_failure_is_one_500_and_one_log_line() {
    let s = setup();
    s.service.mount().unwrap();

    let (status, _, body) = call(&s.server, post("/submit/explode", "{}", true)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
    assert_eq!(*s.log.lines.lock(), vec!["storage unavailable".to_string()]);
}

#[tokio::test]
async fn successful_chain_uses_route_params() {
    let s = setup();
    s.service.mount().unwrap();

    let req = http::Request::builder()
        .method(Method::PUT)
        .uri("/submit/note")
        .header("authorization", "Bearer t0k3n")
        .body(Body::from(r#"{"text":"hi"}"#))
        .unwrap();
    let (status, _, body) = call(&s.server, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({ "kind": "note", "body": { "text": "hi" } })
    );
    assert!(s.log.lines.lock().is_empty());
}

#[tokio::test]
async fn child_service_sees_parent_dependencies_live() {
    let s = setup();
    let flag = Arc::new(Mutex::new(false));
    s.service
        .inject(Dependencies::new().with("flag", Arc::clone(&flag)))
        .unwrap();

    let child = Service::with(&s.service, Api, json!({ "child": true }), Dependencies::new()).unwrap();
    assert!(child.server().is_some());
    assert!(child.logger().is_some());

    *flag.lock() = true;
    assert!(*child.require::<Mutex<bool>>("flag").unwrap().lock());
    assert_eq!(serde_json::to_value(&*child).unwrap(), json!({ "child": true }));

    // Both mount on the same server without clobbering each other.
    s.service.mount().unwrap();
    child.mount().unwrap();
    assert_eq!(s.server.mounted().len(), 2);
    child.unmount();
    assert_eq!(s.server.mounted(), vec![s.service.router().unwrap().id()]);
}

#[tokio::test]
async fn handler_that_never_responds_yields_500() {
    struct Silent;

    #[svckit::async_trait]
    impl Handler for Silent {
        fn route(&self) -> Route {
            Route::get("/silent")
        }

        async fn handle(&self, _req: Request, _res: Response, _service: Arc<Service>) {}
    }

    struct Quiet;

    impl ServiceDefinition for Quiet {
        fn handlers(&self) -> Vec<Arc<dyn Handler>> {
            vec![Arc::new(Silent)]
        }
    }

    let server = Arc::new(HttpServer::new());
    let service = Service::create(
        Quiet,
        Value::Null,
        Dependencies::new().server(Arc::clone(&server)),
    )
    .unwrap();
    service.mount().unwrap();

    let (status, _, _) = call(
        &server,
        http::Request::get("/silent").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
