use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use svckit::{
    AuthChallenge, Handler, HandlerRegistration, Request, RequestScope, Response, Route, Service,
    StepError, StepResult,
};
use tracing::debug;

use crate::service::GROUP;

/// `GET /alpha`: static JSON.
pub struct AlphaRequest;

#[async_trait]
impl Handler for AlphaRequest {
    fn route(&self) -> Route {
        Route::get("/alpha")
    }

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
        if let Err(e) = res.json(&json!({ "fake": "data" })) {
            RequestScope::new(req, res, service).internal_server_error(&e.into());
        }
    }
}

/// `GET /bravo`: a three step chain answering from the last step.
pub struct BravoRequest;

#[async_trait]
impl Handler for BravoRequest {
    fn route(&self) -> Route {
        Route::get("/bravo")
    }

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
        let scope = RequestScope::new(req, res, service);
        let outcome = bravo_chain(&scope).await;
        scope.finish(outcome);
    }
}

async fn bravo_chain(scope: &RequestScope) -> StepResult {
    let first = step_one().await?;
    let second = step_two(first).await?;
    debug!(steps = second, "bravo chain complete");
    scope.res().send("asynchronously");
    Ok(())
}

async fn step_one() -> StepResult<u32> {
    tokio::task::yield_now().await;
    Ok(1)
}

async fn step_two(prev: u32) -> StepResult<u32> {
    tokio::task::yield_now().await;
    Ok(prev + 1)
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    error_description: String,
}

/// `POST|PUT /echo/:label`: echoes a JSON body with the service greeting.
pub struct EchoRequest;

#[async_trait]
impl Handler for EchoRequest {
    fn route(&self) -> Route {
        Route::many([Method::POST, Method::PUT], "/echo/:label")
    }

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
        let scope = RequestScope::new(req, res, service);
        let outcome = echo(&scope);
        scope.finish(outcome);
    }
}

fn echo(scope: &RequestScope) -> StepResult {
    let body: Value = match scope.req().json() {
        Ok(body) => body,
        Err(e) => {
            return scope.bad_request(&ErrorBody {
                error: "invalid_request",
                error_description: e.to_string(),
            })
        }
    };

    let label = scope.req().param("label").unwrap_or_default();
    if label == "missing" {
        return scope.not_found(&ErrorBody {
            error: "not_found",
            error_description: format!("no echo target '{label}'"),
        });
    }

    let greeting = scope
        .service()
        .get("greeting")
        .and_then(Value::as_str)
        .unwrap_or("hello");

    scope
        .res()
        .json(&json!({ "label": label, "greeting": greeting, "body": body }))
        .map_err(StepError::failed)
}

/// `DELETE /session`: requires a bearer token, answers 204.
pub struct SessionRequest;

#[async_trait]
impl Handler for SessionRequest {
    fn route(&self) -> Route {
        Route::delete("/session")
    }

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
        let scope = RequestScope::new(req, res, service);
        let outcome = end_session(&scope);
        scope.finish(outcome);
    }
}

fn end_session(scope: &RequestScope) -> StepResult {
    let token = scope
        .req()
        .header("authorization")
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty());

    if token.is_none() {
        scope.unauthorized(
            &AuthChallenge::new()
                .realm("demo")
                .error("invalid_token")
                .description("bearer token required"),
        )?;
    }

    scope.no_content()
}

/// `GET /status`: reports the service and the one it shares dependencies with.
pub struct StatusRequest;

#[async_trait]
impl Handler for StatusRequest {
    fn route(&self) -> Route {
        Route::get("/status")
    }

    async fn handle(&self, _req: Request, res: Response, service: Arc<Service>) {
        let body = json!({
            "status": "ok",
            "service": service.name(),
            "shared": service.shared().map(|s| s.name().to_owned()),
            "dependencies": service.dependency_keys(),
        });
        if res.status(StatusCode::OK).json(&body).is_err() {
            res.send_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn alpha() -> Arc<dyn Handler> {
    Arc::new(AlphaRequest)
}

fn bravo() -> Arc<dyn Handler> {
    Arc::new(BravoRequest)
}

fn echo_handler() -> Arc<dyn Handler> {
    Arc::new(EchoRequest)
}

fn session() -> Arc<dyn Handler> {
    Arc::new(SessionRequest)
}

inventory::submit! { HandlerRegistration::new(GROUP, "alpha", alpha) }
inventory::submit! { HandlerRegistration::new(GROUP, "bravo", bravo) }
inventory::submit! { HandlerRegistration::new(GROUP, "echo", echo_handler) }
inventory::submit! { HandlerRegistration::new(GROUP, "session", session) }
