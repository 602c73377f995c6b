//! Per-request scope with terminal response helpers.
//!
//! Each terminal helper comes in two forms. The bare form (`bad_request`) writes
//! the response and returns `Err(StepError::Terminated)` so that `?` ends the
//! step chain. The `send_` form only writes.

use std::sync::Arc;

use http::{header, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

use crate::service::Service;
use crate::signal::{StepError, StepResult};
use crate::transport::{Request, Response};

/// Request, response sink and owning service for one inbound request.
pub struct RequestScope {
    req: Request,
    res: Response,
    service: Arc<Service>,
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("method", self.req.method())
            .field("path", &self.req.path())
            .field("service", &self.service.name())
            .finish()
    }
}

impl RequestScope {
    pub fn new(req: Request, res: Response, service: Arc<Service>) -> Self {
        Self { req, res, service }
    }

    pub fn req(&self) -> &Request {
        &self.req
    }

    pub fn res(&self) -> &Response {
        &self.res
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn into_parts(self) -> (Request, Response, Arc<Service>) {
        (self.req, self.res, self.service)
    }

    /// 204 No Content.
    pub fn no_content(&self) -> StepResult {
        self.send_no_content();
        Err(StepError::Terminated)
    }

    pub fn send_no_content(&self) {
        self.res.send_status(StatusCode::NO_CONTENT);
    }

    /// 400 Bad Request with `err` as the JSON body.
    pub fn bad_request<E: Serialize + ?Sized>(&self, err: &E) -> StepResult {
        self.send_bad_request(err);
        Err(StepError::Terminated)
    }

    pub fn send_bad_request<E: Serialize + ?Sized>(&self, err: &E) {
        self.send_client_error(StatusCode::BAD_REQUEST, err);
    }

    /// 401 Unauthorized with a Bearer challenge built from `challenge`.
    pub fn unauthorized(&self, challenge: &AuthChallenge) -> StepResult {
        self.send_unauthorized(challenge);
        Err(StepError::Terminated)
    }

    pub fn send_unauthorized(&self, challenge: &AuthChallenge) {
        match HeaderValue::try_from(challenge.header_value()) {
            Ok(value) => {
                self.res.header(header::WWW_AUTHENTICATE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Unrepresentable WWW-Authenticate challenge"),
        }
        self.res.send_status(StatusCode::UNAUTHORIZED);
    }

    /// 404 Not Found with `err` as the JSON body.
    pub fn not_found<E: Serialize + ?Sized>(&self, err: &E) -> StepResult {
        self.send_not_found(err);
        Err(StepError::Terminated)
    }

    pub fn send_not_found<E: Serialize + ?Sized>(&self, err: &E) {
        self.send_client_error(StatusCode::NOT_FOUND, err);
    }

    /// 500 with an empty body. Does not terminate: callers are usually already
    /// at the end of the chain.
    pub fn internal_server_error(&self, err: &anyhow::Error) {
        match self.service.logger() {
            Some(log) => log.error(&format_args!("{err:#}")),
            None => tracing::error!(
                service = self.service.name(),
                method = %self.req.method(),
                path = self.req.path(),
                error = ?err,
                "Request failed"
            ),
        }
        self.res.send_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Single exit point for a failed chain: termination is swallowed, anything
    /// else becomes a 500.
    pub fn error(&self, err: StepError) {
        match err {
            StepError::Terminated => {}
            StepError::Failed(err) => self.internal_server_error(&err),
        }
    }

    pub fn finish(&self, outcome: StepResult) {
        if let Err(err) = outcome {
            self.error(err);
        }
    }

    fn send_client_error<E: Serialize + ?Sized>(&self, status: StatusCode, err: &E) {
        let body = match serde_json::to_value(err) {
            Ok(body) => body,
            Err(e) => {
                let err = anyhow::Error::new(e).context("serialize error response body");
                self.internal_server_error(&err);
                return;
            }
        };

        self.res
            .set([("Cache-Control", "no-store"), ("Pragma", "no-cache")]);
        if let Some(log) = self.service.logger() {
            log.error(&body);
        }
        if let Err(e) = self.res.status(status).json(&body) {
            self.internal_server_error(&e.into());
        }
    }
}

/// Parameters of a `WWW-Authenticate: Bearer` challenge.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthChallenge {
    pub const DEFAULT_REALM: &'static str = "user";

    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// `Bearer realm=R [error=E ][error_description=D]`; `error` falls back to
    /// `message`.
    pub fn header_value(&self) -> String {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }

        let mut out = String::from("Bearer ");
        out.push_str("realm=");
        out.push_str(present(&self.realm).unwrap_or(Self::DEFAULT_REALM));
        out.push(' ');

        if let Some(error) = present(&self.error).or_else(|| present(&self.message)) {
            out.push_str("error=");
            out.push_str(error);
            out.push(' ');
        }
        if let Some(desc) = present(&self.error_description) {
            out.push_str("error_description=");
            out.push_str(desc);
        }
        out
    }
}
