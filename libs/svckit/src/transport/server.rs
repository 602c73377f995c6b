use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use http::StatusCode;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{Request, Response};
use crate::router::{RouterId, ServiceRouter};

/// Default cap on buffered request bodies (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Host HTTP server that services mount their routers onto.
///
/// Routers are tried in mount order; the first one with a matching route handles
/// the request. Unmatched requests get an empty 404.
pub struct HttpServer {
    routers: RwLock<IndexMap<RouterId, Arc<ServiceRouter>>>,
    body_limit: usize,
    request_timeout: Option<Duration>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("mounted", &self.mounted())
            .field("body_limit", &self.body_limit)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HttpServer {
    pub fn new() -> Self {
        Self {
            routers: RwLock::new(IndexMap::new()),
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Mount a router. Returns `false` if that router is already mounted.
    pub fn use_router(&self, router: Arc<ServiceRouter>) -> bool {
        let mut routers = self.routers.write();
        if routers.contains_key(&router.id()) {
            return false;
        }
        tracing::debug!(router = %router.id(), service = router.service_name(), routes = router.len(), "Mounting router");
        routers.insert(router.id(), router);
        true
    }

    /// Unmount a router by id, preserving the order of the remaining ones.
    pub fn remove_router(&self, id: RouterId) -> Option<Arc<ServiceRouter>> {
        let removed = self.routers.write().shift_remove(&id);
        if let Some(router) = &removed {
            tracing::debug!(router = %id, service = router.service_name(), "Unmounted router");
        }
        removed
    }

    pub fn is_mounted(&self, id: RouterId) -> bool {
        self.routers.read().contains_key(&id)
    }

    /// Ids of the mounted routers, in mount order.
    pub fn mounted(&self) -> Vec<RouterId> {
        self.routers.read().keys().copied().collect()
    }

    /// Route a buffered request through the mounted routers.
    pub async fn handle(&self, req: Request) -> http::Response<Body> {
        let routers: Vec<Arc<ServiceRouter>> = self.routers.read().values().cloned().collect();

        for router in routers {
            let dispatch = match router.route(req.method(), req.path()) {
                None => continue,
                Some(Ok(dispatch)) => dispatch,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, path = req.path(), "Rejected route params");
                    return empty(StatusCode::BAD_REQUEST);
                }
            };

            let (res, pending) = Response::channel();
            let method = req.method().clone();
            let path = req.path().to_owned();
            // Panics inside the handler drop its sinks, which surfaces below as a 500.
            tokio::spawn(dispatch.run(req, res));

            return match pending.wait().await {
                Some(response) => response,
                None => {
                    tracing::warn!(%method, %path, service = router.service_name(), "Handler finished without responding");
                    empty(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
        }

        empty(StatusCode::NOT_FOUND)
    }

    /// Buffer and route a raw `http` request.
    pub async fn dispatch(&self, req: http::Request<Body>) -> http::Response<Body> {
        match Request::from_http(req, self.body_limit).await {
            Ok(req) => self.handle(req).await,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                empty(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// An axum router that forwards every request to this server.
    pub fn axum_router(self: &Arc<Self>) -> axum::Router {
        axum::Router::new()
            .fallback(forward)
            .with_state(Arc::clone(self))
    }

    /// Serve on `listener` until `cancel` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: tokio::net::TcpListener,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut router = self.axum_router().layer(TraceLayer::new_for_http());
        if let Some(timeout) = self.request_timeout {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }

        let addr = listener.local_addr()?;
        tracing::info!(%addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn forward(
    State(server): State<Arc<HttpServer>>,
    req: axum::extract::Request,
) -> axum::response::Response {
    server.dispatch(req).await
}

fn empty(status: StatusCode) -> http::Response<Body> {
    let mut response = http::Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
