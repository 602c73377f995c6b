//! Dispatch table derived from a service's handler set.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use http::Method;

use crate::contracts::{Handler, Middleware};
use crate::errors::ServiceError;
use crate::request::RequestScope;
use crate::service::Service;
use crate::transport::{Request, Response};

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique router identity; the key servers mount routers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(u64);

impl RouterId {
    fn next() -> Self {
        Self(NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router-{}", self.0)
    }
}

struct RouteEntry {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
}

/// One entry per declared (verb, path) pair, each bound to its handler and the
/// owning service.
///
/// The service is held weakly: the service owns its router, not the reverse.
pub struct ServiceRouter {
    id: RouterId,
    service_name: String,
    service: Weak<Service>,
    entries: Vec<RouteEntry>,
    matchers: HashMap<Method, matchit::Router<usize>>,
}

impl fmt::Debug for ServiceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRouter")
            .field("id", &self.id)
            .field("service", &self.service_name)
            .field("routes", &self.routes().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceRouter {
    pub(crate) fn build(service: &Arc<Service>) -> Result<Self, ServiceError> {
        let mut entries: Vec<RouteEntry> = Vec::new();
        let mut matchers: HashMap<Method, matchit::Router<usize>> = HashMap::new();

        for handler in service.handlers() {
            let route = handler.route();
            let methods = route.methods.normalize();
            if methods.is_empty() {
                tracing::warn!(service = service.name(), path = %route.path, "Route declares no methods; skipped");
                continue;
            }

            let path = to_matcher_path(&route.path);
            for method in methods {
                matchers
                    .entry(method.clone())
                    .or_insert_with(matchit::Router::new)
                    .insert(path.clone(), entries.len())
                    .map_err(|source| ServiceError::Route {
                        service: service.name().to_owned(),
                        method: method.clone(),
                        path: route.path.clone(),
                        source,
                    })?;
                entries.push(RouteEntry {
                    method,
                    path: path.clone(),
                    handler: Arc::clone(&handler),
                    middleware: route.middleware.clone(),
                });
            }
        }

        let router = Self {
            id: RouterId::next(),
            service_name: service.name().to_owned(),
            service: Arc::downgrade(service),
            entries,
            matchers,
        };
        tracing::debug!(service = %router.service_name, router = %router.id, routes = router.len(), "Built service router");
        Ok(router)
    }

    pub fn id(&self) -> RouterId {
        self.id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The owning service, while it is alive.
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.upgrade()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared (verb, path) pairs in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.entries.iter().map(|e| (&e.method, e.path.as_str()))
    }

    /// Whether a route was declared for exactly this verb and path pattern.
    pub fn contains(&self, method: &Method, path: &str) -> bool {
        let path = to_matcher_path(path);
        self.entries
            .iter()
            .any(|e| e.method == *method && e.path == path)
    }

    /// Resolve a concrete request path to a dispatch entry.
    ///
    /// Captured params are percent-decoded; a param that does not decode to
    /// UTF-8 yields `Some(Err(..))`.
    pub fn route(&self, method: &Method, path: &str) -> Option<Result<Dispatch, InvalidParam>> {
        let matched = self.matchers.get(method)?.at(path).ok()?;
        let entry = &self.entries[*matched.value];
        let service = self.service.upgrade()?;
        let params = match decode_params(matched.params.iter()) {
            Ok(params) => params,
            Err(err) => return Some(Err(err)),
        };

        Some(Ok(Dispatch {
            handler: Arc::clone(&entry.handler),
            middleware: entry.middleware.clone(),
            service,
            params,
        }))
    }
}

/// A route param whose percent-decoded bytes are not UTF-8.
#[derive(Debug, Clone, thiserror::Error)]
#[error("route param '{name}' is not valid percent-encoded UTF-8")]
pub struct InvalidParam {
    pub name: String,
}

fn decode_params<'k, 'v>(
    raw: impl Iterator<Item = (&'k str, &'v str)>,
) -> Result<Vec<(String, String)>, InvalidParam> {
    raw.map(|(name, value)| {
        urlencoding::decode(value)
            .map(|v| (name.to_owned(), v.into_owned()))
            .map_err(|_| InvalidParam {
                name: name.to_owned(),
            })
    })
    .collect()
}

/// A matched route, ready to run.
pub struct Dispatch {
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
    service: Arc<Service>,
    params: Vec<(String, String)>,
}

impl Dispatch {
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Run middleware in order, then the handler.
    pub async fn run(self, req: Request, res: Response) {
        let req = req.with_params(self.params);
        for mw in &self.middleware {
            if let Err(err) = mw.call(&req, &res, &self.service).await {
                RequestScope::new(req, res, self.service).error(err);
                return;
            }
        }
        self.handler.handle(req, res, self.service).await;
    }
}

/// Param name a bare `*` segment is captured under.
pub const WILDCARD_PARAM: &str = "wildcard";

/// `/users/:id` -> `/users/{id}`, `/files/*rest` -> `/files/{*rest}`,
/// `/files/*` -> `/files/{*wildcard}`.
fn to_matcher_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if let Some(name) = seg.strip_prefix(':') {
                format!("{{{name}}}")
            } else if seg == "*" {
                format!("{{*{WILDCARD_PARAM}}}")
            } else if let Some(name) = seg.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                seg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
