use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use crate::service::Service;
use crate::signal::StepResult;
use crate::transport::{Request, Response};

/// A request handler: one route plus the code that serves it.
///
/// `handle` owns the response. It is expected to send exactly one response, through
/// the sink directly or through a [`RequestScope`](crate::RequestScope) helper.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    fn route(&self) -> Route;

    async fn handle(&self, req: Request, res: Response, service: Arc<Service>);
}

/// Runs before the handler of a route.
///
/// Returning [`StepError::Terminated`](crate::StepError::Terminated) means the
/// middleware already responded and the handler is skipped. Any other error is
/// answered with a 500.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn call(&self, req: &Request, res: &Response, service: &Arc<Service>) -> StepResult;
}

/// HTTP verb(s) a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Methods {
    One(Method),
    Many(Vec<Method>),
}

impl Methods {
    /// The verbs as a list, duplicates removed, first occurrence kept.
    pub fn normalize(&self) -> Vec<Method> {
        match self {
            Self::One(m) => vec![m.clone()],
            Self::Many(ms) => {
                let mut out: Vec<Method> = Vec::with_capacity(ms.len());
                for m in ms {
                    if !out.contains(m) {
                        out.push(m.clone());
                    }
                }
                out
            }
        }
    }
}

impl From<Method> for Methods {
    fn from(m: Method) -> Self {
        Self::One(m)
    }
}

impl From<Vec<Method>> for Methods {
    fn from(ms: Vec<Method>) -> Self {
        Self::Many(ms)
    }
}

/// Route declared by a handler.
///
/// Paths use `{name}` segments for parameters; the `:name` form is accepted too.
#[derive(Clone)]
pub struct Route {
    pub methods: Methods,
    pub path: String,
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Route {
    pub fn new(methods: impl Into<Methods>, path: impl Into<String>) -> Self {
        Self {
            methods: methods.into(),
            path: path.into(),
            middleware: Vec::new(),
        }
    }

    pub fn many(methods: impl IntoIterator<Item = Method>, path: impl Into<String>) -> Self {
        Self::new(Methods::Many(methods.into_iter().collect()), path)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Error sink a service can be given under the `log` dependency key.
pub trait ErrorLog: Send + Sync + 'static {
    fn error(&self, err: &dyn Display);
}

pub type Logger = Arc<dyn ErrorLog>;

/// [`ErrorLog`] that writes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ErrorLog for TracingLog {
    fn error(&self, err: &dyn Display) {
        tracing::error!(error = %err, "Request failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dedups_in_order() {
        let methods = Methods::Many(vec![Method::POST, Method::PUT, Method::POST]);
        assert_eq!(methods.normalize(), vec![Method::POST, Method::PUT]);
        assert_eq!(Methods::One(Method::GET).normalize(), vec![Method::GET]);
    }

    #[test]
    fn route_constructors() {
        let route = Route::many([Method::GET, Method::HEAD], "/items/:id");
        assert_eq!(route.methods.normalize(), vec![Method::GET, Method::HEAD]);
        assert_eq!(route.path, "/items/:id");
        assert_eq!(Route::delete("/x").methods, Methods::One(Method::DELETE));
        assert!(Route::get("/").middleware.is_empty());
    }
}
