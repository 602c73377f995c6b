//! # SvcKit - Mountable HTTP Services
//!
//! A thin binding layer between discovered request handlers and a host HTTP server.
//!
//! ## Features
//!
//! - **Handler contracts**: each handler declares a route (verb(s) + path) and a dispatch fn
//! - **Services**: aggregate a handler set, derive a cached dispatch table, receive
//!   define-once named dependencies (optionally forwarded from a shared parent service)
//! - **Plugins**: mount every service they registered when the container starts,
//!   unmount them when it stops
//! - **Request scopes**: terminal 204/400/401/404/500 helpers that short-circuit a
//!   handler's step chain through [`StepError::Terminated`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use svckit::{Handler, Request, RequestScope, Response, Route, Service, StepResult};
//! use std::sync::Arc;
//!
//! struct Greet;
//!
//! #[svckit::async_trait]
//! impl Handler for Greet {
//!     fn route(&self) -> Route {
//!         Route::get("/greet/{name}")
//!     }
//!
//!     async fn handle(&self, req: Request, res: Response, service: Arc<Service>) {
//!         let scope = RequestScope::new(req, res, service);
//!         let outcome: StepResult = async {
//!             let name = scope.req().param("name").unwrap_or_default().to_owned();
//!             if name.is_empty() {
//!                 scope.bad_request(&serde_json::json!({ "error": "name required" }))?;
//!             }
//!             scope.res().send(format!("hello {name}"));
//!             Ok(())
//!         }
//!         .await;
//!         scope.finish(outcome);
//!     }
//! }
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory so handler crates can submit registrations
pub use inventory;

pub mod container;
pub mod context;
pub mod contracts;
pub mod deps;
pub mod discovery;
pub mod errors;
pub mod plugin;
pub mod request;
pub mod router;
pub mod runtime;
pub mod service;
pub mod signal;
pub mod transport;

pub use container::{Injector, Query, Registration, Selection, ROUTER};
pub use context::{ConfigProvider, EmptyConfig, Resolver};
pub use contracts::{ErrorLog, Handler, Logger, Methods, Middleware, Route, TracingLog};
pub use deps::{Dependencies, LOG, SERVER};
pub use discovery::{handlers, HandlerRegistration};
pub use errors::{ContainerError, PluginError, RuntimeError, ServiceError};
pub use plugin::{Plugin, PluginState, Registrar, ServicePlugin};
pub use request::{AuthChallenge, RequestScope};
pub use router::{InvalidParam, RouterId, ServiceRouter};
pub use runtime::{run, HostRuntime, RunOptions, ShutdownOptions};
pub use service::{Service, ServiceDefinition};
pub use signal::{StepError, StepResult, Terminated};
pub use transport::{HttpServer, Request, Response};
