//! HTTP transport collaborator.
//!
//! Request and response-sink types handed to handlers, and the [`HttpServer`]
//! handle that services mount their routers onto.

mod request;
mod response;
mod server;

pub use request::Request;
pub use response::{PendingResponse, Response};
pub use server::{HttpServer, DEFAULT_BODY_LIMIT};
