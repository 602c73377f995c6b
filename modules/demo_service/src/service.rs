use std::sync::Arc;

use svckit::{Handler, ServiceDefinition};

use crate::api::handlers::StatusRequest;

/// Inventory group the demo handlers are submitted under.
pub const GROUP: &str = "demo";

pub const SERVICE_NAME: &str = "demo:http:service";
pub const STATUS_NAME: &str = "demo:http:status";

/// Every handler submitted under [`GROUP`].
pub struct DemoService;

impl ServiceDefinition for DemoService {
    fn name(&self) -> &'static str {
        "DemoService"
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        svckit::handlers(GROUP)
    }
}

/// Health endpoint built on top of [`DemoService`]'s dependencies.
pub struct StatusService;

impl ServiceDefinition for StatusService {
    fn name(&self) -> &'static str {
        "StatusService"
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        vec![Arc::new(StatusRequest)]
    }
}
