use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::container::Injector;
use crate::contracts::Logger;
use crate::deps::{self, Dependencies};
use crate::errors::ContainerError;
use crate::service::Service;
use crate::transport::HttpServer;

/// Source of per-service configuration data.
pub trait ConfigProvider: Send + Sync {
    /// Config data for the service registered under `name`, if any.
    fn service_config(&self, name: &str) -> Option<&Value>;
}

/// Provider with no configuration at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyConfig;

impl ConfigProvider for EmptyConfig {
    fn service_config(&self, _name: &str) -> Option<&Value> {
        None
    }
}

/// What a service factory sees while a plugin initializes.
pub struct Resolver<'a> {
    injector: &'a Injector,
    plugin: &'static str,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(injector: &'a Injector, plugin: &'static str) -> Self {
        Self { injector, plugin }
    }

    /// Name of the plugin running the factory.
    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.injector.resolve(name)
    }

    pub fn server(&self) -> Result<Arc<HttpServer>, ContainerError> {
        self.get::<HttpServer>(deps::SERVER)
    }

    pub fn logger(&self) -> Option<Logger> {
        self.get::<Logger>(deps::LOG)
            .ok()
            .map(|log| Logger::clone(&log))
    }

    /// Configured data for `name`, or `null` when there is none.
    pub fn service_data(&self, name: &str) -> Value {
        self.injector
            .config()
            .service_config(name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// A dependency batch holding the named container values.
    pub fn dependencies(&self, names: &[&str]) -> Result<Dependencies, ContainerError> {
        let mut batch = Dependencies::new();
        for name in names {
            let value = self
                .injector
                .raw_value(name)
                .ok_or_else(|| ContainerError::MissingValue((*name).to_owned()))?;
            batch.insert_raw((*name).to_owned(), value);
        }
        Ok(batch)
    }

    /// A service registered earlier, e.g. to pass as `shared` to [`Service::with`].
    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.injector.get(name)
    }
}
