//! Services: a handler set plus the dependencies it runs with.

use std::any::{type_name, Any};
use std::sync::{Arc, OnceLock};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::contracts::{Handler, Logger};
use crate::deps::{self, Dependencies, DependencyTable};
use crate::errors::ServiceError;
use crate::router::ServiceRouter;
use crate::transport::HttpServer;

/// Supplies the handler set of a service.
pub trait ServiceDefinition: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>>;
}

/// A mountable unit of handlers.
///
/// Built with [`Service::create`] or [`Service::with`]. Dependencies are
/// define-once; the router is derived on first use and cached.
pub struct Service {
    name: String,
    definition: Arc<dyn ServiceDefinition>,
    data: Map<String, Value>,
    deps: DependencyTable,
    shared: Option<Arc<Service>>,
    forwarded: Vec<String>,
    router: OnceLock<Arc<ServiceRouter>>,
}

impl Service {
    /// Build a service from `definition`, merging `data` (an object or `null`) and
    /// injecting `dependencies`.
    pub fn create(
        definition: impl ServiceDefinition,
        data: Value,
        dependencies: Dependencies,
    ) -> Result<Arc<Self>, ServiceError> {
        Self::build(Arc::new(definition), data, None, dependencies)
    }

    /// Like [`Service::create`], and every dependency `shared` holds right now is
    /// readable on the new service. Reads go to `shared` each time, so they track
    /// whatever `shared` exposes.
    pub fn with(
        shared: &Arc<Service>,
        definition: impl ServiceDefinition,
        data: Value,
        dependencies: Dependencies,
    ) -> Result<Arc<Self>, ServiceError> {
        Self::build(
            Arc::new(definition),
            data,
            Some(Arc::clone(shared)),
            dependencies,
        )
    }

    fn build(
        definition: Arc<dyn ServiceDefinition>,
        data: Value,
        shared: Option<Arc<Service>>,
        dependencies: Dependencies,
    ) -> Result<Arc<Self>, ServiceError> {
        let data = match data {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ServiceError::InvalidData {
                    found: json_kind(&other),
                })
            }
        };
        let forwarded = shared
            .as_ref()
            .map(|s| s.dependency_keys())
            .unwrap_or_default();

        let service = Self {
            name: definition.name().to_owned(),
            definition,
            data,
            deps: DependencyTable::default(),
            shared,
            forwarded,
            router: OnceLock::new(),
        };
        service.inject(dependencies)?;
        Ok(Arc::new(service))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind more dependencies. Fails without binding anything if one of the keys
    /// is already defined here or forwarded from the shared service.
    pub fn inject(&self, dependencies: Dependencies) -> Result<(), ServiceError> {
        if dependencies.is_empty() {
            return Ok(());
        }
        self.deps.define(&self.name, &self.forwarded, dependencies)
    }

    fn raw(&self, key: &str) -> Option<deps::Value> {
        if let Some(v) = self.deps.get(key) {
            return Some(v);
        }
        match &self.shared {
            Some(shared) if self.forwarded.iter().any(|k| k == key) => shared.raw(key),
            _ => None,
        }
    }

    pub fn dependency<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.raw(key).and_then(|v| v.downcast::<T>().ok())
    }

    pub fn require<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, ServiceError> {
        let value = self.raw(key).ok_or_else(|| ServiceError::MissingDependency {
            service: self.name.clone(),
            key: key.to_owned(),
        })?;
        value
            .downcast::<T>()
            .map_err(|_| ServiceError::DependencyTypeMismatch {
                service: self.name.clone(),
                key: key.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Own keys followed by forwarded ones.
    pub fn dependency_keys(&self) -> Vec<String> {
        let mut keys = self.deps.keys();
        keys.extend(self.forwarded.iter().cloned());
        keys
    }

    pub fn has_dependency(&self, key: &str) -> bool {
        self.deps.contains(key) || self.forwarded.iter().any(|k| k == key)
    }

    pub fn server(&self) -> Option<Arc<HttpServer>> {
        self.dependency::<HttpServer>(deps::SERVER)
    }

    pub fn logger(&self) -> Option<Logger> {
        self.dependency::<Logger>(deps::LOG)
            .map(|log| Logger::clone(&log))
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn shared(&self) -> Option<&Arc<Service>> {
        self.shared.as_ref()
    }

    pub fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.definition.handlers()
    }

    /// The dispatch table for this service, built on first call.
    pub fn router(self: &Arc<Self>) -> Result<Arc<ServiceRouter>, ServiceError> {
        if let Some(router) = self.router.get() {
            return Ok(Arc::clone(router));
        }
        let built = Arc::new(ServiceRouter::build(self)?);
        Ok(Arc::clone(self.router.get_or_init(|| built)))
    }

    /// Install the router on the injected server. Mounting twice is a no-op.
    pub fn mount(self: &Arc<Self>) -> Result<(), ServiceError> {
        let server = self.require::<HttpServer>(deps::SERVER)?;
        let router = self.router()?;
        let id = router.id();
        if server.use_router(router) {
            tracing::info!(service = %self.name, router = %id, "Service mounted");
        }
        Ok(())
    }

    /// Remove this service's router from the server, if it is there.
    pub fn unmount(&self) {
        let (Some(router), Some(server)) = (self.router.get(), self.server()) else {
            return;
        };
        if server.remove_router(router.id()).is_some() {
            tracing::info!(service = %self.name, router = %router.id(), "Service unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        match (self.router.get(), self.server()) {
            (Some(router), Some(server)) => server.is_mounted(router.id()),
            _ => false,
        }
    }
}

impl Serialize for Service {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("dependencies", &self.dependency_keys())
            .field("shared", &self.shared.as_ref().map(|s| s.name.as_str()))
            .field("router", &self.router.get().map(|r| r.id()))
            .finish()
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
