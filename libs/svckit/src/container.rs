//! Minimal plugin container: provided values plus named, tagged service
//! registrations that plugins query back at start/stop.

use std::any::{type_name, Any};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::context::{ConfigProvider, EmptyConfig};
use crate::deps::Value;
use crate::errors::ContainerError;
use crate::service::Service;

/// Tag carried by registrations that hold a mountable service.
pub const ROUTER: &str = "router";

/// A service registered in the container.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub tag: &'static str,
    pub plugin: Option<String>,
    pub service: Arc<Service>,
}

impl Registration {
    pub fn router(name: impl Into<String>, plugin: &str, service: Arc<Service>) -> Self {
        Self {
            name: name.into(),
            tag: ROUTER,
            plugin: Some(plugin.to_owned()),
            service,
        }
    }
}

/// Filter over registrations. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct Query {
    tag: Option<String>,
    plugin: Option<String>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            plugin: None,
        }
    }

    /// Registrations tagged [`ROUTER`].
    pub fn routers() -> Self {
        Self::tag(ROUTER)
    }

    #[must_use]
    pub fn owned_by(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    fn matches(&self, reg: &Registration) -> bool {
        self.tag.as_deref().map_or(true, |t| t == reg.tag)
            && self
                .plugin
                .as_deref()
                .map_or(true, |p| reg.plugin.as_deref() == Some(p))
    }
}

/// Result of [`Injector::filter`], in registration order.
#[derive(Debug, Default)]
pub struct Selection {
    entries: Vec<Arc<Registration>>,
}

impl Selection {
    pub fn values(&self) -> Vec<Arc<Service>> {
        self.entries
            .iter()
            .map(|r| Arc::clone(&r.service))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds provided values (`server`, `log`, ...) and service registrations.
pub struct Injector {
    values: RwLock<IndexMap<String, Value>>,
    registrations: RwLock<IndexMap<String, Arc<Registration>>>,
    config: Arc<dyn ConfigProvider>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("values", &self.values.read().keys().collect::<Vec<_>>())
            .field(
                "registrations",
                &self.registrations.read().keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Injector {
    pub fn new() -> Self {
        Self::with_config(Arc::new(EmptyConfig))
    }

    pub fn with_config(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            values: RwLock::new(IndexMap::new()),
            registrations: RwLock::new(IndexMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    /// Provide a named value. Each name can be provided once.
    pub fn provide<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Result<(), ContainerError> {
        let name = name.into();
        let mut values = self.values.write();
        if values.contains_key(&name) {
            return Err(ContainerError::DuplicateValue(name));
        }
        values.insert(name, value);
        Ok(())
    }

    pub fn resolve<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        let value = self
            .raw_value(name)
            .ok_or_else(|| ContainerError::MissingValue(name.to_owned()))?;
        value
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_owned(),
                expected: type_name::<T>(),
            })
    }

    pub(crate) fn raw_value(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    pub fn register(&self, registration: Registration) -> Result<(), ContainerError> {
        let mut regs = self.registrations.write();
        if regs.contains_key(&registration.name) {
            return Err(ContainerError::DuplicateRegistration(registration.name));
        }
        tracing::debug!(
            name = %registration.name,
            tag = registration.tag,
            plugin = registration.plugin.as_deref().unwrap_or("-"),
            "Registered service"
        );
        regs.insert(registration.name.clone(), Arc::new(registration));
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Registration>> {
        self.registrations.write().shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Service>> {
        self.registrations
            .read()
            .get(name)
            .map(|r| Arc::clone(&r.service))
    }

    pub fn filter(&self, query: &Query) -> Selection {
        let entries = self
            .registrations
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        Selection { entries }
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}
