//! Service plugins: register services at initialize, mount them on start,
//! unmount them on stop.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::{Injector, Query, Registration, Selection};
use crate::context::Resolver;
use crate::errors::PluginError;
use crate::service::Service;

/// A unit that contributes services to the container.
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Register this plugin's services. Runs once.
    fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()>;
}

/// Handed to [`Plugin::initialize`] to register services.
pub struct Registrar<'a> {
    injector: &'a Injector,
    plugin: &'static str,
    registered: Vec<String>,
}

impl<'a> Registrar<'a> {
    fn new(injector: &'a Injector, plugin: &'static str) -> Self {
        Self {
            injector,
            plugin,
            registered: Vec::new(),
        }
    }

    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.injector, self.plugin)
    }

    /// Build a service with `factory` and register it under `name`, tagged as a
    /// router owned by this plugin.
    pub fn router<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), PluginError>
    where
        F: FnOnce(&Resolver<'_>) -> anyhow::Result<Arc<Service>>,
    {
        let name = name.into();
        let service = factory(&self.resolver()).map_err(|source| PluginError::Factory {
            plugin: self.plugin,
            service: name.clone(),
            source,
        })?;
        self.injector
            .register(Registration::router(name.clone(), self.plugin, service))?;
        self.registered.push(name);
        Ok(())
    }

    /// Names registered so far, in order.
    pub fn registered(&self) -> &[String] {
        &self.registered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

/// Drives one [`Plugin`] through its lifecycle against a shared [`Injector`].
pub struct ServicePlugin {
    plugin: Arc<dyn Plugin>,
    injector: Arc<Injector>,
    state: Mutex<PluginState>,
}

impl std::fmt::Debug for ServicePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePlugin")
            .field("name", &self.plugin.name())
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ServicePlugin {
    pub fn new(plugin: Arc<dyn Plugin>, injector: Arc<Injector>) -> Self {
        Self {
            plugin,
            injector,
            state: Mutex::new(PluginState::Uninitialized),
        }
    }

    pub fn name(&self) -> &'static str {
        self.plugin.name()
    }

    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    /// Run the plugin's registration hook.
    ///
    /// If the hook fails, the services it registered are removed again.
    pub fn initialize(&self) -> Result<(), PluginError> {
        let mut state = self.state.lock();
        if *state != PluginState::Uninitialized {
            return Err(self.invalid("initialize", *state));
        }

        let mut registrar = Registrar::new(&self.injector, self.name());
        if let Err(source) = self.plugin.initialize(&mut registrar) {
            for name in &registrar.registered {
                self.injector.remove(name);
            }
            return Err(PluginError::Initialize {
                plugin: self.name(),
                source,
            });
        }

        tracing::info!(plugin = self.name(), services = ?registrar.registered, "Plugin initialized");
        *state = PluginState::Initialized;
        Ok(())
    }

    /// Router registrations owned by this plugin, in registration order.
    pub fn routers(&self) -> Selection {
        self.injector
            .filter(&Query::routers().owned_by(self.name()))
    }

    /// Mount every owned router. On failure, routers mounted by this call are
    /// unmounted and the state is left unchanged.
    pub fn start(&self) -> Result<(), PluginError> {
        let mut state = self.state.lock();
        match *state {
            PluginState::Uninitialized => return Err(self.invalid("start", *state)),
            PluginState::Started => return Ok(()),
            PluginState::Initialized | PluginState::Stopped => {}
        }

        let selection = self.routers();
        let mut mounted: Vec<&Arc<Service>> = Vec::new();
        for reg in selection.iter() {
            let already = reg.service.is_mounted();
            if let Err(source) = reg.service.mount() {
                for service in mounted.iter().rev() {
                    service.unmount();
                }
                tracing::error!(plugin = self.name(), service = %reg.name, error = %source, "Mount failed; rolled back");
                return Err(PluginError::Mount {
                    plugin: self.name(),
                    service: reg.name.clone(),
                    source,
                });
            }
            if !already {
                mounted.push(&reg.service);
            }
        }

        tracing::info!(plugin = self.name(), routers = selection.len(), "Plugin started");
        *state = PluginState::Started;
        Ok(())
    }

    /// Unmount every owned router. Does nothing unless started.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state != PluginState::Started {
            tracing::debug!(plugin = self.name(), state = ?*state, "Stop ignored");
            return;
        }

        for service in self.routers().values() {
            service.unmount();
        }

        tracing::info!(plugin = self.name(), "Plugin stopped");
        *state = PluginState::Stopped;
    }

    fn invalid(&self, action: &'static str, state: PluginState) -> PluginError {
        PluginError::InvalidState {
            plugin: self.name(),
            action,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Handler, Route};
    use crate::deps::{Dependencies, SERVER};
    use crate::service::ServiceDefinition;
    use crate::transport::{HttpServer, Request, Response};
    use serde_json::Value;

    struct Hello(&'static str);

    #[async_trait::async_trait]
    impl Handler for Hello {
        fn route(&self) -> Route {
            Route::get(self.0)
        }

        async fn handle(&self, _req: Request, res: Response, _service: Arc<Service>) {
            res.send("hello");
        }
    }

    struct HelloService(&'static str);

    impl ServiceDefinition for HelloService {
        fn handlers(&self) -> Vec<Arc<dyn Handler>> {
            vec![Arc::new(Hello(self.0))]
        }
    }

    struct TwoRouters;

    impl Plugin for TwoRouters {
        fn name(&self) -> &'static str {
            "two"
        }

        fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
            for (name, path) in [("two:a", "/a"), ("two:b", "/b")] {
                registrar.router(name, |r| {
                    let deps = r.dependencies(&[SERVER])?;
                    Ok(Service::create(HelloService(path), Value::Null, deps)?)
                })?;
            }
            Ok(())
        }
    }

    /// Second service has no server, so mounting it fails.
    struct HalfWired;

    impl Plugin for HalfWired {
        fn name(&self) -> &'static str {
            "half"
        }

        fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
            registrar.router("half:ok", |r| {
                Ok(Service::create(
                    HelloService("/ok"),
                    Value::Null,
                    Dependencies::new().server(r.server()?),
                )?)
            })?;
            registrar.router("half:broken", |_| {
                Ok(Service::create(
                    HelloService("/broken"),
                    Value::Null,
                    Dependencies::new(),
                )?)
            })?;
            Ok(())
        }
    }

    struct FailsLate;

    impl Plugin for FailsLate {
        fn name(&self) -> &'static str {
            "late"
        }

        fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
            registrar.router("late:first", |_| {
                Ok(Service::create(
                    HelloService("/x"),
                    Value::Null,
                    Dependencies::new(),
                )?)
            })?;
            anyhow::bail!("config missing")
        }
    }

    fn injector() -> (Arc<Injector>, Arc<HttpServer>) {
        let injector = Arc::new(Injector::new());
        let server = Arc::new(HttpServer::new());
        injector.provide(SERVER, Arc::clone(&server)).unwrap();
        (injector, server)
    }

    #[test]
    fn lifecycle_mounts_and_unmounts_in_order() {
        let (injector, server) = injector();
        let plugin = ServicePlugin::new(Arc::new(TwoRouters), Arc::clone(&injector));

        assert!(matches!(
            plugin.start(),
            Err(PluginError::InvalidState { action: "start", .. })
        ));
        plugin.stop();
        assert_eq!(plugin.state(), PluginState::Uninitialized);

        plugin.initialize().unwrap();
        assert_eq!(plugin.routers().names(), vec!["two:a", "two:b"]);
        assert!(plugin.initialize().is_err());

        plugin.start().unwrap();
        plugin.start().unwrap();
        let expected: Vec<_> = plugin
            .routers()
            .values()
            .iter()
            .map(|s| s.router().unwrap().id())
            .collect();
        assert_eq!(server.mounted(), expected);

        plugin.stop();
        plugin.stop();
        assert!(server.mounted().is_empty());
        assert_eq!(plugin.state(), PluginState::Stopped);

        plugin.start().unwrap();
        assert_eq!(server.mounted().len(), 2);
    }

    #[test]
    fn failed_start_rolls_back() {
        let (injector, server) = injector();
        let plugin = ServicePlugin::new(Arc::new(HalfWired), injector);
        plugin.initialize().unwrap();

        let err = plugin.start().unwrap_err();
        assert!(matches!(err, PluginError::Mount { ref service, .. } if service == "half:broken"));
        assert!(server.mounted().is_empty());
        assert_eq!(plugin.state(), PluginState::Initialized);
    }

    #[test]
    fn failed_initialize_removes_its_registrations() {
        let (injector, _server) = injector();
        let plugin = ServicePlugin::new(Arc::new(FailsLate), Arc::clone(&injector));

        let err = plugin.initialize().unwrap_err();
        assert!(matches!(err, PluginError::Initialize { plugin: "late", .. }));
        assert!(injector.is_empty());
        assert_eq!(plugin.state(), PluginState::Uninitialized);
    }

    #[test]
    fn factory_errors_name_the_service() {
        struct NoServer;

        impl Plugin for NoServer {
            fn name(&self) -> &'static str {
                "noserver"
            }

            fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
                registrar.router("noserver:svc", |r| {
                    let deps = r.dependencies(&["db"])?;
                    Ok(Service::create(HelloService("/n"), Value::Null, deps)?)
                })?;
                Ok(())
            }
        }

        let plugin = ServicePlugin::new(Arc::new(NoServer), Arc::new(Injector::new()));
        let err = plugin.initialize().unwrap_err();
        let PluginError::Initialize { source, .. } = err else {
            panic!("unexpected error kind");
        };
        let inner = source.downcast_ref::<PluginError>().unwrap();
        assert!(matches!(inner, PluginError::Factory { service, .. } if service == "noserver:svc"));
    }
}
