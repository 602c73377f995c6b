//! Host Runtime - drives service plugins through their lifecycle
//!
//! Phase order: init → start → serve/wait → stop.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::container::Injector;
use crate::context::ConfigProvider;
use crate::contracts::{Logger, TracingLog};
use crate::deps::{LOG, SERVER};
use crate::errors::RuntimeError;
use crate::plugin::{Plugin, ServicePlugin};
use crate::transport::HttpServer;

/// Owns the container, the HTTP server and the plugins mounted onto it.
pub struct HostRuntime {
    injector: Arc<Injector>,
    server: Arc<HttpServer>,
    plugins: Vec<ServicePlugin>,
    cancel: CancellationToken,
}

impl HostRuntime {
    /// Prepare the container: `server` and a tracing-backed `log` are provided to
    /// every plugin. No phase runs yet.
    pub fn new(
        server: Arc<HttpServer>,
        config: Arc<dyn ConfigProvider>,
        plugins: Vec<Arc<dyn Plugin>>,
        cancel: CancellationToken,
    ) -> Result<Self, RuntimeError> {
        let mut seen = HashSet::new();
        for p in &plugins {
            if !seen.insert(p.name()) {
                return Err(RuntimeError::DuplicatePlugin(p.name()));
            }
        }

        let injector = Arc::new(Injector::with_config(config));
        injector.provide(SERVER, Arc::clone(&server))?;
        let logger: Logger = Arc::new(TracingLog);
        injector.provide(LOG, Arc::new(logger))?;

        let plugins = plugins
            .into_iter()
            .map(|p| ServicePlugin::new(p, Arc::clone(&injector)))
            .collect();

        Ok(Self {
            injector,
            server,
            plugins,
            cancel,
        })
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub fn server(&self) -> &Arc<HttpServer> {
        &self.server
    }

    pub fn plugins(&self) -> &[ServicePlugin] {
        &self.plugins
    }

    /// INIT phase: every plugin registers its services, in declaration order.
    pub fn run_init_phase(&self) -> Result<(), RuntimeError> {
        tracing::info!("Phase: init");

        for p in &self.plugins {
            tracing::debug!(plugin = p.name(), "Initializing plugin");
            p.initialize().map_err(|source| RuntimeError::Init {
                plugin: p.name(),
                source,
            })?;
        }

        Ok(())
    }

    /// START phase: mount every plugin's routers.
    ///
    /// If one plugin fails, the plugins started before it are stopped again.
    pub fn run_start_phase(&self) -> Result<(), RuntimeError> {
        tracing::info!("Phase: start");

        for (idx, p) in self.plugins.iter().enumerate() {
            if let Err(source) = p.start() {
                for started in self.plugins[..idx].iter().rev() {
                    started.stop();
                }
                return Err(RuntimeError::Start {
                    plugin: p.name(),
                    source,
                });
            }
        }

        Ok(())
    }

    /// STOP phase: unmount in reverse order.
    pub fn run_stop_phase(&self) {
        tracing::info!("Phase: stop");

        for p in self.plugins.iter().rev() {
            p.stop();
        }
    }

    /// Run the full lifecycle: init → start → serve until cancelled → stop.
    pub async fn run_full_cycle(self, listener: TcpListener) -> anyhow::Result<()> {
        self.run_init_phase()?;
        self.run_start_phase()?;

        let mut serve = tokio::spawn(Arc::clone(&self.server).serve(listener, self.cancel.clone()));

        let finished = tokio::select! {
            () = self.cancel.cancelled() => None,
            res = &mut serve => Some(res),
        };

        self.run_stop_phase();

        let outcome = match finished {
            Some(res) => {
                // Server ended on its own; make sure anything watching the token stops too.
                self.cancel.cancel();
                res
            }
            None => serve.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RuntimeError::Serve(e).into()),
            Err(join) => Err(RuntimeError::Serve(join.into()).into()),
        }
    }
}
