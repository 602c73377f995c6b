//! SvcKit runtime runner.
//!
//! Builds the HTTP server from [`RunOptions`], binds it, and hands the lifecycle
//! to [`HostRuntime`]. Shutdown can be driven by OS signals, an external
//! `CancellationToken`, or an arbitrary future.

use std::net::SocketAddr;
use std::time::Duration;
use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::context::ConfigProvider;
use crate::plugin::Plugin;
use crate::runtime::{shutdown, HostRuntime};
use crate::transport::{HttpServer, DEFAULT_BODY_LIMIT};

/// How the runtime should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Options for running the SvcKit runner.
pub struct RunOptions {
    /// Provider of per-service config data (raw JSON by service name).
    pub config: Arc<dyn ConfigProvider>,
    /// Plugins to initialize and start, in order.
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub bind_addr: SocketAddr,
    pub request_timeout: Option<Duration>,
    pub body_limit: usize,
    /// Shutdown strategy.
    pub shutdown: ShutdownOptions,
}

impl RunOptions {
    pub fn new(config: Arc<dyn ConfigProvider>, bind_addr: SocketAddr) -> Self {
        Self {
            config,
            plugins: Vec::new(),
            bind_addr,
            request_timeout: None,
            body_limit: DEFAULT_BODY_LIMIT,
            shutdown: ShutdownOptions::Signals,
        }
    }

    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// Full cycle: init → start → serve/wait → stop.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match shutdown::wait_for_shutdown().await {
                    Ok(()) => {
                        tracing::info!("shutdown: signal received");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    let server = Arc::new(
        HttpServer::new()
            .with_body_limit(opts.body_limit)
            .with_request_timeout(opts.request_timeout),
    );
    let host = HostRuntime::new(server, opts.config, opts.plugins, cancel)?;

    let listener = tokio::net::TcpListener::bind(opts.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", opts.bind_addr))?;

    host.run_full_cycle(listener).await
}
