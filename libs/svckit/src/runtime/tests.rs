use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::container::Registration;
use crate::context::EmptyConfig;
use crate::contracts::{Handler, Route};
use crate::deps::{LOG, SERVER};
use crate::errors::{PluginError, RuntimeError};
use crate::plugin::{Plugin, PluginState, Registrar};
use crate::service::{Service, ServiceDefinition};
use crate::transport::{HttpServer, Request, Response};

struct Path(&'static str);

#[async_trait::async_trait]
impl Handler for Path {
    fn route(&self) -> Route {
        Route::get(self.0)
    }

    async fn handle(&self, _req: Request, res: Response, service: Arc<Service>) {
        res.send(service.name().to_owned());
    }
}

struct Single(&'static str);

impl ServiceDefinition for Single {
    fn name(&self) -> &'static str {
        self.0
    }

    fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        vec![Arc::new(Path(self.0))]
    }
}

struct Mounts {
    name: &'static str,
    path: &'static str,
    with_server: bool,
}

impl Plugin for Mounts {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
        let (path, with_server) = (self.path, self.with_server);
        registrar.router(format!("{}:http", self.name), move |r| {
            let keys: &[&str] = if with_server { &[SERVER, LOG] } else { &[LOG] };
            Ok(Service::create(
                Single(path),
                r.service_data(path),
                r.dependencies(keys)?,
            )?)
        })?;
        Ok(())
    }
}

fn mounts(name: &'static str, path: &'static str, with_server: bool) -> Arc<dyn Plugin> {
    Arc::new(Mounts {
        name,
        path,
        with_server,
    })
}

fn host(plugins: Vec<Arc<dyn Plugin>>) -> HostRuntime {
    HostRuntime::new(
        Arc::new(HttpServer::new()),
        Arc::new(EmptyConfig),
        plugins,
        CancellationToken::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn phases_mount_and_unmount_plugins() {
    let host = host(vec![mounts("a", "/a", true), mounts("b", "/b", true)]);
    host.run_init_phase().unwrap();
    host.run_start_phase().unwrap();
    assert_eq!(host.server().mounted().len(), 2);

    let resp = host
        .server()
        .handle(Request::new(Method::GET, "/b".parse().unwrap()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    host.run_stop_phase();
    assert!(host.server().mounted().is_empty());
    assert!(host
        .plugins()
        .iter()
        .all(|p| p.state() == PluginState::Stopped));
}

#[test]
fn failed_start_stops_earlier_plugins() {
    let host = host(vec![mounts("ok", "/ok", true), mounts("bad", "/bad", false)]);
    host.run_init_phase().unwrap();

    let err = host.run_start_phase().unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Start {
            plugin: "bad",
            source: PluginError::Mount { .. }
        }
    ));
    assert!(host.server().mounted().is_empty());
    assert_eq!(host.plugins()[0].state(), PluginState::Stopped);
}

#[test]
fn duplicate_plugin_names_are_rejected() {
    let err = HostRuntime::new(
        Arc::new(HttpServer::new()),
        Arc::new(EmptyConfig),
        vec![mounts("same", "/x", true), mounts("same", "/y", true)],
        CancellationToken::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, RuntimeError::DuplicatePlugin("same")));
}

#[test]
fn init_errors_name_the_plugin() {
    let host = host(vec![mounts("p", "/p", true)]);
    host.injector()
        .register(Registration::router(
            "p:http",
            "other",
            Service::create(Single("/z"), Value::Null, crate::Dependencies::new()).unwrap(),
        ))
        .unwrap();

    let err = host.run_init_phase().unwrap_err();
    assert!(matches!(err, RuntimeError::Init { plugin: "p", .. }));
}

#[tokio::test]
async fn full_cycle_serves_until_cancelled() {
    let cancel = CancellationToken::new();
    let host = HostRuntime::new(
        Arc::new(HttpServer::new().with_request_timeout(Some(Duration::from_secs(5)))),
        Arc::new(EmptyConfig),
        vec![mounts("live", "/live", true)],
        cancel.clone(),
    )
    .unwrap();
    let server = Arc::clone(host.server());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let task = tokio::spawn(host.run_full_cycle(listener));

    for _ in 0..50 {
        if !server.mounted().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.mounted().len(), 1);

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert!(server.mounted().is_empty());
}
