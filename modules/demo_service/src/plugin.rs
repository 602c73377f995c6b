use serde_json::Value;
use svckit::{Dependencies, Plugin, Registrar, Service, LOG, SERVER};
use tracing::debug;

use crate::config::DemoConfig;
use crate::service::{DemoService, StatusService, SERVICE_NAME, STATUS_NAME};

/// Registers the demo HTTP service and, unless disabled, a status service
/// sharing its dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoServicePlugin;

impl Plugin for DemoServicePlugin {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn initialize(&self, registrar: &mut Registrar<'_>) -> anyhow::Result<()> {
        let data = registrar.resolver().service_data(SERVICE_NAME);
        let cfg = DemoConfig::from_value(&data)?;
        debug!(greeting = %cfg.greeting, status = cfg.status_enabled, "demo config");

        registrar.router(SERVICE_NAME, |r| {
            let deps = r.dependencies(&[SERVER, LOG])?;
            Ok(Service::create(DemoService, data.clone(), deps)?)
        })?;

        if cfg.status_enabled {
            registrar.router(STATUS_NAME, |r| {
                let parent = r
                    .service(SERVICE_NAME)
                    .ok_or_else(|| anyhow::anyhow!("'{SERVICE_NAME}' is not registered"))?;
                Ok(Service::with(
                    &parent,
                    StatusService,
                    Value::Null,
                    Dependencies::new(),
                )?)
            })?;
        }

        Ok(())
    }
}
