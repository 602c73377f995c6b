use serde::{Deserialize, Serialize};

/// Data for the demo services, read from `services.<name>` in the app config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Also register the status service.
    #[serde(default = "default_status_enabled")]
    pub status_enabled: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            status_enabled: default_status_enabled(),
        }
    }
}

fn default_greeting() -> String {
    "hello".to_string()
}

fn default_status_enabled() -> bool {
    true
}

impl DemoConfig {
    /// `null` means defaults.
    pub fn from_value(value: &serde_json::Value) -> anyhow::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }
}
