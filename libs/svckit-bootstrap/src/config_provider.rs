use crate::config::AppConfig;
use std::sync::Arc;

/// Implementation of svckit's ConfigProvider that uses AppConfig
pub struct AppConfigProvider(Arc<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }

    pub fn inner(&self) -> &AppConfig {
        &self.0
    }
}

impl svckit::ConfigProvider for AppConfigProvider {
    fn service_config(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.services.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svckit::ConfigProvider;

    #[test]
    fn exposes_service_sections() {
        let mut config = AppConfig::default();
        config
            .services
            .insert("demo".to_string(), serde_json::json!({ "greeting": "hi" }));
        let provider = AppConfigProvider::new(config);

        assert_eq!(
            provider.service_config("demo"),
            Some(&serde_json::json!({ "greeting": "hi" }))
        );
        assert!(provider.service_config("other").is_none());
        assert_eq!(provider.inner().server.port, 8087);
    }
}
