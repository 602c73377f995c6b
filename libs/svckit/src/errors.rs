use thiserror::Error;

/// Wiring errors raised by a [`Service`](crate::Service).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("dependency '{key}' is already defined on service '{service}'")]
    DependencyAlreadyDefined { service: String, key: String },

    #[error("service '{service}' has no dependency '{key}'")]
    MissingDependency { service: String, key: String },

    #[error("dependency '{key}' on service '{service}' is not a {expected}")]
    DependencyTypeMismatch {
        service: String,
        key: String,
        expected: &'static str,
    },

    #[error("service data must be a JSON object, got {found}")]
    InvalidData { found: &'static str },

    #[error("service '{service}': cannot register {method} {path}")]
    Route {
        service: String,
        method: http::Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Errors raised by the plugin container.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("a registration named '{0}' already exists")]
    DuplicateRegistration(String),

    #[error("a value named '{0}' is already provided")]
    DuplicateValue(String),

    #[error("no value named '{0}' is provided")]
    MissingValue(String),

    #[error("value '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Errors raised while driving a [`ServicePlugin`](crate::ServicePlugin).
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin '{plugin}' cannot {action} while {state:?}")]
    InvalidState {
        plugin: &'static str,
        action: &'static str,
        state: crate::PluginState,
    },

    #[error("plugin '{plugin}' failed to initialize")]
    Initialize {
        plugin: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("plugin '{plugin}': factory for '{service}' failed")]
    Factory {
        plugin: &'static str,
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("plugin '{plugin}' failed to mount '{service}'")]
    Mount {
        plugin: &'static str,
        service: String,
        #[source]
        source: ServiceError,
    },
}

/// Phase errors of the host runtime, tagged with the plugin that caused them.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("plugin '{0}' is registered twice")]
    DuplicatePlugin(&'static str),

    #[error("initialize failed for plugin '{plugin}'")]
    Init {
        plugin: &'static str,
        #[source]
        source: PluginError,
    },

    #[error("start failed for plugin '{plugin}'")]
    Start {
        plugin: &'static str,
        #[source]
        source: PluginError,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("HTTP server failed")]
    Serve(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn plugin_errors_keep_their_source() {
        let err = PluginError::Mount {
            plugin: "demo",
            service: "demo:http".into(),
            source: ServiceError::MissingDependency {
                service: "Demo".into(),
                key: "server".into(),
            },
        };
        assert_eq!(err.to_string(), "plugin 'demo' failed to mount 'demo:http'");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("service 'Demo' has no dependency 'server'".to_string())
        );
    }

    #[test]
    fn container_errors_convert_transparently() {
        let err: PluginError = ContainerError::DuplicateRegistration("x".into()).into();
        assert_eq!(err.to_string(), "a registration named 'x' already exists");
    }
}
