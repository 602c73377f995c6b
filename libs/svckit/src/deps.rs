//! Named dependencies injected into services.
//!
//! A [`Dependencies`] value is a batch built by the caller. Services keep what they
//! receive in a define-once table: a key can be bound exactly once for the life of
//! the service.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::contracts::Logger;
use crate::errors::ServiceError;
use crate::transport::HttpServer;

/// Key under which the host [`HttpServer`] is injected.
pub const SERVER: &str = "server";
/// Key under which the service [`Logger`] is injected.
pub const LOG: &str = "log";

pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// A batch of named values to inject.
///
/// Within one batch the last value for a key wins; define-once applies when the
/// batch is injected.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: IndexMap<String, Value>,
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values.keys()).finish()
    }
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: Arc<T>) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn server(self, server: Arc<HttpServer>) -> Self {
        self.with(SERVER, server)
    }

    #[must_use]
    pub fn log(self, logger: Logger) -> Self {
        self.with(LOG, Arc::new(logger))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert_raw(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }
}

/// Define-once storage owned by a service.
#[derive(Default)]
pub(crate) struct DependencyTable {
    values: RwLock<IndexMap<String, Value>>,
}

impl DependencyTable {
    /// Bind every key of `batch`, or none of them.
    ///
    /// A key already bound here, or listed in `forwarded`, is rejected.
    pub(crate) fn define(
        &self,
        service: &str,
        forwarded: &[String],
        batch: Dependencies,
    ) -> Result<(), ServiceError> {
        let mut values = self.values.write();
        if let Some(key) = batch
            .values
            .keys()
            .find(|k| values.contains_key(k.as_str()) || forwarded.iter().any(|f| f == *k))
        {
            return Err(ServiceError::DependencyAlreadyDefined {
                service: service.to_owned(),
                key: key.clone(),
            });
        }
        values.extend(batch.values);
        Ok(())
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins_within_a_batch() {
        let deps = Dependencies::new()
            .with("n", Arc::new(1u32))
            .with("n", Arc::new(2u32));
        assert_eq!(deps.len(), 1);

        let table = DependencyTable::default();
        table.define("svc", &[], deps).unwrap();
        let n = table.get("n").unwrap().downcast::<u32>().unwrap();
        assert_eq!(*n, 2);
    }

    #[test]
    fn define_is_all_or_nothing() {
        let table = DependencyTable::default();
        table
            .define("svc", &[], Dependencies::new().with("a", Arc::new(1u8)))
            .unwrap();

        let batch = Dependencies::new()
            .with("b", Arc::new(2u8))
            .with("a", Arc::new(3u8));
        let err = table.define("svc", &[], batch).unwrap_err();
        assert!(matches!(err, ServiceError::DependencyAlreadyDefined { ref key, .. } if key == "a"));
        assert!(!table.contains("b"));
        assert_eq!(table.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn forwarded_keys_cannot_be_defined() {
        let table = DependencyTable::default();
        let err = table
            .define(
                "child",
                &["server".to_string()],
                Dependencies::new().with("server", Arc::new(())),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::DependencyAlreadyDefined { .. }));
    }
}
