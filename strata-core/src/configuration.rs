//! Observable per-unit configuration.
//!
//! A unit that exposes a [`Configuration`] becomes a change-notification
//! source: the reactive executor subscribes to it and re-runs the unit and
//! everything downstream of it when a setting changes.

use crate::observer::{Callback, ObserverId, ObserverList};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A single configuration change.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationChange {
    /// The key that changed.
    pub key: String,
    /// Value before the change (`None` if the key was unset).
    pub previous: Option<JsonValue>,
    /// Value after the change (`None` if the key was removed).
    pub current: Option<JsonValue>,
}

/// Mutable key/value settings of a unit.
#[derive(Default)]
pub struct Configuration {
    values: RwLock<BTreeMap<String, JsonValue>>,
    observers: ObserverList<Callback<ConfigurationChange>>,
}

impl Configuration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with initial values. No notification is sent.
    pub fn with_values(values: impl IntoIterator<Item = (String, JsonValue)>) -> Self {
        Self {
            values: RwLock::new(values.into_iter().collect()),
            observers: ObserverList::new(),
        }
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.values.read().get(key).cloned()
    }

    /// Get a value as i64.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.read().get(key).and_then(JsonValue::as_i64)
    }

    /// Get a value as f64.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.read().get(key).and_then(JsonValue::as_f64)
    }

    /// Get a value as bool.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.read().get(key).and_then(JsonValue::as_bool)
    }

    /// Get a value as string.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    /// Set a value and notify observers.
    ///
    /// Returns `false` without notifying when the key already held an
    /// equal value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) -> bool {
        let key = key.into();
        let value = value.into();

        let previous = {
            let mut values = self.values.write();
            if values.get(&key) == Some(&value) {
                return false;
            }
            values.insert(key.clone(), value.clone())
        };

        self.observers.notify(&ConfigurationChange {
            key,
            previous,
            current: Some(value),
        });
        true
    }

    /// Remove a value and notify observers if it was present.
    pub fn remove(&self, key: &str) -> Option<JsonValue> {
        let previous = self.values.write().remove(key)?;
        self.observers.notify(&ConfigurationChange {
            key: key.to_string(),
            previous: Some(previous.clone()),
            current: None,
        });
        Some(previous)
    }

    /// Copy of all current values.
    pub fn values(&self) -> BTreeMap<String, JsonValue> {
        self.values.read().clone()
    }

    /// Register a change observer.
    pub fn subscribe(
        &self,
        callback: impl Fn(&ConfigurationChange) + Send + Sync + 'static,
    ) -> ObserverId {
        self.observers.subscribe(callback)
    }

    /// Remove a change observer.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("values", &*self.values.read())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn typed_getters() {
        let config = Configuration::with_values([
            ("threshold".to_string(), json!(0.5)),
            ("limit".to_string(), json!(10)),
            ("name".to_string(), json!("filter")),
            ("enabled".to_string(), json!(true)),
        ]);

        assert_eq!(config.get_f64("threshold"), Some(0.5));
        assert_eq!(config.get_i64("limit"), Some(10));
        assert_eq!(config.get_string("name").as_deref(), Some("filter"));
        assert_eq!(config.get_bool("enabled"), Some(true));
        assert!(config.get("missing").is_none());
    }

    #[test]
    fn set_notifies_with_previous_value() {
        let config = Configuration::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = Arc::clone(&changes);
        config.subscribe(move |change| changes_clone.lock().push(change.clone()));

        assert!(config.set("limit", 1));
        assert!(config.set("limit", 2));

        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].previous, None);
        assert_eq!(changes[1].previous, Some(json!(1)));
        assert_eq!(changes[1].current, Some(json!(2)));
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let config = Configuration::new();
        let count = Arc::new(Mutex::new(0));
        let count_clone = Arc::clone(&count);
        config.subscribe(move |_| *count_clone.lock() += 1);

        assert!(config.set("mode", "fast"));
        assert!(!config.set("mode", "fast"));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn remove_and_unsubscribe() {
        let config = Configuration::new();
        let count = Arc::new(Mutex::new(0));
        let count_clone = Arc::clone(&count);
        let id = config.subscribe(move |_| *count_clone.lock() += 1);

        config.set("a", 1);
        assert_eq!(config.remove("a"), Some(json!(1)));
        assert_eq!(config.remove("a"), None);
        assert_eq!(*count.lock(), 2);

        assert!(config.unsubscribe(id));
        assert_eq!(config.observer_count(), 0);
        config.set("a", 2);
        assert_eq!(*count.lock(), 2);
    }
}
