//! Mapping change notifications.
//!
//! Components that react to mapping changes (resource exposure, document
//! caches) implement [`MappingSubscriber`] and are registered under a
//! capability key in a [`SubscriberRegistry`] at startup. The manager
//! notifies subscribers only after a change has been committed; a failing
//! subscriber yields a [`SubscriberWarning`] and never undoes the change.

use crate::model::{Mapping, PropertyMapping};
use indexmap::IndexMap;
use schemata_core::{BundleKey, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Types
// ============================================================================

/// A committed mapping change.
#[derive(Clone, Debug, PartialEq)]
pub enum MappingEvent {
    /// A bundle was mapped for the first time.
    Created(Mapping),
    /// An existing mapping changed.
    Updated { mapping: Mapping, previous: Mapping },
    /// A mapping was removed.
    Removed(Mapping),
}

impl MappingEvent {
    /// The bundle the event concerns.
    pub fn bundle(&self) -> BundleKey {
        match self {
            Self::Created(m) | Self::Updated { mapping: m, .. } | Self::Removed(m) => m.key(),
        }
    }

    /// The mapping as it is after the change, if it still exists.
    pub fn current(&self) -> Option<&Mapping> {
        match self {
            Self::Created(m) | Self::Updated { mapping: m, .. } => Some(m),
            Self::Removed(_) => None,
        }
    }
}

/// A subscriber failure reported alongside a committed change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberWarning {
    /// Capability key of the failing subscriber.
    pub subscriber: String,
    /// Failure description.
    pub message: String,
}

/// Handler for mapping changes.
pub trait MappingSubscriber: Send + Sync {
    /// Called after every committed mapping change.
    fn on_mapping_changed(&self, event: &MappingEvent) -> Result<()>;

    /// Called after a bundle is mapped for the first time.
    fn enable_mapping(&self, _mapping: &Mapping) -> Result<()> {
        Ok(())
    }

    /// Called for each field created by a mapping change.
    fn enable_field(&self, _mapping: &Mapping, _field: &PropertyMapping) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Capability key → subscriber, in registration order.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: IndexMap<String, Arc<dyn MappingSubscriber>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning the one it replaces.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        subscriber: Arc<dyn MappingSubscriber>,
    ) -> Option<Arc<dyn MappingSubscriber>> {
        let key = key.into();
        log::debug!("registering mapping subscriber '{key}'");
        self.subscribers.insert(key, subscriber)
    }

    /// Remove a subscriber.
    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn MappingSubscriber>> {
        self.subscribers.shift_remove(key)
    }

    /// Look up a subscriber.
    pub fn get(&self, key: &str) -> Option<&Arc<dyn MappingSubscriber>> {
        self.subscribers.get(key)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Vec<&str> {
        self.subscribers.keys().map(String::as_str).collect()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn each<F>(&self, mut call: F) -> Vec<SubscriberWarning>
    where
        F: FnMut(&dyn MappingSubscriber) -> Result<()>,
    {
        let mut warnings = Vec::new();
        for (key, subscriber) in &self.subscribers {
            if let Err(e) = call(subscriber.as_ref()) {
                log::warn!("mapping subscriber '{key}' failed: {e}");
                warnings.push(SubscriberWarning {
                    subscriber: key.clone(),
                    message: e.to_string(),
                });
            }
        }
        warnings
    }

    /// Deliver a committed change to every subscriber.
    pub fn notify_changed(&self, event: &MappingEvent) -> Vec<SubscriberWarning> {
        self.each(|s| s.on_mapping_changed(event))
    }

    /// Deliver the enable calls that follow a create.
    pub fn notify_enabled(
        &self,
        mapping: &Mapping,
        created_fields: &[String],
    ) -> Vec<SubscriberWarning> {
        self.each(|s| {
            s.enable_mapping(mapping)?;
            enable_fields(s, mapping, created_fields)
        })
    }

    /// Deliver `enable_field` for fields added to an existing mapping.
    pub fn notify_fields(
        &self,
        mapping: &Mapping,
        created_fields: &[String],
    ) -> Vec<SubscriberWarning> {
        self.each(|s| enable_fields(s, mapping, created_fields))
    }
}

fn enable_fields(
    subscriber: &dyn MappingSubscriber,
    mapping: &Mapping,
    created_fields: &[String],
) -> Result<()> {
    for property in mapping
        .properties
        .iter()
        .filter(|p| created_fields.contains(&p.field))
    {
        subscriber.enable_field(mapping, property)?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::{Error, FieldKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MappingSubscriber for Recorder {
        fn on_mapping_changed(&self, event: &MappingEvent) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("changed {}", event.bundle()));
            if self.fail {
                return Err(Error::operation("boom"));
            }
            Ok(())
        }

        fn enable_mapping(&self, mapping: &Mapping) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("enable {}", mapping.key()));
            Ok(())
        }

        fn enable_field(&self, _mapping: &Mapping, field: &PropertyMapping) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("field {}", field.field));
            Ok(())
        }
    }

    fn mapping() -> Mapping {
        Mapping::new(&BundleKey::new("node", "event"), "Event")
            .with_property(PropertyMapping::new("name", "title", FieldKind::PlainText))
            .with_property(PropertyMapping::new(
                "startDate",
                "schema_start_date",
                FieldKind::DateTime,
            ))
    }

    #[test]
    fn test_register_replaces_by_key() {
        let mut registry = SubscriberRegistry::new();
        assert!(registry.register("cache", Arc::new(Recorder::default())).is_none());
        assert!(registry.register("cache", Arc::new(Recorder::default())).is_some());
        registry.register("resources", Arc::new(Recorder::default()));
        assert_eq!(registry.keys(), vec!["cache", "resources"]);
        assert!(registry.unregister("cache").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failures_become_warnings() {
        let ok = Arc::new(Recorder::default());
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let mut registry = SubscriberRegistry::new();
        registry.register("failing", failing.clone());
        registry.register("ok", ok.clone());

        let warnings = registry.notify_changed(&MappingEvent::Created(mapping()));

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].subscriber, "failing");
        assert!(warnings[0].message.contains("boom"));
        // later subscribers still run
        assert_eq!(ok.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_notify_enabled_only_created_fields() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = SubscriberRegistry::new();
        registry.register("r", recorder.clone());

        let warnings = registry.notify_enabled(&mapping(), &["schema_start_date".to_string()]);

        assert!(warnings.is_empty());
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["enable node--event", "field schema_start_date"]
        );
    }

    #[test]
    fn test_event_accessors() {
        let removed = MappingEvent::Removed(mapping());
        assert_eq!(removed.bundle(), BundleKey::new("node", "event"));
        assert!(removed.current().is_none());
        assert!(MappingEvent::Created(mapping()).current().is_some());
    }
}
