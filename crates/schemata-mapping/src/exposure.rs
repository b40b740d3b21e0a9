//! Resource exposure synchronization.
//!
//! Each mapped bundle is exposed as an API resource named
//! `{entity}--{bundle}`. Mapped fields are enabled under the property id as
//! their public alias; every other field on the bundle is disabled.
//! [`ResourceSynchronizer`] keeps the resource configs in step with the
//! mappings by subscribing to mapping changes.

use crate::model::{Mapping, PropertyMapping};
use crate::subscriber::{MappingEvent, MappingSubscriber};
use indexmap::IndexMap;
use schemata_core::{
    BundleKey, ConfigStore, Error, FieldDefinition, Result, SchemaAdmin, load_config, save_config,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration key prefix for resource configs.
pub const RESOURCE_PREFIX: &str = "schemata.resource.";

// ============================================================================
// Types
// ============================================================================

/// Exposure settings for one field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceField {
    /// Public name of the field in the resource.
    pub public_name: String,
    /// Whether the field is exposed.
    pub enabled: bool,
}

/// Exposure settings for one bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type name, `{entity}--{bundle}`.
    pub resource_type: String,
    /// Public path segment, `{entity}/{bundle}`.
    pub path: String,
    /// Settings by field name.
    #[serde(default)]
    pub fields: IndexMap<String, ResourceField>,
}

impl ResourceConfig {
    /// Build the config for a mapping over the bundle's current fields.
    pub fn for_mapping(mapping: &Mapping, bundle_fields: &[FieldDefinition]) -> Self {
        let key = mapping.key();
        let mut config = Self {
            resource_type: key.to_string(),
            path: format!("{}/{}", key.entity_type, key.bundle),
            fields: IndexMap::new(),
        };
        for field in bundle_fields {
            config
                .fields
                .insert(field.name.clone(), resource_field(mapping, &field.name));
        }
        // mapped fields missing from the bundle list still get an entry
        for pm in &mapping.properties {
            config
                .fields
                .entry(pm.field.clone())
                .or_insert_with(|| resource_field(mapping, &pm.field));
        }
        config
    }

    /// Enabled fields as `(field, public name)` pairs.
    pub fn enabled_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(_, f)| f.enabled)
            .map(|(name, f)| (name.as_str(), f.public_name.as_str()))
    }
}

fn resource_field(mapping: &Mapping, field: &str) -> ResourceField {
    match mapping.property_for_field(field) {
        Some(pm) => ResourceField {
            public_name: pm.property.clone(),
            enabled: true,
        },
        None => ResourceField {
            public_name: field.to_string(),
            enabled: false,
        },
    }
}

/// Host-facing resource exposure operations.
pub trait ResourceExposure: Send + Sync {
    /// Create the resource config for a newly mapped bundle.
    fn insert_mapping_resource_config(
        &self,
        mapping: &Mapping,
        bundle_fields: &[FieldDefinition],
    ) -> Result<ResourceConfig>;

    /// Reconcile an existing resource config with a changed mapping.
    fn update_mapping_resource_config(
        &self,
        mapping: &Mapping,
        bundle_fields: &[FieldDefinition],
    ) -> Result<ResourceConfig>;

    /// Enable and alias one mapped field.
    fn insert_field_config_resource(&self, mapping: &Mapping, field: &PropertyMapping)
    -> Result<()>;

    /// Drop a bundle's resource config.
    fn delete_mapping_resource_config(&self, key: &BundleKey) -> Result<()>;

    /// Read a bundle's resource config.
    fn resource_config(&self, key: &BundleKey) -> Result<Option<ResourceConfig>>;
}

// ============================================================================
// Config-backed exposure
// ============================================================================

/// [`ResourceExposure`] storing configs in a [`ConfigStore`].
#[derive(Clone)]
pub struct ConfigResourceExposure {
    config: Arc<dyn ConfigStore>,
}

impl ConfigResourceExposure {
    /// Create over a configuration backend.
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    /// Configuration key of a bundle's resource config.
    pub fn config_key(key: &BundleKey) -> String {
        format!("{RESOURCE_PREFIX}{key}")
    }

    fn save(&self, resource: &ResourceConfig) -> Result<()> {
        save_config(
            self.config.as_ref(),
            &format!("{RESOURCE_PREFIX}{}", resource.resource_type),
            resource,
        )
    }
}

impl ResourceExposure for ConfigResourceExposure {
    fn insert_mapping_resource_config(
        &self,
        mapping: &Mapping,
        bundle_fields: &[FieldDefinition],
    ) -> Result<ResourceConfig> {
        let key = mapping.key();
        if self.resource_config(&key)?.is_some() {
            return Err(Error::resource_sync(
                key.to_string(),
                "resource config already exists",
            ));
        }
        let resource = ResourceConfig::for_mapping(mapping, bundle_fields);
        self.save(&resource)?;
        log::debug!("inserted resource config {}", resource.resource_type);
        Ok(resource)
    }

    fn update_mapping_resource_config(
        &self,
        mapping: &Mapping,
        bundle_fields: &[FieldDefinition],
    ) -> Result<ResourceConfig> {
        let key = mapping.key();
        if self.resource_config(&key)?.is_none() {
            return Err(Error::resource_sync(key.to_string(), "no resource config to update"));
        }
        let resource = ResourceConfig::for_mapping(mapping, bundle_fields);
        self.save(&resource)?;
        log::debug!("updated resource config {}", resource.resource_type);
        Ok(resource)
    }

    fn insert_field_config_resource(
        &self,
        mapping: &Mapping,
        field: &PropertyMapping,
    ) -> Result<()> {
        let key = mapping.key();
        let mut resource = self
            .resource_config(&key)?
            .ok_or_else(|| Error::resource_sync(key.to_string(), "no resource config"))?;
        resource.fields.insert(
            field.field.clone(),
            ResourceField {
                public_name: field.property.clone(),
                enabled: true,
            },
        );
        self.save(&resource)
    }

    fn delete_mapping_resource_config(&self, key: &BundleKey) -> Result<()> {
        self.config.delete(&Self::config_key(key))
    }

    fn resource_config(&self, key: &BundleKey) -> Result<Option<ResourceConfig>> {
        load_config(self.config.as_ref(), &Self::config_key(key))
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Mapping subscriber that keeps resource configs reconciled.
pub struct ResourceSynchronizer {
    exposure: Arc<dyn ResourceExposure>,
    schema: Arc<dyn SchemaAdmin>,
}

impl ResourceSynchronizer {
    /// Capability key the synchronizer is registered under.
    pub const KEY: &'static str = "resource_exposure";

    /// Create a synchronizer.
    pub fn new(exposure: Arc<dyn ResourceExposure>, schema: Arc<dyn SchemaAdmin>) -> Self {
        Self { exposure, schema }
    }

    fn reconcile(&self, mapping: &Mapping) -> Result<ResourceConfig> {
        let key = mapping.key();
        let fields = self.schema.bundle_fields(&key)?;
        if self.exposure.resource_config(&key)?.is_some() {
            self.exposure.update_mapping_resource_config(mapping, &fields)
        } else {
            self.exposure.insert_mapping_resource_config(mapping, &fields)
        }
    }

    fn wrap<T>(key: &BundleKey, result: Result<T>) -> Result<T> {
        result.map_err(|e| match e {
            Error::ResourceSync { .. } => e,
            other => Error::resource_sync(key.to_string(), other.to_string()),
        })
    }
}

impl MappingSubscriber for ResourceSynchronizer {
    fn on_mapping_changed(&self, event: &MappingEvent) -> Result<()> {
        let key = event.bundle();
        match event.current() {
            Some(mapping) => Self::wrap(&key, self.reconcile(mapping)).map(|_| ()),
            None => Self::wrap(&key, self.exposure.delete_mapping_resource_config(&key)),
        }
    }

    fn enable_mapping(&self, mapping: &Mapping) -> Result<()> {
        let key = mapping.key();
        if self.exposure.resource_config(&key)?.is_some() {
            return Ok(());
        }
        let fields = self.schema.bundle_fields(&key)?;
        Self::wrap(
            &key,
            self.exposure.insert_mapping_resource_config(mapping, &fields),
        )
        .map(|_| ())
    }

    fn enable_field(&self, mapping: &Mapping, field: &PropertyMapping) -> Result<()> {
        Self::wrap(
            &mapping.key(),
            self.exposure.insert_field_config_resource(mapping, field),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::{BundleDefinition, FieldKind, MemoryConfigStore, MemorySchemaAdmin};

    struct Fixture {
        schema: Arc<MemorySchemaAdmin>,
        exposure: Arc<ConfigResourceExposure>,
        sync: ResourceSynchronizer,
    }

    fn fixture() -> Fixture {
        let schema = Arc::new(MemorySchemaAdmin::new());
        let key = BundleKey::new("node", "event");
        schema
            .create_bundle(&BundleDefinition {
                key: key.clone(),
                label: "Event".to_string(),
            })
            .unwrap();
        for (name, kind) in [
            ("title", FieldKind::PlainText),
            ("schema_start_date", FieldKind::DateTime),
            ("body", FieldKind::LongText),
        ] {
            schema
                .create_field(&FieldDefinition::new("node", name, kind))
                .unwrap();
            schema.attach_field(&key, name).unwrap();
        }
        let exposure = Arc::new(ConfigResourceExposure::new(Arc::new(MemoryConfigStore::new())));
        let sync = ResourceSynchronizer::new(exposure.clone(), schema.clone());
        Fixture {
            schema,
            exposure,
            sync,
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
    fn test_created_mapping_exposes_fields() {
        let f = fixture();
        f.sync
            .on_mapping_changed(&MappingEvent::Created(mapping()))
            .unwrap();

        let resource = f
            .exposure
            .resource_config(&BundleKey::new("node", "event"))
            .unwrap()
            .unwrap();
        assert_eq!(resource.resource_type, "node--event");
        assert_eq!(resource.path, "node/event");
        let enabled: Vec<_> = resource.enabled_fields().collect();
        assert_eq!(
            enabled,
            vec![("title", "name"), ("schema_start_date", "startDate")]
        );
        assert!(!resource.fields["body"].enabled);
        assert_eq!(resource.fields["body"].public_name, "body");
    }

    #[test]
    fn test_updated_mapping_disables_unmapped_field() {
        let f = fixture();
        f.sync
            .on_mapping_changed(&MappingEvent::Created(mapping()))
            .unwrap();

        let mut changed = mapping();
        changed.remove_property("startDate");
        f.sync
            .on_mapping_changed(&MappingEvent::Updated {
                mapping: changed,
                previous: mapping(),
            })
            .unwrap();

        let resource = f
            .exposure
            .resource_config(&BundleKey::new("node", "event"))
            .unwrap()
            .unwrap();
        assert!(!resource.fields["schema_start_date"].enabled);
        assert!(resource.fields["title"].enabled);
    }

    #[test]
    fn test_removed_mapping_drops_config() {
        let f = fixture();
        f.sync
            .on_mapping_changed(&MappingEvent::Created(mapping()))
            .unwrap();
        f.sync
            .on_mapping_changed(&MappingEvent::Removed(mapping()))
            .unwrap();
        assert!(
            f.exposure
                .resource_config(&BundleKey::new("node", "event"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_enable_calls_are_idempotent() {
        let f = fixture();
        let m = mapping();
        f.sync.enable_mapping(&m).unwrap();
        f.sync.enable_mapping(&m).unwrap();
        f.sync.enable_field(&m, &m.properties[1]).unwrap();
        let resource = f.exposure.resource_config(&m.key()).unwrap().unwrap();
        assert_eq!(resource.fields["schema_start_date"].public_name, "startDate");
        assert_eq!(f.schema.bundle_fields(&m.key()).unwrap().len(), 3);
    }

    #[test]
    fn test_insert_twice_is_resource_sync_error() {
        let f = fixture();
        let m = mapping();
        f.exposure.insert_mapping_resource_config(&m, &[]).unwrap();
        let err = f.exposure.insert_mapping_resource_config(&m, &[]).unwrap_err();
        assert!(matches!(err, Error::ResourceSync { .. }));
    }

    #[test]
    fn test_enable_field_without_config_fails() {
        let f = fixture();
        let m = mapping();
        let err = f.sync.enable_field(&m, &m.properties[0]).unwrap_err();
        assert!(matches!(err, Error::ResourceSync { .. }));
    }
}
