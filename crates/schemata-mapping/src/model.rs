//! Mapping model and its persistence.
//!
//! A [`Mapping`] ties one bundle to one vocabulary type and lists, in
//! declared order, which field carries each mapped property. Mappings are
//! stored as named configuration objects under `schemata.mapping.{key}`.

use indexmap::IndexMap;
use schemata_core::{
    BundleKey, Cardinality, ConfigStore, FieldKind, Result, load_config, save_config,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration key prefix for stored mappings.
pub const MAPPING_PREFIX: &str = "schemata.mapping.";

// ============================================================================
// Types
// ============================================================================

/// One property-to-field association.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMapping {
    /// Vocabulary property id.
    pub property: String,
    /// Field machine name on the bundle.
    pub field: String,
    /// Storage kind of the field.
    pub kind: FieldKind,
    /// How many values are emitted.
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Bundles a reference field may target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_bundles: Vec<String>,
}

impl PropertyMapping {
    /// Create a single-valued property mapping.
    pub fn new(property: impl Into<String>, field: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            property: property.into(),
            field: field.into(),
            kind,
            cardinality: Cardinality::Single,
            target_bundles: Vec::new(),
        }
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Set the reference target bundles.
    pub fn with_target_bundles(mut self, bundles: Vec<String>) -> Self {
        self.target_bundles = bundles;
        self
    }
}

/// Result of merging a property mapping into a [`Mapping`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upsert {
    /// The identical entry was already present.
    Unchanged,
    /// A new entry was appended.
    Added,
    /// An existing entry for the property was replaced.
    Replaced(PropertyMapping),
}

/// The association between a vocabulary type and a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Entity kind of the bundle.
    pub entity_type: String,
    /// Bundle name.
    pub bundle: String,
    /// Vocabulary type id.
    pub type_id: String,
    /// Property mappings in declared order.
    #[serde(default)]
    pub properties: Vec<PropertyMapping>,
}

impl Mapping {
    /// Create a mapping with no properties.
    pub fn new(key: &BundleKey, type_id: impl Into<String>) -> Self {
        Self {
            entity_type: key.entity_type.clone(),
            bundle: key.bundle.clone(),
            type_id: type_id.into(),
            properties: Vec::new(),
        }
    }

    /// Builder-style property mapping.
    pub fn with_property(mut self, property: PropertyMapping) -> Self {
        self.upsert(property);
        self
    }

    /// The bundle this mapping belongs to.
    pub fn key(&self) -> BundleKey {
        BundleKey::new(&self.entity_type, &self.bundle)
    }

    /// Entry for a property.
    pub fn get_property(&self, property: &str) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.property == property)
    }

    /// Entry whose field is `field`.
    pub fn property_for_field(&self, field: &str) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.field == field)
    }

    /// Field names in declared order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.field.as_str())
    }

    /// Insert or replace the entry for a property, keeping its position.
    pub fn upsert(&mut self, property: PropertyMapping) -> Upsert {
        match self
            .properties
            .iter_mut()
            .find(|p| p.property == property.property)
        {
            Some(existing) if *existing == property => Upsert::Unchanged,
            Some(existing) => Upsert::Replaced(std::mem::replace(existing, property)),
            None => {
                self.properties.push(property);
                Upsert::Added
            }
        }
    }

    /// Remove the entry for a property.
    pub fn remove_property(&mut self, property: &str) -> Option<PropertyMapping> {
        let idx = self.properties.iter().position(|p| p.property == property)?;
        Some(self.properties.remove(idx))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Mapping persistence over a [`ConfigStore`].
#[derive(Clone)]
pub struct MappingStore {
    config: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingStore").finish_non_exhaustive()
    }
}

impl MappingStore {
    /// Create a store over a configuration backend.
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    /// Configuration key for a bundle's mapping.
    pub fn config_key(key: &BundleKey) -> String {
        format!("{MAPPING_PREFIX}{key}")
    }

    /// Read a bundle's mapping.
    pub fn get(&self, key: &BundleKey) -> Result<Option<Mapping>> {
        load_config(self.config.as_ref(), &Self::config_key(key))
    }

    /// Write a mapping.
    pub fn save(&self, mapping: &Mapping) -> Result<()> {
        save_config(self.config.as_ref(), &Self::config_key(&mapping.key()), mapping)
    }

    /// Delete a bundle's mapping.
    pub fn delete(&self, key: &BundleKey) -> Result<()> {
        self.config.delete(&Self::config_key(key))
    }

    /// All mappings, ordered by bundle key.
    pub fn list(&self) -> Result<Vec<Mapping>> {
        let mut mappings = Vec::new();
        for key in self.config.keys(MAPPING_PREFIX)? {
            if let Some(mapping) = load_config::<Mapping>(self.config.as_ref(), &key)? {
                mappings.push(mapping);
            }
        }
        Ok(mappings)
    }

    /// Mappings backed by a given vocabulary type.
    pub fn for_type(&self, type_id: &str) -> Result<Vec<Mapping>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| m.type_id == type_id)
            .collect())
    }

    /// Mappings grouped by entity kind.
    pub fn by_entity_type(&self) -> Result<IndexMap<String, Vec<Mapping>>> {
        let mut grouped: IndexMap<String, Vec<Mapping>> = IndexMap::new();
        for mapping in self.list()? {
            grouped
                .entry(mapping.entity_type.clone())
                .or_default()
                .push(mapping);
        }
        Ok(grouped)
    }
}

// ============================================================================
// Tests
// ============================================================================
