//! Host collaborator interfaces.
//!
//! Schemata never owns content storage. It consumes three narrow interfaces
//! from the host platform:
//!
//! - [`RecordStore`]: typed records with named fields
//! - [`SchemaAdmin`]: bundle and field administration
//! - [`ConfigStore`]: named configuration objects (JSON values by key)
//!
//! The value types that cross these boundaries ([`Record`], [`FieldValue`],
//! [`FieldDefinition`], ...) are defined here so every Schemata crate shares
//! one vocabulary for them. In-memory implementations live in
//! [`crate::memory`].

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Field kinds
// ============================================================================

/// Storage kind of a field.
///
/// Variant order is the default-choice precedence used when a property
/// admits several kinds: reference first, long text last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Reference to another record.
    EntityReference,
    /// Date or date-time.
    DateTime,
    /// Whole number.
    Integer,
    /// Decimal number.
    Decimal,
    /// True/false.
    Boolean,
    /// Single-line text.
    PlainText,
    /// Formatted multi-line text.
    LongText,
}

impl FieldKind {
    /// All kinds in precedence order.
    pub const ALL: [FieldKind; 7] = [
        FieldKind::EntityReference,
        FieldKind::DateTime,
        FieldKind::Integer,
        FieldKind::Decimal,
        FieldKind::Boolean,
        FieldKind::PlainText,
        FieldKind::LongText,
    ];

    /// Machine name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::EntityReference => "entity_reference",
            FieldKind::DateTime => "date_time",
            FieldKind::Integer => "integer",
            FieldKind::Decimal => "decimal",
            FieldKind::Boolean => "boolean",
            FieldKind::PlainText => "plain_text",
            FieldKind::LongText => "long_text",
        }
    }

    /// Parse a machine name.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::parse(format!("Unknown field kind: {s}")))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many values a field holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one value.
    #[default]
    Single,
    /// Any number of values.
    Multiple,
}

// ============================================================================
// Bundles and fields
// ============================================================================

/// Identifies a bundle: an entity kind plus a bundle name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BundleKey {
    /// Entity kind (e.g. `node`).
    pub entity_type: String,
    /// Bundle name (e.g. `event`).
    pub bundle: String,
}

impl BundleKey {
    /// Create a new bundle key.
    pub fn new(entity_type: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
        }
    }

    /// Parse the `entity--bundle` form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once("--") {
            Some((entity, bundle)) if !entity.is_empty() && !bundle.is_empty() => {
                Ok(Self::new(entity, bundle))
            }
            _ => Err(Error::parse(format!(
                "Expected 'entity--bundle', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}--{}", self.entity_type, self.bundle)
    }
}

/// A bundle as known to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    /// Bundle key.
    pub key: BundleKey,
    /// Human-readable label.
    pub label: String,
}

/// A field storage definition.
///
/// Storage is shared per entity kind: one field name has one kind and
/// cardinality across every bundle it is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Entity kind owning the storage.
    pub entity_type: String,
    /// Field machine name.
    pub name: String,
    /// Storage kind.
    pub kind: FieldKind,
    /// Cardinality.
    pub cardinality: Cardinality,
    /// Human-readable label.
    pub label: String,
    /// Bundles a reference field may point to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_bundles: Vec<String>,
}

impl FieldDefinition {
    /// Create a single-valued field definition.
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            entity_type: entity_type.into(),
            label: name.clone(),
            name,
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

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the reference target bundles.
    pub fn with_target_bundles(mut self, bundles: Vec<String>) -> Self {
        self.target_bundles = bundles;
        self
    }
}

// ============================================================================
// Records
// ============================================================================

/// Identifies a record: an entity kind plus an id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    /// Entity kind.
    pub entity_type: String,
    /// Record id within the entity kind.
    pub id: String,
}

impl RecordId {
    /// Create a new record id.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Parse the `entity/id` form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((entity, id)) if !entity.is_empty() && !id.is_empty() => {
                Ok(Self::new(entity, id))
            }
            _ => Err(Error::parse(format!("Expected 'entity/id', got '{s}'"))),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A single field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Text (plain or formatted).
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Decimal number.
    Decimal(f64),
    /// Boolean.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date-time with offset.
    DateTime(DateTime<FixedOffset>),
    /// Reference to another record.
    Reference(RecordId),
}

impl FieldValue {
    /// Shorthand for a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Shorthand for a reference value.
    pub fn reference(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Reference(RecordId::new(entity_type, id))
    }
}

/// A content record as read from the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity.
    pub id: RecordId,
    /// Bundle name within `id.entity_type`.
    pub bundle: String,
    /// Revision counter; bumps on every change.
    #[serde(default)]
    pub revision: u64,
    /// Language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Field values by field name, in storage order.
    #[serde(default)]
    pub fields: IndexMap<String, Vec<FieldValue>>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Record {
    /// Create an empty record.
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        bundle: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(entity_type, id),
            bundle: bundle.into(),
            revision: 1,
            language: default_language(),
            fields: IndexMap::new(),
        }
    }

    /// Set a field's values.
    pub fn with_field(mut self, name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        self.fields.insert(name.into(), values);
        self
    }

    /// Set the revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// The record's bundle key.
    pub fn bundle_key(&self) -> BundleKey {
        BundleKey::new(&self.id.entity_type, &self.bundle)
    }

    /// Values of a field; empty when the field is absent.
    pub fn values(&self, field: &str) -> &[FieldValue] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Generic content-record store.
pub trait RecordStore: Send + Sync {
    /// Read a record by id. `Ok(None)` if it does not exist.
    fn load(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Replace a field's values on a record, bumping its revision.
    fn write_field(&self, id: &RecordId, field: &str, values: Vec<FieldValue>) -> Result<()>;

    /// The bundle a record belongs to.
    fn bundle_of(&self, id: &RecordId) -> Result<Option<BundleKey>> {
        Ok(self.load(id)?.map(|r| r.bundle_key()))
    }
}

/// Generic bundle/field administration API.
pub trait SchemaAdmin: Send + Sync {
    /// Whether the bundle exists.
    fn bundle_exists(&self, key: &BundleKey) -> Result<bool>;

    /// Create a bundle.
    fn create_bundle(&self, bundle: &BundleDefinition) -> Result<()>;

    /// Delete a bundle and its field attachments.
    fn delete_bundle(&self, key: &BundleKey) -> Result<()>;

    /// Look up field storage on an entity kind.
    fn field_storage(&self, entity_type: &str, field: &str) -> Result<Option<FieldDefinition>>;

    /// Fields attached to a bundle, in attachment order.
    fn bundle_fields(&self, key: &BundleKey) -> Result<Vec<FieldDefinition>>;

    /// Bundles of an entity kind that have the field attached.
    fn field_bundles(&self, entity_type: &str, field: &str) -> Result<Vec<BundleKey>>;

    /// Create field storage.
    fn create_field(&self, field: &FieldDefinition) -> Result<()>;

    /// Attach existing field storage to a bundle.
    fn attach_field(&self, key: &BundleKey, field: &str) -> Result<()>;

    /// Detach a field from a bundle. Storage and data are kept.
    fn detach_field(&self, key: &BundleKey, field: &str) -> Result<()>;

    /// Delete field storage (and its data) from an entity kind.
    fn delete_field(&self, entity_type: &str, field: &str) -> Result<()>;
}

/// Generic named-configuration store.
pub trait ConfigStore: Send + Sync {
    /// Read a configuration object.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write a configuration object.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Delete a configuration object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read a configuration object and deserialize it.
pub fn load_config<T: DeserializeOwned>(store: &dyn ConfigStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::config(format!("Invalid configuration '{key}': {e}"))),
        None => Ok(None),
    }
}

/// Serialize a value and store it as a configuration object.
pub fn save_config<T: Serialize>(store: &dyn ConfigStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)?;
    store.set(key, json)
}
