//! In-memory collaborator implementations.
//!
//! These back the test suites and the CLI's file-backed site snapshot. Each
//! store can export its contents as a serializable snapshot and be rebuilt
//! from one.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::store::{
    BundleDefinition, BundleKey, ConfigStore, FieldDefinition, FieldValue, Record, RecordId,
    RecordStore, SchemaAdmin,
};
use crate::{Error, Result};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Config store
// ============================================================================

/// Key-value configuration store held in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot.
    pub fn from_snapshot(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    /// Export all values.
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        read(&self.values).clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(read(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        write(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        write(&self.values).remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(read(&self.values)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Schema admin
// ============================================================================

/// Serializable state of a [`MemorySchemaAdmin`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Bundles in creation order.
    #[serde(default)]
    pub bundles: Vec<BundleDefinition>,
    /// Field storages in creation order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Attached field names per `entity--bundle` key.
    #[serde(default)]
    pub attachments: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct SchemaState {
    bundles: IndexMap<BundleKey, BundleDefinition>,
    fields: IndexMap<(String, String), FieldDefinition>,
    attachments: IndexMap<BundleKey, Vec<String>>,
}

/// Bundle and field administration held in memory.
#[derive(Debug, Default)]
pub struct MemorySchemaAdmin {
    state: RwLock<SchemaState>,
}

impl MemorySchemaAdmin {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot.
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Result<Self> {
        let mut state = SchemaState::default();
        for bundle in snapshot.bundles {
            state.bundles.insert(bundle.key.clone(), bundle);
        }
        for field in snapshot.fields {
            state
                .fields
                .insert((field.entity_type.clone(), field.name.clone()), field);
        }
        for (key, names) in snapshot.attachments {
            state.attachments.insert(BundleKey::parse(&key)?, names);
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Export the schema.
    pub fn snapshot(&self) -> SchemaSnapshot {
        let state = read(&self.state);
        SchemaSnapshot {
            bundles: state.bundles.values().cloned().collect(),
            fields: state.fields.values().cloned().collect(),
            attachments: state
                .attachments
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    /// Number of bundles.
    pub fn bundle_count(&self) -> usize {
        read(&self.state).bundles.len()
    }

    /// Number of field storages.
    pub fn field_count(&self) -> usize {
        read(&self.state).fields.len()
    }
}

impl SchemaAdmin for MemorySchemaAdmin {
    fn bundle_exists(&self, key: &BundleKey) -> Result<bool> {
        Ok(read(&self.state).bundles.contains_key(key))
    }

    fn create_bundle(&self, bundle: &BundleDefinition) -> Result<()> {
        let mut state = write(&self.state);
        if state.bundles.contains_key(&bundle.key) {
            return Err(Error::operation(format!(
                "Bundle '{}' already exists",
                bundle.key
            )));
        }
        state.bundles.insert(bundle.key.clone(), bundle.clone());
        log::debug!("created bundle {}", bundle.key);
        Ok(())
    }

    fn delete_bundle(&self, key: &BundleKey) -> Result<()> {
        let mut state = write(&self.state);
        if state.bundles.shift_remove(key).is_none() {
            return Err(Error::not_found(format!("Bundle '{key}'")));
        }
        state.attachments.shift_remove(key);
        log::debug!("deleted bundle {key}");
        Ok(())
    }

    fn field_storage(&self, entity_type: &str, field: &str) -> Result<Option<FieldDefinition>> {
        Ok(read(&self.state)
            .fields
            .get(&(entity_type.to_string(), field.to_string()))
            .cloned())
    }

    fn bundle_fields(&self, key: &BundleKey) -> Result<Vec<FieldDefinition>> {
        let state = read(&self.state);
        let names = state.attachments.get(key).cloned().unwrap_or_default();
        Ok(names
            .iter()
            .filter_map(|name| {
                state
                    .fields
                    .get(&(key.entity_type.clone(), name.clone()))
                    .cloned()
            })
            .collect())
    }

    fn field_bundles(&self, entity_type: &str, field: &str) -> Result<Vec<BundleKey>> {
        Ok(read(&self.state)
            .attachments
            .iter()
            .filter(|(key, attached)| {
                key.entity_type == entity_type && attached.iter().any(|f| f == field)
            })
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn create_field(&self, field: &FieldDefinition) -> Result<()> {
        let mut state = write(&self.state);
        let id = (field.entity_type.clone(), field.name.clone());
        if state.fields.contains_key(&id) {
            return Err(Error::operation(format!(
                "Field storage '{}.{}' already exists",
                field.entity_type, field.name
            )));
        }
        state.fields.insert(id, field.clone());
        log::debug!(
            "created field storage {}.{} ({})",
            field.entity_type,
            field.name,
            field.kind
        );
        Ok(())
    }

    fn attach_field(&self, key: &BundleKey, field: &str) -> Result<()> {
        let mut state = write(&self.state);
        if !state.bundles.contains_key(key) {
            return Err(Error::not_found(format!("Bundle '{key}'")));
        }
        if !state
            .fields
            .contains_key(&(key.entity_type.clone(), field.to_string()))
        {
            return Err(Error::not_found(format!(
                "Field storage '{}.{field}'",
                key.entity_type
            )));
        }
        let attached = state.attachments.entry(key.clone()).or_default();
        if !attached.iter().any(|f| f == field) {
            attached.push(field.to_string());
        }
        Ok(())
    }

    fn detach_field(&self, key: &BundleKey, field: &str) -> Result<()> {
        let mut state = write(&self.state);
        if let Some(attached) = state.attachments.get_mut(key) {
            attached.retain(|f| f != field);
        }
        Ok(())
    }

    fn delete_field(&self, entity_type: &str, field: &str) -> Result<()> {
        let mut state = write(&self.state);
        state
            .fields
            .shift_remove(&(entity_type.to_string(), field.to_string()));
        for (key, attached) in state.attachments.iter_mut() {
            if key.entity_type == entity_type {
                attached.retain(|f| f != field);
            }
        }
        log::debug!("deleted field storage {entity_type}.{field}");
        Ok(())
    }
}

// ============================================================================
// Record store
// ============================================================================

/// Record store held in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<IndexMap<RecordId, Record>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a list of records.
    pub fn from_snapshot(records: Vec<Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Export all records in insertion order.
    pub fn snapshot(&self) -> Vec<Record> {
        read(&self.records).values().cloned().collect()
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: Record) {
        write(&self.records).insert(record.id.clone(), record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        read(&self.records).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(read(&self.records).get(id).cloned())
    }

    fn write_field(&self, id: &RecordId, field: &str, values: Vec<FieldValue>) -> Result<()> {
        let mut records = write(&self.records);
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("Record '{id}'")))?;
        record.fields.insert(field.to_string(), values);
        record.revision += 1;
        Ok(())
    }
}
