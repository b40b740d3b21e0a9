//! Transactional structural changes and the migration log.
//!
//! Every bundle, field and mapping change made by the mapping manager runs
//! through a [`MigrationTransaction`]. Each [`MigrationStep`] is applied
//! through the host collaborators as soon as it is added, and carries what
//! is needed to undo it. Dropping a transaction without committing it undoes
//! the applied steps in reverse order. Committed steps are appended to the
//! [`MigrationLog`], which can replay them against another schema.

use crate::model::{Mapping, MappingStore};
use chrono::{DateTime, Utc};
use schemata_core::{
    BundleDefinition, BundleKey, ConfigStore, FieldDefinition, Result, SchemaAdmin, load_config,
    save_config,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration key holding the migration log.
pub const MIGRATIONS_KEY: &str = "schemata.migrations";

// ============================================================================
// Steps
// ============================================================================

/// One recorded structural change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationStep {
    /// A bundle was created.
    CreateBundle { bundle: BundleDefinition },
    /// Field storage was created.
    CreateField { field: FieldDefinition },
    /// Field storage was attached to a bundle.
    AttachField { bundle: BundleKey, field: String },
    /// Field was detached from a bundle; storage is kept.
    DetachField { bundle: BundleKey, field: String },
    /// Field storage was deleted after being detached from `bundle`, its
    /// only bundle.
    DeleteField {
        bundle: BundleKey,
        field: FieldDefinition,
    },
    /// A mapping was written; `previous` is what it replaced.
    SaveMapping {
        mapping: Mapping,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Mapping>,
    },
    /// A mapping was deleted.
    DeleteMapping { mapping: Mapping },
}

impl MigrationStep {
    /// Short description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateBundle { bundle } => format!("create bundle {}", bundle.key),
            Self::CreateField { field } => {
                format!("create field {}.{} ({})", field.entity_type, field.name, field.kind)
            }
            Self::AttachField { bundle, field } => format!("attach {field} to {bundle}"),
            Self::DetachField { bundle, field } => format!("detach {field} from {bundle}"),
            Self::DeleteField { bundle, field } => {
                format!("delete field {}.{} from {bundle}", field.entity_type, field.name)
            }
            Self::SaveMapping { mapping, .. } => {
                format!("save mapping {} -> {}", mapping.key(), mapping.type_id)
            }
            Self::DeleteMapping { mapping } => format!("delete mapping {}", mapping.key()),
        }
    }

    fn apply(&self, schema: &dyn SchemaAdmin, mappings: &MappingStore) -> Result<()> {
        match self {
            Self::CreateBundle { bundle } => schema.create_bundle(bundle),
            Self::CreateField { field } => schema.create_field(field),
            Self::AttachField { bundle, field } => schema.attach_field(bundle, field),
            Self::DetachField { bundle, field } => schema.detach_field(bundle, field),
            Self::DeleteField { bundle, field } => {
                schema.detach_field(bundle, &field.name)?;
                schema.delete_field(&field.entity_type, &field.name)
            }
            Self::SaveMapping { mapping, .. } => mappings.save(mapping),
            Self::DeleteMapping { mapping } => mappings.delete(&mapping.key()),
        }
    }

    fn undo(&self, schema: &dyn SchemaAdmin, mappings: &MappingStore) -> Result<()> {
        match self {
            Self::CreateBundle { bundle } => schema.delete_bundle(&bundle.key),
            Self::CreateField { field } => schema.delete_field(&field.entity_type, &field.name),
            Self::AttachField { bundle, field } => schema.detach_field(bundle, field),
            Self::DetachField { bundle, field } => schema.attach_field(bundle, field),
            Self::DeleteField { bundle, field } => {
                schema.create_field(field)?;
                schema.attach_field(bundle, &field.name)
            }
            Self::SaveMapping { mapping, previous } => match previous {
                Some(previous) => mappings.save(previous),
                None => mappings.delete(&mapping.key()),
            },
            Self::DeleteMapping { mapping } => mappings.save(mapping),
        }
    }

    /// Apply the step unless its effect is already present.
    ///
    /// Returns `false` when the step was skipped.
    fn replay(&self, schema: &dyn SchemaAdmin, mappings: &MappingStore) -> Result<bool> {
        let needed = match self {
            Self::CreateBundle { bundle } => !schema.bundle_exists(&bundle.key)?,
            Self::CreateField { field } => schema
                .field_storage(&field.entity_type, &field.name)?
                .is_none(),
            Self::AttachField { bundle, field } => !schema
                .bundle_fields(bundle)?
                .iter()
                .any(|f| &f.name == field),
            Self::DetachField { bundle, field } => schema
                .bundle_fields(bundle)?
                .iter()
                .any(|f| &f.name == field),
            Self::DeleteField { field, .. } => schema
                .field_storage(&field.entity_type, &field.name)?
                .is_some(),
            Self::SaveMapping { mapping, .. } => {
                mappings.get(&mapping.key())?.as_ref() != Some(mapping)
            }
            Self::DeleteMapping { mapping } => mappings.get(&mapping.key())?.is_some(),
        };
        if needed {
            self.apply(schema, mappings)?;
        }
        Ok(needed)
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// A scoped set of structural changes with rollback on drop.
pub struct MigrationTransaction<'a> {
    label: String,
    schema: &'a dyn SchemaAdmin,
    mappings: &'a MappingStore,
    steps: Vec<MigrationStep>,
    committed: bool,
}

impl<'a> MigrationTransaction<'a> {
    /// Begin a transaction.
    pub fn begin(
        label: impl Into<String>,
        schema: &'a dyn SchemaAdmin,
        mappings: &'a MappingStore,
    ) -> Self {
        let label = label.into();
        log::debug!("begin migration: {label}");
        Self {
            label,
            schema,
            mappings,
            steps: Vec::new(),
            committed: false,
        }
    }

    /// Apply a step and record it.
    pub fn apply(&mut self, step: MigrationStep) -> Result<()> {
        log::debug!("{}: {}", self.label, step.describe());
        step.apply(self.schema, self.mappings)?;
        self.steps.push(step);
        Ok(())
    }

    /// Steps applied so far.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Whether no step has been applied.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Record the steps in the log and keep their effects.
    ///
    /// An empty transaction commits without touching the log. If the log
    /// cannot be written the transaction rolls back.
    pub fn commit(mut self, journal: &MigrationLog) -> Result<Vec<MigrationStep>> {
        if !self.steps.is_empty() {
            journal.append(&self.label, self.steps.clone())?;
        }
        self.committed = true;
        log::debug!("commit migration: {} ({} steps)", self.label, self.steps.len());
        Ok(std::mem::take(&mut self.steps))
    }

    fn rollback(&mut self) {
        log::warn!(
            "rolling back migration '{}' ({} steps)",
            self.label,
            self.steps.len()
        );
        while let Some(step) = self.steps.pop() {
            if let Err(e) = step.undo(self.schema, self.mappings) {
                log::error!("failed to undo '{}': {e}", step.describe());
            }
        }
    }
}

impl Drop for MigrationTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.steps.is_empty() {
            self.rollback();
        }
    }
}

// ============================================================================
// Log
// ============================================================================

/// One committed transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MigrationEntry {
    /// Position in the log, starting at 1.
    pub sequence: u64,
    /// What the transaction did.
    pub label: String,
    /// Commit time.
    pub applied_at: DateTime<Utc>,
    /// Steps in application order.
    pub steps: Vec<MigrationStep>,
}

/// Outcome of [`MigrationLog::replay`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Steps whose effect was missing and has been applied.
    pub applied: usize,
    /// Steps already in effect.
    pub skipped: usize,
}

/// Persisted, append-only record of committed migrations.
#[derive(Clone)]
pub struct MigrationLog {
    config: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for MigrationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationLog").finish_non_exhaustive()
    }
}

impl MigrationLog {
    /// Create a log stored in a configuration backend.
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<MigrationEntry>> {
        Ok(load_config(self.config.as_ref(), MIGRATIONS_KEY)?.unwrap_or_default())
    }

    /// Number of entries.
    pub fn count(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    /// Append a committed transaction.
    pub fn append(&self, label: &str, steps: Vec<MigrationStep>) -> Result<MigrationEntry> {
        let mut entries = self.entries()?;
        let entry = MigrationEntry {
            sequence: entries.last().map_or(1, |e| e.sequence + 1),
            label: label.to_string(),
            applied_at: Utc::now(),
            steps,
        };
        entries.push(entry.clone());
        save_config(self.config.as_ref(), MIGRATIONS_KEY, &entries)?;
        Ok(entry)
    }

    /// Re-apply every logged step whose effect is missing.
    ///
    /// Steps are replayed in log order. Replaying twice is a no-op the
    /// second time.
    pub fn replay(&self, schema: &dyn SchemaAdmin, mappings: &MappingStore) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();
        for entry in self.entries()? {
            for step in &entry.steps {
                if step.replay(schema, mappings)? {
                    report.applied += 1;
                } else {
                    report.skipped += 1;
                }
            }
        }
        log::info!(
            "replayed migration log: {} applied, {} skipped",
            report.applied,
            report.skipped
        );
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyMapping;
    use schemata_core::{FieldKind, MemoryConfigStore, MemorySchemaAdmin};

    struct Fixture {
        schema: MemorySchemaAdmin,
        mappings: MappingStore,
        log: MigrationLog,
    }

    fn fixture() -> Fixture {
        let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::new());
        Fixture {
            schema: MemorySchemaAdmin::new(),
            mappings: MappingStore::new(Arc::clone(&config)),
            log: MigrationLog::new(config),
        }
    }

    fn event_key() -> BundleKey {
        BundleKey::new("node", "event")
    }

    fn event_steps() -> Vec<MigrationStep> {
        let field = FieldDefinition::new("node", "schema_start_date", FieldKind::DateTime);
        let mapping = Mapping::new(&event_key(), "Event").with_property(PropertyMapping::new(
            "startDate",
            "schema_start_date",
            FieldKind::DateTime,
        ));
        vec![
            MigrationStep::CreateBundle {
                bundle: BundleDefinition {
                    key: event_key(),
                    label: "Event".to_string(),
                },
            },
            MigrationStep::CreateField { field },
            MigrationStep::AttachField {
                bundle: event_key(),
                field: "schema_start_date".to_string(),
            },
            MigrationStep::SaveMapping {
                mapping,
                previous: None,
            },
        ]
    }

    // ------------------------------------------------------------------------
    // Transaction
    // ------------------------------------------------------------------------

    #[test]
    fn test_commit_keeps_effects_and_logs() {
        let f = fixture();
        let mut tx = MigrationTransaction::begin("map Event", &f.schema, &f.mappings);
        for step in event_steps() {
            tx.apply(step).unwrap();
        }
        let steps = tx.commit(&f.log).unwrap();

        assert_eq!(steps.len(), 4);
        assert!(f.schema.bundle_exists(&event_key()).unwrap());
        assert!(f.mappings.get(&event_key()).unwrap().is_some());

        let entries = f.log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 1);
        assert_eq!(entries[0].label, "map Event");
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let f = fixture();
        {
            let mut tx = MigrationTransaction::begin("map Event", &f.schema, &f.mappings);
            for step in event_steps() {
                tx.apply(step).unwrap();
            }
        }
        assert_eq!(f.schema.bundle_count(), 0);
        assert_eq!(f.schema.field_count(), 0);
        assert!(f.mappings.get(&event_key()).unwrap().is_none());
        assert_eq!(f.log.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_step_is_not_recorded() {
        let f = fixture();
        let mut tx = MigrationTransaction::begin("attach", &f.schema, &f.mappings);
        let err = tx.apply(MigrationStep::AttachField {
            bundle: event_key(),
            field: "missing".to_string(),
        });
        assert!(err.is_err());
        assert!(tx.is_empty());
    }

    #[test]
    fn test_rollback_restores_previous_mapping_and_deleted_field() {
        let f = fixture();
        let mut setup = MigrationTransaction::begin("setup", &f.schema, &f.mappings);
        for step in event_steps() {
            setup.apply(step).unwrap();
        }
        setup.commit(&f.log).unwrap();
        let original = f.mappings.get(&event_key()).unwrap().unwrap();
        let field = f
            .schema
            .field_storage("node", "schema_start_date")
            .unwrap()
            .unwrap();

        {
            let mut tx = MigrationTransaction::begin("remove", &f.schema, &f.mappings);
            tx.apply(MigrationStep::DeleteMapping {
                mapping: original.clone(),
            })
            .unwrap();
            tx.apply(MigrationStep::DeleteField {
                bundle: event_key(),
                field,
            })
            .unwrap();
            assert_eq!(f.schema.field_count(), 0);
        }

        assert_eq!(f.mappings.get(&event_key()).unwrap(), Some(original));
        assert_eq!(f.schema.bundle_fields(&event_key()).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_commit_skips_log() {
        let f = fixture();
        let tx = MigrationTransaction::begin("noop", &f.schema, &f.mappings);
        assert!(tx.commit(&f.log).unwrap().is_empty());
        assert_eq!(f.log.count().unwrap(), 0);
    }

    // ------------------------------------------------------------------------
    // Log
    // ------------------------------------------------------------------------

    #[test]
    fn test_replay_onto_fresh_schema() {
        let source = fixture();
        let mut tx = MigrationTransaction::begin("map Event", &source.schema, &source.mappings);
        for step in event_steps() {
            tx.apply(step).unwrap();
        }
        tx.commit(&source.log).unwrap();

        let target_schema = MemorySchemaAdmin::new();
        let target_mappings = MappingStore::new(Arc::new(MemoryConfigStore::new()));

        let first = source.log.replay(&target_schema, &target_mappings).unwrap();
        assert_eq!(first, ReplayReport { applied: 4, skipped: 0 });
        assert!(target_schema.bundle_exists(&event_key()).unwrap());
        assert!(target_mappings.get(&event_key()).unwrap().is_some());

        let second = source.log.replay(&target_schema, &target_mappings).unwrap();
        assert_eq!(second, ReplayReport { applied: 0, skipped: 4 });
    }

    #[test]
    fn test_append_sequence() {
        let f = fixture();
        f.log.append("one", Vec::new()).unwrap();
        let second = f.log.append("two", Vec::new()).unwrap();
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn test_step_serialization_tag() {
        let step = MigrationStep::AttachField {
            bundle: event_key(),
            field: "schema_name".to_string(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["op"], "attach_field");
        assert_eq!(json["bundle"]["bundle"], "event");
    }
}
