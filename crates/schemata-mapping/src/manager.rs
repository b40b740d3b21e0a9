//! The mapping manager.
//!
//! [`MappingManager`] turns "map this vocabulary type onto this bundle" into
//! concrete structure: it creates or reuses the bundle and one field per
//! selected property, validates every field kind against the vocabulary,
//! persists the [`Mapping`], and tells subscribers about it.
//!
//! Every call is validated in full before anything is touched, then applied
//! inside a [`MigrationTransaction`] so a failure part-way leaves no trace.

use crate::migration::{MigrationLog, MigrationStep, MigrationTransaction};
use crate::model::{Mapping, MappingStore, PropertyMapping, Upsert};
use crate::naming;
use crate::subscriber::{MappingEvent, MappingSubscriber, SubscriberRegistry, SubscriberWarning};
use schemata_core::{
    BundleDefinition, BundleKey, Cardinality, ConfigStore, Error, FieldDefinition, FieldKind,
    Result, SchemaAdmin,
};
use schemata_vocab::{VocabularyGraph, VocabularyRepository};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// ============================================================================
// Requests
// ============================================================================

/// Target bundle of a mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleSpec {
    /// Entity kind.
    pub entity_type: String,
    /// Bundle name; derived from the type id when absent.
    pub bundle: Option<String>,
    /// Label for a newly created bundle; the type label when absent.
    pub label: Option<String>,
}

impl BundleSpec {
    /// Bundle of an entity kind, named after the mapped type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: None,
            label: None,
        }
    }

    /// Target an explicit bundle.
    pub fn existing(key: &BundleKey) -> Self {
        Self::new(&key.entity_type).with_bundle(&key.bundle)
    }

    /// Set the bundle name.
    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// Set the bundle label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn key_for(&self, type_id: &str) -> BundleKey {
        let bundle = self
            .bundle
            .clone()
            .unwrap_or_else(|| naming::bundle_name(type_id));
        BundleKey::new(&self.entity_type, bundle)
    }
}

/// One property chosen for mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertySelection {
    /// Vocabulary property id.
    pub property: String,
    /// Field to use; a `schema_*` field is generated when absent.
    pub field: Option<String>,
    /// Kind for a new field; the property's default kind when absent.
    pub kind: Option<FieldKind>,
}

impl PropertySelection {
    /// Select a property with generated field and default kind.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            field: None,
            kind: None,
        }
    }

    /// Use a specific field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Use a specific kind.
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl From<&str> for PropertySelection {
    fn from(property: &str) -> Self {
        Self::new(property)
    }
}

impl From<&PropertyMapping> for PropertySelection {
    fn from(pm: &PropertyMapping) -> Self {
        Self::new(&pm.property)
            .with_field(&pm.field)
            .with_kind(pm.kind)
    }
}

/// Options for a create or update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingOptions {
    /// Delete a field's storage when its property is re-mapped to another
    /// field. Off by default: the old field stays with its data.
    pub delete_replaced_fields: bool,
}

/// Options for [`MappingManager::remove_mapping`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Delete the mapped fields' storage and data. Off by default: fields
    /// stay on the bundle, only the mapping is removed.
    pub delete_fields: bool,
}

/// What a mapping call did.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingOutcome {
    /// The mapping after the call.
    pub mapping: Mapping,
    /// Whether the bundle was created.
    pub created_bundle: bool,
    /// Fields whose storage was created.
    pub created_fields: Vec<String>,
    /// Committed steps; empty when the call changed nothing.
    pub steps: Vec<MigrationStep>,
    /// Subscriber failures.
    pub warnings: Vec<SubscriberWarning>,
}

impl MappingOutcome {
    /// Whether the call changed nothing.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

// ============================================================================
// Planning
// ============================================================================

enum FieldAction {
    /// Already on the bundle.
    Keep,
    /// Storage exists on the entity kind; attach it.
    Attach,
    /// Create storage, then attach.
    Create(FieldDefinition),
}

struct PlannedProperty {
    mapping: PropertyMapping,
    action: FieldAction,
}

struct Plan {
    key: BundleKey,
    new_bundle: Option<BundleDefinition>,
    existing: Option<Mapping>,
    type_id: String,
    properties: Vec<PlannedProperty>,
    removed: Vec<String>,
}

// ============================================================================
// Manager
// ============================================================================

/// Creates, updates and removes mappings.
pub struct MappingManager {
    vocabulary: Arc<VocabularyRepository>,
    schema: Arc<dyn SchemaAdmin>,
    mappings: MappingStore,
    migrations: MigrationLog,
    subscribers: SubscriberRegistry,
}

impl std::fmt::Debug for MappingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingManager")
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

impl MappingManager {
    /// Create a manager over the host collaborators.
    pub fn new(
        vocabulary: Arc<VocabularyRepository>,
        schema: Arc<dyn SchemaAdmin>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            vocabulary,
            schema,
            mappings: MappingStore::new(Arc::clone(&config)),
            migrations: MigrationLog::new(config),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Register a subscriber (builder style).
    pub fn with_subscriber(
        mut self,
        key: impl Into<String>,
        subscriber: Arc<dyn MappingSubscriber>,
    ) -> Self {
        self.subscribers.register(key, subscriber);
        self
    }

    /// The vocabulary repository.
    pub fn vocabulary(&self) -> &Arc<VocabularyRepository> {
        &self.vocabulary
    }

    /// The schema administration collaborator.
    pub fn schema(&self) -> &Arc<dyn SchemaAdmin> {
        &self.schema
    }

    /// Mapping persistence.
    pub fn mappings(&self) -> &MappingStore {
        &self.mappings
    }

    /// The migration log.
    pub fn migrations(&self) -> &MigrationLog {
        &self.migrations
    }

    /// Registered subscribers.
    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    /// Registered subscribers, for startup registration.
    pub fn subscribers_mut(&mut self) -> &mut SubscriberRegistry {
        &mut self.subscribers
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The mapping of a bundle.
    pub fn get_mapping(&self, key: &BundleKey) -> Result<Option<Mapping>> {
        self.mappings.get(key)
    }

    /// All mappings.
    pub fn list_mappings(&self) -> Result<Vec<Mapping>> {
        self.mappings.list()
    }

    /// Mappings backed by a vocabulary type.
    pub fn mappings_for_type(&self, type_id: &str) -> Result<Vec<Mapping>> {
        self.mappings.for_type(type_id)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Map a vocabulary type onto a bundle.
    ///
    /// Creates the bundle if needed and one field per selected property.
    /// Calling again with the same arguments changes nothing. Fails with
    /// `DuplicateMapping` if the bundle is mapped to another type.
    pub fn create_mapping<S>(
        &self,
        type_id: &str,
        bundle: &BundleSpec,
        selections: impl IntoIterator<Item = S>,
        options: MappingOptions,
    ) -> Result<MappingOutcome>
    where
        S: Into<PropertySelection>,
    {
        let vocab = self.vocabulary.current();
        let vocab_type = vocab.require_type(type_id)?;
        let key = bundle.key_for(type_id);

        let existing = self.mappings.get(&key)?;
        if let Some(existing) = &existing
            && existing.type_id != type_id
        {
            return Err(Error::DuplicateMapping {
                bundle: key.to_string(),
                existing: existing.type_id.clone(),
                requested: type_id.to_string(),
            });
        }

        let new_bundle = if self.schema.bundle_exists(&key)? {
            None
        } else {
            Some(BundleDefinition {
                key: key.clone(),
                label: bundle
                    .label
                    .clone()
                    .unwrap_or_else(|| vocab_type.label.clone()),
            })
        };

        let selections: Vec<PropertySelection> = selections.into_iter().map(Into::into).collect();
        let plan = self.plan(&vocab, key, type_id, existing, new_bundle, &selections, &[])?;
        self.execute(plan, options, &format!("map {type_id} to bundle"))
    }

    /// Change the properties of an existing mapping.
    ///
    /// `selections` are merged into the mapping; `remove` unmaps properties
    /// (their fields stay on the bundle).
    pub fn update_mapping<S>(
        &self,
        key: &BundleKey,
        selections: impl IntoIterator<Item = S>,
        remove: &[String],
        options: MappingOptions,
    ) -> Result<MappingOutcome>
    where
        S: Into<PropertySelection>,
    {
        let existing = self
            .mappings
            .get(key)?
            .ok_or_else(|| Error::not_found(format!("Mapping for bundle '{key}'")))?;
        let vocab = self.vocabulary.current();
        vocab.require_type(&existing.type_id)?;

        let type_id = existing.type_id.clone();
        let selections: Vec<PropertySelection> = selections.into_iter().map(Into::into).collect();
        let plan = self.plan(
            &vocab,
            key.clone(),
            &type_id,
            Some(existing),
            None,
            &selections,
            remove,
        )?;
        self.execute(plan, options, &format!("update mapping of {key}"))
    }

    /// Remove a bundle's mapping.
    pub fn remove_mapping(&self, key: &BundleKey, options: RemovalOptions) -> Result<MappingOutcome> {
        let mapping = self
            .mappings
            .get(key)?
            .ok_or_else(|| Error::not_found(format!("Mapping for bundle '{key}'")))?;

        let mut tx = MigrationTransaction::begin(
            format!("remove mapping of {key}"),
            self.schema.as_ref(),
            &self.mappings,
        );
        tx.apply(MigrationStep::DeleteMapping {
            mapping: mapping.clone(),
        })?;
        if options.delete_fields {
            let fields: BTreeSet<&str> =
                mapping.properties.iter().map(|pm| pm.field.as_str()).collect();
            for field in fields {
                if let Some(step) = self.retire_field(key, field)? {
                    tx.apply(step)?;
                }
            }
        }
        let steps = tx.commit(&self.migrations)?;

        log::info!("removed mapping of {key} ({})", mapping.type_id);
        let warnings = self
            .subscribers
            .notify_changed(&MappingEvent::Removed(mapping.clone()));

        Ok(MappingOutcome {
            mapping,
            created_bundle: false,
            created_fields: Vec::new(),
            steps,
            warnings,
        })
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Validate selections and decide what to do for each. Touches nothing.
    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        vocab: &VocabularyGraph,
        key: BundleKey,
        type_id: &str,
        existing: Option<Mapping>,
        new_bundle: Option<BundleDefinition>,
        selections: &[PropertySelection],
        remove: &[String],
    ) -> Result<Plan> {
        let attached: BTreeSet<String> = if new_bundle.is_some() {
            BTreeSet::new()
        } else {
            self.schema
                .bundle_fields(&key)?
                .into_iter()
                .map(|f| f.name)
                .collect()
        };

        let mut properties: Vec<PlannedProperty> = Vec::new();
        // fields planned for creation by earlier selections, with their kind
        let mut claimed: BTreeMap<String, FieldKind> = BTreeMap::new();

        for (i, selection) in selections.iter().enumerate() {
            let property_id = selection.property.as_str();
            // a later selection of the same property wins
            if selections[i + 1..].iter().any(|s| s.property == property_id) {
                continue;
            }
            if !vocab.applies_to(type_id, property_id)? {
                return Err(Error::unknown_property(property_id, Some(type_id)));
            }
            let property = vocab.require_property(property_id)?;
            let compatible = vocab.compatible_field_kinds(property_id)?;

            let field = selection
                .field
                .clone()
                .or_else(|| {
                    existing
                        .as_ref()
                        .and_then(|m| m.get_property(property_id))
                        .map(|pm| pm.field.clone())
                })
                .unwrap_or_else(|| naming::field_name(property_id));

            let cardinality = if property.multi_valued {
                Cardinality::Multiple
            } else {
                Cardinality::Single
            };

            let storage = self.schema.field_storage(&key.entity_type, &field)?;
            let kind = match (&storage, claimed.get(&field)) {
                (Some(def), _) => def.kind,
                (None, Some(planned)) => *planned,
                (None, None) => selection.kind.unwrap_or(compatible[0]),
            };
            let kind_conflict = selection.kind.is_some_and(|k| k != kind);
            if kind_conflict || !compatible.contains(&kind) {
                return Err(Error::incompatible_field(
                    property_id,
                    &field,
                    selection.kind.unwrap_or(kind),
                ));
            }

            // recomputed on every apply so targets follow the vocabulary and
            // the set of mapped bundles
            let target_bundles = match (&storage, kind) {
                (_, FieldKind::EntityReference) => {
                    self.reference_targets(vocab, &key, type_id, property_id)?
                }
                (Some(def), _) => def.target_bundles.clone(),
                (None, _) => Vec::new(),
            };

            let action = match &storage {
                Some(_) if attached.contains(&field) => FieldAction::Keep,
                Some(_) => FieldAction::Attach,
                None if claimed.contains_key(&field) => FieldAction::Keep,
                None => FieldAction::Create(
                    FieldDefinition::new(&key.entity_type, &field, kind)
                        .with_cardinality(cardinality)
                        .with_label(property.label.clone())
                        .with_target_bundles(target_bundles.clone()),
                ),
            };
            if storage.is_none() {
                claimed.insert(field.clone(), kind);
            }

            properties.push(PlannedProperty {
                mapping: PropertyMapping::new(property_id, field, kind)
                    .with_cardinality(cardinality)
                    .with_target_bundles(target_bundles),
                action,
            });
        }

        let removed = remove
            .iter()
            .filter(|p| existing.as_ref().is_some_and(|m| m.get_property(p).is_some()))
            .cloned()
            .collect();

        Ok(Plan {
            key,
            new_bundle,
            existing,
            type_id: type_id.to_string(),
            properties,
            removed,
        })
    }

    /// Bundles of the same entity kind mapped to a range type of
    /// `property` or to one of its subtypes.
    fn reference_targets(
        &self,
        vocab: &VocabularyGraph,
        key: &BundleKey,
        type_id: &str,
        property: &str,
    ) -> Result<Vec<String>> {
        let mut accepted: BTreeSet<String> = BTreeSet::new();
        for range in vocab.reference_targets(property)? {
            accepted.insert(range.id.clone());
            for sub in vocab.subtypes_of(&range.id)? {
                accepted.insert(sub.id.clone());
            }
        }

        let mut bundles: BTreeSet<String> = self
            .mappings
            .list()?
            .into_iter()
            .filter(|m| m.entity_type == key.entity_type && accepted.contains(&m.type_id))
            .map(|m| m.bundle)
            .collect();
        if accepted.contains(type_id) {
            bundles.insert(key.bundle.clone());
        }
        Ok(bundles.into_iter().collect())
    }

    /// The step that takes `field` away from `key`: deleting the storage
    /// when no other bundle has it attached, else detaching it from `key`.
    fn retire_field(&self, key: &BundleKey, field: &str) -> Result<Option<MigrationStep>> {
        let Some(storage) = self.schema.field_storage(&key.entity_type, field)? else {
            return Ok(None);
        };
        let shared = self
            .schema
            .field_bundles(&key.entity_type, field)?
            .iter()
            .any(|other| other != key);
        if shared {
            log::info!("keeping {}.{field}: attached to other bundles", key.entity_type);
            Ok(Some(MigrationStep::DetachField {
                bundle: key.clone(),
                field: field.to_string(),
            }))
        } else {
            Ok(Some(MigrationStep::DeleteField {
                bundle: key.clone(),
                field: storage,
            }))
        }
    }

    fn execute(&self, plan: Plan, options: MappingOptions, label: &str) -> Result<MappingOutcome> {
        let Plan {
            key,
            new_bundle,
            existing,
            type_id,
            properties,
            removed,
        } = plan;

        let mut mapping = existing
            .clone()
            .unwrap_or_else(|| Mapping::new(&key, &type_id));
        let mut replaced: Vec<PropertyMapping> = Vec::new();
        let mut created_fields = Vec::new();
        let created_bundle = new_bundle.is_some();

        let mut tx = MigrationTransaction::begin(label, self.schema.as_ref(), &self.mappings);

        if let Some(bundle) = new_bundle {
            tx.apply(MigrationStep::CreateBundle { bundle })?;
        }

        for planned in properties {
            match planned.action {
                FieldAction::Keep => {}
                FieldAction::Attach => {
                    tx.apply(MigrationStep::AttachField {
                        bundle: key.clone(),
                        field: planned.mapping.field.clone(),
                    })?;
                }
                FieldAction::Create(field) => {
                    created_fields.push(field.name.clone());
                    tx.apply(MigrationStep::CreateField { field })?;
                    tx.apply(MigrationStep::AttachField {
                        bundle: key.clone(),
                        field: planned.mapping.field.clone(),
                    })?;
                }
            }
            if let Upsert::Replaced(old) = mapping.upsert(planned.mapping) {
                replaced.push(old);
            }
        }

        for property in &removed {
            mapping.remove_property(property);
        }

        if existing.as_ref() != Some(&mapping) {
            tx.apply(MigrationStep::SaveMapping {
                mapping: mapping.clone(),
                previous: existing.clone(),
            })?;
        }

        if options.delete_replaced_fields {
            for old in &replaced {
                if mapping.property_for_field(&old.field).is_some() {
                    continue;
                }
                if let Some(step) = self.retire_field(&key, &old.field)? {
                    tx.apply(step)?;
                }
            }
        }

        let steps = tx.commit(&self.migrations)?;

        let mut warnings = Vec::new();
        if !steps.is_empty() {
            log::info!(
                "{label}: {key} -> {type_id} ({} properties, {} steps)",
                mapping.properties.len(),
                steps.len()
            );
            let event = match existing {
                None => MappingEvent::Created(mapping.clone()),
                Some(previous) => MappingEvent::Updated {
                    mapping: mapping.clone(),
                    previous,
                },
            };
            let is_create = matches!(event, MappingEvent::Created(_));
            warnings.extend(self.subscribers.notify_changed(&event));
            if is_create {
                warnings.extend(self.subscribers.notify_enabled(&mapping, &created_fields));
            } else if !created_fields.is_empty() {
                warnings.extend(self.subscribers.notify_fields(&mapping, &created_fields));
            }
        } else {
            log::debug!("{label}: {key} unchanged");
        }

        Ok(MappingOutcome {
            mapping,
            created_bundle,
            created_fields,
            steps,
            warnings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
