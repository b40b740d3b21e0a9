//! The structured-data builder.
//!
//! Walks a record through its bundle's mapping and produces a
//! [`StructuredDocument`]. Referenced records are embedded while the depth
//! stays below `max_depth`; past that, and for any record already on the
//! current path, only an identity reference is emitted.

use crate::document::{DocValue, Node, StructuredDocument};
use crate::serialize;
use crate::settings::JsonLdSettings;
use schemata_core::{
    BundleKey, Cardinality, Error, FieldKind, FieldValue, Record, RecordId, RecordStore, Result,
};
use schemata_mapping::{Mapping, MappingStore, PropertyMapping};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Per-build state.
#[derive(Default)]
struct BuildContext {
    /// Records from the root down to the node being built.
    path: Vec<RecordId>,
    /// Every record looked up, with the revision read.
    dependencies: BTreeMap<RecordId, Option<u64>>,
    /// Mapping lookups, memoized for the duration of one build.
    mappings: HashMap<BundleKey, Option<Mapping>>,
}

/// Builds structured documents from mapped records.
pub struct StructuredDataBuilder {
    records: Arc<dyn RecordStore>,
    mappings: MappingStore,
    settings: JsonLdSettings,
}

impl StructuredDataBuilder {
    /// Create a builder.
    pub fn new(
        records: Arc<dyn RecordStore>,
        mappings: MappingStore,
        settings: JsonLdSettings,
    ) -> Self {
        Self {
            records,
            mappings,
            settings,
        }
    }

    /// The settings in effect.
    pub fn settings(&self) -> &JsonLdSettings {
        &self.settings
    }

    /// Build the document of a record.
    ///
    /// Fails with `UnmappedRecord` when the record's bundle has no mapping.
    pub fn build(&self, record: &Record) -> Result<StructuredDocument> {
        let mut ctx = BuildContext::default();
        let mapping = self
            .mapping_for(&mut ctx, &record.bundle_key())?
            .ok_or_else(|| Error::UnmappedRecord {
                record: record.id.to_string(),
                bundle: record.bundle_key().to_string(),
            })?;

        let root = self.build_node(record, &mapping, 0, &mut ctx)?;
        log::debug!(
            "built structured data for {} ({} records read)",
            record.id,
            ctx.dependencies.len()
        );

        Ok(StructuredDocument {
            context: self.settings.context.clone(),
            root,
            dependencies: ctx.dependencies,
        })
    }

    /// Load a record and build its document.
    pub fn build_id(&self, id: &RecordId) -> Result<StructuredDocument> {
        let record = self
            .records
            .load(id)?
            .ok_or_else(|| Error::not_found(format!("Record '{id}'")))?;
        self.build(&record)
    }

    fn mapping_for(&self, ctx: &mut BuildContext, key: &BundleKey) -> Result<Option<Mapping>> {
        if let Some(cached) = ctx.mappings.get(key) {
            return Ok(cached.clone());
        }
        let mapping = self.mappings.get(key)?;
        ctx.mappings.insert(key.clone(), mapping.clone());
        Ok(mapping)
    }

    fn build_node(
        &self,
        record: &Record,
        mapping: &Mapping,
        depth: usize,
        ctx: &mut BuildContext,
    ) -> Result<Node> {
        let mut node = Node::new(&mapping.type_id, self.settings.identity(&record.id));
        ctx.path.push(record.id.clone());
        ctx.dependencies
            .insert(record.id.clone(), Some(record.revision));

        for pm in &mapping.properties {
            let mut values = Vec::new();
            for value in record.values(&pm.field) {
                if let Some(converted) = self.convert(pm, value, depth, ctx)? {
                    values.push(converted);
                }
            }
            if let Some(value) = collapse(pm.cardinality, values) {
                node.properties.insert(pm.property.clone(), value);
            }
        }

        ctx.path.pop();
        Ok(node)
    }

    fn convert(
        &self,
        pm: &PropertyMapping,
        value: &FieldValue,
        depth: usize,
        ctx: &mut BuildContext,
    ) -> Result<Option<DocValue>> {
        match (pm.kind, value) {
            (FieldKind::EntityReference, FieldValue::Reference(target)) => {
                self.reference(target, depth, ctx)
            }
            (kind, value) => Ok(serialize::scalar(kind, value).map(DocValue::Scalar)),
        }
    }

    fn reference(
        &self,
        target: &RecordId,
        depth: usize,
        ctx: &mut BuildContext,
    ) -> Result<Option<DocValue>> {
        let identity = self.settings.identity(target);
        if ctx.path.contains(target) {
            return Ok(Some(DocValue::Reference(identity)));
        }

        let Some(referenced) = self.records.load(target)? else {
            log::debug!("omitting dangling reference to {target}");
            ctx.dependencies.insert(target.clone(), None);
            return Ok(None);
        };
        ctx.dependencies
            .insert(target.clone(), Some(referenced.revision));

        let Some(mapping) = self.mapping_for(ctx, &referenced.bundle_key())? else {
            return Ok(Some(DocValue::Reference(identity)));
        };

        if depth < self.settings.max_depth {
            let node = self.build_node(&referenced, &mapping, depth + 1, ctx)?;
            Ok(Some(DocValue::Node(Box::new(node))))
        } else {
            Ok(Some(DocValue::Reference(identity)))
        }
    }
}

/// Apply cardinality: single takes the first value, multiple emits a list
/// when there is more than one.
fn collapse(cardinality: Cardinality, mut values: Vec<DocValue>) -> Option<DocValue> {
    match (cardinality, values.len()) {
        (_, 0) => None,
        (Cardinality::Single, _) | (Cardinality::Multiple, 1) => Some(values.swap_remove(0)),
        (Cardinality::Multiple, _) => Some(DocValue::List(values)),
    }
}
