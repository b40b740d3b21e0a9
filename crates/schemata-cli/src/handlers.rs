//! Handler functions for the vocabulary, mapping, record, update and
//! JSON-LD commands.
//!
//! Handlers that change the site save it once the operation succeeds.

use crate::cli::{MappingSubcommand, RecordSubcommand, VocabSubcommand};
use crate::site::Site;
use schemata_core::traits::ConfigProvider;
use schemata_core::{BundleKey, Error, FieldKind, Record, RecordId, Result};
use schemata_mapping::{
    BundleSpec, MappingManager, MappingOptions, MappingOutcome, PropertySelection, RemovalOptions,
    UpdateRequest, run_update,
};
use schemata_vocab::{VocabularyRepository, VocabularySource, compute_stats};
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

/// The vocabulary catalog files named by the config.
pub fn vocabulary_source<C: ConfigProvider>(config: &C) -> Result<VocabularySource> {
    Ok(VocabularySource::files(
        config.data_path("types")?,
        config.data_path("properties")?,
    ))
}

fn load_vocabulary<C: ConfigProvider>(config: &C) -> Result<Arc<VocabularyRepository>> {
    Ok(Arc::new(VocabularyRepository::load(&vocabulary_source(config)?)?))
}

/// Parse `property`, `property=field` or `property=field:kind`.
pub fn parse_selection(spec: &str) -> Result<PropertySelection> {
    let (property, rest) = match spec.split_once('=') {
        Some((property, rest)) => (property.trim(), Some(rest.trim())),
        None => (spec.trim(), None),
    };
    if property.is_empty() {
        return Err(Error::parse(format!("Missing property in '{spec}'")));
    }

    let mut selection = PropertySelection::new(property);
    if let Some(rest) = rest {
        let (field, kind) = match rest.split_once(':') {
            Some((field, kind)) => (field.trim(), Some(kind.trim())),
            None => (rest, None),
        };
        if !field.is_empty() {
            selection = selection.with_field(field);
        }
        if let Some(kind) = kind {
            selection = selection.with_kind(FieldKind::parse(kind)?);
        }
    }
    Ok(selection)
}

fn parse_selections(specs: &[String]) -> Result<Vec<PropertySelection>> {
    specs.iter().map(|s| parse_selection(s)).collect()
}

fn print_outcome(outcome: &MappingOutcome) {
    if outcome.is_noop() {
        println!("No changes for {}.", outcome.mapping.key());
        return;
    }
    println!("{} -> {}", outcome.mapping.key(), outcome.mapping.type_id);
    for step in &outcome.steps {
        println!("  {}", step.describe());
    }
    for warning in &outcome.warnings {
        println!("  WARN  [{}]: {}", warning.subscriber, warning.message);
    }
}

// ============================================================================
// vocab
// ============================================================================

/// Handle a vocabulary subcommand.
pub fn handle_vocab<C: ConfigProvider>(config: &C, command: VocabSubcommand) -> Result<()> {
    let repository = load_vocabulary(config)?;
    let vocab = repository.current();

    match command {
        VocabSubcommand::Stats => {
            let stats = compute_stats(&vocab);
            println!("Vocabulary statistics:");
            if let Some(version) = vocab.version() {
                println!("  Release:             {version}");
            }
            println!("  Types:               {}", stats.type_count);
            println!("  Properties:          {}", stats.property_count);
            println!("  Inheritance edges:   {}", stats.inheritance_edges);
            println!("  Root types:          {}", stats.root_types.join(", "));
            println!("  Leaf types:          {}", stats.leaf_count);
            println!("  Max depth:           {}", stats.max_depth);
            println!("  Reference props:     {}", stats.reference_properties);
            if let Some((id, count)) = &stats.widest_type {
                println!("  Widest type:         {id} ({count} subtypes)");
            }
            if !stats.range_distribution.is_empty() {
                println!("\nRange distribution:");
                for (range, count) in &stats.range_distribution {
                    println!("  {range:<20} {count}");
                }
            }
        }
        VocabSubcommand::Ancestors { type_id } => {
            for ancestor in vocab.ancestors_of(&type_id)? {
                println!("{}", ancestor.id);
            }
        }
        VocabSubcommand::Properties { type_id } => {
            for property in vocab.effective_properties_of(&type_id)? {
                println!("{:<24} {}", property.id, property.range_includes.join(", "));
            }
        }
        VocabSubcommand::Kinds { property } => {
            for kind in vocab.compatible_field_kinds(&property)? {
                println!("{kind}");
            }
        }
    }
    Ok(())
}

// ============================================================================
// mapping
// ============================================================================

/// Handle a mapping subcommand against the site.
pub fn handle_mapping<C: ConfigProvider>(
    config: &C,
    site: &Site,
    command: MappingSubcommand,
) -> Result<()> {
    match command {
        MappingSubcommand::Create {
            type_id,
            entity,
            bundle,
            label,
            properties,
            delete_replaced_fields,
        } => {
            let manager = site.manager(load_vocabulary(config)?);
            let mut spec = BundleSpec::new(entity);
            if let Some(bundle) = bundle {
                spec = spec.with_bundle(bundle);
            }
            if let Some(label) = label {
                spec = spec.with_label(label);
            }
            let outcome = manager.create_mapping(
                &type_id,
                &spec,
                parse_selections(&properties)?,
                MappingOptions {
                    delete_replaced_fields,
                },
            )?;
            print_outcome(&outcome);
            site.save()
        }
        MappingSubcommand::Update {
            bundle,
            properties,
            remove,
            delete_replaced_fields,
        } => {
            let manager = site.manager(load_vocabulary(config)?);
            let outcome = manager.update_mapping(
                &BundleKey::parse(&bundle)?,
                parse_selections(&properties)?,
                &remove,
                MappingOptions {
                    delete_replaced_fields,
                },
            )?;
            print_outcome(&outcome);
            site.save()
        }
        MappingSubcommand::List => {
            let manager = site.manager(Arc::default());
            let mappings = manager.list_mappings()?;
            if mappings.is_empty() {
                println!("No mappings.");
            }
            for mapping in mappings {
                println!(
                    "{:<32} {:<20} {} properties",
                    mapping.key().to_string(),
                    mapping.type_id,
                    mapping.properties.len()
                );
            }
            Ok(())
        }
        MappingSubcommand::Show { bundle } => {
            let manager = site.manager(Arc::default());
            let key = BundleKey::parse(&bundle)?;
            let mapping = manager
                .get_mapping(&key)?
                .ok_or_else(|| Error::not_found(format!("Mapping for bundle '{key}'")))?;
            println!("{} -> {}", key, mapping.type_id);
            for pm in &mapping.properties {
                println!(
                    "  {:<24} {:<28} {:<16} {:?}",
                    pm.property,
                    pm.field,
                    pm.kind.as_str(),
                    pm.cardinality
                );
            }
            Ok(())
        }
        MappingSubcommand::Remove {
            bundle,
            delete_fields,
        } => {
            let manager = site.manager(Arc::default());
            let outcome =
                manager.remove_mapping(&BundleKey::parse(&bundle)?, RemovalOptions { delete_fields })?;
            print_outcome(&outcome);
            site.save()
        }
        MappingSubcommand::History => {
            let manager = site.manager(Arc::default());
            for entry in manager.migrations().entries()? {
                println!(
                    "#{:<4} {}  {}",
                    entry.sequence,
                    entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.label
                );
                for step in &entry.steps {
                    println!("        {}", step.describe());
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// record
// ============================================================================

/// Handle a record subcommand against the site.
pub fn handle_record(site: &Site, command: RecordSubcommand) -> Result<()> {
    match command {
        RecordSubcommand::Import { file } => {
            let content = std::fs::read_to_string(&file).map_err(|e| Error::io_with_path(e, &file))?;
            let records: Vec<Record> = serde_json::from_str(&content)
                .map_err(|e| Error::parse(format!("Invalid records in {file}: {e}")))?;
            let count = records.len();
            for record in records {
                site.records().insert(record);
            }
            println!("Imported {count} record(s).");
            site.save()
        }
        RecordSubcommand::List => {
            for record in site.records().snapshot() {
                println!("{:<16} {:<20} rev {}", record.id.to_string(), record.bundle, record.revision);
            }
            Ok(())
        }
    }
}

// ============================================================================
// update
// ============================================================================

/// Reload the vocabulary and re-apply every mapping of the site.
pub fn handle_update<C: ConfigProvider>(config: &C, site: &Site, confirmed: bool) -> Result<()> {
    let manager: MappingManager = site.manager(Arc::default());
    let report = run_update(
        &manager,
        &vocabulary_source(config)?,
        UpdateRequest { confirmed },
    )?;

    println!("Vocabulary: {} (generation {})", report.vocabulary, report.generation);
    println!("  Updated:   {}", report.updated.len());
    println!("  Unchanged: {}", report.unchanged.len());
    for failure in &report.failures {
        println!("  FAILED [{}]: {}", failure.bundle, failure.error);
    }
    for warning in &report.warnings {
        println!("  WARN  {warning}");
    }
    site.save()?;

    if report.is_clean() {
        Ok(())
    } else {
        Err(Error::operation(format!(
            "{} bundle(s) could not be updated",
            report.failures.len()
        )))
    }
}

// ============================================================================
// jsonld
// ============================================================================

/// Render the JSON-LD of a record.
pub fn render_jsonld(site: &Site, record: &str, pretty: bool) -> Result<String> {
    let json = site.endpoint().retrieve(&RecordId::parse(record)?)?;
    if pretty {
        let value: serde_json::Value = serde_json::from_str(&json)?;
        Ok(serde_json::to_string_pretty(&value)?)
    } else {
        Ok(json)
    }
}

// ============================================================================
// Tests
// ============================================================================
