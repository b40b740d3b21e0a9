//! The administrative vocabulary update.
//!
//! Reloads the vocabulary, then re-applies every stored mapping against the
//! new release: field kinds are re-validated, and cardinalities and the
//! mapping's reference targets are recomputed. Existing field storage keeps
//! its own settings. A bundle whose mapping no longer fits is reported, not
//! fatal.

use crate::manager::{BundleSpec, MappingManager, MappingOptions, PropertySelection};
use schemata_core::{Error, Result};
use schemata_vocab::{VocabularySource, quick_summary};
use serde::{Deserialize, Serialize};

/// Request to run the update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// The operator confirmed the update.
    pub confirmed: bool,
}

impl UpdateRequest {
    /// A confirmed request.
    pub fn confirmed() -> Self {
        Self { confirmed: true }
    }
}

/// A bundle whose mapping could not be re-applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFailure {
    /// `entity--bundle` key.
    pub bundle: String,
    /// Failure description.
    pub error: String,
}

/// Result of an update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Vocabulary generation after the reload.
    pub generation: u64,
    /// Summary of the new vocabulary.
    pub vocabulary: String,
    /// Bundles whose mapping changed.
    pub updated: Vec<String>,
    /// Bundles already in line with the new vocabulary.
    pub unchanged: Vec<String>,
    /// Bundles that failed to re-apply; their mapping is left as it was.
    pub failures: Vec<BundleFailure>,
    /// Subscriber warnings raised while re-applying.
    pub warnings: Vec<String>,
}

impl UpdateReport {
    /// Whether every mapping re-applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reload the vocabulary and re-apply every mapping.
///
/// Fails with `Aborted` and changes nothing unless the request is
/// confirmed. Load errors leave the previous vocabulary in place.
pub fn run_update(
    manager: &MappingManager,
    source: &VocabularySource,
    request: UpdateRequest,
) -> Result<UpdateReport> {
    if !request.confirmed {
        return Err(Error::aborted("vocabulary update was not confirmed"));
    }

    let vocab = manager.vocabulary().reload(source)?;
    let mut report = UpdateReport {
        generation: manager.vocabulary().generation(),
        vocabulary: quick_summary(&vocab),
        ..Default::default()
    };

    for mapping in manager.list_mappings()? {
        let key = mapping.key();
        let selections: Vec<PropertySelection> =
            mapping.properties.iter().map(PropertySelection::from).collect();

        match manager.create_mapping(
            &mapping.type_id,
            &BundleSpec::existing(&key),
            selections,
            MappingOptions::default(),
        ) {
            Ok(outcome) => {
                report.warnings.extend(
                    outcome
                        .warnings
                        .iter()
                        .map(|w| format!("{key}: {}: {}", w.subscriber, w.message)),
                );
                if outcome.is_noop() {
                    report.unchanged.push(key.to_string());
                } else {
                    report.updated.push(key.to_string());
                }
            }
            Err(e) => {
                log::warn!("could not re-apply mapping of {key}: {e}");
                report.failures.push(BundleFailure {
                    bundle: key.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "vocabulary update: {} updated, {} unchanged, {} failed",
        report.updated.len(),
        report.unchanged.len(),
        report.failures.len()
    );
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
