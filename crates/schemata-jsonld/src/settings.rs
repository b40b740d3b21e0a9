//! Structured-data output settings.

use schemata_core::{ConfigStore, RecordId, Result, load_config, save_config};
use serde::{Deserialize, Serialize};

/// Configuration key of the settings object.
pub const SETTINGS_KEY: &str = "schemata.jsonld";

/// Settings for JSON-LD emission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonLdSettings {
    /// Whether documents are emitted at all.
    pub enabled: bool,
    /// How many levels of referenced records are embedded.
    pub max_depth: usize,
    /// Prefix of record identities.
    pub base_url: String,
    /// Value of the root `@context`.
    pub context: String,
}

impl Default for JsonLdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 1,
            base_url: "http://localhost".to_string(),
            context: "https://schema.org".to_string(),
        }
    }
}

impl JsonLdSettings {
    /// Read the settings, falling back to defaults when none are stored.
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        Ok(load_config(store, SETTINGS_KEY)?.unwrap_or_default())
    }

    /// Store the settings.
    pub fn save(&self, store: &dyn ConfigStore) -> Result<()> {
        save_config(store, SETTINGS_KEY, self)
    }

    /// Identity IRI of a record: `{base_url}/{entity}/{id}`.
    pub fn identity(&self, record: &RecordId) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            record.entity_type,
            record.id
        )
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the maximum embedding depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
