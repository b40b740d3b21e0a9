//! File-backed site state.
//!
//! The CLI keeps the host collaborators (bundles and fields, named
//! configuration, content records) in memory and persists them as one JSON
//! snapshot between invocations.

use schemata_core::{
    ConfigStore, Error, MemoryConfigStore, MemoryRecordStore, MemorySchemaAdmin, Record, Result,
    SchemaSnapshot,
};
use schemata_jsonld::{DocumentCache, JsonLdEndpoint, JsonLdSettings, SETTINGS_KEY};
use schemata_mapping::{ConfigResourceExposure, MappingManager, ResourceSynchronizer};
use schemata_vocab::VocabularyRepository;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serialized form of a site.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SiteSnapshot {
    /// Bundles, field storages and attachments.
    #[serde(default)]
    pub schema: SchemaSnapshot,
    /// Named configuration objects.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Content records.
    #[serde(default)]
    pub records: Vec<Record>,
}

/// An opened site.
pub struct Site {
    path: PathBuf,
    schema: Arc<MemorySchemaAdmin>,
    config: Arc<MemoryConfigStore>,
    records: Arc<MemoryRecordStore>,
    cache: Arc<DocumentCache>,
}

impl Site {
    /// Open the site at `path`; a missing file gives an empty site.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot: SiteSnapshot = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
            serde_json::from_str(&content)
                .map_err(|e| Error::parse(format!("Invalid site file {}: {e}", path.display())))?
        } else {
            log::debug!("no site at {}, starting empty", path.display());
            SiteSnapshot::default()
        };

        Ok(Self {
            schema: Arc::new(MemorySchemaAdmin::from_snapshot(snapshot.schema)?),
            config: Arc::new(MemoryConfigStore::from_snapshot(snapshot.config)),
            records: Arc::new(MemoryRecordStore::from_snapshot(snapshot.records)),
            cache: Arc::new(DocumentCache::new()),
            path,
        })
    }

    /// Where the site is persisted.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bundle and field administration.
    pub fn schema(&self) -> &Arc<MemorySchemaAdmin> {
        &self.schema
    }

    /// Named configuration.
    pub fn config(&self) -> &Arc<MemoryConfigStore> {
        &self.config
    }

    /// Content records.
    pub fn records(&self) -> &Arc<MemoryRecordStore> {
        &self.records
    }

    /// Store structured-data settings unless the site already has some.
    pub fn seed_settings(&self, defaults: &JsonLdSettings) -> Result<bool> {
        if self.config.get(SETTINGS_KEY)?.is_some() {
            return Ok(false);
        }
        defaults.save(self.config.as_ref())?;
        Ok(true)
    }

    /// A mapping manager over this site, with the resource synchronizer and
    /// the document cache subscribed.
    pub fn manager(&self, vocabulary: Arc<VocabularyRepository>) -> MappingManager {
        let exposure = Arc::new(ConfigResourceExposure::new(self.config.clone()));
        MappingManager::new(vocabulary, self.schema.clone(), self.config.clone())
            .with_subscriber(
                ResourceSynchronizer::KEY,
                Arc::new(ResourceSynchronizer::new(exposure, self.schema.clone())),
            )
            .with_subscriber(DocumentCache::KEY, self.cache.clone())
    }

    /// The JSON-LD endpoint of this site.
    pub fn endpoint(&self) -> JsonLdEndpoint {
        JsonLdEndpoint::with_cache(
            self.records.clone(),
            self.config.clone(),
            self.cache.clone(),
        )
    }

    /// Export the current state.
    pub fn snapshot(&self) -> SiteSnapshot {
        SiteSnapshot {
            schema: self.schema.snapshot(),
            config: self.config.snapshot(),
            records: self.records.snapshot(),
        }
    }

    /// Write the site back to its file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(&self.path, json).map_err(|e| Error::io_with_path(e, &self.path))?;
        log::debug!("saved site to {}", self.path.display());
        Ok(())
    }
}
