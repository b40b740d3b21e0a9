//! JSON-LD retrieval endpoint.

use crate::builder::StructuredDataBuilder;
use crate::cache::{CacheKey, DocumentCache};
use crate::settings::JsonLdSettings;
use schemata_core::{ConfigStore, Error, RecordId, RecordStore, Result};
use schemata_mapping::MappingStore;
use std::sync::Arc;

/// Serves the JSON-LD document of a record, through the cache.
pub struct JsonLdEndpoint {
    records: Arc<dyn RecordStore>,
    config: Arc<dyn ConfigStore>,
    cache: Arc<DocumentCache>,
}

impl JsonLdEndpoint {
    /// Create an endpoint with its own cache.
    pub fn new(records: Arc<dyn RecordStore>, config: Arc<dyn ConfigStore>) -> Self {
        Self::with_cache(records, config, Arc::new(DocumentCache::new()))
    }

    /// Create an endpoint sharing a cache, e.g. one also registered as a
    /// mapping subscriber.
    pub fn with_cache(
        records: Arc<dyn RecordStore>,
        config: Arc<dyn ConfigStore>,
        cache: Arc<DocumentCache>,
    ) -> Self {
        Self {
            records,
            config,
            cache,
        }
    }

    /// The document cache.
    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// Current settings.
    pub fn settings(&self) -> Result<JsonLdSettings> {
        JsonLdSettings::load(self.config.as_ref())
    }

    /// Store new settings and drop every cached document.
    pub fn save_settings(&self, settings: &JsonLdSettings) -> Result<()> {
        settings.save(self.config.as_ref())?;
        self.cache.clear();
        Ok(())
    }

    /// Retrieve the JSON-LD of a record.
    ///
    /// # Errors
    ///
    /// `NotFound` when emission is disabled, the record does not exist, or
    /// its bundle has no mapping.
    pub fn retrieve(&self, id: &RecordId) -> Result<String> {
        let settings = self.settings()?;
        if !settings.enabled {
            return Err(Error::not_found("Structured data is disabled"));
        }

        let record = self
            .records
            .load(id)?
            .ok_or_else(|| Error::not_found(format!("Record '{id}'")))?;

        let key = CacheKey::for_record(&record, settings.max_depth);
        let records = &self.records;
        let cached = self
            .cache
            .get_fresh(&key, |dep| Ok(records.load(dep)?.map(|r| r.revision)))?;
        if let Some(json) = cached {
            log::debug!("serving cached structured data for {id}");
            return Ok(json.to_string());
        }

        let builder = StructuredDataBuilder::new(
            Arc::clone(&self.records),
            MappingStore::new(Arc::clone(&self.config)),
            settings,
        );
        let document = builder.build(&record).map_err(|e| match e {
            Error::UnmappedRecord { record, bundle } => {
                Error::not_found(format!("Record '{record}' (bundle '{bundle}' is not mapped)"))
            }
            other => other,
        })?;

        let json: Arc<str> = Arc::from(document.to_json_string());
        self.cache.insert(key, &document, Arc::clone(&json));
        Ok(json.to_string())
    }

    /// Drop cached documents that read a record.
    ///
    /// Stale entries are also caught on retrieval; this frees them early.
    pub fn invalidate_record(&self, id: &RecordId) -> usize {
        self.cache.invalidate_record(id)
    }
}
