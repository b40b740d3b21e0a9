//! Structured-data (JSON-LD) emission for Schemata.
//!
//! Turns a content record into a JSON-LD document by following its bundle's
//! mapping: each mapped field becomes a vocabulary property, values are
//! normalized per storage kind, and referenced records are embedded up to a
//! configured depth.
//!
//! # Modules
//!
//! - [`builder`]: the recursive document builder
//! - [`document`]: the document model and its JSON rendering
//! - [`serialize`]: per-kind value normalization
//! - [`settings`]: emission settings stored in the configuration store
//! - [`cache`]: rendered-document cache with dependency invalidation
//! - [`endpoint`]: cached retrieval by record id

pub mod builder;
pub mod cache;
pub mod document;
pub mod endpoint;
pub mod serialize;
pub mod settings;

pub use builder::StructuredDataBuilder;
pub use cache::{CacheKey, CacheStats, DocumentCache};
pub use document::{DocValue, Node, StructuredDocument};
pub use endpoint::JsonLdEndpoint;
pub use serialize::strip_markup;
pub use settings::{JsonLdSettings, SETTINGS_KEY};
