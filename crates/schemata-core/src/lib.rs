//! Schemata Core: shared types, errors, and collaborator traits.
//!
//! This crate provides the foundational types used across all Schemata
//! crates. It has no internal Schemata dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`store`]: Host collaborator traits and the values crossing them
//! - [`memory`]: In-memory collaborator implementations
//! - [`traits`]: Host configuration abstraction

pub mod error;
pub mod memory;
pub mod store;
pub mod traits;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use memory::{MemoryConfigStore, MemoryRecordStore, MemorySchemaAdmin, SchemaSnapshot};
pub use store::{
    BundleDefinition, BundleKey, Cardinality, ConfigStore, FieldDefinition, FieldKind,
    FieldValue, Record, RecordId, RecordStore, SchemaAdmin, load_config, save_config,
};
pub use traits::ConfigProvider;
