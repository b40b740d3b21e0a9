//! Error types for Schemata operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all Schemata crates. Uses `thiserror` for derive macros.
//!
//! Variants fall in three groups:
//!
//! - **Validation** (`UnknownType`, `UnknownProperty`, `IncompatibleFieldKind`,
//!   `DuplicateMapping`): raised before any mutation is applied.
//! - **Lookup** (`UnmappedRecord`, `NotFound`): surfaced as not-found
//!   conditions to callers, never as internal faults.
//! - **Infrastructure** (`Io`, `Config`, `Parse`, ...): everything else.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in Schemata operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The vocabulary catalog is malformed or its type graph has a cycle.
    #[error("Vocabulary load failed: {0}")]
    VocabularyLoad(String),

    /// A vocabulary reload was requested while another one is running.
    #[error("A vocabulary reload is already in progress")]
    ReloadInProgress,

    /// The vocabulary has no type with this identifier.
    #[error("Unknown vocabulary type: {0}")]
    UnknownType(String),

    /// The property is not in the vocabulary, or does not apply to the type.
    #[error("Unknown vocabulary property: {property}{}", type_suffix(.type_id))]
    UnknownProperty {
        /// Property identifier.
        property: String,
        /// Type the property was selected for, if any.
        type_id: Option<String>,
    },

    /// The field's storage kind cannot hold any of the property's ranges.
    #[error("Field '{field}' of kind {kind} is incompatible with property '{property}'")]
    IncompatibleFieldKind {
        /// Property identifier.
        property: String,
        /// Field name.
        field: String,
        /// Offending field kind.
        kind: String,
    },

    /// The bundle is already mapped to another vocabulary type.
    #[error("Bundle '{bundle}' is already mapped to '{existing}' (requested '{requested}')")]
    DuplicateMapping {
        /// `entity--bundle` key.
        bundle: String,
        /// Type the bundle is currently mapped to.
        existing: String,
        /// Type that was requested.
        requested: String,
    },

    /// The record's bundle has no mapping.
    #[error("No mapping for bundle '{bundle}' of record '{record}'")]
    UnmappedRecord {
        /// Record identifier.
        record: String,
        /// `entity--bundle` key.
        bundle: String,
    },

    /// Synchronizing the exposed resource configuration failed.
    #[error("Resource sync failed for '{bundle}': {message}")]
    ResourceSync {
        /// `entity--bundle` key.
        bundle: String,
        /// Failure description.
        message: String,
    },

    /// The operator declined a confirm-gated operation.
    #[error("Operation aborted: {0}")]
    Aborted(String),

    /// Content not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A collaborator operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),
}

fn type_suffix(type_id: &Option<String>) -> String {
    match type_id {
        Some(t) => format!(" (for type '{t}')"),
        None => String::new(),
    }
}

impl Error {
    /// Create a vocabulary load error.
    pub fn vocabulary(msg: impl Into<String>) -> Self {
        Self::VocabularyLoad(msg.into())
    }

    /// Create an unknown type error.
    pub fn unknown_type(type_id: impl Into<String>) -> Self {
        Self::UnknownType(type_id.into())
    }

    /// Create an unknown property error, optionally naming the type.
    pub fn unknown_property(property: impl Into<String>, type_id: Option<&str>) -> Self {
        Self::UnknownProperty {
            property: property.into(),
            type_id: type_id.map(String::from),
        }
    }

    /// Create an incompatible field kind error.
    pub fn incompatible_field(
        property: impl Into<String>,
        field: impl Into<String>,
        kind: impl std::fmt::Display,
    ) -> Self {
        Self::IncompatibleFieldKind {
            property: property.into(),
            field: field.into(),
            kind: kind.to_string(),
        }
    }

    /// Create a resource sync error.
    pub fn resource_sync(bundle: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ResourceSync {
            bundle: bundle.into(),
            message: msg.into(),
        }
    }

    /// Create an aborted error.
    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an operation error.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Wrap a bare I/O error.
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err)
    }

    /// Wrap an I/O error together with the path that produced it.
    pub fn io_with_path(err: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source: err,
        }
    }

    /// True for conditions a retrieval endpoint reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnmappedRecord { .. })
    }

    /// True for validation failures raised before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownType(_)
                | Self::UnknownProperty { .. }
                | Self::IncompatibleFieldKind { .. }
                | Self::DuplicateMapping { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Schemata's Error type.
pub type Result<T> = std::result::Result<T, Error>;
