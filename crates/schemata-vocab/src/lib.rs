//! Vocabulary repository for Schemata.
//!
//! Loads the type/property catalog, validates it, and answers the questions
//! the mapping engine asks of it: ancestors, effective properties, and which
//! storage kinds can hold a property's values.
//!
//! # Key Abstractions
//!
//! - [`VocabularyGraph`]: immutable, indexed snapshot of the catalog
//! - [`VocabularyRepository`]: process-wide handle with atomic reload
//! - [`validate_catalog`]: coded errors and warnings for raw declarations

pub mod graph;
pub mod loader;
pub mod repository;
pub mod stats;
pub mod types;
pub mod validation;

pub use graph::{VocabularyBuilder, VocabularyGraph};
pub use loader::{VocabularySource, load_vocabulary, local_name, parse_catalog};
pub use repository::VocabularyRepository;
pub use stats::{VocabularyStats, compute_stats, quick_summary};
pub use types::{VocabularyProperty, VocabularyType, is_primitive, primitive_kinds};
pub use validation::{ValidationIssue, ValidationResult, is_valid, validate_catalog};
