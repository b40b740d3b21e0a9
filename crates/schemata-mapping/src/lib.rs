//! Mapping engine for Schemata.
//!
//! Associates vocabulary types with content bundles, provisions the fields
//! that carry each mapped property, and keeps dependent configuration in
//! step with every change.
//!
//! # Modules
//!
//! - [`model`]: `Mapping` / `PropertyMapping` and their persistence
//! - [`manager`]: create, update and remove mappings transactionally
//! - [`migration`]: rollback-on-drop transactions and the replayable log
//! - [`subscriber`]: change notifications by capability key
//! - [`exposure`]: API resource configuration for mapped bundles
//! - [`update`]: the confirm-gated vocabulary update

pub mod exposure;
pub mod manager;
pub mod migration;
pub mod model;
pub mod naming;
pub mod subscriber;
pub mod update;

pub use exposure::{
    ConfigResourceExposure, ResourceConfig, ResourceExposure, ResourceField, ResourceSynchronizer,
};
pub use manager::{
    BundleSpec, MappingManager, MappingOptions, MappingOutcome, PropertySelection, RemovalOptions,
};
pub use migration::{MigrationEntry, MigrationLog, MigrationStep, MigrationTransaction, ReplayReport};
pub use model::{Mapping, MappingStore, PropertyMapping, Upsert};
pub use subscriber::{MappingEvent, MappingSubscriber, SubscriberRegistry, SubscriberWarning};
pub use update::{BundleFailure, UpdateReport, UpdateRequest, run_update};
