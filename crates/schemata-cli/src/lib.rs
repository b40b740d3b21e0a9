//! Operator CLI for Schemata sites.
//!
//! Loads the vocabulary catalog, manages bundle mappings against a
//! file-backed site and renders JSON-LD for its records.
//!
//! # Key Abstractions
//!
//! - `SchemataCli<C>`: CLI application parameterized over a config provider
//! - `Site`: the persisted bundles, configuration and records
//! - `SchemataConfig`: confyg-backed configuration (file, env, defaults)

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod handlers;
pub mod site;

pub use app::SchemataCli;
pub use cli::{CliArgs, Command};
pub use config::SchemataConfig;
pub use site::{Site, SiteSnapshot};
