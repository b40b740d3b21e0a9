//! Core traits for host abstraction.
//!
//! The primary trait is [`ConfigProvider`], which abstracts where a host
//! keeps its Schemata data: the vocabulary catalog and the site state.
//! Collaborator traits for records, bundles and configuration live in
//! [`crate::store`].

use std::path::PathBuf;

use crate::Result;

/// Trait for host-specific configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across threads
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use schemata_core::traits::ConfigProvider;
/// use schemata_core::Result;
///
/// #[derive(Clone)]
/// struct SiteConfig {
///     data_dir: PathBuf,
/// }
///
/// impl ConfigProvider for SiteConfig {
///     fn project_name(&self) -> &str {
///         "my-site"
///     }
///
///     fn base_path(&self) -> Result<PathBuf> {
///         Ok(self.data_dir.clone())
///     }
///
///     fn data_path(&self, kind: &str) -> Result<PathBuf> {
///         Ok(self.data_dir.join(kind))
///     }
/// }
/// ```
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Base path for all project data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn base_path(&self) -> Result<PathBuf>;

    /// Path for a specific kind of data.
    ///
    /// `kind` is one of `"types"`, `"properties"` (the two vocabulary
    /// catalog files) or `"site"` (the site snapshot). Implementations
    /// may reject other kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is unknown or the path cannot be
    /// resolved.
    fn data_path(&self, kind: &str) -> Result<PathBuf>;
}
