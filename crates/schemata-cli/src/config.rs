//! Configuration for the Schemata CLI.
//!
//! Provides the [`SchemataConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `SCHEMATA_CONFIG` environment variable
//! 3. XDG default: `~/.config/schemata/config.toml`
//! 4. Built-in defaults

use confyg::{Confygery, env};
use schemata_core::traits::ConfigProvider;
use schemata_core::{Error, Result};
use schemata_jsonld::JsonLdSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the Schemata CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemataConfig {
    /// Project name, used for env var prefixes and default paths.
    pub project_name: String,

    /// Base path for all site data.
    pub base_path: Option<String>,

    /// Vocabulary catalog location.
    pub vocabulary: VocabularyConfig,

    /// Site snapshot location.
    pub site: SiteConfig,

    /// Structured-data defaults, applied to a site without stored settings.
    pub jsonld: JsonLdConfig,
}

/// Vocabulary catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Path to the types CSV.
    pub types: Option<String>,

    /// Path to the properties CSV.
    pub properties: Option<String>,
}

/// Site snapshot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Path to the site snapshot JSON.
    pub path: Option<String>,
}

/// Structured-data defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonLdConfig {
    /// Prefix of record identities.
    pub base_url: String,

    /// Value of the root `@context`.
    pub context: String,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for SchemataConfig {
    fn default() -> Self {
        Self {
            project_name: "schemata".to_string(),
            base_path: None,
            vocabulary: VocabularyConfig::default(),
            site: SiteConfig::default(),
            jsonld: JsonLdConfig::default(),
        }
    }
}

impl Default for JsonLdConfig {
    fn default() -> Self {
        let settings = JsonLdSettings::default();
        Self {
            base_url: settings.base_url,
            context: settings.context,
        }
    }
}

impl JsonLdConfig {
    /// Settings seeded from these defaults.
    pub fn to_settings(&self) -> JsonLdSettings {
        JsonLdSettings {
            context: self.context.clone(),
            ..JsonLdSettings::default().with_base_url(&self.base_url)
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl SchemataConfig {
    /// Load configuration from file, environment, and defaults.
    ///
    /// Loading priority:
    /// 1. Explicit `config_path` (from `--config` flag)
    /// 2. `SCHEMATA_CONFIG` env var
    /// 3. XDG default: `~/.config/schemata/config.toml`
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level("SCHEMATA");
        env_opts.add_section("vocabulary");
        env_opts.add_section("site");
        env_opts.add_section("jsonld");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        Ok(config)
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("SCHEMATA_CONFIG") {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("schemata").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `SCHEMATA_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, "SCHEMATA", &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for SchemataConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => std::env::current_dir()
                .map_err(|e| Error::config(format!("Could not determine base path: {e}"))),
        }
    }

    fn data_path(&self, kind: &str) -> Result<PathBuf> {
        let explicit = match kind {
            "types" => &self.vocabulary.types,
            "properties" => &self.vocabulary.properties,
            "site" => &self.site.path,
            _ => return Err(Error::config(format!("Unknown data kind: {kind}"))),
        };
        match explicit {
            Some(p) => Ok(PathBuf::from(p)),
            None => {
                let base = self.base_path()?;
                Ok(match kind {
                    "site" => base.join("site.json"),
                    _ => base.join("vocabulary").join(format!("{kind}.csv")),
                })
            }
        }
    }
}

// ============================================================================
// Helper: flatten TOML to env vars
// ============================================================================

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// RAII guard for env var manipulation in tests.
    pub(crate) struct EnvGuard {
        key: String,
        prev: Option<String>,
    }

    impl EnvGuard {
        pub(crate) fn new(key: &str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: test-only; guarded keys are unique per test.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                prev,
            }
        }

        pub(crate) fn remove(key: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: test-only; guarded keys are unique per test.
            unsafe { std::env::remove_var(key) };
            Self {
                key: key.to_string(),
                prev,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: restores the value captured in `new`/`remove`.
            unsafe {
                match &self.prev {
                    Some(val) => std::env::set_var(&self.key, val),
                    None => std::env::remove_var(&self.key),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Default tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_schemata_config_default() {
        let config = SchemataConfig::default();
        assert_eq!(config.project_name, "schemata");
        assert!(config.base_path.is_none());
        assert!(config.vocabulary.types.is_none());
        assert!(config.site.path.is_none());
        assert_eq!(config.jsonld.context, "https://schema.org");
        assert_eq!(config.jsonld.base_url, "http://localhost");
    }

    #[test]
    fn test_jsonld_config_to_settings() {
        let config = JsonLdConfig {
            base_url: "https://example.com".into(),
            context: "https://schema.org/".into(),
        };
        let settings = config.to_settings();
        assert!(settings.enabled);
        assert_eq!(settings.max_depth, 1);
        assert_eq!(settings.base_url, "https://example.com");
        assert_eq!(settings.context, "https://schema.org/");
    }

    // ------------------------------------------------------------------------
    // Serialization tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_schemata_config_from_toml() {
        let toml_str = r#"
            project_name = "my-site"
            base_path = "/srv/site"

            [vocabulary]
            types = "/srv/vocab/types.csv"

            [site]
            path = "/srv/site/state.json"

            [jsonld]
            base_url = "https://example.com"
        "#;

        let config: SchemataConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project_name, "my-site");
        assert_eq!(config.base_path.as_deref(), Some("/srv/site"));
        assert_eq!(config.vocabulary.types.as_deref(), Some("/srv/vocab/types.csv"));
        assert!(config.vocabulary.properties.is_none());
        assert_eq!(config.site.path.as_deref(), Some("/srv/site/state.json"));
        assert_eq!(config.jsonld.base_url, "https://example.com");
        assert_eq!(config.jsonld.context, "https://schema.org");
    }

    #[test]
    fn test_schemata_config_to_toml() {
        let config = SchemataConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("project_name = \"schemata\""));
        assert!(toml_str.contains("[jsonld]"));

        let parsed: SchemataConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.project_name, config.project_name);
        assert_eq!(parsed.jsonld.base_url, config.jsonld.base_url);
    }

    // ------------------------------------------------------------------------
    // Loading tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_schemata_config_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                project_name = "loaded-site"
                [site]
                path = "/tmp/site.json"
            "#,
        )
        .unwrap();

        let config = SchemataConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.project_name, "loaded-site");
        assert_eq!(config.site.path.as_deref(), Some("/tmp/site.json"));
    }

    #[test]
    fn test_schemata_config_load_defaults() {
        let config = SchemataConfig::load(Some("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.project_name, "schemata");
    }

    #[test]
    fn test_schemata_config_load_env_overlay() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [jsonld]
                base_url = "https://file.example.com"
            "#,
        )
        .unwrap();

        let _guard = EnvGuard::new("SCHEMATA_JSONLD_BASE_URL", "https://env.example.com");
        let config = SchemataConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.jsonld.base_url, "https://env.example.com");
    }

    // ------------------------------------------------------------------------
    // resolve_config_path tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_config_path_explicit() {
        let path = SchemataConfig::resolve_config_path(Some("/explicit/config.toml"));
        assert_eq!(path, Some(PathBuf::from("/explicit/config.toml")));
    }

    #[test]
    fn test_resolve_config_path_env_and_default() {
        {
            let _guard = EnvGuard::new("SCHEMATA_CONFIG", "/env/config.toml");
            let path = SchemataConfig::resolve_config_path(None);
            assert_eq!(path, Some(PathBuf::from("/env/config.toml")));
        }
        let _guard = EnvGuard::remove("SCHEMATA_CONFIG");
        let path = SchemataConfig::resolve_config_path(None).unwrap();
        assert!(path.to_str().unwrap().contains("schemata"));
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }

    // ------------------------------------------------------------------------
    // ConfigProvider tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_data_path_defaults_under_base() {
        let config = SchemataConfig {
            base_path: Some("/srv".into()),
            ..Default::default()
        };
        assert_eq!(
            config.data_path("types").unwrap(),
            PathBuf::from("/srv/vocabulary/types.csv")
        );
        assert_eq!(
            config.data_path("properties").unwrap(),
            PathBuf::from("/srv/vocabulary/properties.csv")
        );
        assert_eq!(config.data_path("site").unwrap(), PathBuf::from("/srv/site.json"));
        assert!(config.data_path("graphs").is_err());
    }

    #[test]
    fn test_data_path_explicit() {
        let config = SchemataConfig {
            vocabulary: VocabularyConfig {
                types: Some("/data/schemaorg-current-https-types.csv".into()),
                properties: None,
            },
            ..Default::default()
        };
        assert_eq!(
            config.data_path("types").unwrap(),
            PathBuf::from("/data/schemaorg-current-https-types.csv")
        );
    }

    // ------------------------------------------------------------------------
    // to_env_vars tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_schemata_config_to_env_vars() {
        let config = SchemataConfig::default();
        let vars = config.to_env_vars().unwrap();
        let map: HashMap<_, _> = vars.into_iter().collect();
        assert_eq!(map.get("SCHEMATA_PROJECT_NAME").unwrap(), "schemata");
        assert_eq!(
            map.get("SCHEMATA_JSONLD_CONTEXT").unwrap(),
            "https://schema.org"
        );
        assert!(!map.contains_key("SCHEMATA_BASE_PATH"));
    }

    #[test]
    fn test_schemata_config_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemataConfig>();
    }
}
