//! SchemataCli application.
//!
//! Wires the parsed command line to the site, the vocabulary and the
//! handlers.

use crate::cli::{CliArgs, Command};
use crate::config::SchemataConfig;
use crate::site::Site;
use crate::{config_handlers, handlers};
use schemata_core::Result;
use schemata_core::traits::ConfigProvider;
use schemata_jsonld::JsonLdSettings;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SchemataCli
// ============================================================================

/// CLI application parameterized over a config provider.
pub struct SchemataCli<C: ConfigProvider> {
    name: String,
    config: Arc<C>,
    version: String,
    jsonld_defaults: JsonLdSettings,
}

impl SchemataCli<SchemataConfig> {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = SchemataConfig::load(args.config.as_deref())?;
        let defaults = config.jsonld.to_settings();
        Ok(Self::new(name, config).with_jsonld_defaults(defaults))
    }
}

impl<C: ConfigProvider> SchemataCli<C> {
    /// Create a new CLI application.
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
            jsonld_defaults: JsonLdSettings::default(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Structured-data settings stored into a site that has none.
    pub fn with_jsonld_defaults(mut self, settings: JsonLdSettings) -> Self {
        self.jsonld_defaults = settings;
        self
    }

    /// Get a reference to the config provider.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` if set, otherwise a level from the verbosity flags.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Open the site named by the config.
    pub fn open_site(&self) -> Result<Site> {
        let site = Site::open(self.config.data_path("site")?)?;
        if site.seed_settings(&self.jsonld_defaults)? {
            tracing::debug!("seeded structured-data settings for {}", site.path().display());
        }
        Ok(site)
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);
        tracing::debug!(command = ?args.command, "dispatching");

        match args.command {
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Vocab(cmd)) => handlers::handle_vocab(&*self.config, cmd.command),
            Some(Command::Mapping(cmd)) => {
                let site = self.open_site()?;
                handlers::handle_mapping(&*self.config, &site, cmd.command)
            }
            Some(Command::Record(cmd)) => {
                let site = self.open_site()?;
                handlers::handle_record(&site, cmd.command)
            }
            Some(Command::Update { yes }) => {
                let site = self.open_site()?;
                handlers::handle_update(&*self.config, &site, yes)
            }
            Some(Command::Jsonld { record, pretty }) => {
                let site = self.open_site()?;
                println!("{}", handlers::render_jsonld(&site, &record, pretty)?);
                Ok(())
            }
            Some(Command::Config(cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), cmd.command)
            }
            None => {
                println!("{} {} (use --help for usage)", self.name, self.version);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliArgs;
    use clap::Parser;
    use schemata_core::{Error, RecordStore};
    use std::path::Path;
    use tempfile::TempDir;

    const TYPES: &str = "\
id,label,comment,subTypeOf,properties
https://schema.org/Thing,Thing,The most generic type.,,https://schema.org/name
https://schema.org/Place,Place,Entities with a location.,https://schema.org/Thing,
https://schema.org/Event,Event,Something that happens.,https://schema.org/Thing,
";

    const PROPERTIES: &str = "\
id,label,comment,domainIncludes,rangeIncludes,multiValued
https://schema.org/name,name,The name.,https://schema.org/Thing,https://schema.org/Text,
https://schema.org/startDate,startDate,Start.,https://schema.org/Event,https://schema.org/DateTime,
https://schema.org/location,location,Where.,https://schema.org/Event,\"https://schema.org/Place, https://schema.org/Text\",
";

    const RECORDS: &str = r#"[
        {
            "id": { "entity_type": "node", "id": "1" },
            "bundle": "event",
            "fields": {
                "schema_name": [{ "type": "text", "value": "Launch party" }],
                "schema_start_date": [{ "type": "text", "value": "2024-05-01T11:00:00+02:00" }],
                "schema_location": [{ "type": "reference", "value": { "entity_type": "node", "id": "2" } }]
            }
        },
        {
            "id": { "entity_type": "node", "id": "2" },
            "bundle": "place",
            "fields": { "schema_name": [{ "type": "text", "value": "Town hall" }] }
        }
    ]"#;

    fn write_vocabulary(base: &Path) {
        let dir = base.join("vocabulary");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("types.csv"), TYPES).unwrap();
        std::fs::write(dir.join("properties.csv"), PROPERTIES).unwrap();
    }

    fn test_cli(base: &Path) -> SchemataCli<SchemataConfig> {
        let config = SchemataConfig {
            base_path: Some(base.to_string_lossy().into_owned()),
            ..Default::default()
        };
        SchemataCli::new("schemata", config).with_jsonld_defaults(
            JsonLdSettings::default().with_base_url("https://example.com"),
        )
    }

    async fn run(cli: &SchemataCli<SchemataConfig>, argv: &[&str]) -> Result<()> {
        let args = CliArgs::parse_from(std::iter::once("schemata").chain(argv.iter().copied()));
        cli.run(args).await
    }

    // ------------------------------------------------------------------------
    // Basics
    // ------------------------------------------------------------------------

    #[test]
    fn test_schemata_cli_new() {
        let cli = SchemataCli::new("my-app", SchemataConfig::default()).with_version("1.2.3");
        assert_eq!(cli.name, "my-app");
        assert_eq!(cli.version, "1.2.3");
        assert_eq!(cli.config().project_name(), "schemata");
    }

    #[tokio::test]
    async fn test_run_version_and_no_command() {
        let dir = TempDir::new().unwrap();
        let cli = test_cli(dir.path());
        assert!(run(&cli, &["version"]).await.is_ok());
        assert!(run(&cli, &[]).await.is_ok());
    }

    #[test]
    fn test_init_logging_levels() {
        let cli = SchemataCli::new("test", SchemataConfig::default());
        cli.init_logging(false, false);
        cli.init_logging(true, false);
        cli.init_logging(false, true);
    }

    #[test]
    fn test_from_args_reads_jsonld_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[jsonld]\ncontext = \"https://schema.org/\"\n").unwrap();

        let args = CliArgs::parse_from(["test", "--config", path.to_str().unwrap()]);
        let cli = SchemataCli::from_args("schemata", &args).unwrap();
        assert_eq!(cli.jsonld_defaults.context, "https://schema.org/");
    }

    // ------------------------------------------------------------------------
    // Site workflow
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_vocab_commands() {
        let dir = TempDir::new().unwrap();
        write_vocabulary(dir.path());
        let cli = test_cli(dir.path());

        assert!(run(&cli, &["vocab", "stats"]).await.is_ok());
        assert!(run(&cli, &["vocab", "ancestors", "Event"]).await.is_ok());
        assert!(run(&cli, &["vocab", "kinds", "location"]).await.is_ok());
        let err = run(&cli, &["vocab", "properties", "Nope"]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
    }

    #[tokio::test]
    async fn test_vocab_missing_catalog() {
        let dir = TempDir::new().unwrap();
        let cli = test_cli(dir.path());
        let err = run(&cli, &["vocab", "stats"]).await.unwrap_err();
        assert!(matches!(err, Error::IoWithPath { .. }));
    }

    #[tokio::test]
    async fn test_mapping_import_and_jsonld() {
        let dir = TempDir::new().unwrap();
        write_vocabulary(dir.path());
        let cli = test_cli(dir.path());

        run(&cli, &["mapping", "create", "Place", "-b", "place", "-p", "name=schema_name"])
            .await
            .unwrap();
        run(
            &cli,
            &[
                "mapping",
                "create",
                "Event",
                "-b",
                "event",
                "-p",
                "name=schema_name",
                "-p",
                "startDate",
                "-p",
                "location=schema_location:entity_reference",
            ],
        )
        .await
        .unwrap();

        let records = dir.path().join("records.json");
        std::fs::write(&records, RECORDS).unwrap();
        run(&cli, &["record", "import", records.to_str().unwrap()])
            .await
            .unwrap();

        let site = cli.open_site().unwrap();
        assert_eq!(site.schema().bundle_count(), 2);
        assert!(
            site.records()
                .load(&schemata_core::RecordId::new("node", "2"))
                .unwrap()
                .is_some()
        );

        let json = handlers::render_jsonld(&site, "node/1", false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["@id"], "https://example.com/node/1");
        assert_eq!(value["startDate"], "2024-05-01T09:00:00Z");
        assert_eq!(value["location"]["name"], "Town hall");

        assert!(run(&cli, &["jsonld", "node/1", "--pretty"]).await.is_ok());
        assert!(run(&cli, &["mapping", "history"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_mapping_keeps_fields() {
        let dir = TempDir::new().unwrap();
        write_vocabulary(dir.path());
        let cli = test_cli(dir.path());

        run(&cli, &["mapping", "create", "Place", "-b", "place", "-p", "name"])
            .await
            .unwrap();
        run(&cli, &["mapping", "remove", "node--place"]).await.unwrap();

        let site = cli.open_site().unwrap();
        assert_eq!(site.schema().field_count(), 1);
        let err = run(&cli, &["mapping", "show", "node--place"]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        write_vocabulary(dir.path());
        let cli = test_cli(dir.path());

        run(&cli, &["mapping", "create", "Place", "-b", "place", "-p", "name"])
            .await
            .unwrap();
        let err = run(&cli, &["update"]).await.unwrap_err();
        assert!(matches!(err, Error::Aborted(_)));
        assert!(run(&cli, &["update", "--yes"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_config_command_dispatch() {
        let dir = TempDir::new().unwrap();
        let cli = test_cli(dir.path());
        let path = dir.path().join("config.toml");
        assert!(
            run(&cli, &["--config", path.to_str().unwrap(), "config", "path"])
                .await
                .is_ok()
        );
    }
}
