//! CLI argument parsing and command definitions.
//!
//! The operator surface over a Schemata site: vocabulary inspection,
//! mapping administration, the vocabulary update, JSON-LD retrieval and
//! configuration management.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "SCHEMATA_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print version information.
    Version,

    /// Vocabulary inspection.
    Vocab(VocabCommand),

    /// Mapping administration.
    Mapping(MappingCommand),

    /// Content records held by the site.
    Record(RecordCommand),

    /// Reload the vocabulary and re-apply every mapping.
    Update {
        /// Confirm the update. Without it nothing is changed.
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the JSON-LD document of a record.
    Jsonld {
        /// Record id as `entity/id`.
        record: String,

        /// Indent the output.
        #[arg(long)]
        pretty: bool,
    },

    /// Configuration operations.
    Config(ConfigCommand),
}

// ----------------------------------------------------------------------------
// vocab
// ----------------------------------------------------------------------------

/// Vocabulary subcommands.
#[derive(Parser, Debug)]
pub struct VocabCommand {
    /// Vocabulary subcommand to execute.
    #[command(subcommand)]
    pub command: VocabSubcommand,
}

/// Available vocabulary subcommands.
#[derive(Subcommand, Debug)]
pub enum VocabSubcommand {
    /// Show vocabulary statistics.
    Stats,

    /// List the ancestors of a type, nearest first.
    Ancestors {
        /// Type id (e.g., "Event").
        type_id: String,
    },

    /// List the properties that apply to a type.
    Properties {
        /// Type id (e.g., "Event").
        type_id: String,
    },

    /// List the field kinds that can hold a property.
    Kinds {
        /// Property id (e.g., "startDate").
        property: String,
    },
}

// ----------------------------------------------------------------------------
// mapping
// ----------------------------------------------------------------------------

/// Mapping subcommands.
#[derive(Parser, Debug)]
pub struct MappingCommand {
    /// Mapping subcommand to execute.
    #[command(subcommand)]
    pub command: MappingSubcommand,
}

/// Available mapping subcommands.
#[derive(Subcommand, Debug)]
pub enum MappingSubcommand {
    /// Map a vocabulary type onto a bundle.
    Create {
        /// Type id (e.g., "Event").
        type_id: String,

        /// Entity kind of the bundle.
        #[arg(short, long, default_value = "node")]
        entity: String,

        /// Bundle name (derived from the type when omitted).
        #[arg(short, long)]
        bundle: Option<String>,

        /// Bundle label for a new bundle.
        #[arg(long)]
        label: Option<String>,

        /// Property to map: `property`, `property=field` or
        /// `property=field:kind`. Repeatable.
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Delete a field's storage when its property moves to another field.
        #[arg(long)]
        delete_replaced_fields: bool,
    },

    /// Change the properties of an existing mapping.
    Update {
        /// Bundle as `entity--bundle`.
        bundle: String,

        /// Property to map. Repeatable.
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Property to unmap. Repeatable.
        #[arg(short, long = "remove")]
        remove: Vec<String>,

        /// Delete a field's storage when its property moves to another field.
        #[arg(long)]
        delete_replaced_fields: bool,
    },

    /// List all mappings.
    List,

    /// Show one mapping.
    Show {
        /// Bundle as `entity--bundle`.
        bundle: String,
    },

    /// Remove a bundle's mapping.
    Remove {
        /// Bundle as `entity--bundle`.
        bundle: String,

        /// Also delete the mapped fields and their data.
        #[arg(long)]
        delete_fields: bool,
    },

    /// Show the migration log.
    History,
}

// ----------------------------------------------------------------------------
// record
// ----------------------------------------------------------------------------

/// Record subcommands.
#[derive(Parser, Debug)]
pub struct RecordCommand {
    /// Record subcommand to execute.
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

/// Available record subcommands.
#[derive(Subcommand, Debug)]
pub enum RecordSubcommand {
    /// Import records from a JSON array file.
    Import {
        /// Path to the JSON file.
        file: String,
    },

    /// List records.
    List,
}

// ----------------------------------------------------------------------------
// config
// ----------------------------------------------------------------------------

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "jsonld.base_url").
        key: String,
    },

    /// Set a configuration value by dotted key.
    Set {
        /// Dotted key (e.g., "jsonld.base_url").
        key: String,

        /// Value to set.
        value: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
