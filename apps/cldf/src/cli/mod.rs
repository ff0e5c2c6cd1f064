//! # CLDF CLI Module
//!
//! ## Available Commands
//!
//! - `validate` - Integrity report for each archive
//! - `info` - Manifest and collection counts
//! - `merge` - Combine archives into one
//! - `clid generate` / `clid parse` - Work with global identifiers
//! - `assign-clids` - Fill in missing identifiers and rewrite the archive

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use cldf_core::{CldfError, Codec, CodecConfig, DigestAlgorithm, EntityType, Mode};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// CLDF - Climbing Log Data Format tool
///
/// Reads, validates, merges and writes CLDF climbing-log archives.
#[derive(Parser, Debug)]
#[command(name = "cldf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Codec configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Degrade integrity and referential failures into warnings
    #[arg(long, global = true, conflicts_with = "strict")]
    pub lenient: bool,

    /// Abort on the first integrity or referential failure (default)
    #[arg(long, global = true)]
    pub strict: bool,

    /// Digest for written archives
    #[arg(long, global = true, value_enum)]
    pub digest: Option<DigestArg>,

    /// Indent JSON documents in written archives
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Digest choices on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestArg {
    Sha256,
    Blake3,
}

impl From<DigestArg> for DigestAlgorithm {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Sha256 => Self::Sha256,
            DigestArg::Blake3 => Self::Blake3,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate archives and print an integrity report for each
    Validate {
        /// Archive files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show manifest and collection counts
    Info {
        /// Archive file
        file: PathBuf,
    },

    /// Merge archives into one
    Merge {
        /// Input archives, in priority order (first wins on conflicts)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate or inspect CLIDs
    Clid {
        #[command(subcommand)]
        action: ClidAction,
    },

    /// Give every record that lacks a CLID one, then rewrite the archive
    AssignClids {
        /// Input archive
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClidAction {
    /// Generate random CLIDs
    Generate {
        /// Entity type (location, sector, route, session, climb, media, ascent)
        #[arg(value_parser = parse_entity_type)]
        entity: EntityType,

        /// How many to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Parse a CLID and show its parts
    Parse {
        /// CLID text
        text: String,
    },
}

fn parse_entity_type(text: &str) -> Result<EntityType, String> {
    EntityType::from_segment(text).ok_or_else(|| {
        let valid: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown entity type '{text}'; valid values: {}", valid.join(", "))
    })
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Effective codec configuration: file (if any), then flags.
pub fn resolve_config(cli: &Cli) -> Result<CodecConfig, CldfError> {
    let mut config = match &cli.config {
        Some(path) => CodecConfig::load(path)?,
        None => CodecConfig::default(),
    };
    if cli.lenient {
        config.mode = Mode::Lenient;
    } else if cli.strict {
        config.mode = Mode::Strict;
    }
    if let Some(digest) = cli.digest {
        config.digest = digest.into();
    }
    if cli.pretty {
        config.pretty = true;
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
///
/// `Ok(false)` means the command ran but found problems (an invalid archive,
/// an unparseable CLID).
pub fn execute(cli: Cli) -> Result<bool, CldfError> {
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "codec configuration");
    let codec = Codec::new(config);
    let json = cli.json;

    match cli.command {
        Commands::Validate { files } => cmd_validate(&codec, &files, json),
        Commands::Info { file } => cmd_info(&codec, &file, json).map(|()| true),
        Commands::Merge { inputs, output } => {
            cmd_merge(&codec, &inputs, &output, json).map(|()| true)
        }
        Commands::Clid { action } => match action {
            ClidAction::Generate { entity, count } => {
                cmd_clid_generate(entity, count, json);
                Ok(true)
            }
            ClidAction::Parse { text } => Ok(cmd_clid_parse(&text, json)),
        },
        Commands::AssignClids { input, output } => {
            cmd_assign_clids(&codec, &input, &output).map(|()| true)
        }
    }
}
