//! Command-line interface.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser, Debug)]
#[command(name = "scansync")]
#[command(about = "Synchronize scan transcriptions into a versioned text repository")]
#[command(version)]
pub struct Cli {
    /// Config file (default: discovered scansync.toml / scansync.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the transcription cache
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the image/transcription service
    #[arg(long, global = true, env = "SCANSYNC_SOURCE_URL")]
    pub source_url: Option<String>,

    /// Bearer token for the image/transcription service
    #[arg(long, global = true, env = "SCANSYNC_SOURCE_TOKEN", hide_env_values = true)]
    pub source_token: Option<String>,

    /// Base URL of the text repository
    #[arg(long, global = true, env = "SCANSYNC_TARGET_URL")]
    pub target_url: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import transcription versions for identifier records
    Import {
        #[command(flatten)]
        records: RecordArgs,

        /// Only import these output types (repeatable)
        #[arg(long = "type", value_name = "NAME")]
        types: Vec<String>,
    },

    /// Delete the documents of identifier records from the text repository
    Delete {
        #[command(flatten)]
        records: RecordArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Create the configured output types and list all types
    Types,

    /// Inspect or clear the transcription cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache location and size
    Stats,
    /// Remove every cached entry
    Purge,
}

/// Where identifier records come from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct RecordArgs {
    /// CSV file with an `identifier` column
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Identifier such as NL-HaNA_1.10.94_0455 (repeatable)
    #[arg(long = "identifier", value_name = "ID")]
    pub identifiers: Vec<String>,
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
        source_url: cli.source_url,
        source_token: cli.source_token,
        target_url: cli.target_url,
    })
    .await?;

    match cli.command {
        Commands::Import { records, types } => {
            commands::cmd_import(&settings, &records, &types).await
        }
        Commands::Delete { records, yes } => commands::cmd_delete(&settings, &records, yes).await,
        Commands::Types => commands::cmd_types(&settings).await,
        Commands::Cache { command } => match command {
            CacheCommands::Stats => commands::cmd_cache_stats(&settings),
            CacheCommands::Purge => commands::cmd_cache_purge(&settings),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_import() {
        let cli = Cli::try_parse_from([
            "scansync",
            "--data-dir",
            "/tmp/scansync",
            "import",
            "--identifier",
            "NL-HaNA_1.10.94_0455",
            "--identifier",
            "NL-HaNA_1.01.02_3097",
            "--type",
            "hocr",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/scansync")));
        match cli.command {
            Commands::Import { records, types } => {
                assert_eq!(records.identifiers.len(), 2);
                assert!(records.csv.is_none());
                assert_eq!(types, vec!["hocr".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_one_record_source() {
        assert!(Cli::try_parse_from(["scansync", "delete"]).is_err());
        assert!(Cli::try_parse_from([
            "scansync",
            "delete",
            "--csv",
            "records.csv",
            "--identifier",
            "NL-HaNA_1.10.94_0455",
        ])
        .is_err());
    }

    #[test]
    fn test_cli_parses_cache_purge() {
        let cli = Cli::try_parse_from(["scansync", "-v", "cache", "purge"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommands::Purge
            }
        ));
    }
}
