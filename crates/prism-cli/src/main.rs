//! Prism CLI
//!
//! Command-line interface for Prism documents: validation, export,
//! statistics, view recommendations and persisted undo history.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use prism_core::history::HistoryError;
use prism_core::{Config, SceneTemplate, StorageError, ViewType};

mod commands;
mod output;

use commands::export::ExportFormat;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Prism - one document, many views")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a document file for structural problems
    #[command(alias = "check")]
    Validate {
        /// Document JSON file
        file: PathBuf,
    },
    /// Export a document as JSON, HTML or Markdown
    Export {
        /// Document JSON file
        file: PathBuf,
        /// Target format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show document statistics
    Stats {
        /// Document JSON file
        file: PathBuf,
    },
    /// Recommend views for a scene
    Recommend {
        /// Scene template (writing, research, planning, ...)
        #[arg(short, long)]
        scene: Option<SceneTemplate>,
        /// Take the scene hint from this document
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Inspect or move through the persisted history
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List snapshots
    #[command(alias = "ls")]
    Show,
    /// Record a document file as a new snapshot
    Record {
        /// Document JSON file
        file: PathBuf,
        /// View the snapshot is tagged with
        #[arg(short, long)]
        view: Option<ViewType>,
    },
    /// Step back one snapshot
    Undo,
    /// Step forward one snapshot
    Redo,
    /// Write the current snapshot's document
    Restore {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete the persisted history
    Clear,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, log_file, default_scene, max_history_size, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output).await;
    if let Err(ref err) = result {
        if let Some(hint) = recovery_hint(err) {
            eprintln!("⚠ {}", hint);
        }
    }
    result
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands work on the raw file and must not fail on a broken one
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);
    debug!(data_dir = ?config.data_dir, "configuration loaded");

    match cli.command {
        Commands::Validate { file } => commands::validate::validate(&file, output),
        Commands::Export {
            file,
            format,
            output: out,
        } => commands::export::export(config, &file, format, out.as_deref(), output),
        Commands::Stats { file } => commands::stats::show(&file, output),
        Commands::Recommend { scene, file } => {
            commands::recommend::recommend(config, scene, file.as_deref(), output)
        }
        Commands::History { command } => handle_history_command(command, config, output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_history_command(
    command: Option<HistoryCommands>,
    config: Config,
    output: &Output,
) -> Result<()> {
    match command {
        Some(HistoryCommands::Show) | None => commands::history::show(config, output),
        Some(HistoryCommands::Record { file, view }) => {
            commands::history::record(config, &file, view, output).await
        }
        Some(HistoryCommands::Undo) => commands::history::undo(config, output),
        Some(HistoryCommands::Redo) => commands::history::redo(config, output),
        Some(HistoryCommands::Restore { output: out }) => {
            commands::history::restore(config, out.as_deref(), output)
        }
        Some(HistoryCommands::Clear) => commands::history::clear(config, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Suggestion for a storage failure anywhere in the error chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(storage) = cause.downcast_ref::<StorageError>() {
            return storage.recovery_suggestion();
        }
        match cause.downcast_ref::<HistoryError>() {
            Some(HistoryError::Storage(storage)) => storage.recovery_suggestion(),
            _ => None,
        }
    })
}

/// Initialize logging
///
/// Level comes from PRISM_LOG (default "warn"). Logs go to `config.log_file`
/// when set, stderr otherwise.
fn init_logging(config: &Config) {
    let level = std::env::var("PRISM_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::new(format!("prism_core={},prism_cli={}", level, level));

    let Some(ref log_path) = config.log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use prism_core::EditorError;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from(["prism", "export", "doc.json", "-f", "html", "--json"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Export { format, output, .. } => {
                assert_eq!(format, ExportFormat::Html);
                assert!(output.is_none());
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_parse_scene_and_view() {
        let cli = Cli::try_parse_from(["prism", "recommend", "--scene", "project-management"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Recommend {
                scene: Some(SceneTemplate::ProjectManagement),
                ..
            }
        ));

        let cli = Cli::try_parse_from(["prism", "history", "record", "d.json", "-v", "graph"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                command: Some(HistoryCommands::Record {
                    view: Some(ViewType::Graph),
                    ..
                })
            }
        ));

        assert!(Cli::try_parse_from(["prism", "recommend", "--scene", "nap"]).is_err());
    }

    #[test]
    fn test_recovery_hint_for_storage_failures() {
        let denied = StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("/data/history/current.json"),
        );
        let err = anyhow::Error::new(HistoryError::Storage(denied))
            .context("Failed to load history");
        assert_eq!(
            recovery_hint(&err),
            Some("Check file and directory permissions for the history directory.")
        );

        let full = StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::Other, "No space left on device"),
            PathBuf::from("/data/history/current.json"),
        );
        let err = anyhow::Error::new(EditorError::Storage(full)).context("Failed to save history");
        assert_eq!(recovery_hint(&err), Some("Free up disk space and try again."));
    }

    #[test]
    fn test_recovery_hint_absent_for_other_errors() {
        let err = anyhow::anyhow!("Document is invalid").context("Failed to validate");
        assert_eq!(recovery_hint(&err), None);

        let unavailable = StorageError::Unavailable("poisoned".to_string());
        assert_eq!(recovery_hint(&anyhow::Error::new(unavailable)), None);
    }
}
