//! Tally CLI
//!
//! Main entry point for the tally command-line tool: index document stores
//! and business tables, answer questions with citations, and run aggregate
//! queries over table records.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AggregateCommand, AskCommand, DescribeCommand, IndexCommand};
use std::path::PathBuf;
use tally_core::{config::AppConfig, logging, AppResult};
use tracing::Instrument;

/// Tally - answers and aggregates over your documents and business data
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Answers and aggregates over documents and business data", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TALLY_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.tally/config.yaml)
    #[arg(short, long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index all configured sources into the search index
    Index(IndexCommand),

    /// Answer a question from indexed documents
    Ask(AskCommand),

    /// Resolve an aggregate or listing question over table records
    Aggregate(AggregateCommand),

    /// Show resolved metadata for a table
    Describe(DescribeCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Index(_) => "index",
            Commands::Ask(_) => "ask",
            Commands::Aggregate(_) => "aggregate",
            Commands::Describe(_) => "describe",
        }
    }

    async fn execute(self, config: &AppConfig) -> AppResult<()> {
        match self {
            Commands::Index(cmd) => cmd.execute(config).await,
            Commands::Ask(cmd) => cmd.execute(config).await,
            Commands::Aggregate(cmd) => cmd.execute(config).await,
            Commands::Describe(cmd) => cmd.execute(config).await,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(
        cli.workspace,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Tally CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Search backend: {}", config.search.backend);

    config.ensure_tally_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let command = cli.command;
    let config = &config;
    async move {
        let result = command.execute(config).await;
        match &result {
            Ok(_) => tracing::info!("Command completed successfully"),
            Err(e) => tracing::error!(error_class = e.class(), "Command failed: {}", e),
        }
        result
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tally",
            "ask",
            "How long do refunds take?",
            "--json",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.question, "How long do refunds take?");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_command_span_names() {
        let names: Vec<&str> = [
            vec!["tally", "index"],
            vec!["tally", "ask", "q"],
            vec!["tally", "aggregate", "count", "accounts"],
            vec!["tally", "describe", "account"],
        ]
        .iter()
        .map(|args| Cli::try_parse_from(args).unwrap().command.name())
        .collect();
        assert_eq!(names, vec!["index", "ask", "aggregate", "describe"]);
    }

    #[tokio::test]
    async fn test_failed_command_runs_inside_span() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp_dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let cli = Cli::try_parse_from(["tally", "describe", "account"]).unwrap();

        let span = tracing::info_span!("command", name = cli.command.name());
        let result = cli.command.execute(&config).instrument(span).await;

        assert!(matches!(result, Err(tally_core::AppError::Config(_))));
    }

    #[test]
    fn test_parse_aggregate_joins_words() {
        let cli = Cli::try_parse_from(["tally", "aggregate", "count", "accounts", "in", "2024"])
            .unwrap();
        match cli.command {
            Commands::Aggregate(cmd) => assert_eq!(cmd.text(), "count accounts in 2024"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
