//! CLI command definitions for workerscope.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::InspectorConfig;
use crate::directory::ManagerDirectory;
use crate::lookup::{LookupOptions, LookupResponse};
use crate::metrics::init_metrics;
use crate::server::{self, AppState};
use crate::store::RedisStore;

/// Worker pool introspection for Redis-backed job queues.
#[derive(Parser)]
#[command(name = "workerscope")]
#[command(about = "Inspect running workers, queue backlogs and retries of a job pool")]
#[command(version)]
#[command(
    long_about = "workerscope reports what a worker pool is doing: jobs on live workers, pending queue lengths, retry set size and the processed/failed counters.\n\nThe standalone binary runs outside the worker process, so its worker directory stays idle: stats list no active jobs and lookups only find jobs in the retry set. To report live jobs, embed the server in the worker process with server::router and AppState::new.\n\nExample usage:\n  workerscope --config workerscope.yaml serve\n  workerscope lookup default order-17"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file. Environment variables override its values.
    #[arg(short, long, env = "WORKERSCOPE_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Serve the stats, lookup and metrics endpoints over HTTP.
    Serve {
        /// Bind address, overriding the configured one.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Print one stats report as JSON.
    Stats {
        /// Print on a single line instead of pretty-printing.
        #[arg(long)]
        compact: bool,
    },

    /// Look a job up by its first string argument.
    Lookup {
        /// Queue whose live workers are scanned.
        queue: String,

        /// Identifier to match against job arguments.
        identifier: String,

        /// Only scan live workers.
        #[arg(long)]
        no_retry: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { listen } => {
            run_serve_command(config, listen).await?;
        }
        Commands::Stats { compact } => {
            run_stats_command(config, compact).await?;
        }
        Commands::Lookup {
            queue,
            identifier,
            no_retry,
        } => {
            run_lookup_command(config, &queue, &identifier, no_retry).await?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<InspectorConfig> {
    let config = match path {
        Some(path) => InspectorConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => InspectorConfig::from_env().context("Failed to load configuration")?,
    };

    if config.queues.is_empty() {
        warn!("No queues configured, stats will only contain the global counters");
    }
    Ok(config)
}

/// Builds the state shared by every command from the configured queues.
async fn build_state(config: &InspectorConfig) -> anyhow::Result<AppState> {
    let directory = ManagerDirectory::from_queues(
        config
            .queues
            .iter()
            .map(|queue| (queue.name.clone(), queue.concurrency)),
    );
    let store = RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.redis_url))?;

    info!(
        redis_url = %config.redis_url,
        namespace = %config.namespace,
        queues = directory.len(),
        "Connected to job store"
    );

    Ok(AppState::new(Arc::new(directory), Arc::new(store), config))
}

async fn run_serve_command(config: InspectorConfig, listen: Option<String>) -> anyhow::Result<()> {
    init_metrics().context("Failed to initialize metrics")?;

    let listen_addr = listen.unwrap_or_else(|| config.listen_addr.clone());
    let state = build_state(&config).await?;
    server::serve(&listen_addr, Arc::new(state)).await
}

async fn run_stats_command(config: InspectorConfig, compact: bool) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let report = state.stats.generate().await;

    let output = if compact {
        serde_json::to_string(&report)?
    } else {
        report.to_pretty_json()?
    };
    println!("{}", output);
    Ok(())
}

async fn run_lookup_command(
    config: InspectorConfig,
    queue: &str,
    identifier: &str,
    no_retry: bool,
) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let options = LookupOptions {
        scan_retry_set: config.scan_retry_set && !no_retry,
    };

    let result = state.lookup.find_with(queue, identifier, options).await;
    if let Err(e) = &result {
        warn!(queue = %queue, identifier = %identifier, error = %e, "Identifier lookup failed");
    }

    let response = LookupResponse::from_result(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_command_defaults() {
        let cli = Cli::try_parse_from(["workerscope", "serve"]).expect("should parse");

        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Serve { listen } => assert!(listen.is_none()),
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_lookup_command_with_options() {
        let cli = Cli::try_parse_from([
            "workerscope",
            "--log-level",
            "debug",
            "lookup",
            "default",
            "order-17",
            "--no-retry",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Lookup {
                queue,
                identifier,
                no_retry,
            } => {
                assert_eq!(queue, "default");
                assert_eq!(identifier, "order-17");
                assert!(no_retry);
            }
            _ => panic!("Expected Lookup command"),
        }
    }

    #[test]
    fn test_lookup_requires_identifier() {
        assert!(Cli::try_parse_from(["workerscope", "lookup", "default"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["workerscope", "stats", "--compact", "-c", "ws.yaml"])
            .expect("should parse");

        assert_eq!(cli.config, Some(PathBuf::from("ws.yaml")));
        assert!(matches!(cli.command, Commands::Stats { compact: true }));
    }

    #[test]
    fn test_help_explains_live_state_needs_embedding() {
        let help = Cli::command()
            .get_long_about()
            .map(|about| about.to_string())
            .unwrap_or_default();

        assert!(help.contains("worker directory stays idle"));
        assert!(help.contains("AppState::new"));
    }
}
