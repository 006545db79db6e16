//! profiles - serve and query catalogs of deployable profiles

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod catalog_cli;
mod serve;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Profile catalog service", long_about = None)]
struct Cli {
    /// Log level
    #[clap(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    json_logs: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile configured catalog sources and serve the query API
    Serve {
        /// Service configuration file
        #[clap(long, short)]
        config: PathBuf,

        /// Listen address (overrides the config file)
        #[clap(long)]
        listen: Option<String>,
    },

    /// Scan a single profile repository and print what it publishes
    Scan {
        /// Repository URL, e.g. https://github.com/org/profile
        url: String,

        /// Catalog source name to attribute entries to
        #[clap(long, default_value = "scan")]
        source: String,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search profiles by name across all configured sources
    Search {
        /// Substring of the profile name (lists everything when omitted)
        query: Option<String>,

        /// Service configuration file
        #[clap(long, short)]
        config: PathBuf,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show a single profile, optionally at a specific version
    Show {
        /// Catalog source name
        catalog: String,

        /// Profile name
        profile: String,

        /// Version tag
        #[clap(long)]
        version: Option<String>,

        /// Service configuration file
        #[clap(long, short)]
        config: PathBuf,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    // Logs go to stderr so stdout stays parseable with --json
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Command::Serve { config, listen } => serve::execute(&config, listen).await,
        Command::Scan { url, source, json } => catalog_cli::execute_scan(&url, &source, json).await,
        Command::Search {
            query,
            config,
            json,
        } => catalog_cli::execute_search(&config, query.as_deref(), json).await,
        Command::Show {
            catalog,
            profile,
            version,
            config,
            json,
        } => {
            catalog_cli::execute_show(&config, &catalog, &profile, version.as_deref(), json).await
        }
    }
}
