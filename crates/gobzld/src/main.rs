//! gobzld: GOPATH overlay daemon for Bazel workspaces
//!
//! Usage:
//!   gobzld [--workspace .] [--config <workspace>/.gobzl.toml]
//!
//! Mounts `$GOPATH/src` as a view of the workspace (under the configured
//! package prefix) and its vendor directories, and rebuilds on change.

mod daemon;
mod dirs;
mod hooks;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use gobzl_core::config::{GobzlConfig, CONFIG_FILE_NAME};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gobzld", version, about = "GOPATH overlay for Bazel workspaces")]
struct Cli {
    /// Bazel workspace root
    #[arg(long, short = 'w', env = "GOBZL_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Path to the configuration file (default: <workspace>/.gobzl.toml)
    #[arg(long, short = 'c', env = "GOBZL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(long, env = "GOBZL_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config
    #[arg(long, env = "GOBZL_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.workspace.join(CONFIG_FILE_NAME));
    let config = GobzlConfig::load(&config_path)?;

    // Initialize logging
    let level = cli.log.as_deref().unwrap_or(&config.daemon.log_level);
    let format = cli.log_format.clone().unwrap_or(match config.daemon.log_format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workspace = %cli.workspace.display(),
        config = %config_path.display(),
        "gobzld starting"
    );
    if !config_path.exists() {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    daemon::run(config, cli.workspace).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
