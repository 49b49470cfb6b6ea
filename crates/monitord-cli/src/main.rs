// crates/monitord-cli/src/main.rs
// ============================================================================
// Module: monitord CLI Entry Point
// Description: Process lifecycle around a running Engine: config load,
//              platform wiring, and graceful shutdown on Ctrl+C.
// Purpose: The one binary that turns the monitord-* library crates into a
//          running monitoring daemon.
// Dependencies: clap, tokio, tracing-subscriber, monitord-config,
//               monitord-dispatch, monitord-engine, monitord-providers
// ============================================================================

mod log_channel;

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use monitord_core::time::system_clock;
use monitord_dispatch::ChannelSet;
use monitord_dispatch::PlatformRegistry;
use monitord_engine::Engine;
use monitord_providers::HttpPollPlatform;

use crate::log_channel::LogChannel;

/// `monitord`: a probe scheduler, rule evaluator, and alert pipeline.
#[derive(Parser, Debug)]
#[command(name = "monitord")]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load a configuration file, start every enabled probe, and run until
    /// interrupted.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },
    /// Load and structurally validate a configuration file without starting
    /// anything.
    CheckConfig {
        /// Path to the TOML configuration file.
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match Cli::parse().command {
        Command::Serve { config } => match run_serve(&config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "monitord exited with an error");
                ExitCode::FAILURE
            }
        },
        Command::CheckConfig { config } => match monitord_config::load_from_path(&config) {
            Ok(loaded) => {
                tracing::info!(probes = loaded.probes.len(), platforms = loaded.platforms.len(), "configuration is valid");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, "configuration is invalid");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
}

async fn run_serve(config_path: &Path) -> Result<(), anyhow::Error> {
    let config = monitord_config::load_from_path(config_path)?;

    let clock = system_clock();
    let mut registry = PlatformRegistry::new();
    let mut init_configs = BTreeMap::new();

    for entry in &config.platforms {
        if !entry.enabled {
            tracing::info!(platform = %entry.platform, "platform disabled in configuration, skipping");
            continue;
        }
        match entry.platform.as_str() {
            "httppoll" => {
                registry.register(Arc::new(HttpPollPlatform::new(Arc::clone(&clock))?))?;
                init_configs.insert(entry.platform.clone(), entry.config.clone());
            }
            other => {
                tracing::warn!(platform = %other, "no built-in implementation for this platform id, skipping");
            }
        }
    }

    registry.initialize_all(&init_configs).await?;

    let mut channels = ChannelSet::new();
    channels.add(Arc::new(LogChannel));

    let engine = Engine::bootstrap(&config, registry, channels).await?;
    tracing::info!(probes = engine.list_probes().len(), "monitord started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping");
    engine.stop().await;

    Ok(())
}
