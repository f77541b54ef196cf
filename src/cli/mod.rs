//! Command-line interface.
//!
//! The binary ships the lifecycle commands only; attack techniques come from
//! a catalog that registers them in a [`TechniqueRegistry`] before calling
//! [`run`].

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::FileSystemRunnerFactory;
use crate::services::TechniqueRegistry;
use commands::{
    cleanup::CleanupArgs, detonate::DetonateArgs, list::ListArgs, revert::RevertArgs,
    status::StatusArgs, warmup::WarmupArgs, CommandContext,
};

#[derive(Parser, Debug)]
#[command(name = "detonator")]
#[command(about = "Detonate cloud attack techniques and manage their prerequisites", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Spin up the prerequisites of attack techniques without detonating them
    Warmup(WarmupArgs),
    /// Detonate one or more attack techniques
    Detonate(DetonateArgs),
    /// Revert the detonation of attack techniques, keeping their prerequisites
    Revert(RevertArgs),
    /// Revert and tear down the prerequisites of attack techniques
    #[command(visible_alias = "clean")]
    Cleanup(CleanupArgs),
    /// Show the lifecycle state of attack techniques
    Status(StatusArgs),
    /// List registered attack techniques
    List(ListArgs),
}

/// Load configuration, install logging and Ctrl-C handling, then dispatch.
pub async fn run(cli: Cli, registry: TechniqueRegistry) -> Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))
        .context("Failed to initialize logging")?;

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping in-flight operations");
            on_interrupt.cancel();
        }
    });

    let ctx = CommandContext {
        registry: Arc::new(registry),
        factory: Arc::new(FileSystemRunnerFactory::from_config(&config, cancellation)),
        json_mode: cli.json,
    };

    dispatch(cli.command, &ctx).await
}

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Warmup(args) => commands::warmup::execute(args, ctx).await,
        Commands::Detonate(args) => commands::detonate::execute(args, ctx).await,
        Commands::Revert(args) => commands::revert::execute(args, ctx).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args, ctx).await,
        Commands::Status(args) => commands::status::execute(args, ctx).await,
        Commands::List(args) => commands::list::execute(args, ctx).await,
    }
}

/// Print the error and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let payload = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
    std::process::exit(1);
}
