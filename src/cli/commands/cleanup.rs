//! Cleanup command.

use anyhow::Result;
use clap::{ArgGroup, Args};
use std::path::PathBuf;
use tracing::info;

use super::{ensure_success, status, CommandContext};
use crate::domain::models::RunnerOptions;
use crate::services::BatchOperation;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("targets").required(true).args(["ids", "all"])))]
pub struct CleanupArgs {
    /// Attack technique IDs
    pub ids: Vec<String>,

    /// Clean up every technique that is not COLD
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    /// Clean up even if the technique is already COLD
    #[arg(short, long)]
    pub force: bool,

    /// Custom Terraform directory replacing the technique's own prerequisites
    #[arg(long = "terraform-dir")]
    pub terraform_dir: Option<PathBuf>,
}

pub async fn execute(args: CleanupArgs, ctx: &CommandContext) -> Result<()> {
    let techniques = if args.all {
        info!("Cleaning up all techniques that have been warmed-up or detonated");
        status::techniques_not_cold(ctx).await
    } else {
        ctx.resolve(&args.ids)?
    };

    if techniques.is_empty() {
        info!("Nothing to clean up");
        return Ok(());
    }

    let options = RunnerOptions {
        force: args.force,
        custom_terraform_dir: args.terraform_dir,
        ..Default::default()
    };

    let report = ctx
        .run_batch(&techniques, BatchOperation::CleanUp, &options)
        .await?;
    status::print_status(ctx, &techniques).await;
    ensure_success(&report)
}
