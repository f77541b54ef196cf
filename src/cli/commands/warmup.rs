//! Warmup command.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::{ensure_success, CommandContext};
use crate::domain::models::RunnerOptions;
use crate::services::BatchOperation;

#[derive(Args, Debug)]
pub struct WarmupArgs {
    /// Attack technique IDs
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Re-apply the prerequisites even if they are already up
    #[arg(short, long)]
    pub force: bool,

    /// Custom Terraform directory replacing the technique's own prerequisites
    #[arg(long = "terraform-dir")]
    pub terraform_dir: Option<PathBuf>,
}

pub async fn execute(args: WarmupArgs, ctx: &CommandContext) -> Result<()> {
    let techniques = ctx.resolve(&args.ids)?;
    let options = RunnerOptions {
        force: args.force,
        custom_terraform_dir: args.terraform_dir,
        ..Default::default()
    };

    let report = ctx
        .run_batch(&techniques, BatchOperation::WarmUp, &options)
        .await?;
    ensure_success(&report)
}
