//! Detonate command.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::{ensure_success, CommandContext};
use crate::domain::models::RunnerOptions;
use crate::services::BatchOperation;

#[derive(Args, Debug)]
pub struct DetonateArgs {
    /// Attack technique IDs
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Clean up the prerequisites once the technique has been detonated
    #[arg(long)]
    pub cleanup: bool,

    /// Do not spin up prerequisites; requires --outputs-file
    #[arg(long = "no-warmup")]
    pub no_warmup: bool,

    /// JSON file holding the prerequisite outputs, used with --no-warmup
    #[arg(long = "outputs-file")]
    pub outputs_file: Option<PathBuf>,

    /// Custom Terraform directory replacing the technique's own prerequisites
    #[arg(long = "terraform-dir")]
    pub terraform_dir: Option<PathBuf>,

    /// Detonate again even if a non-idempotent technique was already detonated
    #[arg(short, long)]
    pub force: bool,
}

impl DetonateArgs {
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            force: self.force,
            no_warmup: self.no_warmup,
            outputs_file: self.outputs_file.clone(),
            custom_terraform_dir: self.terraform_dir.clone(),
        }
    }
}

pub async fn execute(args: DetonateArgs, ctx: &CommandContext) -> Result<()> {
    let techniques = ctx.resolve(&args.ids)?;
    let options = args.runner_options();

    let report = ctx
        .run_batch(
            &techniques,
            BatchOperation::Detonate {
                cleanup: args.cleanup,
            },
            &options,
        )
        .await?;
    ensure_success(&report)
}
