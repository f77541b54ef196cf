//! Terraform provisioner.
//!
//! Drives the `terraform` binary as a child process. Every invocation carries
//! the run's user-agent through `TF_APPEND_USER_AGENT` and races the shared
//! cancellation token; on cancellation the child is killed and
//! [`ProvisionError::Cancelled`] is returned.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::ProvisionError;
use crate::domain::models::{TerraformConfig, TerraformOutputs};
use crate::domain::ports::Provisioner;

const MISSING_REGION_ERROR: &str =
    "The argument \"region\" is required, but no definition was found";

/// Provisioner backed by the Terraform CLI.
#[derive(Debug, Clone)]
pub struct TerraformProvisioner {
    binary_path: String,
    user_agent: String,
    extra_env: HashMap<String, String>,
    cancellation: CancellationToken,
}

impl TerraformProvisioner {
    pub fn new(
        config: &TerraformConfig,
        user_agent: impl Into<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            binary_path: config.binary_path.clone(),
            user_agent: user_agent.into(),
            extra_env: config.extra_env.clone(),
            cancellation,
        }
    }

    /// Run `terraform <args>` in `dir` and return its stdout.
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, ProvisionError> {
        let subcommand = format!("terraform {}", args.first().copied().unwrap_or_default());

        if self.cancellation.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        debug!(dir = %dir.display(), command = %subcommand, "running terraform");

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_APPEND_USER_AGENT", &self.user_agent)
            .envs(&self.extra_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        // Dropping the child on cancellation kills the process.
        let output = tokio::select! {
            biased;
            () = self.cancellation.cancelled() => {
                warn!(dir = %dir.display(), command = %subcommand, "terraform interrupted");
                return Err(ProvisionError::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let raw = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(ProvisionError::Command {
                command: subcommand,
                message: friendly_error_message(&raw),
            });
        }

        Ok(stdout)
    }

    async fn init_if_needed(&self, dir: &Path) -> Result<(), ProvisionError> {
        if dir.join(".terraform").exists() {
            debug!(dir = %dir.display(), "terraform already initialized");
            return Ok(());
        }
        info!(dir = %dir.display(), "Initializing terraform");
        self.run(dir, &["init", "-input=false", "-no-color"]).await?;
        Ok(())
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn init_and_apply(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError> {
        self.init_if_needed(dir).await?;
        info!(dir = %dir.display(), "Applying terraform to spin up technique prerequisites");
        self.run(dir, &["apply", "-auto-approve", "-input=false", "-no-color"])
            .await?;
        self.output(dir).await
    }

    async fn destroy(&self, dir: &Path) -> Result<(), ProvisionError> {
        self.run(dir, &["destroy", "-auto-approve", "-input=false", "-no-color"])
            .await?;
        Ok(())
    }

    async fn output(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError> {
        let raw = self.run(dir, &["output", "-json", "-no-color"]).await?;
        parse_outputs(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
}

/// Parse `terraform output -json`.
///
/// String values are kept verbatim, anything else is rendered as JSON text.
pub fn parse_outputs(raw: &str) -> Result<TerraformOutputs, ProvisionError> {
    if raw.trim().is_empty() {
        return Ok(TerraformOutputs::new());
    }

    let entries: HashMap<String, OutputEntry> =
        serde_json::from_str(raw).map_err(|e| ProvisionError::Parse {
            what: "terraform outputs".to_string(),
            message: e.to_string(),
        })?;

    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let value = match entry.value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Replace opaque Terraform failures with an actionable hint when recognized.
pub fn friendly_error_message(raw: &str) -> String {
    if raw.contains(MISSING_REGION_ERROR) {
        return format!(
            "unable to create attack technique prerequisites. Ensure you are authenticated \
             against AWS and have the right permissions to run detonator.\n\
             Below is the error that Terraform returned:\n{raw}"
        );
    }
    raw.to_string()
}
