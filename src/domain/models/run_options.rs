use std::path::{Path, PathBuf};

use tracing::warn;

/// Options for one runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Bypass lifecycle guards
    pub force: bool,
    /// Skip prerequisite provisioning; outputs come from `outputs_file`
    pub no_warmup: bool,
    /// JSON object of string outputs, required with `no_warmup`
    pub outputs_file: Option<PathBuf>,
    /// Operator-owned Terraform directory. Disables state persistence,
    /// output persistence and deletion of the directory on cleanup.
    pub custom_terraform_dir: Option<PathBuf>,
}

impl RunnerOptions {
    pub fn has_custom_dir(&self) -> bool {
        self.custom_terraform_dir.is_some()
    }

    /// Custom directory made absolute against the current working directory.
    pub fn resolved_custom_dir(&self) -> Option<PathBuf> {
        self.custom_terraform_dir.as_deref().map(absolutize)
    }
}

fn absolutize(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(dir),
        Err(err) => {
            warn!(
                dir = %dir.display(),
                error = %err,
                "unable to resolve absolute path for custom Terraform directory"
            );
            dir.to_path_buf()
        }
    }
}
