//! Filesystem-backed technique state.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<technique-id>/.state               COLD | WARM | DETONATED
//! <root>/<technique-id>/.terraform-outputs   JSON object of string outputs
//! <root>/<technique-id>/main.tf              materialized prerequisites
//! ```
//!
//! Files are replaced atomically (write to a temporary sibling, then rename)
//! so an interrupted write never leaves a truncated state behind.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::StateError;
use crate::domain::models::{AttackTechnique, TechniqueState, TerraformOutputs};
use crate::domain::ports::StateStore;

const STATE_FILE: &str = ".state";
const OUTPUTS_FILE: &str = ".terraform-outputs";
const PREREQUISITES_FILE: &str = "main.tf";

/// State store keeping one directory per technique.
pub struct FileSystemStateStore {
    root: PathBuf,
    technique: Arc<AttackTechnique>,
}

impl FileSystemStateStore {
    pub fn new(root: impl Into<PathBuf>, technique: Arc<AttackTechnique>) -> Self {
        Self {
            root: root.into(),
            technique,
        }
    }

    fn state_file(&self) -> PathBuf {
        self.technique_directory().join(STATE_FILE)
    }

    fn outputs_file(&self) -> PathBuf {
        self.technique_directory().join(OUTPUTS_FILE)
    }

    async fn ensure_directory(&self) -> Result<PathBuf, StateError> {
        let dir = self.technique_directory();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StateError::io(&dir, e))?;
        Ok(dir)
    }
}

/// Replace `path` with `contents` via a temporary sibling file.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StateError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StateError::io(path, e))
}

#[async_trait]
impl StateStore for FileSystemStateStore {
    fn root_directory(&self) -> PathBuf {
        self.root.clone()
    }

    fn technique_directory(&self) -> PathBuf {
        self.root.join(&self.technique.id)
    }

    async fn get_technique_state(&self) -> Option<TechniqueState> {
        let path = self.state_file();
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let state = TechniqueState::from_str(&raw);
                if state.is_none() && !raw.trim().is_empty() {
                    warn!(path = %path.display(), "ignoring unrecognized technique state");
                }
                state
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unable to read technique state");
                None
            }
        }
    }

    async fn set_technique_state(&self, state: TechniqueState) -> Result<(), StateError> {
        self.ensure_directory().await?;
        write_atomic(&self.state_file(), state.as_str().as_bytes()).await
    }

    async fn materialize_technique(&self) -> Result<(), StateError> {
        let dir = self.ensure_directory().await?;
        let Some(code) = self.technique.prerequisites_terraform_code.as_deref() else {
            return Ok(());
        };

        let path = dir.join(PREREQUISITES_FILE);
        debug!(path = %path.display(), "writing technique prerequisites");
        write_atomic(&path, code.as_bytes()).await
    }

    async fn cleanup_technique(&self) -> Result<(), StateError> {
        let dir = self.technique_directory();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StateError::io(&dir, err)),
        }
    }

    async fn get_outputs(&self) -> Result<TerraformOutputs, StateError> {
        let path = self.outputs_file();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(TerraformOutputs::new()),
            Err(err) => return Err(StateError::io(&path, err)),
        };
        serde_json::from_slice(&raw).map_err(|e| StateError::serialization(&path, e))
    }

    async fn write_outputs(&self, outputs: &TerraformOutputs) -> Result<(), StateError> {
        self.ensure_directory().await?;
        let path = self.outputs_file();
        let raw = serde_json::to_vec_pretty(outputs).map_err(|e| StateError::serialization(&path, e))?;
        write_atomic(&path, &raw).await
    }
}
