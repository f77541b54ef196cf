//! Wires configuration into runners backed by Terraform and the filesystem.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::models::{
    resolve_correlation_id, user_agent_for, AttackTechnique, Config, RunnerOptions,
    TerraformConfig,
};
use crate::infrastructure::state::FileSystemStateStore;
use crate::infrastructure::terraform::TerraformProvisioner;
use crate::services::batch_executor::RunnerFactory;
use crate::services::runner::Runner;

/// Builds one runner per technique, each with its own correlation id and
/// its own Terraform provisioner tagged with that id's user-agent.
pub struct FileSystemRunnerFactory {
    state_dir: PathBuf,
    detonation_id: Option<String>,
    terraform: TerraformConfig,
    cancellation: CancellationToken,
}

impl FileSystemRunnerFactory {
    pub fn new(
        state_dir: impl Into<PathBuf>,
        detonation_id: Option<String>,
        terraform: TerraformConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            state_dir: state_dir.into(),
            detonation_id,
            terraform,
            cancellation,
        }
    }

    pub fn from_config(config: &Config, cancellation: CancellationToken) -> Self {
        Self::new(
            config.resolved_state_dir(),
            config.detonation_id.clone(),
            config.terraform.clone(),
            cancellation,
        )
    }

    /// State store for one technique, for read-only inspection.
    pub fn state_store(&self, technique: Arc<AttackTechnique>) -> FileSystemStateStore {
        FileSystemStateStore::new(&self.state_dir, technique)
    }
}

#[async_trait]
impl RunnerFactory for FileSystemRunnerFactory {
    async fn create(&self, technique: Arc<AttackTechnique>, options: RunnerOptions) -> Runner {
        let correlation_id = resolve_correlation_id(self.detonation_id.as_deref());
        let provisioner = TerraformProvisioner::new(
            &self.terraform,
            user_agent_for(correlation_id),
            self.cancellation.clone(),
        );
        let state_store = self.state_store(Arc::clone(&technique));

        Runner::new(
            technique,
            options,
            correlation_id,
            Arc::new(provisioner),
            Arc::new(state_store),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Platform, TechniqueState};

    fn technique(id: &str) -> Arc<AttackTechnique> {
        Arc::new(AttackTechnique::new(id, Platform::Aws, |_, _| Ok(())).with_prerequisites("# none"))
    }

    #[tokio::test]
    async fn test_runner_reads_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let technique_dir = dir.path().join("aws.t1");
        std::fs::create_dir_all(&technique_dir).unwrap();
        std::fs::write(technique_dir.join(".state"), "WARM").unwrap();

        let factory = FileSystemRunnerFactory::new(
            dir.path(),
            None,
            TerraformConfig::default(),
            CancellationToken::new(),
        );
        let runner = factory.create(technique("aws.t1"), RunnerOptions::default()).await;

        assert_eq!(runner.state(), TechniqueState::Warm);
        assert_eq!(runner.terraform_dir(), technique_dir.as_path());
    }

    #[tokio::test]
    async fn test_detonation_id_override_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let id = "6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f";
        let factory = FileSystemRunnerFactory::new(
            dir.path(),
            Some(id.to_string()),
            TerraformConfig::default(),
            CancellationToken::new(),
        );

        let first = factory.create(technique("aws.t1"), RunnerOptions::default()).await;
        let second = factory.create(technique("aws.t2"), RunnerOptions::default()).await;

        assert_eq!(first.execution_id(), id);
        assert_eq!(second.execution_id(), id);
    }

    #[tokio::test]
    async fn test_fresh_ids_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileSystemRunnerFactory::new(
            dir.path(),
            Some("not-a-uuid".to_string()),
            TerraformConfig::default(),
            CancellationToken::new(),
        );

        let first = factory.create(technique("aws.t1"), RunnerOptions::default()).await;
        let second = factory.create(technique("aws.t1"), RunnerOptions::default()).await;

        assert_ne!(first.execution_id(), second.execution_id());
        assert_eq!(first.state(), TechniqueState::Cold);
    }
}
