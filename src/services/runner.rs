//! Technique runner
//!
//! Drives one technique through warm-up, detonation, revert and cleanup on top
//! of the [`Provisioner`] and [`StateStore`] ports.
//!
//! # State handling
//!
//! The lifecycle state is read from the state store once, when the runner is
//! built, and every transition is written back before the operation returns.
//! With a custom Terraform directory the state store is bypassed entirely:
//! transitions live in memory for the lifetime of the runner only.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{ProvisionError, RunnerError, RunnerResult};
use crate::domain::models::{
    display_text, AttackTechnique, CloudProviders, RunnerOptions, TechniqueAction,
    TechniqueState, TerraformOutputs,
};
use crate::domain::ports::{Provisioner, StateStore};

/// Runs lifecycle operations for exactly one technique.
pub struct Runner {
    technique: Arc<AttackTechnique>,
    options: RunnerOptions,
    state: Option<TechniqueState>,
    terraform_dir: PathBuf,
    correlation_id: Uuid,
    providers: CloudProviders,
    provisioner: Arc<dyn Provisioner>,
    state_store: Arc<dyn StateStore>,
}

impl Runner {
    /// Build a runner, reading the current state unless a custom directory is set.
    pub async fn new(
        technique: Arc<AttackTechnique>,
        options: RunnerOptions,
        correlation_id: Uuid,
        provisioner: Arc<dyn Provisioner>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let (terraform_dir, state) = match options.resolved_custom_dir() {
            Some(dir) => (dir, None),
            None => (
                state_store.technique_directory(),
                state_store.get_technique_state().await,
            ),
        };

        Self {
            technique,
            options,
            state,
            terraform_dir,
            correlation_id,
            providers: CloudProviders::new(correlation_id),
            provisioner,
            state_store,
        }
    }

    /// Technique this runner drives.
    pub fn technique(&self) -> &AttackTechnique {
        &self.technique
    }

    /// Directory handed to the provisioner.
    pub fn terraform_dir(&self) -> &std::path::Path {
        &self.terraform_dir
    }

    /// Current lifecycle state.
    ///
    /// With a custom directory nothing is known about earlier sessions, so a
    /// runner that has not transitioned yet reports `COLD`. That is a
    /// convention, not an observation of the actual infrastructure.
    pub fn state(&self) -> TechniqueState {
        self.state.unwrap_or_default()
    }

    /// Correlation identifier of this runner, as a canonical UUID string.
    pub fn execution_id(&self) -> String {
        self.correlation_id.to_string()
    }

    fn uses_custom_dir(&self) -> bool {
        self.options.has_custom_dir()
    }

    /// Spin up the technique's prerequisites and return their outputs.
    #[instrument(skip(self), fields(technique_id = %self.technique.id, correlation_id = %self.correlation_id))]
    pub async fn warm_up(&mut self) -> RunnerResult<TerraformOutputs> {
        if !self.technique.has_prerequisites() && !self.uses_custom_dir() {
            return Ok(TerraformOutputs::new());
        }

        if self.options.no_warmup {
            info!("Not warming up - --no-warmup was passed");
            return self.read_outputs_file().await;
        }

        if self.uses_custom_dir() {
            info!(dir = %self.terraform_dir.display(), "Using custom Terraform directory");
        } else {
            self.state_store
                .materialize_technique()
                .await
                .map_err(|e| RunnerError::state("unable to extract Terraform file", e))?;
        }

        let will_warm_up = match self.state() {
            TechniqueState::Cold => true,
            TechniqueState::Warm if !self.options.force => {
                info!("Not warming up - technique is already warm. Use --force to force");
                false
            }
            TechniqueState::Detonated if !self.options.force => {
                info!("Technique has been detonated but not cleaned up, not warming up as it should be warm already");
                false
            }
            _ => true,
        };

        if !will_warm_up {
            return self.existing_outputs().await;
        }

        if self.technique.is_slow {
            info!("Note: this is a slow attack technique, it might take a long time to warm up");
        }
        info!("Warming up");

        let outputs = match self.provisioner.init_and_apply(&self.terraform_dir).await {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!("Error during warm up. Cleaning up technique prerequisites with terraform destroy");
                if let Err(destroy_err) = self.provisioner.destroy(&self.terraform_dir).await {
                    warn!(error = %destroy_err, "Best-effort destroy after failed warm up did not succeed");
                }
                return Err(provisioning_error(
                    "unable to run terraform apply on prerequisite",
                    err,
                ));
            }
        };

        let persisted = if self.uses_custom_dir() {
            Ok(())
        } else {
            self.state_store.write_outputs(&outputs).await
        };
        self.set_state(TechniqueState::Warm).await;

        if let Some(text) = display_text(&outputs) {
            info!("{text}");
        }

        persisted.map_err(|e| RunnerError::state("unable to persist Terraform outputs", e))?;
        Ok(outputs)
    }

    /// Detonate the technique, warming it up first when needed.
    #[instrument(skip(self), fields(technique_id = %self.technique.id, correlation_id = %self.correlation_id))]
    pub async fn detonate(&mut self) -> RunnerResult<()> {
        let mut will_warm_up = true;

        if self.state() == TechniqueState::Detonated {
            if !self.technique.is_idempotent && !self.options.force {
                return Err(RunnerError::AlreadyDetonated {
                    technique_id: self.technique.id.clone(),
                });
            }
            will_warm_up = false;
        }

        if self.technique.is_slow {
            info!("Note: this is a slow attack technique, it might take a long time to warm up or detonate");
        }

        let outputs = if will_warm_up {
            self.warm_up().await?
        } else {
            self.existing_outputs().await?
        };

        let action = Arc::clone(&self.technique.detonate);
        self.run_action(action, outputs)
            .await
            .map_err(|message| RunnerError::Detonation {
                technique_id: self.technique.id.clone(),
                message,
            })?;

        self.set_state(TechniqueState::Detonated).await;
        Ok(())
    }

    /// Undo the detonation, leaving the prerequisites in place.
    #[instrument(skip(self), fields(technique_id = %self.technique.id, correlation_id = %self.correlation_id))]
    pub async fn revert(&mut self) -> RunnerResult<()> {
        if self.state() != TechniqueState::Detonated && !self.options.force {
            return Err(RunnerError::NotDetonated {
                technique_id: self.technique.id.clone(),
            });
        }
        self.revert_detonation().await
    }

    async fn revert_detonation(&mut self) -> RunnerResult<()> {
        let outputs = self.existing_outputs().await?;

        info!("Reverting detonation of technique");

        if let Some(action) = self.technique.revert.clone() {
            self.run_action(action, outputs)
                .await
                .map_err(|message| RunnerError::Revert {
                    technique_id: self.technique.id.clone(),
                    message,
                })?;
        }

        self.set_state(TechniqueState::Warm).await;
        Ok(())
    }

    /// Revert if needed, destroy the prerequisites and return to `COLD`.
    #[instrument(skip(self), fields(technique_id = %self.technique.id, correlation_id = %self.correlation_id))]
    pub async fn clean_up(&mut self) -> RunnerResult<()> {
        if self.state() == TechniqueState::Cold && !self.options.force {
            return Err(RunnerError::AlreadyCold {
                technique_id: self.technique.id.clone(),
            });
        }

        info!("Cleaning up");

        // State is not tracked across sessions for custom directories, so
        // revert whenever the technique can be reverted.
        let should_revert = self.technique.has_revert()
            && (self.state() == TechniqueState::Detonated || self.uses_custom_dir());
        if should_revert {
            if let Err(err) = self.revert_detonation().await {
                if err.is_cancelled() {
                    return Err(err);
                }
                if !self.options.force {
                    return Err(RunnerError::RevertBeforeCleanup {
                        technique_id: self.technique.id.clone(),
                        source: Box::new(err),
                    });
                }
                warn!(error = %err, "Failed to revert detonation. Ignoring and cleaning up anyway as --force was used");
            }
        }

        if (self.technique.has_prerequisites() || self.uses_custom_dir()) && !self.options.no_warmup {
            info!("Cleaning up technique prerequisites with terraform destroy");
            self.provisioner
                .destroy(&self.terraform_dir)
                .await
                .map_err(|err| provisioning_error("unable to cleanup TTP prerequisites", err))?;
        }

        self.set_state(TechniqueState::Cold).await;

        if !self.uses_custom_dir() {
            self.state_store.cleanup_technique().await.map_err(|e| {
                RunnerError::state(
                    format!(
                        "unable to remove technique directory {}",
                        self.terraform_dir.display()
                    ),
                    e,
                )
            })?;
        }

        Ok(())
    }

    async fn set_state(&mut self, state: TechniqueState) {
        if !self.uses_custom_dir() {
            if let Err(err) = self.state_store.set_technique_state(state).await {
                warn!(state = %state, error = %err, "unable to set technique state");
            }
        }
        self.state = Some(state);
    }

    /// Outputs of prerequisites that are already up.
    async fn existing_outputs(&self) -> RunnerResult<TerraformOutputs> {
        if self.uses_custom_dir() {
            return self
                .provisioner
                .output(&self.terraform_dir)
                .await
                .map_err(|err| match err {
                    ProvisionError::Cancelled => RunnerError::Cancelled,
                    other => RunnerError::Outputs {
                        technique_id: self.technique.id.clone(),
                        message: other.to_string(),
                    },
                });
        }

        self.state_store
            .get_outputs()
            .await
            .map_err(|err| RunnerError::Outputs {
                technique_id: self.technique.id.clone(),
                message: err.to_string(),
            })
    }

    async fn read_outputs_file(&self) -> RunnerResult<TerraformOutputs> {
        let Some(path) = self.options.outputs_file.as_ref() else {
            return Err(RunnerError::Configuration(
                "you must specify --outputs-file when using --no-warmup".to_string(),
            ));
        };

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RunnerError::Configuration(format!("unable to read terraform outputs file: {e}"))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            RunnerError::Configuration(format!("unable to parse terraform outputs file: {e}"))
        })
    }

    /// Run a technique action on the blocking pool; errors come back as text.
    async fn run_action(
        &self,
        action: TechniqueAction,
        outputs: TerraformOutputs,
    ) -> Result<(), String> {
        let providers = self.providers;
        let joined = tokio::task::spawn_blocking(move || action(&outputs, &providers)).await;

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(join_err) => Err(format!("action did not complete: {join_err}")),
        }
    }
}

/// Cancellation passes through untouched; anything else is put in context.
fn provisioning_error(context: &str, err: ProvisionError) -> RunnerError {
    match err {
        ProvisionError::Cancelled => RunnerError::Cancelled,
        other => RunnerError::Provisioning {
            context: context.to_string(),
            message: other.to_string(),
        },
    }
}
