//! In-memory provisioner and state store for testing

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::errors::{ProvisionError, StateError};
use crate::domain::models::{TechniqueState, TerraformOutputs};
use crate::domain::ports::{Provisioner, StateStore};

/// How a mocked provisioning call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Cancelled,
    Message(String),
}

impl MockFailure {
    fn to_error(&self, command: &str) -> ProvisionError {
        match self {
            Self::Cancelled => ProvisionError::Cancelled,
            Self::Message(message) => ProvisionError::Command {
                command: command.to_string(),
                message: message.clone(),
            },
        }
    }
}

/// Provisioner that records calls and returns canned outputs.
#[derive(Debug, Default)]
pub struct MockProvisioner {
    outputs: TerraformOutputs,
    apply_failure: Mutex<Option<MockFailure>>,
    destroy_failure: Mutex<Option<MockFailure>>,
    output_failure: Mutex<Option<MockFailure>>,
    apply_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
    output_calls: AtomicUsize,
    directories: Mutex<Vec<PathBuf>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs<I, K, V>(outputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            outputs: outputs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn fail_apply(&self, failure: MockFailure) {
        *self.apply_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
    }

    pub fn fail_destroy(&self, failure: MockFailure) {
        *self.destroy_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
    }

    pub fn fail_output(&self, failure: MockFailure) {
        *self.output_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(failure);
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn output_calls(&self) -> usize {
        self.output_calls.load(Ordering::SeqCst)
    }

    /// Working directories seen by any call, in call order.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.directories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, dir: &Path) {
        self.directories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(dir.to_path_buf());
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn init_and_apply(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.record(dir);
        let failure = self
            .apply_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(failure) => Err(failure.to_error("terraform apply")),
            None => Ok(self.outputs.clone()),
        }
    }

    async fn destroy(&self, dir: &Path) -> Result<(), ProvisionError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.record(dir);
        let failure = self
            .destroy_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(failure) => Err(failure.to_error("terraform destroy")),
            None => Ok(()),
        }
    }

    async fn output(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError> {
        self.output_calls.fetch_add(1, Ordering::SeqCst);
        self.record(dir);
        let failure = self
            .output_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(failure) => Err(failure.to_error("terraform output")),
            None => Ok(self.outputs.clone()),
        }
    }
}

/// State store kept in memory, scoped to one technique.
#[derive(Debug)]
pub struct InMemoryStateStore {
    technique_id: String,
    state: Mutex<Option<TechniqueState>>,
    outputs: Mutex<Option<TerraformOutputs>>,
    materialized: Mutex<bool>,
    state_writes: AtomicUsize,
    output_writes: AtomicUsize,
    cleanups: AtomicUsize,
}

impl InMemoryStateStore {
    pub fn new(technique_id: impl Into<String>) -> Self {
        Self {
            technique_id: technique_id.into(),
            state: Mutex::new(None),
            outputs: Mutex::new(None),
            materialized: Mutex::new(false),
            state_writes: AtomicUsize::new(0),
            output_writes: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_state(self, state: TechniqueState) -> Self {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
        self
    }

    pub fn recorded_state(&self) -> Option<TechniqueState> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn recorded_outputs(&self) -> Option<TerraformOutputs> {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_materialized(&self) -> bool {
        *self.materialized.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state_writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }

    pub fn output_writes(&self) -> usize {
        self.output_writes.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    fn root_directory(&self) -> PathBuf {
        PathBuf::from("/nonexistent/detonator")
    }

    fn technique_directory(&self) -> PathBuf {
        self.root_directory().join(&self.technique_id)
    }

    async fn get_technique_state(&self) -> Option<TechniqueState> {
        self.recorded_state()
    }

    async fn set_technique_state(&self, state: TechniqueState) -> Result<(), StateError> {
        self.state_writes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
        Ok(())
    }

    async fn materialize_technique(&self) -> Result<(), StateError> {
        *self.materialized.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }

    async fn cleanup_technique(&self) -> Result<(), StateError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        *self.materialized.lock().unwrap_or_else(|e| e.into_inner()) = false;
        *self.outputs.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    async fn get_outputs(&self) -> Result<TerraformOutputs, StateError> {
        Ok(self.recorded_outputs().unwrap_or_default())
    }

    async fn write_outputs(&self, outputs: &TerraformOutputs) -> Result<(), StateError> {
        self.output_writes.fetch_add(1, Ordering::SeqCst);
        *self.outputs.lock().unwrap_or_else(|e| e.into_inner()) = Some(outputs.clone());
        Ok(())
    }
}
