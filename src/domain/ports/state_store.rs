//! Per-technique persistence port.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::errors::StateError;
use crate::domain::models::{TechniqueState, TerraformOutputs};

/// Durable state of one technique.
///
/// Implementations are scoped to a single technique. Operations must be
/// idempotent, and a missing or unreadable state must read back as `None`,
/// which callers treat like [`TechniqueState::Cold`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Root directory shared by all techniques.
    fn root_directory(&self) -> PathBuf;

    /// Working directory of this technique's prerequisites.
    fn technique_directory(&self) -> PathBuf;

    async fn get_technique_state(&self) -> Option<TechniqueState>;

    async fn set_technique_state(&self, state: TechniqueState) -> Result<(), StateError>;

    /// Write the bundled prerequisite code into the technique directory.
    async fn materialize_technique(&self) -> Result<(), StateError>;

    /// Remove the technique directory.
    async fn cleanup_technique(&self) -> Result<(), StateError>;

    async fn get_outputs(&self) -> Result<TerraformOutputs, StateError>;

    async fn write_outputs(&self, outputs: &TerraformOutputs) -> Result<(), StateError>;
}
