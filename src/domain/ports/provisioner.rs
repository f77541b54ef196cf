//! Provisioning gateway port.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::ProvisionError;
use crate::domain::models::TerraformOutputs;

/// Interface to the external provisioning tool.
///
/// Every call is scoped to a working directory. Implementations tag their
/// invocations with the caller's correlation identifier and must return
/// [`ProvisionError::Cancelled`] when the shutdown signal fires mid-call.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Initialise (if needed) and apply the prerequisites in `dir`.
    async fn init_and_apply(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError>;

    /// Destroy the prerequisites in `dir`.
    async fn destroy(&self, dir: &Path) -> Result<(), ProvisionError>;

    /// Read the current outputs of `dir` without changing anything.
    async fn output(&self, dir: &Path) -> Result<TerraformOutputs, ProvisionError>;
}
