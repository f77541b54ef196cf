//! Detonator - cloud attack technique lifecycle runner
//!
//! Detonator warms up, detonates, reverts and cleans up attack techniques
//! against cloud environments. Each technique moves through the `COLD`,
//! `WARM` and `DETONATED` states; prerequisites are provisioned with
//! Terraform and the state of every technique is persisted on local disk.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): lifecycle model, errors and ports
//! - **Service Layer** (`services`): runner, batch executor, technique registry
//! - **Infrastructure Layer** (`infrastructure`): Terraform, filesystem state,
//!   configuration and logging adapters
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use detonator::cli::{run, Cli};
//! use detonator::services::TechniqueRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = TechniqueRegistry::new();
//!     catalog::register_all(&mut registry)?;
//!     run(clap::Parser::parse(), registry).await
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ProvisionError, RunnerError, RunnerResult, StateError};
pub use domain::models::{
    AttackTechnique, CloudProviders, Config, Platform, RunnerOptions, TechniqueState,
    TerraformOutputs,
};
pub use domain::ports::{Provisioner, StateStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::FileSystemRunnerFactory;
pub use services::{BatchExecutor, BatchOperation, BatchReport, Runner, TechniqueRegistry};
