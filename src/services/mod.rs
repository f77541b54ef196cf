//! Service layer module
//!
//! Business logic on top of the domain ports:
//! - Runner: lifecycle state machine for one technique
//! - Batch executor: one runner per technique, run concurrently
//! - Technique registry: lookup of registered techniques by id

pub mod batch_executor;
pub mod runner;
pub mod technique_registry;

pub use batch_executor::{
    BatchExecutor, BatchOperation, BatchReport, RunnerFactory, TechniqueOutcome,
};
pub use runner::Runner;
pub use technique_registry::{RegistryError, TechniqueRegistry};
