//! Domain layer for the detonation lifecycle
//!
//! Techniques, lifecycle states, run options and the ports the runner drives.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ProvisionError, RunnerError, RunnerResult, StateError};
