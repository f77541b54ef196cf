//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports:
//! - Terraform provisioner
//! - Filesystem state store
//! - Configuration management
//! - Logging infrastructure
//! - In-memory test doubles
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod mock;
pub mod runner_factory;
pub mod state;
pub mod terraform;

pub use runner_factory::FileSystemRunnerFactory;
