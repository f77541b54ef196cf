//! Port trait definitions (Hexagonal Architecture)
//!
//! - Provisioner: the external provisioning tool (Terraform)
//! - StateStore: durable per-technique state
//!
//! These traits keep the runner independent of the process and filesystem
//! adapters in `infrastructure`.

pub mod provisioner;
pub mod state_store;

pub use provisioner::Provisioner;
pub use state_store::StateStore;
