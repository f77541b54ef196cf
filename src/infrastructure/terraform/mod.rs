//! Terraform-backed provisioning gateway.

pub mod provisioner;

pub use provisioner::{friendly_error_message, parse_outputs, TerraformProvisioner};
