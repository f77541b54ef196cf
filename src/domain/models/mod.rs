pub mod config;
pub mod providers;
pub mod run_options;
pub mod technique;
pub mod technique_state;

pub use config::{Config, LoggingConfig, TerraformConfig};
pub use providers::{resolve_correlation_id, user_agent_for, CloudProviders, DETONATION_ID_ENV_VAR};
pub use run_options::RunnerOptions;
pub use technique::{
    display_text, AttackTechnique, Platform, TechniqueAction, TerraformOutputs, DISPLAY_OUTPUT_KEY,
};
pub use technique_state::TechniqueState;
