use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::DETONATION_ID_ENV_VAR;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Terraform binary path cannot be empty")]
    EmptyTerraformBinary,

    #[error("State directory cannot be empty")]
    EmptyStateDir,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .detonator/config.yaml (project config)
    /// 3. .detonator/local.yaml (project local overrides, optional)
    /// 4. Environment variables (DETONATOR_* prefix, highest priority)
    ///
    /// `DETONATOR_DETONATION_ID` lands in `detonation_id` as raw text. The
    /// env provider would otherwise coerce numeric or boolean values and fail
    /// extraction; validity is decided when the correlation ID is resolved.
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".detonator/config.yaml"))
            .merge(Yaml::file(".detonator/local.yaml"))
            .merge(Env::prefixed("DETONATOR_").ignore(&["detonation_id"]).split("__"));

        if let Some(raw) = std::env::var_os(DETONATION_ID_ENV_VAR) {
            figment = figment.merge(Serialized::default(
                "detonation_id",
                raw.to_string_lossy().into_owned(),
            ));
        }

        let config: Config = figment
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.terraform.binary_path.trim().is_empty() {
            return Err(ConfigError::EmptyTerraformBinary);
        }

        if config
            .state_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::EmptyStateDir);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
