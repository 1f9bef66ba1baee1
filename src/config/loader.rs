//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CourierConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that forces the legacy plaintext transport.
pub const LEGACY_PLAINTEXT_ENV: &str = "COURIER_LEGACY_PLAINTEXT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CourierConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate a TOML document.
pub fn parse_config(content: &str) -> Result<CourierConfig, ConfigError> {
    let mut config: CourierConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, std::env::var(LEGACY_PLAINTEXT_ENV).ok().as_deref());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the deployment-environment flag. Only ever switches plaintext on.
pub fn apply_env_overrides(config: &mut CourierConfig, legacy_flag: Option<&str>) {
    if let Some(flag) = legacy_flag {
        if matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
            tracing::warn!("{} set, using plaintext transport", LEGACY_PLAINTEXT_ENV);
            config.transport.legacy_plaintext = true;
        }
    }
}
