//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use thiserror::Error;
use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields validated defaults.
pub fn load_or_default(path: &Path) -> Result<ManagerConfig, ConfigError> {
    if !path.exists() {
        let config = ManagerConfig::default();
        validate_config(&config).map_err(ConfigError::Validation)?;
        return Ok(config);
    }
    load_config(path)
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<ManagerConfig, ConfigError> {
    let config: ManagerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
