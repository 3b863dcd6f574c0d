//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, line limits)
//! - Check addresses and file names are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Component, Path};
use std::time::Duration;

use crate::config::schema::{ManagerConfig, ProxySettings};
use crate::supervisor::CAPTURE_DRAIN;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Longest a restart can take: SIGTERM grace, SIGKILL wait, both drains and
/// the startup grace of the new process.
fn worst_case_restart(proxy: &ProxySettings) -> Duration {
    proxy.stop_timeout() + proxy.kill_timeout() + CAPTURE_DRAIN * 2 + proxy.startup_grace()
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let proxy = &config.proxy;
    if proxy.executable.trim().is_empty() {
        errors.push(ValidationError::new("proxy.executable", "must not be empty"));
    }
    if proxy.config_file.trim().is_empty() {
        errors.push(ValidationError::new("proxy.config_file", "must not be empty"));
    }
    if proxy.output_log.trim().is_empty() {
        errors.push(ValidationError::new("proxy.output_log", "must not be empty"));
    }
    if proxy.stop_timeout_ms == 0 {
        errors.push(ValidationError::new("proxy.stop_timeout_ms", "must be greater than 0"));
    }
    if proxy.kill_timeout_ms == 0 {
        errors.push(ValidationError::new("proxy.kill_timeout_ms", "must be greater than 0"));
    }

    let logs = &config.logs;
    if logs.default_lines == 0 || logs.default_lines > logs.max_lines {
        errors.push(ValidationError::new(
            "logs.default_lines",
            format!("must be between 1 and max_lines ({})", logs.max_lines),
        ));
    }
    let mut seen = HashSet::new();
    for name in &logs.files {
        if !is_plain_file_name(name) {
            errors.push(ValidationError::new(
                "logs.files",
                format!("'{}' must be a plain file name", name),
            ));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::new("logs.files", format!("'{}' listed twice", name)));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    } else {
        let worst = worst_case_restart(proxy);
        if Duration::from_secs(config.timeouts.request_secs) <= worst {
            errors.push(ValidationError::new(
                "timeouts.request_secs",
                format!(
                    "must exceed the longest restart ({}ms with the proxy timeouts)",
                    worst.as_millis()
                ),
            ));
        }
    }

    let obs = &config.observability;
    if obs.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be \"pretty\" or \"json\"",
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if config.network.script_timeout_secs == 0 {
        errors.push(ValidationError::new("network.script_timeout_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
