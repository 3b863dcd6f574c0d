//! Configuration schema definitions.
//!
//! This module defines the manager's own settings. The proxy's JSON file is
//! handled separately by [`crate::document`].
//! All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Supervised proxy binary and its files.
    pub proxy: ProxySettings,

    /// Log files exposed through the API.
    pub logs: LogsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub network: NetworkConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Settings of the supervised ZBProxy process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Executable path, relative to `working_dir` unless absolute.
    pub executable: String,

    /// Extra arguments passed to the executable.
    pub args: Vec<String>,

    /// Proxy JSON configuration, relative to `working_dir` unless absolute.
    pub config_file: String,

    /// Directory holding the executable and its configuration.
    /// The process is started with this as its working directory.
    pub working_dir: String,

    /// File receiving the process's combined stdout/stderr.
    pub output_log: String,

    /// Append to `output_log` instead of truncating it on every start.
    pub append_output: bool,

    /// How long a new process must stay alive to be considered started.
    pub startup_grace_ms: u64,

    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout_ms: u64,

    /// Bound on waiting for exit after SIGKILL.
    pub kill_timeout_ms: u64,

    /// Treat a same-named process we did not spawn as already running.
    pub detect_external: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            executable: "ZBProxy-linux-amd64-v1".to_string(),
            args: Vec::new(),
            config_file: "ZBProxy.json".to_string(),
            working_dir: ".".to_string(),
            output_log: "out.log".to_string(),
            append_output: false,
            startup_grace_ms: 1000,
            stop_timeout_ms: 5000,
            kill_timeout_ms: 5000,
            detect_external: true,
        }
    }
}

impl ProxySettings {
    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir_path().join(path)
        }
    }

    /// Working directory, made absolute against the manager's cwd.
    pub fn working_dir_path(&self) -> PathBuf {
        let dir = Path::new(&self.working_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|_| dir.to_path_buf())
        }
    }

    pub fn executable_path(&self) -> PathBuf {
        self.resolve(&self.executable)
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn output_log_path(&self) -> PathBuf {
        self.resolve(&self.output_log)
    }

    /// File name used to recognise externally started instances.
    pub fn executable_name(&self) -> String {
        Path::new(&self.executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.clone())
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// Log files readable through the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Directory holding the log files. Empty means the proxy working dir.
    pub directory: String,

    /// Allow-listed file names.
    pub files: Vec<String>,

    /// Lines returned by a tail read when the caller gives no count.
    pub default_lines: usize,

    /// Upper bound for a tail read.
    pub max_lines: usize,

    /// Lines per file in the overview.
    pub overview_lines: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            files: ["out.log", "zbproxy.log", "error.log", "access.log"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_lines: 50,
            max_lines: 10_000,
            overview_lines: 200,
        }
    }
}

impl LogsConfig {
    pub fn directory_path(&self, proxy: &ProxySettings) -> PathBuf {
        if self.directory.is_empty() {
            proxy.working_dir_path()
        } else {
            PathBuf::from(&self.directory)
        }
    }
}

/// Timeout configuration for API requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds. Must cover a full restart.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin authentication.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on every request. Empty disables the check.
    pub api_key: String,
}

/// Anchor-IP default route setup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Public interface the default route is bound to.
    pub interface: String,

    /// Metadata endpoint returning the anchor gateway address.
    pub anchor_metadata_url: String,

    /// Upper bound for the route script.
    pub script_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            anchor_metadata_url:
                "http://169.254.169.254/metadata/v1/interfaces/public/0/anchor_ipv4/gateway"
                    .to_string(),
            script_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_working_dir() {
        let proxy = ProxySettings {
            working_dir: "/opt/zbproxy".into(),
            ..Default::default()
        };
        assert_eq!(
            proxy.executable_path(),
            PathBuf::from("/opt/zbproxy/ZBProxy-linux-amd64-v1")
        );
        assert_eq!(proxy.config_path(), PathBuf::from("/opt/zbproxy/ZBProxy.json"));

        let proxy = ProxySettings {
            working_dir: "/opt/zbproxy".into(),
            executable: "/usr/local/bin/zbproxy".into(),
            ..Default::default()
        };
        assert_eq!(proxy.executable_path(), PathBuf::from("/usr/local/bin/zbproxy"));
        assert_eq!(proxy.executable_name(), "zbproxy");
    }

    #[test]
    fn test_logs_directory_defaults_to_working_dir() {
        let proxy = ProxySettings {
            working_dir: "/srv/proxy".into(),
            ..Default::default()
        };
        let logs = LogsConfig::default();
        assert_eq!(logs.directory_path(&proxy), PathBuf::from("/srv/proxy"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ManagerConfig = toml::from_str(
            r#"
            [proxy]
            executable = "zb"
            stop_timeout_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.proxy.executable, "zb");
        assert_eq!(config.proxy.stop_timeout_ms, 100);
        assert_eq!(config.proxy.config_file, "ZBProxy.json");
        assert_eq!(config.logs.files.len(), 4);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
    }
}
