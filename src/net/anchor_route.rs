//! Default-route setup through the cloud anchor gateway.
//!
//! The gateway address is fetched from the instance metadata service with
//! `curl` and installed with `ip route replace`. Interface and URL are passed
//! to bash as positional arguments, never spliced into the script text.

use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::NetworkConfig;

const SCRIPT: &str = r#"IFACE="$1"
ANCHOR_IP=$(curl -s "$2")
if [ -n "$ANCHOR_IP" ]; then
    echo "Setting default route via $ANCHOR_IP ($IFACE)"
    ip route replace default via "$ANCHOR_IP" dev "$IFACE"
else
    echo "Could not fetch the anchor IP" >&2
    exit 1
fi
"#;

#[derive(Debug, Error)]
pub enum RouteSetupError {
    #[error("route setup is only supported on Linux (current OS: {0})")]
    Unsupported(&'static str),

    #[error("route setup script timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("insufficient privileges to change the routing table: {0}")]
    Permission(#[source] std::io::Error),

    #[error("failed to run route setup script: {0}")]
    Io(#[source] std::io::Error),
}

/// Captured result of one script run. A non-zero exit is reported here,
/// not as an error.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSetupOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct AnchorRoute {
    interface: String,
    metadata_url: String,
    timeout: Duration,
}

impl AnchorRoute {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            interface: config.interface.clone(),
            metadata_url: config.anchor_metadata_url.clone(),
            timeout: Duration::from_secs(config.script_timeout_secs),
        }
    }

    pub async fn apply(&self) -> Result<RouteSetupOutput, RouteSetupError> {
        if !cfg!(target_os = "linux") {
            return Err(RouteSetupError::Unsupported(std::env::consts::OS));
        }
        self.run_script(SCRIPT).await
    }

    async fn run_script(&self, script: &str) -> Result<RouteSetupOutput, RouteSetupError> {
        let child = Command::new("/bin/bash")
            .arg("-c")
            .arg(script)
            .arg("anchor-route")
            .arg(&self.interface)
            .arg(&self.metadata_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(classify)?;

        // On timeout the future is dropped, which kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(classify)?,
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Route setup script timed out");
                return Err(RouteSetupError::Timeout(self.timeout));
            }
        };

        let result = RouteSetupOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        };
        if result.success {
            tracing::info!(interface = %self.interface, "Anchor route applied");
        } else {
            tracing::warn!(
                interface = %self.interface,
                exit_code = ?result.exit_code,
                stderr = %result.stderr,
                "Anchor route setup failed"
            );
        }
        Ok(result)
    }
}

fn classify(e: std::io::Error) -> RouteSetupError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        RouteSetupError::Permission(e)
    } else {
        RouteSetupError::Io(e)
    }
}
