//! Shared utilities for integration tests.
//!
//! The supervised "proxy" is `/bin/sh` running a script from a temp
//! directory, so no binary has to be built or made executable.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use zbproxy_manager::config::{ManagerConfig, ProxySettings};

/// Runs until signalled; SIGTERM ends it at once.
pub const LONG_RUNNING: &str = "echo proxy started\nexec sleep 30\n";

/// Ignores SIGTERM, so only SIGKILL stops it.
pub const IGNORES_TERM: &str = "trap '' TERM\nwhile true; do sleep 0.1; done\n";

/// Forks a helper and records its pid in `child.pid`.
pub const FORKS_CHILD: &str = "sleep 317 &\necho $! > child.pid\nwait\n";

/// Dies before the startup grace period ends.
pub const EXITS_AT_ONCE: &str = "echo boom >&2\nexit 3\n";

/// Survives the grace period, then exits on its own.
pub const EXITS_LATER: &str = "sleep 0.6\nexit 0\n";

pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// Supervisor settings running `body` through `/bin/sh`.
    pub fn settings(&self, body: &str) -> ProxySettings {
        let script = self.write_script("proxy.sh", body);
        ProxySettings {
            executable: "/bin/sh".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
            working_dir: self.path().to_string_lossy().into_owned(),
            startup_grace_ms: 200,
            stop_timeout_ms: 1000,
            kill_timeout_ms: 2000,
            detect_external: false,
            ..ProxySettings::default()
        }
    }

    /// Manager settings around [`Sandbox::settings`], with the sample
    /// document written next to the script.
    pub fn config(&self, body: &str) -> ManagerConfig {
        self.write_document(&sample_document());
        let mut config = ManagerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.proxy = self.settings(body);
        config
    }

    pub fn write_document(&self, doc: &Value) {
        std::fs::write(
            self.path().join("ZBProxy.json"),
            serde_json::to_vec_pretty(doc).unwrap(),
        )
        .unwrap();
    }

    pub fn read_document(&self) -> Value {
        serde_json::from_slice(&std::fs::read(self.path().join("ZBProxy.json")).unwrap()).unwrap()
    }
}

pub fn sample_document() -> Value {
    json!({
        "Log": { "Level": "warn" },
        "Services": [
            {
                "Name": "A",
                "Listen": 25565,
                "IPAccess": { "Mode": "" },
                "Outbound": { "Type": "" }
            }
        ],
        "Outbounds": [
            {
                "Name": "hypixel",
                "TargetAddress": "mc.hypixel.net",
                "TargetPort": 25565
            }
        ]
    })
}

/// Send one request through the router and decode the JSON body.
pub async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn wait_until<F: FnMut() -> bool>(limit: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[cfg(target_os = "linux")]
pub fn pid_alive(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .map(|stat| {
            // State is the field after the parenthesised command name.
            stat.rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .map(|state| state != "Z" && state != "X")
                .unwrap_or(false)
        })
        .unwrap_or(false)
}
