//! Consumer-facing status view: supervisor snapshot plus OS metrics.

pub mod reporter;

use serde::Serialize;

use crate::supervisor::{Supervisor, SupervisorState};

pub use reporter::{ProcessMetrics, Sample, StatusReporter};

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: SupervisorState,
    pub running: bool,
    pub pid: Option<u32>,
    /// Unix seconds.
    pub started_at: Option<u64>,
    pub uptime_secs: Option<f64>,
    pub cpu_percent: Option<f32>,
    pub memory_bytes: Option<u64>,
    pub memory_mb: Option<f64>,
    /// The process was not spawned by this manager.
    pub external: bool,
    pub message: String,
}

impl StatusReport {
    fn stopped(message: impl Into<String>) -> Self {
        Self {
            state: SupervisorState::Stopped,
            running: false,
            pid: None,
            started_at: None,
            uptime_secs: None,
            cpu_percent: None,
            memory_bytes: None,
            memory_mb: None,
            external: false,
            message: message.into(),
        }
    }

    fn with_metrics(mut self, metrics: ProcessMetrics) -> Self {
        self.cpu_percent = Some(metrics.cpu_percent);
        self.memory_bytes = Some(metrics.memory_bytes);
        self.memory_mb = Some(round2(metrics.memory_bytes as f64 / (1024.0 * 1024.0)));
        self
    }

    /// Sample the supervised process. A pid that vanished between the
    /// snapshot and the sample demotes the report to stopped.
    pub async fn collect(supervisor: &Supervisor) -> Self {
        let snapshot = supervisor.status();

        if let Some(pid) = snapshot.pid {
            return match sample(supervisor.reporter(), pid).await {
                Sample::Available(metrics) => Self {
                    state: snapshot.state,
                    running: snapshot.state == SupervisorState::Running,
                    pid: Some(pid),
                    started_at: snapshot.started_at_unix(),
                    uptime_secs: snapshot.uptime().map(|d| round2(d.as_secs_f64())),
                    cpu_percent: None,
                    memory_bytes: None,
                    memory_mb: None,
                    external: false,
                    message: format!("ZBProxy is {}", snapshot.state),
                }
                .with_metrics(metrics),
                Sample::Unavailable => Self::stopped("ZBProxy process exited"),
            };
        }

        if snapshot.state != SupervisorState::Stopped {
            let mut report = Self::stopped(format!("ZBProxy is {}", snapshot.state));
            report.state = snapshot.state;
            return report;
        }

        let Some(pid) = supervisor.external_instance().await else {
            return Self::stopped("ZBProxy is not running");
        };
        match sample(supervisor.reporter(), pid).await {
            Sample::Available(metrics) => Self {
                state: SupervisorState::Running,
                running: true,
                pid: Some(pid),
                started_at: None,
                uptime_secs: Some(metrics.run_time_secs as f64),
                cpu_percent: None,
                memory_bytes: None,
                memory_mb: None,
                external: true,
                message: "ZBProxy is running (started externally)".to_string(),
            }
            .with_metrics(metrics),
            Sample::Unavailable => Self::stopped("ZBProxy is not running"),
        }
    }
}

async fn sample(reporter: &StatusReporter, pid: u32) -> Sample {
    let reporter = reporter.clone();
    tokio::task::spawn_blocking(move || reporter.sample(pid))
        .await
        .unwrap_or(Sample::Unavailable)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
