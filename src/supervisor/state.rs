//! Supervisor state machine and the snapshot published to readers.
//!
//! ```text
//! Stopped --start--> Starting --(survived grace)--> Running --stop--> Stopping --> Stopped
//!                    Starting --(spawn failed / died)--> Stopped
//!                                                       Running --(exited on its own)--> Stopped
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl SupervisorState {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub(crate) fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Point-in-time view of the supervisor, published atomically after every
/// transition so readers never need the lifecycle lock.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub started_at: Option<SystemTime>,
    started: Option<Instant>,
    exit: Option<watch::Receiver<Option<ExitInfo>>>,
}

impl StatusSnapshot {
    pub(crate) fn stopped() -> Self {
        Self::without_process(SupervisorState::Stopped)
    }

    pub(crate) fn without_process(state: SupervisorState) -> Self {
        Self {
            state,
            pid: None,
            started_at: None,
            started: None,
            exit: None,
        }
    }

    pub(crate) fn with_process(
        state: SupervisorState,
        pid: u32,
        started_at: SystemTime,
        started: Instant,
        exit: watch::Receiver<Option<ExitInfo>>,
    ) -> Self {
        Self {
            state,
            pid: Some(pid),
            started_at: Some(started_at),
            started: Some(started),
            exit: Some(exit),
        }
    }

    /// Time since the process was spawned.
    pub fn uptime(&self) -> Option<Duration> {
        self.started.map(|s| s.elapsed())
    }

    /// Seconds since the Unix epoch at spawn time.
    pub fn started_at_unix(&self) -> Option<u64> {
        self.started_at
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }

    /// Exit observed by the reaper but not yet reconciled under the lock.
    pub fn exited(&self) -> Option<ExitInfo> {
        self.exit.as_ref().and_then(|rx| *rx.borrow())
    }

    /// The snapshot as readers should see it: a process that already exited
    /// is reported as stopped even before the next transition cleans up.
    pub(crate) fn observed(&self) -> Self {
        if self.exited().is_some() {
            Self::stopped()
        } else {
            self.clone()
        }
    }
}
