use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::state::{ExitInfo, SupervisorState};

fn origin(external: &bool) -> &'static str {
    if *external {
        ", started externally"
    } else {
        ""
    }
}

/// Failure of a lifecycle operation. Every variant leaves the supervisor in
/// a well-defined state: `Stopped` with no handle, or unchanged.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("ZBProxy is already running (PID {pid}{})", origin(.external))]
    AlreadyRunning { pid: u32, external: bool },

    #[error("ZBProxy is not running")]
    NotRunning,

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: SupervisorState,
        action: &'static str,
    },

    #[error("ZBProxy executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ZBProxy exited during startup ({exit})")]
    ExitedDuringStartup { exit: ExitInfo },

    #[error("cannot open output log {}: {source}", .path.display())]
    OutputSink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("insufficient permissions on {}: {source}", .path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lifecycle task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SupervisorError {
    /// Launch failures: missing executable, refused exec, immediate crash.
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            SupervisorError::ExecutableNotFound(_)
                | SupervisorError::Spawn { .. }
                | SupervisorError::ExitedDuringStartup { .. }
                | SupervisorError::OutputSink { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
