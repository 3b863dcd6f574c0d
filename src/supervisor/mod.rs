//! Lifecycle supervision of the ZBProxy process.
//!
//! # State
//! ```text
//! Supervisor
//!   └── core: Arc<Core>
//!         ├── inner: Mutex<Inner>            held for the full length of every transition
//!         │     ├── state: SupervisorState
//!         │     └── handle: Option<ProcessHandle>
//!         └── snapshot: ArcSwap<StatusSnapshot>   republished after every transition
//! ```
//!
//! # Design Decisions
//! - One owned instance per service, shared through `Arc`, never rebuilt per request
//! - Spawning and signalling only happen while `inner` is locked, so two
//!   transitions never overlap and concurrent `start` calls spawn at most once
//! - `status()` reads the published snapshot and never waits on a transition
//! - A child that exits on its own is reaped at the next transition (reconcile)
//!   and reported as stopped by readers in the meantime
//! - Transitions run on their own task, so a caller that gives up (request
//!   timeout, client disconnect) never leaves a transition half done

pub mod capture;
pub mod error;
pub mod permissions;
pub mod process;
pub mod state;

use arc_swap::ArcSwap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ProxySettings;
use crate::observability::metrics;
use crate::status::StatusReporter;
use process::ProcessHandle;

pub use error::{Result, SupervisorError};
pub use permissions::PermissionFix;
pub use state::{ExitInfo, StatusSnapshot, SupervisorState};

/// Upper bound on flushing the capture pipes after the process is gone.
pub const CAPTURE_DRAIN: Duration = Duration::from_secs(2);

/// Result of a successful stop.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StopOutcome {
    pub pid: u32,
    /// `None` when the process did not even report an exit after SIGKILL.
    pub exit: Option<ExitInfo>,
    /// SIGKILL was needed.
    pub forced: bool,
}

/// Result of a successful restart.
#[derive(Debug, Clone)]
pub struct RestartOutcome {
    /// The stop half, absent when nothing was running.
    pub previous: Option<StopOutcome>,
    pub current: StatusSnapshot,
}

#[derive(Debug)]
struct Inner {
    state: SupervisorState,
    handle: Option<ProcessHandle>,
}

impl Inner {
    fn transition(&mut self, next: SupervisorState, action: &'static str) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SupervisorError::InvalidTransition {
                from: self.state,
                action,
            });
        }
        tracing::debug!(from = %self.state, to = %next, action, "Supervisor transition");
        self.state = next;
        Ok(())
    }
}

/// Owner of the single supervised ZBProxy instance.
#[derive(Debug)]
pub struct Supervisor {
    core: Arc<Core>,
}

#[derive(Debug)]
struct Core {
    settings: ProxySettings,
    reporter: StatusReporter,
    inner: Mutex<Inner>,
    snapshot: ArcSwap<StatusSnapshot>,
}

impl Supervisor {
    pub fn new(settings: ProxySettings) -> Self {
        Self {
            core: Arc::new(Core {
                settings,
                reporter: StatusReporter::new(),
                inner: Mutex::new(Inner {
                    state: SupervisorState::Stopped,
                    handle: None,
                }),
                snapshot: ArcSwap::from_pointee(StatusSnapshot::stopped()),
            }),
        }
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.core.settings
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.core.reporter
    }

    /// Current state without taking the lifecycle lock.
    pub fn status(&self) -> StatusSnapshot {
        self.core.status()
    }

    /// Spawn ZBProxy. Fails `AlreadyRunning` when this supervisor owns a live
    /// process or an external instance is detected.
    pub async fn start(&self) -> Result<StatusSnapshot> {
        self.run("start", |core| async move {
            let mut inner = core.inner.lock().await;
            core.start_locked(&mut inner).await
        })
        .await
    }

    /// SIGTERM, then SIGKILL once `stop_timeout` elapses.
    pub async fn stop(&self) -> Result<StopOutcome> {
        self.run("stop", |core| async move {
            let mut inner = core.inner.lock().await;
            core.stop_locked(&mut inner).await
        })
        .await
    }

    /// Stop (if running) and start again under one lock acquisition.
    pub async fn restart(&self) -> Result<RestartOutcome> {
        self.run("restart", |core| async move {
            let mut inner = core.inner.lock().await;
            core.restart_locked(&mut inner).await
        })
        .await
    }

    /// Reset the executable's mode to `0o755`. Holds the lifecycle lock so it
    /// never races a spawn.
    pub async fn fix_permissions(&self) -> Result<PermissionFix> {
        self.run("fix_permissions", |core| async move {
            let _inner = core.inner.lock().await;
            permissions::fix_permissions(&core.settings.executable_path()).await
        })
        .await
    }

    /// Terminate the live child, if any. Called once when the service exits.
    pub async fn shutdown(&self) {
        let core = Arc::clone(&self.core);
        let task = tokio::spawn(async move {
            let mut inner = core.inner.lock().await;
            core.reconcile(&mut inner).await;
            if inner.handle.is_none() {
                return;
            }
            tracing::info!("Stopping ZBProxy before shutdown");
            match core.stop_locked(&mut inner).await {
                Ok(outcome) => {
                    tracing::info!(pid = outcome.pid, forced = outcome.forced, "ZBProxy stopped")
                }
                Err(e) => tracing::error!(error = %e, "Failed to stop ZBProxy during shutdown"),
            }
        });
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Shutdown task failed");
        }
    }

    /// Pid of a same-named process this supervisor did not spawn.
    pub async fn external_instance(&self) -> Option<u32> {
        self.core.external_instance().await
    }

    /// Drive one lifecycle operation to completion on its own task. Dropping
    /// the returned future only stops waiting for the result.
    async fn run<T, F, Fut>(&self, action: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Core>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let work = op(Arc::clone(&self.core));
        let task = tokio::spawn(async move {
            let result = work.await;
            metrics::record_lifecycle(action, result.is_ok());
            result
        });
        task.await?
    }
}

impl Core {
    fn status(&self) -> StatusSnapshot {
        self.snapshot.load().observed()
    }

    async fn external_instance(&self) -> Option<u32> {
        if !self.settings.detect_external {
            return None;
        }
        let owned: Vec<u32> = self.status().pid.into_iter().collect();
        let name = self.settings.executable_name();
        let reporter = self.reporter.clone();
        match tokio::task::spawn_blocking(move || reporter.find_external(&name, &owned)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "External process scan failed");
                None
            }
        }
    }

    async fn start_locked(&self, inner: &mut Inner) -> Result<StatusSnapshot> {
        self.reconcile(inner).await;

        if let Some(handle) = &inner.handle {
            return Err(SupervisorError::AlreadyRunning {
                pid: handle.pid(),
                external: false,
            });
        }
        if let Some(pid) = self.external_instance().await {
            return Err(SupervisorError::AlreadyRunning {
                pid,
                external: true,
            });
        }

        inner.transition(SupervisorState::Starting, "start")?;
        self.publish(SupervisorState::Starting, None);

        let handle = match ProcessHandle::spawn(&self.settings).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start ZBProxy");
                inner.state = SupervisorState::Stopped;
                self.publish(SupervisorState::Stopped, None);
                return Err(e);
            }
        };
        self.publish(SupervisorState::Starting, Some(&handle));

        if let Some(exit) = handle.wait_exit(self.settings.startup_grace()).await {
            let pid = handle.pid();
            handle.release(CAPTURE_DRAIN).await;
            inner.state = SupervisorState::Stopped;
            self.publish(SupervisorState::Stopped, None);
            tracing::error!(pid, %exit, "ZBProxy exited during startup");
            return Err(SupervisorError::ExitedDuringStartup { exit });
        }

        inner.transition(SupervisorState::Running, "start")?;
        let snapshot = self.publish(SupervisorState::Running, Some(&handle));
        tracing::info!(pid = handle.pid(), "ZBProxy running");
        inner.handle = Some(handle);
        metrics::record_process_up(true);
        Ok(snapshot)
    }

    async fn stop_locked(&self, inner: &mut Inner) -> Result<StopOutcome> {
        self.reconcile(inner).await;

        if inner.handle.is_none() {
            return Err(SupervisorError::NotRunning);
        }
        inner.transition(SupervisorState::Stopping, "stop")?;
        let Some(handle) = inner.handle.take() else {
            return Err(SupervisorError::NotRunning);
        };
        self.publish(SupervisorState::Stopping, Some(&handle));

        let pid = handle.pid();
        tracing::info!(pid, "Stopping ZBProxy");
        handle.terminate().await;

        let (exit, forced) = match handle.wait_exit(self.settings.stop_timeout()).await {
            Some(exit) => (Some(exit), false),
            None => {
                tracing::warn!(
                    pid,
                    timeout_ms = self.settings.stop_timeout_ms,
                    "ZBProxy ignored SIGTERM, sending SIGKILL"
                );
                handle.kill().await;
                (handle.wait_exit(self.settings.kill_timeout()).await, true)
            }
        };
        if exit.is_none() {
            tracing::error!(pid, "ZBProxy did not report an exit after SIGKILL");
        }

        handle.release(CAPTURE_DRAIN).await;
        inner.transition(SupervisorState::Stopped, "stop")?;
        self.publish(SupervisorState::Stopped, None);
        metrics::record_process_up(false);

        Ok(StopOutcome { pid, exit, forced })
    }

    async fn restart_locked(&self, inner: &mut Inner) -> Result<RestartOutcome> {
        self.reconcile(inner).await;
        let previous = if inner.handle.is_some() {
            Some(self.stop_locked(inner).await?)
        } else {
            None
        };
        let current = self.start_locked(inner).await?;
        Ok(RestartOutcome { previous, current })
    }

    /// Drop a handle whose process already exited on its own.
    async fn reconcile(&self, inner: &mut Inner) {
        let Some(exit) = inner.handle.as_ref().and_then(ProcessHandle::exit_status) else {
            return;
        };
        if let Some(handle) = inner.handle.take() {
            let pid = handle.pid();
            handle.release(CAPTURE_DRAIN).await;
            tracing::warn!(pid, %exit, "ZBProxy exited on its own");
        }
        inner.state = SupervisorState::Stopped;
        self.publish(SupervisorState::Stopped, None);
        metrics::record_process_up(false);
    }

    fn publish(&self, state: SupervisorState, handle: Option<&ProcessHandle>) -> StatusSnapshot {
        let snapshot = match handle {
            Some(h) => StatusSnapshot::with_process(
                state,
                h.pid(),
                h.started_at(),
                h.started(),
                h.exit_receiver(),
            ),
            None => StatusSnapshot::without_process(state),
        };
        self.snapshot.store(Arc::new(snapshot.clone()));
        snapshot
    }
}
