//! Ownership of one live ZBProxy process.
//!
//! The `Child` is moved into a reaper task that waits for it and publishes
//! the exit on a watch channel. The supervisor keeps the pid, the control
//! channel and the receiving side. Signals are delivered by the reaper.
//!
//! On unix the child leads its own process group and every signal goes to
//! the whole group, so helpers forked by the proxy go down with it. Once
//! the leader is reaped the group is swept with SIGKILL.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::capture::{open_sink, OutputCapture};
use super::error::{Result, SupervisorError};
use super::permissions::ensure_executable;
use super::state::ExitInfo;
use crate::config::ProxySettings;

/// Requests sent to the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Terminate,
    Kill,
}

/// Handle on a spawned process and the resources attached to it.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pid: u32,
    started_at: SystemTime,
    started: Instant,
    control: mpsc::Sender<Control>,
    exit: watch::Receiver<Option<ExitInfo>>,
    reaper: JoinHandle<()>,
    capture: OutputCapture,
}

impl ProcessHandle {
    /// Launch the executable described by `settings`.
    pub(crate) async fn spawn(settings: &ProxySettings) -> Result<Self> {
        let exe = settings.executable_path();
        match tokio::fs::metadata(&exe).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(SupervisorError::Spawn {
                    path: exe,
                    source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SupervisorError::ExecutableNotFound(exe))
            }
            Err(source) => return Err(SupervisorError::Spawn { path: exe, source }),
        }

        match ensure_executable(&exe).await {
            Ok(true) => tracing::info!(path = %exe.display(), "Added execute permission"),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                path = %exe.display(),
                error = %e,
                "Could not add execute permission"
            ),
        }

        let log_path = settings.output_log_path();
        let sink = open_sink(&log_path, settings.append_output)
            .await
            .map_err(|source| SupervisorError::OutputSink {
                path: log_path.clone(),
                source,
            })?;

        let mut command = Command::new(&exe);
        command
            .args(&settings.args)
            .current_dir(settings.working_dir_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            path: exe.clone(),
            source,
        })?;
        let started = Instant::now();
        let started_at = SystemTime::now();

        let Some(pid) = child.id() else {
            return Err(SupervisorError::Spawn {
                path: exe,
                source: std::io::Error::other("process was reaped before its pid was read"),
            });
        };

        let capture = OutputCapture::start(pid, child.stdout.take(), child.stderr.take(), sink);
        let (control_tx, control_rx) = mpsc::channel(4);
        let (exit_tx, exit_rx) = watch::channel(None);
        let reaper = tokio::spawn(reap(pid, child, control_rx, exit_tx));

        tracing::info!(
            pid,
            executable = %exe.display(),
            output = %log_path.display(),
            "Spawned ZBProxy"
        );

        Ok(Self {
            pid,
            started_at,
            started,
            control: control_tx,
            exit: exit_rx,
            reaper,
            capture,
        })
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }

    pub(crate) fn exit_receiver(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit.clone()
    }

    /// Exit status, if the reaper has seen the process end.
    pub(crate) fn exit_status(&self) -> Option<ExitInfo> {
        *self.exit.borrow()
    }

    /// Ask for a graceful stop (SIGTERM).
    pub(crate) async fn terminate(&self) {
        let _ = self.control.send(Control::Terminate).await;
    }

    /// Force the process down (SIGKILL).
    pub(crate) async fn kill(&self) {
        let _ = self.control.send(Control::Kill).await;
    }

    /// Wait up to `limit` for the process to exit.
    pub(crate) async fn wait_exit(&self, limit: Duration) -> Option<ExitInfo> {
        let mut rx = self.exit.clone();
        let exit = match tokio::time::timeout(limit, rx.wait_for(Option::is_some)).await {
            Ok(Ok(exit)) => *exit,
            // Reaper gone without reporting: the child was dropped and killed.
            Ok(Err(_)) => Some(ExitInfo::unknown()),
            Err(_) => None,
        };
        exit
    }

    /// Release the reaper and the capture sink. Call once the process has
    /// exited; a process still alive at this point is killed by the reaper
    /// when the control channel closes.
    pub(crate) async fn release(self, drain: Duration) {
        let Self {
            pid,
            control,
            reaper,
            capture,
            ..
        } = self;
        drop(control);

        let mut reaper = reaper;
        if tokio::time::timeout(drain, &mut reaper).await.is_err() {
            tracing::warn!(pid, "Reaper did not finish, aborting it");
            reaper.abort();
            let _ = reaper.await;
        }
        capture.finish(drain).await;
    }
}

async fn reap(
    pid: u32,
    mut child: Child,
    mut control: mpsc::Receiver<Control>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
) {
    let mut control_open = true;
    loop {
        tokio::select! {
            status = child.wait() => {
                let exit = match status {
                    Ok(status) => ExitInfo::from(status),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to wait for ZBProxy");
                        ExitInfo::unknown()
                    }
                };
                tracing::info!(pid, code = ?exit.code, signal = ?exit.signal, "ZBProxy exited");
                sweep_group(pid);
                let _ = exit_tx.send(Some(exit));
                return;
            }
            request = control.recv(), if control_open => match request {
                Some(Control::Terminate) => send_terminate(&mut child),
                Some(Control::Kill) => send_kill(&mut child),
                None => {
                    control_open = false;
                    send_kill(&mut child);
                }
            },
        }
    }
}

/// Deliver `signal` to the process group led by the child. `id()` is None
/// once the child has been reaped, so a recycled pid is never signalled.
#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => {
            tracing::debug!(pid, signal = ?signal, "Signalled process group");
            true
        }
        Err(nix::errno::Errno::ESRCH) => {
            tracing::debug!(pid, "Process group already gone");
            true
        }
        Err(e) => {
            tracing::warn!(pid, signal = ?signal, error = %e, "Failed to signal process group");
            false
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(unix)]
fn send_kill(child: &mut Child) {
    if !signal_group(child, nix::sys::signal::Signal::SIGKILL) {
        if let Err(e) = child.start_kill() {
            tracing::debug!(error = %e, "SIGKILL not delivered");
        }
    }
}

/// Kill whatever is left in the group after its leader exited. The group
/// id stays reserved while any member is alive.
#[cfg(unix)]
fn sweep_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => tracing::info!(pid, "Killed processes left in ZBProxy's group"),
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "Failed to sweep process group"),
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn send_kill(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn sweep_group(_pid: u32) {}
