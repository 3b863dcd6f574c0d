//! OS-level sampling of the supervised process.

use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

/// Resource usage of one process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    /// Percent of one core since the previous sample of this pid.
    pub cpu_percent: f32,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub run_time_secs: u64,
}

/// Result of sampling a pid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Available(ProcessMetrics),
    /// The process is gone (or a zombie). Not an error.
    Unavailable,
}

/// Samples process metrics through a long-lived `sysinfo::System`, so CPU
/// usage is measured between consecutive samples.
#[derive(Clone, Default)]
pub struct StatusReporter {
    system: Arc<Mutex<System>>,
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter").finish_non_exhaustive()
    }
}

fn is_gone(process: &Process) -> bool {
    matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn file_name_matches(path: &Path, needle: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().eq_ignore_ascii_case(needle))
        .unwrap_or(false)
}

fn name_matches(process: &Process, needle: &str) -> bool {
    let needle_lower = needle.to_lowercase();
    if process
        .name()
        .to_string_lossy()
        .to_lowercase()
        .contains(&needle_lower)
    {
        return true;
    }
    // Linux truncates the process name, so also look at the exe and argv[0].
    if process.exe().is_some_and(|exe| file_name_matches(exe, needle)) {
        return true;
    }
    process
        .cmd()
        .first()
        .map(|arg0| file_name_matches(Path::new(arg0), needle))
        .unwrap_or(false)
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample CPU and memory for `pid`. A pid that vanished between the
    /// caller's lookup and this read yields `Unavailable`.
    pub fn sample(&self, pid: u32) -> Sample {
        let sys_pid = Pid::from_u32(pid);
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        match system.process(sys_pid) {
            Some(process) if !is_gone(process) => Sample::Available(ProcessMetrics {
                pid,
                cpu_percent: process.cpu_usage(),
                memory_bytes: process.memory(),
                virtual_memory_bytes: process.virtual_memory(),
                run_time_secs: process.run_time(),
            }),
            _ => {
                tracing::debug!(pid, "Process not available for sampling");
                Sample::Unavailable
            }
        }
    }

    /// Find a live process whose name matches `executable_name`, skipping
    /// the manager itself and any pid in `exclude`.
    pub fn find_external(&self, executable_name: &str, exclude: &[u32]) -> Option<u32> {
        let own_pid = std::process::id();
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        system
            .processes()
            .iter()
            .filter(|(pid, _)| {
                let pid = pid.as_u32();
                pid != own_pid && !exclude.contains(&pid)
            })
            // Linux lists threads as processes; only whole processes count.
            .filter(|(_, process)| process.thread_kind().is_none())
            .find(|(_, process)| !is_gone(process) && name_matches(process, executable_name))
            .map(|(pid, _)| pid.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_own_process() {
        let reporter = StatusReporter::new();
        match reporter.sample(std::process::id()) {
            Sample::Available(metrics) => {
                assert_eq!(metrics.pid, std::process::id());
                assert!(metrics.memory_bytes > 0);
            }
            Sample::Unavailable => panic!("own process must be sampleable"),
        }
    }

    #[test]
    fn test_sample_missing_pid_is_unavailable() {
        let reporter = StatusReporter::new();
        // Above the Linux pid_max ceiling.
        assert_eq!(reporter.sample(4_194_304 + 17), Sample::Unavailable);
    }

    #[test]
    fn test_find_external_skips_self() {
        let reporter = StatusReporter::new();
        let own_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap();
        assert_ne!(
            reporter.find_external(&own_name, &[]),
            Some(std::process::id())
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_find_external_ignores_own_threads() {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = stop_rx.recv();
        });

        let reporter = StatusReporter::new();
        let own_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap();
        let own_threads: Vec<u32> = std::fs::read_dir("/proc/self/task")
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_string_lossy().parse().ok())
            .collect();
        assert!(own_threads.len() > 1);

        let found = reporter.find_external(&own_name, &[]);
        assert!(found.map_or(true, |pid| !own_threads.contains(&pid)));

        stop_tx.send(()).unwrap();
        worker.join().unwrap();
    }
}
