//! Lifecycle tests against real child processes.

use std::sync::Arc;
use std::time::Duration;
use zbproxy_manager::supervisor::{Supervisor, SupervisorError, SupervisorState};

mod common;
use common::Sandbox;

#[tokio::test]
async fn test_start_twice_keeps_one_process() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    let first = supervisor.start().await.unwrap();
    assert_eq!(first.state, SupervisorState::Running);
    let pid = first.pid.unwrap();

    match supervisor.start().await {
        Err(SupervisorError::AlreadyRunning { pid: running, external }) => {
            assert_eq!(running, pid);
            assert!(!external);
        }
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    let status = supervisor.status();
    assert_eq!(status.state, SupervisorState::Running);
    assert_eq!(status.pid, Some(pid));
    assert!(status.uptime().is_some());

    let outcome = supervisor.stop().await.unwrap();
    assert_eq!(outcome.pid, pid);
    assert!(!outcome.forced);
}

#[tokio::test]
async fn test_stop_when_stopped_is_not_running() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    assert!(matches!(
        supervisor.stop().await,
        Err(SupervisorError::NotRunning)
    ));
    assert_eq!(supervisor.status().state, SupervisorState::Stopped);
}

#[tokio::test]
async fn test_missing_executable_leaves_stopped() {
    let sandbox = Sandbox::new();
    let mut settings = sandbox.settings(common::LONG_RUNNING);
    settings.executable = "ZBProxy-missing".to_string();
    settings.args.clear();
    let supervisor = Supervisor::new(settings);

    let err = supervisor.start().await.unwrap_err();
    assert!(err.is_spawn_error());
    assert!(matches!(err, SupervisorError::ExecutableNotFound(_)));

    let status = supervisor.status();
    assert_eq!(status.state, SupervisorState::Stopped);
    assert_eq!(status.pid, None);
}

#[tokio::test]
async fn test_restart_yields_new_pid() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    let before = supervisor.start().await.unwrap().pid.unwrap();
    let outcome = supervisor.restart().await.unwrap();

    assert_eq!(outcome.previous.map(|p| p.pid), Some(before));
    assert_eq!(outcome.current.state, SupervisorState::Running);
    let after = outcome.current.pid.unwrap();
    assert_ne!(after, before);
    assert_eq!(supervisor.status().pid, Some(after));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_from_stopped_starts() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    let outcome = supervisor.restart().await.unwrap();
    assert!(outcome.previous.is_none());
    assert_eq!(outcome.current.state, SupervisorState::Running);

    supervisor.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_spawn_once() {
    let sandbox = Sandbox::new();
    let supervisor = Arc::new(Supervisor::new(sandbox.settings(common::LONG_RUNNING)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let supervisor = supervisor.clone();
        tasks.push(tokio::spawn(async move { supervisor.start().await }));
    }

    let mut started = Vec::new();
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(snapshot) => started.push(snapshot.pid.unwrap()),
            Err(SupervisorError::AlreadyRunning { pid, .. }) => {
                rejected += 1;
                assert_eq!(Some(pid), supervisor.status().pid);
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(started.len(), 1);
    assert_eq!(rejected, 7);
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_to_kill() {
    let sandbox = Sandbox::new();
    let mut settings = sandbox.settings(common::IGNORES_TERM);
    settings.stop_timeout_ms = 300;
    let supervisor = Supervisor::new(settings);

    let pid = supervisor.start().await.unwrap().pid.unwrap();
    let outcome = supervisor.stop().await.unwrap();

    assert_eq!(outcome.pid, pid);
    assert!(outcome.forced);
    assert_eq!(outcome.exit.and_then(|e| e.signal), Some(9));
    assert_eq!(supervisor.status().state, SupervisorState::Stopped);
    #[cfg(target_os = "linux")]
    assert!(!common::pid_alive(pid));
}

#[tokio::test]
async fn test_abandoned_stop_runs_to_completion() {
    let sandbox = Sandbox::new();
    let mut settings = sandbox.settings(common::IGNORES_TERM);
    settings.stop_timeout_ms = 500;
    let supervisor = Supervisor::new(settings);

    let pid = supervisor.start().await.unwrap().pid.unwrap();
    let abandoned = tokio::time::timeout(Duration::from_millis(100), supervisor.stop()).await;
    assert!(abandoned.is_err());

    assert!(
        common::wait_until(Duration::from_secs(5), || {
            supervisor.status().state == SupervisorState::Stopped
        })
        .await
    );
    #[cfg(target_os = "linux")]
    assert!(!common::pid_alive(pid));

    let restarted = supervisor.start().await.unwrap();
    assert_ne!(restarted.pid, Some(pid));
    supervisor.stop().await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_stop_takes_down_forked_children() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::FORKS_CHILD));

    supervisor.start().await.unwrap();
    let pid_file = sandbox.path().join("child.pid");
    assert!(common::wait_until(Duration::from_secs(5), || pid_file.exists()).await);
    let grandchild: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(common::pid_alive(grandchild));

    let started = std::time::Instant::now();
    let outcome = supervisor.stop().await.unwrap();
    assert!(!outcome.forced);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(
        common::wait_until(Duration::from_secs(2), || !common::pid_alive(grandchild)).await
    );
}

#[tokio::test]
async fn test_exit_during_startup_is_spawn_error() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::EXITS_AT_ONCE));

    match supervisor.start().await {
        Err(SupervisorError::ExitedDuringStartup { exit }) => assert_eq!(exit.code, Some(3)),
        other => panic!("expected ExitedDuringStartup, got {:?}", other),
    }
    assert_eq!(supervisor.status().state, SupervisorState::Stopped);

    let out = std::fs::read_to_string(sandbox.path().join("out.log")).unwrap();
    assert!(out.contains("boom"));
}

#[tokio::test]
async fn test_output_is_captured() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.path().join("out.log"), "previous run\n").unwrap();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    supervisor.start().await.unwrap();
    supervisor.stop().await.unwrap();

    let out = std::fs::read_to_string(sandbox.path().join("out.log")).unwrap();
    assert!(out.contains("proxy started"));
    assert!(!out.contains("previous run"));
}

#[tokio::test]
async fn test_append_output_keeps_previous_run() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.path().join("out.log"), "previous run\n").unwrap();
    let mut settings = sandbox.settings(common::LONG_RUNNING);
    settings.append_output = true;
    let supervisor = Supervisor::new(settings);

    supervisor.start().await.unwrap();
    supervisor.stop().await.unwrap();

    let out = std::fs::read_to_string(sandbox.path().join("out.log")).unwrap();
    assert!(out.starts_with("previous run\n"));
    assert!(out.contains("proxy started"));
}

#[tokio::test]
async fn test_process_exiting_on_its_own_reads_as_stopped() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::EXITS_LATER));

    supervisor.start().await.unwrap();
    assert!(
        common::wait_until(Duration::from_secs(5), || {
            supervisor.status().state == SupervisorState::Stopped
        })
        .await
    );

    assert!(matches!(
        supervisor.stop().await,
        Err(SupervisorError::NotRunning)
    ));
    // Reconciled: a new start is allowed.
    supervisor.start().await.unwrap();
    assert!(
        common::wait_until(Duration::from_secs(5), || {
            supervisor.status().state == SupervisorState::Stopped
        })
        .await
    );
}

#[tokio::test]
async fn test_shutdown_terminates_child() {
    let sandbox = Sandbox::new();
    let supervisor = Supervisor::new(sandbox.settings(common::LONG_RUNNING));

    let pid = supervisor.start().await.unwrap().pid.unwrap();
    supervisor.shutdown().await;

    assert_eq!(supervisor.status().state, SupervisorState::Stopped);
    #[cfg(target_os = "linux")]
    assert!(!common::pid_alive(pid));
    #[cfg(not(target_os = "linux"))]
    let _ = pid;

    // Idempotent when nothing is running.
    supervisor.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_fix_permissions_sets_755() {
    use std::os::unix::fs::PermissionsExt;

    let sandbox = Sandbox::new();
    let exe = sandbox.write_script("ZBProxy-linux-amd64-v1", "#!/bin/sh\n");
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o600)).unwrap();

    let mut settings = sandbox.settings(common::LONG_RUNNING);
    settings.executable = "ZBProxy-linux-amd64-v1".to_string();
    let supervisor = Supervisor::new(settings);

    let fix = supervisor.fix_permissions().await.unwrap();
    assert_eq!(fix.old_mode, "600");
    assert_eq!(fix.new_mode, "755");
    let mode = std::fs::metadata(&exe).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o755);
}
