//! End-to-end: real listener, real HTTP, the Rust SDK as client.

use serde_json::json;
use std::time::Duration;
use zbproxy_manager::http::HttpServer;
use zbproxy_manager::lifecycle::Shutdown;
use zbproxy_manager_sdk::{ClientError, ManagerClient};

mod common;
use common::Sandbox;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sdk_against_running_server() {
    let sandbox = Sandbox::new();
    let mut config = sandbox.config(common::LONG_RUNNING);
    config.admin.api_key = "e2e-key".to_string();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    let supervisor = server.state().supervisor.clone();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.wait()));

    let url = format!("http://{}", addr);
    let client = ManagerClient::new(&url).with_api_key("e2e-key");

    // Config editing.
    assert_eq!(client.get_value("Services.0.Listen").await.unwrap(), json!(25565));
    client.set_value("Log.Level", json!("debug")).await.unwrap();
    assert_eq!(client.get_value("Log.Level").await.unwrap(), json!("debug"));

    client
        .add_service(&json!({ "Name": "lobby", "Listen": 25570 }))
        .await
        .unwrap();
    match client.add_service(&json!({ "Name": "lobby", "Listen": 25571 })).await {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 409),
        other => panic!("expected 409, got {:?}", other.map(|e| e.message)),
    }
    client.remove_service("lobby").await.unwrap();

    // Lifecycle.
    let started = client.start().await.unwrap();
    assert!(started.success);
    let status = client.status().await.unwrap();
    assert!(status.running);
    assert!(!status.external);
    let pid = status.pid.unwrap();

    let tail = client.tail("out.log", Some(10)).await.unwrap();
    assert_eq!(tail.filename, "out.log");

    // Unauthenticated clients are turned away.
    match ManagerClient::new(&url).status().await {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected 401, got {:?}", other.map(|s| s.state)),
    }

    // Shutting the server down stops the proxy.
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(supervisor.status().pid.is_none());
    #[cfg(target_os = "linux")]
    assert!(!common::pid_alive(pid));
    #[cfg(not(target_os = "linux"))]
    let _ = pid;
}
