//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared `AppState` once per process
//! - Create the axum Router with all handlers
//! - Wire up middleware (auth, body limit, timeout, tracing, request ID)
//! - Serve until shutdown, then stop the supervised process

use axum::{
    body::Body,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers;
use super::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::admin::auth::require_api_key;
use crate::config::ManagerConfig;
use crate::document::ConfigStore;
use crate::logs::LogDirectory;
use crate::net::AnchorRoute;
use crate::supervisor::Supervisor;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ManagerConfig>,
    pub store: Arc<ConfigStore>,
    pub supervisor: Arc<Supervisor>,
    pub logs: Arc<LogDirectory>,
    pub anchor_route: Arc<AnchorRoute>,
}

impl AppState {
    pub fn new(config: ManagerConfig) -> Self {
        let supervisor = Arc::new(Supervisor::new(config.proxy.clone()));
        Self::with_supervisor(config, supervisor)
    }

    /// State around an existing supervisor.
    pub fn with_supervisor(config: ManagerConfig, supervisor: Arc<Supervisor>) -> Self {
        Self {
            store: Arc::new(ConfigStore::new(config.proxy.config_path())),
            logs: Arc::new(LogDirectory::from_config(&config.logs, &config.proxy)),
            anchor_route: Arc::new(AnchorRoute::from_config(&config.network)),
            supervisor,
            config: Arc::new(config),
        }
    }
}

/// HTTP server for the management API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ManagerConfig) -> Self {
        Self::from_state(AppState::new(config))
    }

    pub fn from_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` resolves, then stop ZBProxy.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            config = %self.state.store.path().display(),
            executable = %self.state.supervisor.settings().executable_path().display(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        self.state.supervisor.shutdown().await;
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.timeouts.request_secs);

    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/config",
            get(handlers::get_config).put(handlers::put_config_value),
        )
        .route(
            "/config/{*path}",
            get(handlers::get_config_value).delete(handlers::delete_config_value),
        )
        .route("/config/service", post(handlers::add_service))
        .route("/config/service/{name}", delete(handlers::remove_service))
        .route("/config/outbound", post(handlers::add_outbound))
        .route("/config/outbound/{name}", delete(handlers::remove_outbound))
        .route("/start", post(handlers::start))
        .route("/stop", post(handlers::stop))
        .route("/restart", post(handlers::restart))
        .route("/status", get(handlers::status))
        .route("/fix-permissions", post(handlers::fix_permissions))
        .route("/logs", get(handlers::logs_overview))
        .route("/logs/clear", post(handlers::clear_logs))
        .route("/logs/tail/{filename}", get(handlers::tail_log))
        .route("/dolinuxip", post(handlers::anchor_route))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http().make_span_with(make_span::<Body>))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}
