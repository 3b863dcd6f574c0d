//! Route handlers. Each one is a thin translation between HTTP and a
//! subsystem call; all policy lives in the subsystems.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::SystemTime;

use super::response::{ApiError, ApiResponse, ApiResult};
use super::server::AppState;
use crate::document::{ops, OutboundEntry, PathExpression, Section, ServiceEntry};
use crate::status::StatusReport;
use crate::supervisor::StatusSnapshot;

/// Body of `PUT /config`.
#[derive(Debug, Deserialize)]
pub struct ConfigUpdate {
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct TailQuery {
    pub lines: Option<usize>,
}

fn snapshot_json(snapshot: &StatusSnapshot) -> Value {
    json!({
        "state": snapshot.state,
        "pid": snapshot.pid,
        "started_at": snapshot.started_at_unix(),
    })
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "ZBProxy management API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// --- configuration document -------------------------------------------------

pub async fn get_config(State(state): State<AppState>) -> ApiResult<Value> {
    let doc = state.store.load().await?;
    Ok(ApiResponse::ok("configuration loaded", doc))
}

pub async fn get_config_value(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Value> {
    let expr = PathExpression::parse(&path);
    let doc = state.store.load().await?;
    let value = ops::get(&doc, &expr)?.clone();
    Ok(ApiResponse::ok(
        format!("value of {}", expr),
        json!({ "path": expr.as_str(), "value": value }),
    ))
}

pub async fn put_config_value(
    State(state): State<AppState>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(update) = body?;
    let expr = PathExpression::parse(&update.path);
    let value = update.value.clone();
    state
        .store
        .update(|doc| ops::set(doc, &expr, value))
        .await?;

    tracing::info!(path = %expr, "Configuration value updated");
    Ok(ApiResponse::ok(
        format!("updated {} = {}", expr, update.value),
        json!({ "path": expr.as_str(), "value": update.value }),
    ))
}

pub async fn delete_config_value(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Value> {
    let expr = PathExpression::parse(&path);
    let removed = state.store.update(|doc| ops::delete(doc, &expr)).await?;

    tracing::info!(path = %expr, "Configuration value deleted");
    Ok(ApiResponse::ok(
        format!("deleted {}", expr),
        json!({ "path": expr.as_str(), "removed": removed }),
    ))
}

async fn add_entry(state: &AppState, section: Section, name: String, entry: Value) -> ApiResult<Value> {
    let stored = entry.clone();
    let unique_name = name.clone();
    state
        .store
        .update(move |doc| {
            ops::ensure_unique_name(doc, section, &unique_name)?;
            ops::append_entry(doc, section, entry)
        })
        .await?;

    tracing::info!(section = section.key(), name = %name, "Entry added");
    Ok(ApiResponse::ok(
        format!("{} '{}' added", section.label(), name),
        stored,
    ))
}

async fn remove_entry(state: &AppState, section: Section, name: String) -> ApiResult<Value> {
    let removed = state
        .store
        .update(|doc| ops::remove_entry(doc, section, &name))
        .await?;

    tracing::info!(section = section.key(), name = %name, "Entry removed");
    Ok(ApiResponse::ok(
        format!("{} '{}' removed", section.label(), name),
        removed,
    ))
}

pub async fn add_service(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let entry = ServiceEntry::from_value(body)?;
    let name = entry.name.clone();
    add_entry(&state, Section::Services, name, entry.into_value()?).await
}

pub async fn remove_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    remove_entry(&state, Section::Services, name).await
}

pub async fn add_outbound(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let entry = OutboundEntry::from_value(body)?.with_defaults();
    let name = entry.name.clone();
    add_entry(&state, Section::Outbounds, name, entry.into_value()?).await
}

pub async fn remove_outbound(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    remove_entry(&state, Section::Outbounds, name).await
}

// --- process lifecycle ------------------------------------------------------

pub async fn start(State(state): State<AppState>) -> ApiResult<Value> {
    let snapshot = state.supervisor.start().await?;
    let pid = snapshot.pid.unwrap_or_default();
    Ok(ApiResponse::ok(
        format!("ZBProxy started (PID {})", pid),
        snapshot_json(&snapshot),
    ))
}

pub async fn stop(State(state): State<AppState>) -> ApiResult<Value> {
    let outcome = state.supervisor.stop().await?;
    let message = if outcome.forced {
        format!("ZBProxy killed (PID {})", outcome.pid)
    } else {
        format!("ZBProxy stopped (PID {})", outcome.pid)
    };
    Ok(ApiResponse::ok(message, json!(outcome)))
}

pub async fn restart(State(state): State<AppState>) -> ApiResult<Value> {
    let outcome = state.supervisor.restart().await?;
    let previous_pid = outcome.previous.map(|p| p.pid);
    let mut data = snapshot_json(&outcome.current);
    data["previous_pid"] = json!(previous_pid);
    Ok(ApiResponse::ok(
        format!(
            "ZBProxy restarted (PID {})",
            outcome.current.pid.unwrap_or_default()
        ),
        data,
    ))
}

pub async fn status(State(state): State<AppState>) -> ApiResult<StatusReport> {
    let report = StatusReport::collect(&state.supervisor).await;
    Ok(ApiResponse::ok(report.message.clone(), report))
}

pub async fn fix_permissions(State(state): State<AppState>) -> ApiResult<Value> {
    let fix = state.supervisor.fix_permissions().await?;
    Ok(ApiResponse::ok(
        format!("permissions {} -> {}", fix.old_mode, fix.new_mode),
        json!(fix),
    ))
}

// --- logs -------------------------------------------------------------------

pub async fn logs_overview(State(state): State<AppState>) -> ApiResult<Value> {
    let report = StatusReport::collect(&state.supervisor).await;
    let logs = state.logs.overview().await;
    Ok(ApiResponse::ok(
        "log overview",
        json!({
            "zbproxy_status": report,
            "logs": logs,
            "timestamp": unix_now(),
        }),
    ))
}

pub async fn clear_logs(State(state): State<AppState>) -> ApiResult<Value> {
    let result = state.logs.clear().await;
    let message = if result.success() {
        format!("cleared: {}", result.cleared.join(", "))
    } else {
        "no log files to clear".to_string()
    };
    Ok(ApiResponse::outcome(result.success(), message, json!(result)))
}

pub async fn tail_log(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<TailQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let tail = state.logs.tail(&filename, query.lines).await?;
    Ok(ApiResponse::ok(
        format!("last {} lines of {}", tail.returned_lines, tail.filename),
        json!(tail),
    ))
}

// --- host networking --------------------------------------------------------

pub async fn anchor_route(State(state): State<AppState>) -> ApiResult<Value> {
    let output = state.anchor_route.apply().await?;
    let message = if output.success {
        "default route set via anchor gateway"
    } else {
        "anchor route setup failed"
    };
    Ok(ApiResponse::outcome(output.success, message, json!(output)))
}
