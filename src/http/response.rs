//! Response envelope and error mapping.
//!
//! # Responsibilities
//! - Wrap successful results as `{success, message, data}`
//! - Render failures as `{detail}` with a status code chosen per error kind
//!
//! # Design Decisions
//! - Subsystem errors stay HTTP-agnostic; the mapping lives only here
//! - 5xx failures are logged at error level, client errors at debug

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::io::ErrorKind;

use crate::document::DocumentError;
use crate::logs::LogError;
use crate::net::RouteSetupError;
use crate::supervisor::SupervisorError;

/// Uniform success body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// A completed call whose outcome was negative (nothing cleared, script
    /// exited non-zero). Still a 200.
    pub fn outcome(success: bool, message: impl Into<String>, data: T) -> Self {
        Self {
            success,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Failure body: `{"detail": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid API key")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

fn io_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        let status = match &err {
            DocumentError::NotFound(_)
            | DocumentError::PathNotFound { .. }
            | DocumentError::EntryNotFound { .. } => StatusCode::NOT_FOUND,
            DocumentError::Parse { .. }
            | DocumentError::IndexOutOfRange { .. }
            | DocumentError::TypeMismatch { .. }
            | DocumentError::InvalidEntry { .. } => StatusCode::BAD_REQUEST,
            DocumentError::DuplicateEntry { .. } => StatusCode::CONFLICT,
            DocumentError::Write { .. } | DocumentError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        let status = match &err {
            SupervisorError::AlreadyRunning { .. }
            | SupervisorError::NotRunning
            | SupervisorError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SupervisorError::ExecutableNotFound(_) => StatusCode::NOT_FOUND,
            SupervisorError::Permission { .. } => StatusCode::FORBIDDEN,
            SupervisorError::Spawn { source, .. } => io_status(source.kind()),
            SupervisorError::ExitedDuringStartup { .. }
            | SupervisorError::OutputSink { .. }
            | SupervisorError::Task(_)
            | SupervisorError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        let status = match &err {
            LogError::UnknownFile(_) | LogError::NotFound(_) => StatusCode::NOT_FOUND,
            LogError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<RouteSetupError> for ApiError {
    fn from(err: RouteSetupError) -> Self {
        let status = match &err {
            RouteSetupError::Unsupported(_) => StatusCode::BAD_REQUEST,
            RouteSetupError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            RouteSetupError::Permission(_) => StatusCode::FORBIDDEN,
            RouteSetupError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::{ExitInfo, SupervisorState};
    use std::path::PathBuf;

    #[test]
    fn test_document_error_statuses() {
        let cases = [
            (DocumentError::NotFound(PathBuf::from("ZBProxy.json")), StatusCode::NOT_FOUND),
            (
                DocumentError::PathNotFound {
                    path: "Log.Level".into(),
                    segment: "Log".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                DocumentError::IndexOutOfRange {
                    path: "Services.1".into(),
                    index: 1,
                    len: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                DocumentError::DuplicateEntry {
                    section: "service",
                    name: "A".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                DocumentError::EntryNotFound {
                    section: "outbound",
                    name: "B".into(),
                },
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_supervisor_error_statuses() {
        let err = ApiError::from(SupervisorError::AlreadyRunning {
            pid: 10,
            external: true,
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.detail.contains("started externally"));

        assert_eq!(
            ApiError::from(SupervisorError::NotRunning).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SupervisorError::InvalidTransition {
                from: SupervisorState::Stopping,
                action: "start",
            })
            .status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SupervisorError::ExecutableNotFound(PathBuf::from("zb"))).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SupervisorError::Spawn {
                path: PathBuf::from("zb"),
                source: std::io::Error::from(ErrorKind::PermissionDenied),
            })
            .status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SupervisorError::ExitedDuringStartup {
                exit: ExitInfo {
                    code: Some(1),
                    signal: None
                },
            })
            .status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_log_and_route_statuses() {
        assert_eq!(
            ApiError::from(LogError::UnknownFile("x".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RouteSetupError::Timeout(std::time::Duration::from_secs(30))).status,
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ApiError::from(RouteSetupError::Unsupported("windows")).status,
            StatusCode::BAD_REQUEST
        );
    }
}
