//! HTTP API over the document store, the supervisor and the log files.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, middleware stack)
//!     → request.rs (x-request-id assigned, request span)
//!     → admin::auth (bearer token, when configured)
//!     → handlers.rs (decode, call document / supervisor / logs / net)
//!     → response.rs (envelope or {detail} with mapped status)
//! ```
//!
//! # Design Decisions
//! - Handlers hold no state of their own; everything shared sits in `AppState`
//! - Body decoding failures are reported as 400 with the same `{detail}` shape

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ApiResponse};
pub use server::{AppState, HttpServer};
