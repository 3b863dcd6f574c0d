//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (lifecycle counters, process gauge)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (pid, path, action) instead of formatted messages
//! - Request ID flows through every API call via tower-http
//! - Metrics are recorded unconditionally; without an exporter they are no-ops

pub mod logging;
pub mod metrics;
