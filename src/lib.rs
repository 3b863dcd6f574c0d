//! ZBProxy management library.
//!
//! Supervises one ZBProxy process and edits its JSON configuration over an
//! HTTP API.

pub mod config;
pub mod document;
pub mod http;
pub mod logs;
pub mod net;
pub mod status;
pub mod supervisor;
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::ManagerConfig;
pub use document::ConfigStore;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use supervisor::Supervisor;
