//! Manager configuration subsystem.
//!
//! # Data Flow
//! ```text
//! manager.toml (optional)
//!     → loader.rs (parse & deserialize, defaults when absent)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → shared via Arc with the API and the supervisor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart of the manager
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The proxy's own JSON file is not manager config; see `crate::document`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::ManagerConfig;
pub use schema::{
    AdminConfig, ListenerConfig, LogsConfig, NetworkConfig, ObservabilityConfig, ProxySettings,
    TimeoutConfig,
};
