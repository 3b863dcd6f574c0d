//! Host networking helpers.
//!
//! - listener.rs binds the API socket
//! - anchor_route.rs points the default route at the cloud anchor gateway
//!   so proxied traffic leaves through the reserved IP (Linux only)

pub mod anchor_route;
pub mod listener;

pub use anchor_route::{AnchorRoute, RouteSetupError, RouteSetupOutput};
pub use listener::{bind, ListenerError};
