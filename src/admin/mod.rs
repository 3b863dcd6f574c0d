//! Access control for the management API.
//!
//! A single shared API key, sent as `Authorization: Bearer <key>`. An empty
//! key in `[admin]` leaves the API open.

pub mod auth;

pub use auth::require_api_key;
