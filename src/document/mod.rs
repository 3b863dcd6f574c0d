//! Proxy configuration document (the ZBProxy JSON file).
//!
//! # Data Flow
//! ```text
//! ZBProxy.json
//!     → store.rs (load, parse)
//!     → serde_json::Value tree
//!     → path.rs + ops.rs (resolve "Services.0.Listen", get/set/delete,
//!                         append/remove named entries)
//!     → store.rs (temp file + rename, serialized writers)
//! ```
//!
//! # Design Decisions
//! - The document stays an untyped JSON tree; only the two entry kinds
//!   that the API creates get typed shapes (entries.rs)
//! - Digit segments index sequences, and are plain keys anywhere else
//! - Intermediate containers are never created implicitly

pub mod entries;
pub mod error;
pub mod ops;
pub mod path;
pub mod store;

pub use entries::{OutboundEntry, ServiceEntry};
pub use error::DocumentError;
pub use ops::Section;
pub use path::PathExpression;
pub use store::ConfigStore;
