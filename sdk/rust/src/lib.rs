//! Async client for the ZBProxy management API.

mod client;

pub use client::{ClientError, Envelope, LogTail, ManagerClient, ProcessStatus};
