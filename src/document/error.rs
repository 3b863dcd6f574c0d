//! Errors raised by the proxy configuration document store.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading, resolving or persisting the proxy document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("configuration file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("path does not exist: {path} (missing segment '{segment}')")]
    PathNotFound { path: String, segment: String },

    #[error("index {index} out of range for '{path}' (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("cannot resolve segment '{segment}' of '{path}': found {found}")]
    TypeMismatch {
        path: String,
        segment: String,
        found: &'static str,
    },

    #[error("{section} entry '{name}' not found")]
    EntryNotFound { section: &'static str, name: String },

    #[error("{section} entry '{name}' already exists")]
    DuplicateEntry { section: &'static str, name: String },

    #[error("invalid {section} entry: {source}")]
    InvalidEntry {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write configuration file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DocumentError>;
