use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    /// The name is not one of the exposed log files.
    #[error("log file '{0}' is not available")]
    UnknownFile(String),

    #[error("log file '{0}' does not exist")]
    NotFound(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LogError>;
