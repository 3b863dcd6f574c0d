//! Read access to ZBProxy's log files.
//!
//! Only the file names listed in `[logs].files` can be read or cleared; any
//! other name is rejected before touching the filesystem.

pub mod error;
mod tail;

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::{LogsConfig, ProxySettings};

pub use error::{LogError, Result};

/// Result of a tail read.
#[derive(Debug, Clone, Serialize)]
pub struct TailResult {
    pub filename: String,
    pub total_lines: usize,
    pub returned_lines: usize,
    pub lines: Vec<String>,
    pub file_size: u64,
}

/// One entry of the log overview.
#[derive(Debug, Clone, Serialize)]
pub struct LogFileOverview {
    pub filename: String,
    pub exists: bool,
    pub total_lines: usize,
    pub returned_lines: usize,
    pub lines: Vec<String>,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogFileOverview {
    fn missing(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            exists: false,
            total_lines: 0,
            returned_lines: 0,
            lines: Vec::new(),
            file_size: 0,
            error: None,
        }
    }
}

/// Result of clearing the log files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearResult {
    pub cleared: Vec<String>,
    pub errors: Vec<String>,
}

impl ClearResult {
    pub fn success(&self) -> bool {
        !self.cleared.is_empty()
    }
}

/// The directory holding the allow-listed log files.
#[derive(Debug, Clone)]
pub struct LogDirectory {
    dir: PathBuf,
    files: Vec<String>,
    default_lines: usize,
    max_lines: usize,
    overview_lines: usize,
}

impl LogDirectory {
    pub fn new(dir: impl Into<PathBuf>, logs: &LogsConfig) -> Self {
        Self {
            dir: dir.into(),
            files: logs.files.clone(),
            default_lines: logs.default_lines,
            max_lines: logs.max_lines,
            overview_lines: logs.overview_lines,
        }
    }

    /// Logs live next to the proxy unless `[logs].directory` says otherwise.
    pub fn from_config(logs: &LogsConfig, proxy: &ProxySettings) -> Self {
        Self::new(logs.directory_path(proxy), logs)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !self.files.iter().any(|f| f == name) {
            return Err(LogError::UnknownFile(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    /// The last `lines` lines of `name` (default from config, clamped to
    /// `max_lines`).
    pub async fn tail(&self, name: &str, lines: Option<usize>) -> Result<TailResult> {
        let path = self.resolve(name)?;
        let limit = lines.unwrap_or(self.default_lines).min(self.max_lines);
        read_tail(name.to_string(), path, limit).await
    }

    /// Tail of every allow-listed file. Missing files are listed with
    /// `exists = false`; read failures are reported per file.
    pub async fn overview(&self) -> Vec<LogFileOverview> {
        let mut out = Vec::with_capacity(self.files.len());
        for name in &self.files {
            let path = self.dir.join(name);
            let entry = match read_tail(name.clone(), path, self.overview_lines).await {
                Ok(t) => LogFileOverview {
                    filename: t.filename,
                    exists: true,
                    total_lines: t.total_lines,
                    returned_lines: t.returned_lines,
                    lines: t.lines,
                    file_size: t.file_size,
                    error: None,
                },
                Err(LogError::NotFound(_)) => LogFileOverview::missing(name),
                Err(e) => LogFileOverview {
                    exists: true,
                    error: Some(e.to_string()),
                    ..LogFileOverview::missing(name)
                },
            };
            out.push(entry);
        }
        out
    }

    /// Truncate every existing allow-listed file.
    pub async fn clear(&self) -> ClearResult {
        let mut result = ClearResult::default();
        for name in &self.files {
            let path = self.dir.join(name);
            let truncated = tokio::fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&path)
                .await;
            match truncated {
                Ok(_) => result.cleared.push(name.clone()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Failed to clear log file");
                    result.errors.push(format!("{}: {}", name, e));
                }
            }
        }
        tracing::info!(cleared = ?result.cleared, "Log files cleared");
        result
    }
}

async fn read_tail(filename: String, path: PathBuf, limit: usize) -> Result<TailResult> {
    let blocking_path = path.clone();
    let read = tokio::task::spawn_blocking(move || {
        let (lines, size) = tail::read_last_lines(&blocking_path, limit)?;
        let total = tail::count_lines(&blocking_path)?;
        Ok::<_, std::io::Error>((lines, size, total))
    })
    .await
    .map_err(|e| LogError::Io {
        path: path.clone(),
        source: std::io::Error::other(e),
    })?;

    match read {
        Ok((lines, file_size, total_lines)) => Ok(TailResult {
            filename,
            total_lines,
            returned_lines: lines.len(),
            lines,
            file_size,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(LogError::NotFound(filename)),
        Err(source) => Err(LogError::Io { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(dir: &Path) -> LogDirectory {
        let logs = LogsConfig {
            default_lines: 2,
            max_lines: 3,
            overview_lines: 1,
            ..LogsConfig::default()
        };
        LogDirectory::new(dir, &logs)
    }

    #[tokio::test]
    async fn test_tail_defaults_and_clamp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.log"), "1\n2\n3\n4\n5\n").unwrap();
        let logs = directory(dir.path());

        let t = logs.tail("out.log", None).await.unwrap();
        assert_eq!(t.lines, vec!["4", "5"]);
        assert_eq!(t.total_lines, 5);
        assert_eq!(t.returned_lines, 2);

        let t = logs.tail("out.log", Some(100)).await.unwrap();
        assert_eq!(t.lines, vec!["3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_tail_rejects_unknown_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let logs = directory(dir.path());

        assert!(matches!(
            logs.tail("../etc/passwd", None).await,
            Err(LogError::UnknownFile(_))
        ));
        assert!(matches!(
            logs.tail("error.log", None).await,
            Err(LogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_overview_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zbproxy.log"), "a\nb\n").unwrap();
        let logs = directory(dir.path());

        let overview = logs.overview().await;
        assert_eq!(overview.len(), 4);
        let zb = overview.iter().find(|o| o.filename == "zbproxy.log").unwrap();
        assert!(zb.exists);
        assert_eq!(zb.lines, vec!["b"]);
        assert!(!overview.iter().find(|o| o.filename == "out.log").unwrap().exists);

        let cleared = logs.clear().await;
        assert!(cleared.success());
        assert_eq!(cleared.cleared, vec!["zbproxy.log"]);
        assert!(cleared.errors.is_empty());
        assert_eq!(std::fs::read(dir.path().join("zbproxy.log")).unwrap().len(), 0);

        std::fs::remove_file(dir.path().join("zbproxy.log")).unwrap();
        assert!(!logs.clear().await.success());
    }
}
