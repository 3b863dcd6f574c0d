//! Execute-permission repair for the proxy binary.

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::{Result, SupervisorError};

/// rwxr-xr-x
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Outcome of a permission fix.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PermissionFix {
    pub path: PathBuf,
    pub old_mode: String,
    pub new_mode: String,
}

fn classify(path: &Path, source: std::io::Error) -> SupervisorError {
    match source.kind() {
        ErrorKind::NotFound => SupervisorError::ExecutableNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => SupervisorError::Permission {
            path: path.to_path_buf(),
            source,
        },
        _ => SupervisorError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_of(meta: &std::fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o555
    } else {
        0o755
    }
}

fn format_mode(mode: u32) -> String {
    format!("{:03o}", mode & 0o777)
}

/// Set the executable to `0o755`. Idempotent.
pub(crate) async fn fix_permissions(path: &Path) -> Result<PermissionFix> {
    let before = tokio::fs::metadata(path)
        .await
        .map_err(|e| classify(path, e))?;
    let old_mode = mode_of(&before);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
            .await
            .map_err(|e| classify(path, e))?;
    }

    let after = tokio::fs::metadata(path)
        .await
        .map_err(|e| classify(path, e))?;
    let new_mode = mode_of(&after);

    tracing::info!(
        path = %path.display(),
        old_mode = %format_mode(old_mode),
        new_mode = %format_mode(new_mode),
        "Executable permissions fixed"
    );

    Ok(PermissionFix {
        path: path.to_path_buf(),
        old_mode: format_mode(old_mode),
        new_mode: format_mode(new_mode),
    })
}

/// Add execute bits when the file has none. Returns whether it changed.
#[cfg(unix)]
pub(crate) async fn ensure_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = mode_of(&tokio::fs::metadata(path).await?);
    if mode & 0o111 != 0 {
        return Ok(false);
    }
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | EXECUTABLE_MODE))
        .await?;
    Ok(true)
}

#[cfg(not(unix))]
pub(crate) async fn ensure_executable(_path: &Path) -> std::io::Result<bool> {
    Ok(false)
}
