//! On-disk home of the proxy document.

use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::error::{DocumentError, Result};
use crate::observability::metrics;

/// Loads and persists the proxy's JSON configuration file.
///
/// Reads are lock-free and always see a complete file because saves go
/// through a sibling temp file and a rename. Writers are serialized by
/// `write_lock`, and [`ConfigStore::update`] holds it across the whole
/// load-modify-save cycle so concurrent edits are never lost.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the document.
    pub async fn load(&self) -> Result<Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DocumentError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(DocumentError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| DocumentError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file with `doc`.
    pub async fn save(&self, doc: &Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_atomic(doc).await
    }

    /// Atomic read-modify-write. When `edit` fails nothing is written.
    pub async fn update<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Value) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let out = edit(&mut doc)?;
        self.write_atomic(&doc).await?;
        Ok(out)
    }

    async fn write_atomic(&self, doc: &Value) -> Result<()> {
        let write_err = |source| DocumentError::Write {
            path: self.path.clone(),
            source,
        };

        let bytes = render(doc).map_err(|e| write_err(std::io::Error::other(e)))?;
        let tmp = temp_path(&self.path);

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        metrics::record_config_write();
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Configuration saved");
        Ok(())
    }
}

/// Four-space indented JSON, non-ASCII kept verbatim.
fn render(doc: &Value) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4096);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    doc.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.json".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("ZBProxy.json"));
        assert!(matches!(store.load().await, Err(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ZBProxy.json");
        std::fs::write(&path, "{\"Log\": ").unwrap();
        let store = ConfigStore::new(&path);
        assert!(matches!(store.load().await, Err(DocumentError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_save_round_trip_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ZBProxy.json");
        let store = ConfigStore::new(&path);
        let doc = json!({"Log": {"Level": "info"}, "Motd": "§a你好"});

        store.save(&doc).await.unwrap();
        assert_eq!(store.load().await.unwrap(), doc);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"Log\""));
        assert!(text.contains("§a你好"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_edit_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ZBProxy.json");
        std::fs::write(&path, "{\"A\": 1}").unwrap();
        let store = ConfigStore::new(&path);

        let result: Result<()> = store
            .update(|doc| {
                doc["A"] = json!(2);
                Err(DocumentError::EntryNotFound {
                    section: "service",
                    name: "x".into(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"A\": 1}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_serialized() {
        use crate::document::ops::{self, Section};
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ZBProxy.json");
        std::fs::write(&path, "{\"Services\": []}").unwrap();
        let store = Arc::new(ConfigStore::new(&path));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update(move |doc| {
                            ops::append_entry(
                                doc,
                                Section::Services,
                                json!({"Name": format!("svc-{}", i), "Listen": 20000 + i}),
                            )
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        let services = doc["Services"].as_array().unwrap();
        assert_eq!(services.len(), 20);
        for i in 0..20 {
            let name = format!("svc-{}", i);
            assert!(services.iter().any(|s| s["Name"] == name.as_str()));
        }
    }
}
