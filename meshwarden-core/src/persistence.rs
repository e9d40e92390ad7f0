use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, warn};
use uuid::Uuid;

use crate::registry::ClientRegistry;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write temp snapshot file {path}: {source}")]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to rename temp snapshot into place at {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize client snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Snapshot writer for one registry target file. Serializes all save
/// attempts (including concurrent calls from the periodic saver and the
/// shutdown sequence) through a single process-wide async mutex, so at most
/// one fsync'd rename is ever in flight.
pub struct Persister {
    target: PathBuf,
    save_lock: Arc<AsyncMutex<()>>,
}

impl Persister {
    pub fn new(target: PathBuf) -> Self {
        Self {
            target,
            save_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Saves the registry if it has unsaved changes. Returns `Ok(false)` if
    /// there was nothing to save.
    pub async fn save_if_dirty(&self, registry: &ClientRegistry) -> Result<bool, PersistenceError> {
        let _guard = self.save_lock.lock().await;
        let Some(snapshot) = registry.get_data_snapshot_and_mark_clean() else {
            return Ok(false);
        };
        if let Err(err) = self.write_snapshot(&snapshot).await {
            error!("persistence failed, re-marking registry dirty: {err}");
            registry.mark_dirty();
            return Err(err);
        }
        Ok(true)
    }

    /// Forces a save regardless of the dirty flag, used during shutdown to
    /// guarantee a final write even if nothing marked itself dirty in the
    /// interim (e.g. a save raced a mutation and lost the flag).
    pub async fn force_save(&self, registry: &ClientRegistry) -> Result<(), PersistenceError> {
        let _guard = self.save_lock.lock().await;
        registry.mark_dirty();
        let snapshot = registry
            .get_data_snapshot_and_mark_clean()
            .expect("registry was just marked dirty");
        self.write_snapshot(&snapshot).await
    }

    async fn write_snapshot(
        &self,
        snapshot: &std::collections::HashMap<String, meshwarden_model::ClientRecord>,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(snapshot)?;

        let tmp_path = temp_path_for(&self.target);
        let write_result = write_and_fsync(&tmp_path, &json).await;
        if let Err(source) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(PersistenceError::WriteTemp {
                path: tmp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&tmp_path, &self.target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(PersistenceError::Rename {
                path: self.target.clone(),
                source,
            });
        }
        Ok(())
    }
}

async fn write_and_fsync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    name.push_str(&format!(".tmp.{}", Uuid::new_v4()));
    target.with_file_name(name)
}

/// Loads a previously saved snapshot, tolerating a missing file (fresh
/// install) and the legacy bare-number shape for individual entries.
pub async fn load_snapshot(
    path: &Path,
) -> Result<std::collections::HashMap<String, meshwarden_model::StoredClient>, PersistenceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("no existing snapshot at {}; starting empty", path.display());
            Ok(std::collections::HashMap::new())
        }
        Err(err) => Err(PersistenceError::WriteTemp {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwarden_model::ClientRecord;

    #[tokio::test]
    async fn save_if_dirty_is_noop_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let persister = Persister::new(dir.path().join("clients.json"));
        let registry = ClientRegistry::new();
        assert!(!persister.save_if_dirty(&registry).await.unwrap());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clients.json");
        let persister = Persister::new(target.clone());
        let registry = ClientRegistry::new();
        registry.add_or_update("10.0.0.1", true, None);
        registry.update_ping_result("10.0.0.1", true);
        assert!(persister.save_if_dirty(&registry).await.unwrap());
        assert!(!registry.is_dirty());

        let loaded = load_snapshot(&target).await.unwrap();
        let record: ClientRecord = loaded.get("10.0.0.1").unwrap().clone().into();
        assert!(record.last_ping_ok);
    }

    #[tokio::test]
    async fn force_save_writes_even_without_prior_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clients.json");
        let persister = Persister::new(target.clone());
        let registry = ClientRegistry::new();
        persister.force_save(&registry).await.unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_snapshot(&dir.path().join("missing.json")).await.unwrap();
        assert!(loaded.is_empty());
    }
}
