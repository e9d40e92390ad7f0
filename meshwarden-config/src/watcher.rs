use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::GuardRailError;
use crate::validation::ConfigWarnings;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Merges only the whitelisted fields of a freshly-parsed candidate config
/// onto the currently running one. The candidate is always validated as a
/// complete config in its own right first — a malformed or out-of-range
/// value anywhere in the file aborts the whole reload, not just the field
/// that changed.
///
/// Because this returns a brand-new value rather than mutating `current` in
/// place, a rejected candidate leaves the caller's running config untouched
/// with no separate rollback step required.
pub fn merge_whitelisted<T>(
    current: &T,
    candidate_path: &Path,
    whitelist: &[&str],
    validate: impl FnOnce(&T) -> Result<ConfigWarnings, GuardRailError>,
) -> Result<(T, ConfigWarnings), ReloadError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let raw = std::fs::read_to_string(candidate_path).map_err(ReloadError::Io)?;
    let candidate_value: serde_json::Value =
        serde_json::from_str(&raw).map_err(ReloadError::Parse)?;
    let candidate: T =
        serde_json::from_value(candidate_value.clone()).map_err(ReloadError::Parse)?;
    let warnings = validate(&candidate).map_err(ReloadError::GuardRail)?;

    let mut merged_value = serde_json::to_value(current).map_err(ReloadError::Parse)?;
    if let (Some(merged_obj), Some(candidate_obj)) =
        (merged_value.as_object_mut(), candidate_value.as_object())
    {
        for field in whitelist {
            if let Some(value) = candidate_obj.get(*field) {
                merged_obj.insert((*field).to_string(), value.clone());
            }
        }
    }
    let merged: T = serde_json::from_value(merged_value).map_err(ReloadError::Parse)?;
    Ok((merged, warnings))
}

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("failed to read candidate config: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to parse candidate config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error(transparent)]
    GuardRail(#[from] GuardRailError),
}

/// Polls a config file's mtime on a fixed interval and republishes a merged,
/// validated config through a shared [`RwLock`] whenever it changes.
pub struct ConfigWatcher<T> {
    current: Arc<RwLock<T>>,
    shutdown: watch::Receiver<bool>,
}

impl<T> ConfigWatcher<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(initial: T, shutdown: watch::Receiver<bool>) -> (Self, Arc<RwLock<T>>) {
        let current = Arc::new(RwLock::new(initial));
        (
            Self {
                current: current.clone(),
                shutdown,
            },
            current,
        )
    }

    pub fn current(&self) -> Arc<RwLock<T>> {
        self.current.clone()
    }

    /// Runs until the shutdown signal fires. `validate` is re-invoked for
    /// every reload attempt; `whitelist` bounds which fields may change.
    /// `on_reload` fires after a successful merge, with the newly-published
    /// config, so callers can propagate the change to components that don't
    /// read the shared handle on every tick (ping scheduler interval, worker
    /// pool size, log level).
    pub async fn run(
        mut self,
        path: PathBuf,
        whitelist: &'static [&'static str],
        validate: impl Fn(&T) -> Result<ConfigWarnings, GuardRailError> + Send + Sync + 'static,
        on_reload: impl Fn(&T) + Send + Sync + 'static,
    ) {
        let mut last_mtime = file_mtime(&path);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        return;
                    }
                }
            }
            if *self.shutdown.borrow() {
                return;
            }

            let mtime = file_mtime(&path);
            if mtime.is_some() && mtime != last_mtime {
                tokio::time::sleep(SETTLE_DELAY).await;
                let snapshot = self.current.read().clone();
                match merge_whitelisted(&snapshot, &path, whitelist, &validate) {
                    Ok((merged, warnings)) => {
                        *self.current.write() = merged.clone();
                        last_mtime = mtime;
                        info!("configuration reloaded from {}", path.display());
                        for warning in &warnings.0 {
                            warn!("{warning}");
                        }
                        on_reload(&merged);
                    }
                    Err(err) => {
                        warn!("config reload rejected, keeping previous config: {err}");
                        last_mtime = mtime;
                    }
                }
            }
        }
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}
