//! Saving and restoring the client state between runs.
//!
//! `JsonFileStore` writes to a temp file next to the target and renames it
//! into place, so a crash mid-write leaves the previous snapshot intact.
//! `spawn_writer` saves periodically, only when the snapshot changed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use applin_core::snapshot::StateSnapshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ClientContext;

static TEMP_SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid state file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<StateSnapshot>, PersistError>;
    fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<StateSnapshot>, PersistError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error("read", &self.path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PersistError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistError> {
        let serialized = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error("create directory", parent, err))?;
        }

        let temp = temp_path(&self.path);
        write_synced(&temp, &serialized)?;
        if let Err(err) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(io_error("rename", &self.path, err));
        }
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|err| io_error("open", path, err))?;
    file.write_all(bytes)
        .map_err(|err| io_error("write", path, err))?;
    file.sync_all().map_err(|err| io_error("sync", path, err))
}

fn temp_path(path: &Path) -> PathBuf {
    let pid = std::process::id();
    let suffix = TEMP_SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut raw = path.as_os_str().to_os_string();
    raw.push(format!(".tmp-{pid}-{suffix}"));
    PathBuf::from(raw)
}

/// Saves `ctx` snapshots to a store when they change.
pub struct SnapshotWriter {
    ctx: Arc<ClientContext>,
    store: Arc<dyn SnapshotStore>,
    last_saved: Option<StateSnapshot>,
}

impl SnapshotWriter {
    pub fn new(ctx: Arc<ClientContext>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            ctx,
            store,
            last_saved: None,
        }
    }

    /// Save if the state differs from the last successful save. Failures are
    /// logged and retried on the next call.
    pub fn save_if_changed(&mut self) -> bool {
        let snapshot = self.ctx.snapshot();
        if self.last_saved.as_ref() == Some(&snapshot) {
            return false;
        }
        match self.store.save(&snapshot) {
            Ok(()) => {
                self.last_saved = Some(snapshot);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "saving client state failed");
                false
            }
        }
    }
}

/// Save every `interval` until `cancel` fires, then once more.
pub fn spawn_writer(
    ctx: Arc<ClientContext>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut writer = SnapshotWriter::new(ctx, store);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            writer.save_if_changed();
        }
        writer.save_if_changed();
    })
}
