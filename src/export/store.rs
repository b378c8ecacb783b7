//! Slot-addressed blob storage for fitted encoders and trained models.
//!
//! A slot is a stable logical name (`standardEncoder`, `labelEncoder`,
//! `rf_best_model`) independent of where the blob physically lives.
//! Stores are single-writer: concurrent writes to the same slot are the
//! caller's responsibility and are not guarded here.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Slot holding the fitted quantitative (standard) encoder
pub const STANDARD_ENCODER_SLOT: &str = "standardEncoder";
/// Slot holding the fitted qualitative (label) encoder
pub const LABEL_ENCODER_SLOT: &str = "labelEncoder";
/// Default slot for the winning trained model
pub const DEFAULT_MODEL_SLOT: &str = "rf_best_model";

/// Durable key-value storage of serialized artifacts.
pub trait StateStore: Send + Sync {
    /// Read the blob stored under `slot`, or `None` when absent
    fn load(&self, slot: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob under `slot`. A reader never observes a partial write.
    fn store(&self, slot: &str, bytes: &[u8]) -> Result<()>;

    /// Whether a blob exists under `slot`
    fn contains(&self, slot: &str) -> Result<bool> {
        Ok(self.load(slot)?.is_some())
    }

    /// Human-readable location of `slot`, for diagnostics
    fn location(&self, slot: &str) -> String;
}

/// Filesystem store: one file per slot under a root directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `slot`
    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{}.bin", slot))
    }

    fn temp_path(&self, slot: &str) -> PathBuf {
        self.root
            .join(format!(".{}.bin.tmp-{}", slot, std::process::id()))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, slot: &str) -> Result<Option<Vec<u8>>> {
        let path = self.slot_path(slot);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(slot = %slot, path = %path.display(), bytes = bytes.len(), "Loaded slot");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, slot: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let final_path = self.slot_path(slot);
        let temp_path = self.temp_path(slot);

        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &final_path)?;
            sync_dir(&self.root)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(slot = %slot, path = %final_path.display(), bytes = bytes.len(), "Stored slot");
        Ok(())
    }

    fn location(&self, slot: &str) -> String {
        self.slot_path(slot).display().to_string()
    }
}

/// Flush a directory so a rename inside it survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// In-memory store, used in tests and for throwaway preprocessing runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slots: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, slot: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.slots.read().get(slot).cloned())
    }

    fn store(&self, slot: &str, bytes: &[u8]) -> Result<()> {
        self.slots.write().insert(slot.to_string(), bytes.to_vec());
        Ok(())
    }

    fn location(&self, slot: &str) -> String {
        format!("memory://{}", slot)
    }
}
