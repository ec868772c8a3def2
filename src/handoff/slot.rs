use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::error::ClientError;

/// Storage for the single handoff slot. Writes replace the whole slot
/// atomically; readers see either the old or the new text, never a mix.
pub trait SlotStore: Send + Sync {
    fn write(&self, text: &str) -> Result<(), ClientError>;

    /// `Ok(None)` when nothing was ever written.
    fn read(&self) -> Result<Option<String>, ClientError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Slot backed by one JSON file, shared across processes on the same machine.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_err(path: &Path, e: std::io::Error) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), e))
}

impl SlotStore for FileSlot {
    fn write(&self, text: &str) -> Result<(), ClientError> {
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| storage_err(dir, e))?;
                dir
            }
            None => Path::new("."),
        };
        // Each write gets its own temp file beside the target, renamed over it.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage_err(dir, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| storage_err(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map(|_| ())
            .map_err(|e| storage_err(&self.path, e.error))
    }

    fn read(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(&self.path, e)),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process slot.
#[derive(Default)]
pub struct MemorySlot {
    text: RwLock<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlot {
    fn write(&self, text: &str) -> Result<(), ClientError> {
        *self.text.write() = Some(text.to_string());
        Ok(())
    }

    fn read(&self) -> Result<Option<String>, ClientError> {
        Ok(self.text.read().clone())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
