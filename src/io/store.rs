use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::parse::source::SourceText;

/// Error type for task file I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where the task file lives. Every call goes to the backing storage;
/// nothing is cached between calls.
pub trait TaskStore {
    fn load(&self) -> Result<SourceText, StoreError>;
    fn save(&self, src: &SourceText) -> Result<(), StoreError>;

    /// Directory for the recovery log, if this store keeps one
    fn recovery_dir(&self) -> Option<&Path> {
        None
    }

    /// Label used in messages and recovery entries
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    recovery_dir: PathBuf,
}

impl FileStore {
    /// Store for `path`, logging recovery data next to it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let recovery_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        FileStore { path, recovery_dir }
    }

    pub fn with_recovery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recovery_dir = dir.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for FileStore {
    fn load(&self) -> Result<SourceText, StoreError> {
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        log::debug!("loaded {} ({} bytes)", self.path.display(), text.len());
        Ok(SourceText::parse(&text))
    }

    fn save(&self, src: &SourceText) -> Result<(), StoreError> {
        let content = src.serialize();
        if let Err(e) = atomic_write(&self.path, content.as_bytes()) {
            log_recovery(
                &self.recovery_dir,
                RecoveryEntry::new(RecoveryCategory::Write, "task file write failed")
                    .field("Target", self.path.display().to_string())
                    .field("Error", e.to_string())
                    .body(content),
            );
            return Err(StoreError::WriteError {
                path: self.path.clone(),
                source: e,
            });
        }
        log::debug!("saved {}", self.path.display());
        Ok(())
    }

    fn recovery_dir(&self) -> Option<&Path> {
        Some(&self.recovery_dir)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Holds the file content in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    text: RefCell<String>,
}

impl MemoryStore {
    pub fn new(text: impl Into<String>) -> Self {
        MemoryStore {
            text: RefCell::new(text.into()),
        }
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }
}

impl TaskStore for MemoryStore {
    fn load(&self) -> Result<SourceText, StoreError> {
        Ok(SourceText::parse(&self.text.borrow()))
    }

    fn save(&self, src: &SourceText) -> Result<(), StoreError> {
        *self.text.borrow_mut() = src.serialize();
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
