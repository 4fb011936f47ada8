//! Per-tool key/value storage for the last edited shader source.
//!
//! `FileDraftStore` keeps every key in a single JSON object on disk and
//! rewrites the whole file on each save (write to a sibling temp file, then
//! rename). `MemoryDraftStore` backs tests and headless runs.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("failed to access draft store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("draft store at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode drafts: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Storage key for a tool's draft source.
pub fn draft_key(tool: &str) -> String {
    format!("{tool}:source")
}

pub trait DraftStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), DraftError>;
    fn remove(&mut self, key: &str) -> Result<bool, DraftError>;
}

#[derive(Debug)]
pub struct FileDraftStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileDraftStore {
    /// Opens the store at `path`. A missing file is an empty store; a corrupt
    /// file is reported so callers can decide whether to start fresh.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| DraftError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(DraftError::Io { path, source }),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened draft store");
        Ok(Self { path, entries })
    }

    /// Like [`FileDraftStore::open`] but discards an unreadable file.
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let path = path.into();
        match Self::open(path.clone()) {
            Err(DraftError::Corrupt { source, .. }) => {
                warn!(path = %path.display(), error = %source, "discarding corrupt draft store");
                Ok(Self {
                    path,
                    entries: BTreeMap::new(),
                })
            }
            other => other,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), DraftError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| DraftError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let encoded = serde_json::to_string_pretty(&self.entries)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(|source| DraftError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| DraftError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), DraftError> {
        if self.entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()?;
        debug!(key, bytes = value.len(), "persisted draft");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, DraftError> {
        if self.entries.remove(key).is_none() {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryDraftStore {
    entries: BTreeMap<String, String>,
    saves: usize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls, including no-op rewrites.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), DraftError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.saves += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, DraftError> {
        Ok(self.entries.remove(key).is_some())
    }
}
