//! Persistent JSON state: bridge history, failure counters and bridge sets.
//!
//! Each document is one JSON object in its own file under the data directory.
//! Unreadable or malformed documents are logged and treated as empty so a
//! damaged file never stops a run. Writes go through a temp file in the same
//! directory and are skipped entirely when the content would not change.

mod bridge_sets;
mod failures;
mod history;

pub use bridge_sets::BridgeSetFile;
pub use failures::FailureRecord;
pub use history::History;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bridges::{BridgeSets, TransportClass};

/// Errors from writing persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Locations of every persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub history: PathBuf,
    pub failures: PathBuf,
    pub bridge_sets_dir: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            history: data_dir.join("history.json"),
            failures: data_dir.join("failedBridges.json"),
            bridge_sets_dir: data_dir.to_path_buf(),
        }
    }

    /// File holding the persisted set for one transport class.
    pub fn bridge_set(&self, class: TransportClass) -> PathBuf {
        self.bridge_sets_dir.join(class.file_name())
    }
}

/// Read a JSON document, falling back to the default value when the file is
/// missing, unreadable or malformed.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet, starting empty", path.display());
            return T::default();
        }
        Err(e) => {
            warn!("Failed to read {}: {}; treating as empty", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Corrupt state file {}: {}; treating as empty",
                path.display(),
                e
            );
            T::default()
        }
    }
}

/// Serialize with four-space indentation and a trailing newline.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Atomically write a JSON document. Returns `false` when the file already
/// held identical content and was left untouched.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<bool, StoreError> {
    let bytes = to_pretty_json(value)?;

    if let Ok(existing) = fs::read(path) {
        if existing == bytes {
            return Ok(false);
        }
    }

    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    debug!("Wrote {}", path.display());
    Ok(true)
}

/// Access to all persisted documents of one data directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: StorePaths,
}

impl StateStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn load_history(&self) -> History {
        load_json_or_default(&self.paths.history)
    }

    pub fn save_history(&self, history: &History) -> Result<bool, StoreError> {
        save_json(&self.paths.history, history)
    }

    pub fn load_failures(&self) -> FailureRecord {
        load_json_or_default(&self.paths.failures)
    }

    pub fn save_failures(&self, failures: &FailureRecord) -> Result<bool, StoreError> {
        save_json(&self.paths.failures, failures)
    }

    /// Load every transport's persisted set. Classes without a file are empty.
    pub fn load_bridge_sets(&self) -> BridgeSets {
        TransportClass::ALL
            .iter()
            .map(|&class| {
                let file: BridgeSetFile = load_json_or_default(&self.paths.bridge_set(class));
                (class, file.into_set())
            })
            .collect()
    }

    /// Persist every transport's set. Returns how many files changed.
    pub fn save_bridge_sets(&self, sets: &BridgeSets) -> Result<usize, StoreError> {
        let mut changed = 0;
        for class in TransportClass::ALL {
            let file = sets
                .get(&class)
                .map(BridgeSetFile::from_set)
                .unwrap_or_default();
            if save_json(&self.paths.bridge_set(class), &file)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
