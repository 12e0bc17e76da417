//! JSON file mirror for a record collection

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::StoreError;

/// A pretty-printed JSON array on disk, `<dir>/<collection>.json`
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(dir: &Path, collection: &str) -> Self {
        Self {
            path: dir.join(format!("{collection}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records. A missing or blank file is an empty collection.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file contents with `items`.
    ///
    /// Writes a sibling temp file and renames it over the target so readers
    /// never observe a half-written array.
    pub fn save<T: Serialize>(&self, items: &[T]) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(items).map_err(|source| StoreError::Serialize {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
