//! Record storage
//!
//! Process-local record lists, each optionally mirrored to a JSON file in
//! the configured data directory.

mod collection;
mod file;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use collection::{Collection, Record};

use crate::config::StorageConfig;
use crate::models::{Account, Author, Book, Course, Grade, Product, Review, Student, Task, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize records for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All collections served by the application
pub struct Store {
    pub users: Collection<User>,
    pub products: Collection<Product>,
    pub tasks: Collection<Task>,
    pub accounts: Collection<Account>,
    pub authors: Collection<Author>,
    pub books: Collection<Book>,
    pub reviews: Collection<Review>,
    pub students: Collection<Student>,
    pub courses: Collection<Course>,
    pub grades: Collection<Grade>,
    data_dir: PathBuf,
}

impl Store {
    /// Open the store described by `cfg`. Without persistence every
    /// collection starts empty and nothing touches the disk.
    pub fn open(cfg: &StorageConfig) -> Result<Self, StoreError> {
        let data_dir = PathBuf::from(&cfg.data_dir);
        if !cfg.persist {
            return Ok(Self::in_memory(data_dir));
        }

        Ok(Self {
            users: Collection::open(&data_dir)?,
            products: Collection::open(&data_dir)?,
            tasks: Collection::open(&data_dir)?,
            accounts: Collection::open(&data_dir)?,
            authors: Collection::open(&data_dir)?,
            books: Collection::open(&data_dir)?,
            reviews: Collection::open(&data_dir)?,
            students: Collection::open(&data_dir)?,
            courses: Collection::open(&data_dir)?,
            grades: Collection::open(&data_dir)?,
            data_dir,
        })
    }

    pub fn in_memory(data_dir: PathBuf) -> Self {
        Self {
            users: Collection::in_memory(),
            products: Collection::in_memory(),
            tasks: Collection::in_memory(),
            accounts: Collection::in_memory(),
            authors: Collection::in_memory(),
            books: Collection::in_memory(),
            reviews: Collection::in_memory(),
            students: Collection::in_memory(),
            courses: Collection::in_memory(),
            grades: Collection::in_memory(),
            data_dir,
        }
    }

    /// Directory for auxiliary read-only data files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
