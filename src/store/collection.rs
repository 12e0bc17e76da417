//! In-memory record collection with an optional JSON mirror

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::file::JsonFile;
use super::StoreError;

/// A record kept in a [`Collection`]
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// File stem used for the JSON mirror
    const COLLECTION: &'static str;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

/// Next sequential id: one past the current maximum, or 1 when empty
pub fn next_id<T: Record>(items: &[T]) -> u64 {
    items.iter().map(Record::id).max().map_or(1, |max| max + 1)
}

/// Ordered records of one type.
///
/// Mutations run against a copy of the current records, are written to the
/// mirror file, and only then replace the in-memory list. The lock is held
/// across the write, so concurrent writers are serialized and the file
/// always equals memory after a call returns.
///
/// The mirror is written with blocking `std::fs` calls (temp file, then
/// rename) while the lock is held. Handlers run on the single `LocalSet`
/// thread, so a slow disk stalls every in-flight request until the write
/// returns. Fine for small teaching datasets; larger ones would want the
/// write moved to `spawn_blocking`.
pub struct Collection<T: Record> {
    items: Mutex<Vec<T>>,
    file: Option<JsonFile>,
}

impl<T: Record> Collection<T> {
    /// Memory-only collection
    pub fn in_memory() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            file: None,
        }
    }

    /// Load the collection from `<dir>/<COLLECTION>.json`, mirroring every
    /// later mutation back to it.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let file = JsonFile::new(dir, T::COLLECTION);
        let items = file.load()?;
        tracing::debug!(
            collection = T::COLLECTION,
            count = items.len(),
            path = %file.path().display(),
            "collection loaded"
        );
        Ok(Self {
            items: Mutex::new(items),
            file: Some(file),
        })
    }

    pub fn list(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn get(&self, id: u64) -> Option<T> {
        self.items.lock().iter().find(|r| r.id() == id).cloned()
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.items.lock().iter().find(|r| pred(r)).cloned()
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.items.lock().iter().filter(|r| pred(r)).cloned().collect()
    }

    /// Append a record under a fresh id
    pub fn insert(&self, record: T) -> Result<T, StoreError> {
        self.try_insert(|_| Ok::<_, StoreError>(record))
    }

    /// Build a record from the current contents and append it under a fresh
    /// id. `build` sees the committed records, so uniqueness checks and the
    /// insert happen under one lock.
    pub fn try_insert<E>(&self, build: impl FnOnce(&[T]) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut items = self.items.lock();
        let mut record = build(items.as_slice())?;
        record.set_id(next_id(items.as_slice()));

        let mut next = items.clone();
        next.push(record.clone());
        self.persist(&next)?;
        *items = next;
        Ok(record)
    }

    /// Apply `f` to the record with `id`. Returns `None` when absent.
    pub fn update(&self, id: u64, f: impl FnOnce(&mut T)) -> Result<Option<T>, StoreError> {
        self.try_update(id, |_, record| {
            f(record);
            Ok::<_, StoreError>(())
        })
    }

    /// Like [`update`](Self::update), but `f` may reject the change. `f`
    /// receives the committed records alongside the record being edited.
    pub fn try_update<E>(
        &self,
        id: u64,
        f: impl FnOnce(&[T], &mut T) -> Result<(), E>,
    ) -> Result<Option<T>, E>
    where
        E: From<StoreError>,
    {
        let mut items = self.items.lock();
        let Some(index) = items.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };

        let mut next = items.clone();
        f(items.as_slice(), &mut next[index])?;
        // the id is owned by the collection
        next[index].set_id(id);
        let updated = next[index].clone();

        self.persist(&next)?;
        *items = next;
        Ok(Some(updated))
    }

    /// Remove the record with `id`, returning it
    pub fn remove(&self, id: u64) -> Result<Option<T>, StoreError> {
        let mut items = self.items.lock();
        let Some(index) = items.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };

        let mut next = items.clone();
        let removed = next.remove(index);
        self.persist(&next)?;
        *items = next;
        Ok(Some(removed))
    }

    /// Remove every record matching `pred`, returning how many went
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> Result<usize, StoreError> {
        let mut items = self.items.lock();
        let next: Vec<T> = items.iter().filter(|r| !pred(r)).cloned().collect();
        let removed = items.len() - next.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(&next)?;
        *items = next;
        Ok(removed)
    }

    fn persist(&self, items: &[T]) -> Result<(), StoreError> {
        match &self.file {
            Some(file) => file.save(items),
            None => Ok(()),
        }
    }
}
