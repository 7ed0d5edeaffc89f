//! In-Memory Metadata Store
//!
//! Keeps the catalog in process memory and counts every call, which makes
//! it the store of choice for tests and for checking dry-run purity.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use super::{ancestors, Metadata, MetadataStore, StoreError};

/// Catalog held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    directories: RefCell<BTreeSet<String>>,
    metadata: RefCell<BTreeMap<String, Metadata>>,
    unavailable: Cell<bool>,
    create_calls: Cell<usize>,
    set_calls: Cell<usize>,
    get_calls: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a path with metadata without counting it as a call.
    pub fn with_metadata(self, path: &str, meta: Metadata) -> Self {
        self.directories.borrow_mut().extend(ancestors(path));
        self.metadata
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .extend(meta);
        self
    }

    /// Makes every subsequent call fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.get()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.get()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.get()
    }

    /// Whether a directory node exists.
    pub fn contains(&self, path: &str) -> bool {
        self.directories.borrow().contains(path)
    }

    /// Snapshot of the metadata stored for `path`, without counting a call.
    pub fn peek(&self, path: &str) -> Metadata {
        self.metadata.borrow().get(path).cloned().unwrap_or_default()
    }

    fn check_available(&self, path: &str) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable {
                path: path.to_string(),
                message: "store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl MetadataStore for MemoryStore {
    fn create_path(&self, path: &str) -> Result<(), StoreError> {
        self.create_calls.set(self.create_calls.get() + 1);
        self.check_available(path)?;
        self.directories.borrow_mut().extend(ancestors(path));
        Ok(())
    }

    fn set_metadata(&self, path: &str, meta: &Metadata) -> Result<(), StoreError> {
        self.set_calls.set(self.set_calls.get() + 1);
        self.check_available(path)?;
        if !self.contains(path) {
            return Err(StoreError::Unavailable {
                path: path.to_string(),
                message: "no such directory".to_string(),
            });
        }
        self.metadata
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError> {
        self.get_calls.set(self.get_calls.get() + 1);
        self.check_available(path)?;
        Ok(self.peek(path))
    }
}
