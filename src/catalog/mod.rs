//! Metadata Catalog
//!
//! The hierarchical, path-keyed annotation store that doubles as the
//! dependency database of a production: every step directory carries the
//! identifier of the transformation that fills it, and later runs rediscover
//! predecessors by reading that metadata back.
//!
//! - [`memory`]: In-process store that records every call
//! - [`local`]: Filesystem-backed store, one JSON file per directory

pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use thiserror::Error;

pub use local::LocalCatalog;
pub use memory::MemoryStore;

/// Flat key/value annotations attached to one catalog path.
pub type Metadata = BTreeMap<String, String>;

/// Key holding the transformation that produces a directory's files.
pub const TRANSFORMATION_ID_KEY: &str = "transformationID";

/// Failure of the metadata backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metadata store unavailable for '{path}': {message}")]
    Unavailable { path: String, message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt metadata at '{path}': {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Path-keyed metadata store.
///
/// All calls are synchronous and attempted once.
pub trait MetadataStore {
    /// Ensures a directory node exists at `path`, creating ancestors.
    fn create_path(&self, path: &str) -> Result<(), StoreError>;

    /// Attaches `meta` to an existing `path`, overwriting keys it names.
    fn set_metadata(&self, path: &str, meta: &Metadata) -> Result<(), StoreError>;

    /// Returns the metadata of `path`; empty when the path is unknown.
    fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError>;
}

/// Joins catalog path components with `/`, without doubling separators.
///
/// # Example
/// ```
/// use prodchain::catalog::join_path;
///
/// assert_eq!(join_path("/juno/production/", &["J17v1r1", "Chain"]), "/juno/production/J17v1r1/Chain");
/// ```
pub fn join_path(base: &str, parts: &[&str]) -> String {
    let mut path = base.trim_end_matches('/').to_string();
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(part);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Lists `path` and all its ancestors below the root, shortest first.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        result.push(current.clone());
    }
    result
}
