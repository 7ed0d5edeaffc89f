//! Local Catalog
//!
//! Filesystem-backed metadata store. Each catalog path maps to a directory
//! below a base directory; its metadata lives in `.metadata.json` inside
//! that directory.
//!
//! ```text
//! <base>/juno/user/p/prod/test/J17v1r1/Chain/center/e+_1MeV/detsim/.metadata.json
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;

use super::{Metadata, MetadataStore, StoreError};

/// File holding the metadata of one catalog directory.
const METADATA_FILE: &str = ".metadata.json";

/// Metadata store persisted under a local directory.
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    base: PathBuf,
}

impl LocalCatalog {
    /// Opens (and creates if needed) a catalog rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|source| StoreError::Io {
            path: base.display().to_string(),
            source,
        })?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Maps a catalog path to its local directory, refusing `..`.
    fn local_dir(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::Unavailable {
                path: path.to_string(),
                message: "catalog paths must not leave the catalog root".to_string(),
            });
        }
        Ok(self.base.join(relative))
    }
}

impl MetadataStore for LocalCatalog {
    fn create_path(&self, path: &str) -> Result<(), StoreError> {
        let dir = self.local_dir(path)?;
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: path.to_string(),
            source,
        })?;
        debug!("Created catalog directory: {}", path);
        Ok(())
    }

    fn set_metadata(&self, path: &str, meta: &Metadata) -> Result<(), StoreError> {
        let dir = self.local_dir(path)?;
        if !dir.is_dir() {
            return Err(StoreError::Unavailable {
                path: path.to_string(),
                message: "no such directory".to_string(),
            });
        }

        let mut current = self.get_metadata(path)?;
        current.extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        let json = serde_json::to_string_pretty(&current).map_err(|source| StoreError::Corrupt {
            path: path.to_string(),
            source,
        })?;
        fs::write(dir.join(METADATA_FILE), json).map_err(|source| StoreError::Io {
            path: path.to_string(),
            source,
        })?;

        debug!("Set metadata on {}: {:?}", path, meta);
        Ok(())
    }

    fn get_metadata(&self, path: &str) -> Result<Metadata, StoreError> {
        let file = self.local_dir(path)?.join(METADATA_FILE);
        if !file.exists() {
            return Ok(Metadata::new());
        }

        let content = fs::read_to_string(&file).map_err(|source| StoreError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip_on_disk() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path().join("catalog")).unwrap();

        catalog.create_path("/juno/prod/tag/detsim").unwrap();
        let mut meta = Metadata::new();
        meta.insert("transformationID".to_string(), "12".to_string());
        catalog.set_metadata("/juno/prod/tag/detsim", &meta).unwrap();

        let reopened = LocalCatalog::open(temp_dir.path().join("catalog")).unwrap();
        let loaded = reopened.get_metadata("/juno/prod/tag/detsim").unwrap();
        assert_eq!(loaded.get("transformationID").map(String::as_str), Some("12"));
        assert!(temp_dir
            .path()
            .join("catalog/juno/prod/tag/detsim/.metadata.json")
            .exists());
    }

    #[test]
    fn test_missing_path_is_empty() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path()).unwrap();
        assert!(catalog.get_metadata("/not/there").unwrap().is_empty());
    }

    #[test]
    fn test_set_merges_existing_keys() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path()).unwrap();
        catalog.create_path("/a").unwrap();

        let mut first = Metadata::new();
        first.insert("tag".to_string(), "x".to_string());
        catalog.set_metadata("/a", &first).unwrap();

        let mut second = Metadata::new();
        second.insert("application".to_string(), "detsim".to_string());
        catalog.set_metadata("/a", &second).unwrap();

        let loaded = catalog.get_metadata("/a").unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_set_without_directory_fails() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path()).unwrap();
        let result = catalog.set_metadata("/missing", &Metadata::new());
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path()).unwrap();
        assert!(catalog.create_path("/a/../../escape").is_err());
    }

    #[test]
    fn test_corrupt_metadata_reported() {
        let temp_dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(temp_dir.path()).unwrap();
        catalog.create_path("/bad").unwrap();
        fs::write(temp_dir.path().join("bad").join(METADATA_FILE), "not json").unwrap();
        assert!(matches!(catalog.get_metadata("/bad"), Err(StoreError::Corrupt { .. })));
    }
}
