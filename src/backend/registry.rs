//! Local Transformation Registry
//!
//! File-backed [`ExecutionBackend`] for running the tool without a grid
//! connection. Registered transformations are saved as pretty-printed JSON
//! after every change, so repeated runs see earlier registrations.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{BackendError, ExecutionBackend, TransformationId, TransformationRequest};
use crate::catalog::Metadata;

/// Status given to activated transformations.
const ACTIVE_STATUS: &str = "Active";

/// One registered transformation.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub id: u64,
    pub request: TransformationRequest,

    /// "New" until activated, then "Active"
    pub status: String,

    /// "Manual" until activated, then "Automatic"
    pub agent_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_query: Option<Metadata>,

    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct RegistryState {
    records: Vec<RegistryRecord>,
}

/// Backend persisted to a single JSON file.
#[derive(Debug)]
pub struct LocalRegistry {
    path: PathBuf,
    state: RefCell<RegistryState>,
}

impl LocalRegistry {
    /// Opens the registry at `path`, starting empty if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| unavailable(&path, e))?;
            let state: RegistryState =
                serde_json::from_str(&content).map_err(|e| unavailable(&path, e))?;
            info!(
                "Loaded {} transformation(s) from {}",
                state.records.len(),
                path.display()
            );
            state
        } else {
            RegistryState::default()
        };

        Ok(Self {
            path,
            state: RefCell::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<RegistryRecord> {
        self.state.borrow().records.clone()
    }

    fn save(&self) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| unavailable(&self.path, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&*self.state.borrow())
            .map_err(|e| unavailable(&self.path, e))?;
        fs::write(&self.path, json).map_err(|e| unavailable(&self.path, e))?;
        debug!("Saved registry to {}", self.path.display());
        Ok(())
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut RegistryRecord)) -> Result<(), BackendError> {
        {
            let mut state = self.state.borrow_mut();
            let record = state
                .records
                .iter_mut()
                .find(|r| r.id.to_string() == id)
                .ok_or_else(|| BackendError::UnknownTransformation(id.to_string()))?;
            f(record);
        }
        self.save()
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::Unavailable(format!("{}: {}", path.display(), err))
}

impl ExecutionBackend for LocalRegistry {
    fn add_transformation(
        &self,
        request: &TransformationRequest,
    ) -> Result<TransformationId, BackendError> {
        if self.find_by_name(&request.name)?.is_some() {
            return Err(BackendError::DuplicateName(request.name.clone()));
        }

        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            state.records.push(RegistryRecord {
                id,
                request: request.clone(),
                status: "New".to_string(),
                agent_type: "Manual".to_string(),
                input_query: None,
                created_at: Utc::now(),
            });
            id
        };
        self.save()?;
        Ok(id.to_string())
    }

    fn activate(&self, id: &str) -> Result<(), BackendError> {
        self.update(id, |r| {
            r.status = ACTIVE_STATUS.to_string();
            r.agent_type = "Automatic".to_string();
        })
    }

    fn create_input_query(&self, id: &str, query: &Metadata) -> Result<(), BackendError> {
        self.update(id, |r| r.input_query = Some(query.clone()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<TransformationId>, BackendError> {
        Ok(self
            .state
            .borrow()
            .records
            .iter()
            .find(|r| r.request.name == name)
            .map(|r| r.id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TransformationBody;
    use tempfile::tempdir;

    fn request(name: &str) -> TransformationRequest {
        TransformationRequest::new(name, "Replication-JUNO", "move", TransformationBody::Operations(Vec::new()))
    }

    #[test]
    fn test_registrations_persist() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("reg/transformations.json");

        let registry = LocalRegistry::open(&file).unwrap();
        let id = registry.add_transformation(&request("a")).unwrap();
        registry.activate(&id).unwrap();

        let reopened = LocalRegistry::open(&file).unwrap();
        let records = reopened.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, "Active");
        assert_eq!(records[0].agent_type, "Automatic");
        assert_eq!(reopened.find_by_name("a").unwrap(), Some(id));
    }

    #[test]
    fn test_duplicate_across_reopen() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("t.json");
        LocalRegistry::open(&file)
            .unwrap()
            .add_transformation(&request("a"))
            .unwrap();

        let reopened = LocalRegistry::open(&file).unwrap();
        assert!(matches!(
            reopened.add_transformation(&request("a")),
            Err(BackendError::DuplicateName(_))
        ));
        assert_eq!(reopened.add_transformation(&request("b")).unwrap(), "2");
    }

    #[test]
    fn test_input_query_saved() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("t.json");
        let registry = LocalRegistry::open(&file).unwrap();
        let id = registry.add_transformation(&request("a")).unwrap();

        let mut query = Metadata::new();
        query.insert("transformationID".to_string(), "1".to_string());
        registry.create_input_query(&id, &query).unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert!(content.contains("\"transformationID\": \"1\""));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("t.json");
        fs::write(&file, "{").unwrap();
        assert!(matches!(
            LocalRegistry::open(&file),
            Err(BackendError::Unavailable(_))
        ));
    }
}
