//! In-Memory Backend
//!
//! Records every registration in process memory. Identifiers are assigned
//! sequentially starting at 1.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::{BackendError, ExecutionBackend, TransformationId, TransformationRequest};
use crate::catalog::Metadata;

#[derive(Debug, Clone)]
struct Record {
    request: TransformationRequest,
    active: bool,
    input_query: Option<Metadata>,
}

/// Backend held in memory, counting every mutating call.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RefCell<BTreeMap<u64, Record>>,
    next_id: Cell<u64>,
    calls: Cell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transformations registered.
    pub fn registration_count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Number of add, activate and input query calls, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    pub fn request(&self, id: &str) -> Option<TransformationRequest> {
        let key = id.parse::<u64>().ok()?;
        self.records.borrow().get(&key).map(|r| r.request.clone())
    }

    pub fn is_active(&self, id: &str) -> bool {
        id.parse::<u64>()
            .ok()
            .and_then(|key| self.records.borrow().get(&key).map(|r| r.active))
            .unwrap_or(false)
    }

    pub fn input_query(&self, id: &str) -> Option<Metadata> {
        let key = id.parse::<u64>().ok()?;
        self.records
            .borrow()
            .get(&key)
            .and_then(|r| r.input_query.clone())
    }

    /// Names of all registered transformations in registration order.
    pub fn names(&self) -> Vec<String> {
        self.records
            .borrow()
            .values()
            .map(|r| r.request.name.clone())
            .collect()
    }

    fn bump(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn with_record<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Record) -> T,
    ) -> Result<T, BackendError> {
        let key = id
            .parse::<u64>()
            .map_err(|_| BackendError::UnknownTransformation(id.to_string()))?;
        let mut records = self.records.borrow_mut();
        let record = records
            .get_mut(&key)
            .ok_or_else(|| BackendError::UnknownTransformation(id.to_string()))?;
        Ok(f(record))
    }
}

impl ExecutionBackend for MemoryBackend {
    fn add_transformation(
        &self,
        request: &TransformationRequest,
    ) -> Result<TransformationId, BackendError> {
        self.bump();
        if self.find_by_name(&request.name)?.is_some() {
            return Err(BackendError::DuplicateName(request.name.clone()));
        }

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.records.borrow_mut().insert(
            id,
            Record {
                request: request.clone(),
                active: false,
                input_query: None,
            },
        );
        Ok(id.to_string())
    }

    fn activate(&self, id: &str) -> Result<(), BackendError> {
        self.bump();
        self.with_record(id, |r| r.active = true)
    }

    fn create_input_query(&self, id: &str, query: &Metadata) -> Result<(), BackendError> {
        self.bump();
        self.with_record(id, |r| r.input_query = Some(query.clone()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<TransformationId>, BackendError> {
        Ok(self
            .records
            .borrow()
            .iter()
            .find(|(_, r)| r.request.name == name)
            .map(|(id, _)| id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TransformationBody;

    fn request(name: &str) -> TransformationRequest {
        TransformationRequest::new(name, "MCSimulation-JUNO", "d", TransformationBody::Operations(Vec::new()))
    }

    #[test]
    fn test_sequential_ids() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.add_transformation(&request("a")).unwrap(), "1");
        assert_eq!(backend.add_transformation(&request("b")).unwrap(), "2");
        assert_eq!(backend.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let backend = MemoryBackend::new();
        backend.add_transformation(&request("a")).unwrap();
        let result = backend.add_transformation(&request("a"));
        assert!(matches!(result, Err(BackendError::DuplicateName(_))));
        assert_eq!(backend.registration_count(), 1);
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn test_activate_and_query() {
        let backend = MemoryBackend::new();
        let id = backend.add_transformation(&request("a")).unwrap();
        assert!(!backend.is_active(&id));
        backend.activate(&id).unwrap();
        assert!(backend.is_active(&id));

        let mut query = Metadata::new();
        query.insert("tag".to_string(), "x".to_string());
        backend.create_input_query(&id, &query).unwrap();
        assert_eq!(backend.input_query(&id), Some(query));
    }

    #[test]
    fn test_unknown_id() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.activate("7"),
            Err(BackendError::UnknownTransformation(_))
        ));
    }

    #[test]
    fn test_find_by_name() {
        let backend = MemoryBackend::new();
        let id = backend.add_transformation(&request("a")).unwrap();
        assert_eq!(backend.find_by_name("a").unwrap(), Some(id));
        assert_eq!(backend.find_by_name("b").unwrap(), None);
    }
}
