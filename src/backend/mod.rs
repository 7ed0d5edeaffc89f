//! Execution Backend
//!
//! The boundary to the workload-management system that stores
//! transformations and generates tasks from them.
//!
//! - [`job`]: Job definition carried as the body of a workflow step
//! - [`request`]: Transformation registration request
//! - [`executor`]: Step and move executors built on an [`ExecutionBackend`]
//! - [`memory`]: In-process backend used by tests
//! - [`registry`]: JSON-file registry used by the command line tool

pub mod executor;
pub mod job;
pub mod memory;
pub mod registry;
pub mod request;

use thiserror::Error;

use crate::catalog::Metadata;

pub use executor::{MoveExecutor, StepExecutor};
pub use job::JobDescription;
pub use memory::MemoryBackend;
pub use registry::LocalRegistry;
pub use request::{Operation, TransformationBody, TransformationRequest};

/// Opaque identifier assigned by the backend.
pub type TransformationId = String;

/// Failure reported by the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transformation name '{0}' is already in use")]
    DuplicateName(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unknown transformation '{0}'")]
    UnknownTransformation(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Registry of persistent, repeatable production steps.
pub trait ExecutionBackend {
    /// Registers a transformation. Names are unique within the backend.
    fn add_transformation(
        &self,
        request: &TransformationRequest,
    ) -> Result<TransformationId, BackendError>;

    /// Sets the transformation active with automatic task generation.
    fn activate(&self, id: &str) -> Result<(), BackendError>;

    /// Restricts the transformation's input to files matching `query`.
    fn create_input_query(&self, id: &str, query: &Metadata) -> Result<(), BackendError>;

    /// Looks up a transformation by name.
    fn find_by_name(&self, name: &str) -> Result<Option<TransformationId>, BackendError>;
}
