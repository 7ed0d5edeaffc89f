//! Transformation Requests
//!
//! The registration payload sent to the backend for both production steps
//! and move/replication steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::job::JobDescription;
use super::BackendError;

/// A single data-management operation in a move body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// What a transformation does with each task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TransformationBody {
    /// Runs a job per task.
    Job(JobDescription),
    /// Runs data-management operations per task.
    Operations(Vec<Operation>),
}

/// Registration request for one transformation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformationRequest {
    pub name: String,
    pub transformation_type: String,
    pub description: String,
    pub long_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Files per task, for input-driven transformations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u32>,

    /// Upper bound on generated tasks, for generator transformations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tasks: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_se: Vec<String>,

    pub body: TransformationBody,
}

impl TransformationRequest {
    /// Creates a request with the mandatory fields.
    pub fn new(
        name: impl Into<String>,
        transformation_type: impl Into<String>,
        description: impl Into<String>,
        body: TransformationBody,
    ) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            transformation_type: transformation_type.into(),
            long_description: description.clone(),
            description,
            group: None,
            group_size: None,
            max_tasks: None,
            plugin: None,
            target_se: Vec::new(),
            body,
        }
    }

    /// Checks the fields every backend requires.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.name.trim().is_empty() {
            return Err(BackendError::Rejected("transformation name is empty".to_string()));
        }
        if self.transformation_type.trim().is_empty() {
            return Err(BackendError::Rejected(format!(
                "transformation '{}' has no type",
                self.name
            )));
        }
        if self.long_description.trim().is_empty() {
            return Err(BackendError::Rejected(format!(
                "transformation '{}' has no long description",
                self.name
            )));
        }
        if self.group_size.is_some() && self.max_tasks.is_some() {
            return Err(BackendError::Rejected(format!(
                "transformation '{}' sets both group size and max tasks",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransformationRequest {
        TransformationRequest::new(
            "p-tag-detsim",
            "MCSimulation-JUNO",
            "detsim for Chain",
            TransformationBody::Operations(Vec::new()),
        )
    }

    #[test]
    fn test_long_description_defaults_to_description() {
        let r = request();
        assert_eq!(r.long_description, "detsim for Chain");
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut r = request();
        r.name = " ".to_string();
        assert!(matches!(r.validate(), Err(BackendError::Rejected(_))));
    }

    #[test]
    fn test_group_size_and_max_tasks_exclusive() {
        let mut r = request();
        r.group_size = Some(1);
        r.max_tasks = Some(10);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_operation_builder() {
        let op = Operation::new("ReplicateAndRegister").with_parameter("TargetSE", "A,B");
        assert_eq!(op.parameters["TargetSE"], "A,B");
    }
}
