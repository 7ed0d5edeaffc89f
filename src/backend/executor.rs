//! Step and Move Executors
//!
//! Turn assembled specifications into transformation requests and register
//! them with an [`ExecutionBackend`]. Every backend call is attempted once.

use log::{info, warn};
use serde::Serialize;

use super::job::{quote, JobDescription, DEFAULT_CODE_URL, JOB_ID_PLACEHOLDER};
use super::request::{Operation, TransformationBody, TransformationRequest};
use super::{ExecutionBackend, TransformationId};
use crate::catalog::Metadata;
use crate::config::MoveFlavor;
use crate::error::ProdError;

/// Fully assembled description of one production step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    pub name: String,
    pub transformation_type: String,
    pub group: String,
    pub description: String,
    pub executable: String,
    pub software_version: String,
    pub application: String,
    pub output_path: String,
    pub output_pattern: String,
    pub output_se: String,
    pub output_mode: String,
    /// Already formatted run parameters appended after the fixed arguments
    pub extra_args: Vec<String>,
    /// Input selection; empty for generator steps
    pub input_meta: Metadata,
    pub generator: bool,
    pub max_tasks: u32,
    pub sites: Vec<String>,
    pub banned_sites: Vec<String>,
    pub output_sandbox: Vec<String>,
    /// Ends the job with a failover request command
    pub failover: bool,
}

impl StepSpec {
    /// The argument vector passed to the step executable.
    pub fn arguments(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            &self.software_version,
            &self.application,
            &self.output_path,
            &self.output_pattern,
            &self.output_se,
            &self.output_mode,
        ]
        .iter()
        .map(|a| quote(a))
        .collect();
        args.push(JOB_ID_PLACEHOLDER.to_string());
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Fully assembled description of one move/replication step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSpec {
    pub name: String,
    pub transformation_type: String,
    pub group: String,
    pub description: String,
    pub application: String,
    pub flavor: MoveFlavor,
    pub plugin: String,
    pub input_meta: Metadata,
    pub source_se: Vec<String>,
    pub target_se: Vec<String>,
    pub group_size: u32,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Registers production steps.
pub struct StepExecutor<'a> {
    backend: &'a dyn ExecutionBackend,
    code_url: String,
}

impl<'a> StepExecutor<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend) -> Self {
        Self {
            backend,
            code_url: DEFAULT_CODE_URL.to_string(),
        }
    }

    /// Builds the job every task of the step runs.
    pub fn build_job(&self, spec: &StepSpec) -> JobDescription {
        let mut job =
            JobDescription::bootstrap(&spec.name, &self.code_url, &spec.executable, &spec.arguments());
        if spec.failover {
            job = job.with_failover_request();
        }
        job.with_output_sandbox(spec.output_sandbox.clone())
            .with_destination(spec.sites.clone())
            .with_banned_sites(spec.banned_sites.clone())
    }

    /// Builds the registration request for a step.
    pub fn build_request(&self, spec: &StepSpec) -> TransformationRequest {
        let mut request = TransformationRequest::new(
            &spec.name,
            &spec.transformation_type,
            &spec.description,
            TransformationBody::Job(self.build_job(spec)),
        );
        request.group = non_empty(&spec.group);
        if spec.generator {
            request.max_tasks = Some(spec.max_tasks);
        } else {
            request.group_size = Some(1);
        }
        request
    }

    /// Registers and activates a step, attaching its input query.
    ///
    /// # Returns
    ///
    /// * `Ok(id)` - The backend identifier of the new transformation
    /// * `Err(ProdError::DuplicateStepName)` - The name is already taken
    /// * `Err(ProdError::Submission)` - Any other backend failure
    pub fn submit(&self, spec: &StepSpec) -> Result<TransformationId, ProdError> {
        let request = self.build_request(spec);
        let fail = |e| ProdError::from_backend(&spec.name, e);

        request.validate().map_err(fail)?;
        let id = self.backend.add_transformation(&request).map_err(fail)?;
        self.backend.activate(&id).map_err(fail)?;

        if !spec.generator && !spec.input_meta.is_empty() {
            self.backend
                .create_input_query(&id, &spec.input_meta)
                .map_err(fail)?;
        }

        info!("{}: Transformation {} registered as '{}'", spec.application, id, spec.name);
        Ok(id)
    }
}

/// Registers move/replication steps.
pub struct MoveExecutor<'a> {
    backend: &'a dyn ExecutionBackend,
}

impl<'a> MoveExecutor<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend) -> Self {
        Self { backend }
    }

    /// Operations performed per task for the move flavor.
    pub fn build_body(&self, spec: &MoveSpec) -> Vec<Operation> {
        let replicate = Operation::new("ReplicateAndRegister")
            .with_parameter("TargetSE", spec.target_se.join(","));

        if spec.flavor == MoveFlavor::Moving {
            warn!(
                "{}-move: flavor Moving replicates only, replicas at {:?} are not removed",
                spec.application, spec.source_se
            );
        }

        vec![replicate]
    }

    /// Builds the registration request for a move.
    pub fn build_request(&self, spec: &MoveSpec) -> TransformationRequest {
        let mut request = TransformationRequest::new(
            &spec.name,
            &spec.transformation_type,
            &spec.description,
            TransformationBody::Operations(self.build_body(spec)),
        );
        request.group = non_empty(&spec.group);
        request.group_size = Some(spec.group_size);
        request.plugin = Some(spec.plugin.clone());
        request.target_se = spec.target_se.clone();
        request
    }

    /// Registers and activates a move with its input query.
    pub fn submit(&self, spec: &MoveSpec) -> Result<TransformationId, ProdError> {
        let request = self.build_request(spec);
        let fail = |e| ProdError::from_backend(&spec.name, e);

        request.validate().map_err(fail)?;
        let id = self.backend.add_transformation(&request).map_err(fail)?;
        self.backend.activate(&id).map_err(fail)?;

        if !spec.input_meta.is_empty() {
            self.backend
                .create_input_query(&id, &spec.input_meta)
                .map_err(fail)?;
        }

        info!("{}-move: Transformation {} registered as '{}'", spec.application, id, spec.name);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn step_spec(generator: bool) -> StepSpec {
        let mut input_meta = Metadata::new();
        if !generator {
            input_meta.insert("transformationID".to_string(), "1".to_string());
            input_meta.insert("application".to_string(), "detsim".to_string());
        }
        StepSpec {
            name: "JUNOProd-J17-Chain-e+_1MeV-detsim".to_string(),
            transformation_type: "MCSimulation-JUNO".to_string(),
            group: "JUNO-Prod".to_string(),
            description: "detsim for Chain with tag e+_1MeV".to_string(),
            executable: "bootstrap.sh".to_string(),
            software_version: "J17".to_string(),
            application: "detsim".to_string(),
            output_path: "/juno/x/detsim".to_string(),
            output_pattern: "detsim-*.root".to_string(),
            output_se: "IHEP-STORM".to_string(),
            output_mode: "closest".to_string(),
            extra_args: vec!["2".to_string(), "42".to_string(), "\"gun\"".to_string()],
            input_meta,
            generator,
            max_tasks: 10,
            sites: vec!["GRID.A".to_string()],
            banned_sites: Vec::new(),
            output_sandbox: vec!["*log".to_string()],
            failover: false,
        }
    }

    fn move_spec(flavor: MoveFlavor) -> MoveSpec {
        let mut input_meta = Metadata::new();
        input_meta.insert("transformationID".to_string(), "1".to_string());
        MoveSpec {
            name: "p-tag-detsim-Replication".to_string(),
            transformation_type: "Replication-JUNO".to_string(),
            group: "JUNO-Prod".to_string(),
            description: "Move detsim".to_string(),
            application: "detsim".to_string(),
            flavor,
            plugin: "Broadcast".to_string(),
            input_meta,
            source_se: vec!["CNAF-STORM".to_string()],
            target_se: vec!["IHEP-STORM".to_string(), "JINR-JUNO".to_string()],
            group_size: 5,
        }
    }

    #[test]
    fn test_argument_order() {
        let args = step_spec(true).arguments();
        assert_eq!(
            args,
            vec![
                "\"J17\"",
                "\"detsim\"",
                "\"/juno/x/detsim\"",
                "\"detsim-*.root\"",
                "\"IHEP-STORM\"",
                "\"closest\"",
                "@{JOB_ID}",
                "2",
                "42",
                "\"gun\"",
            ]
        );
    }

    #[test]
    fn test_generator_request_uses_max_tasks() {
        let backend = MemoryBackend::new();
        let request = StepExecutor::new(&backend).build_request(&step_spec(true));
        assert_eq!(request.max_tasks, Some(10));
        assert_eq!(request.group_size, None);
        assert_eq!(request.group.as_deref(), Some("JUNO-Prod"));
        match request.body {
            TransformationBody::Job(job) => assert_eq!(job.destination, vec!["GRID.A"]),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_failover_job_shape() {
        let backend = MemoryBackend::new();
        let executor = StepExecutor::new(&backend);

        let plain = executor.build_job(&step_spec(true));
        assert_eq!(plain.commands.len(), 3);
        assert_eq!(plain.output_sandbox, vec!["*log"]);

        let mut spec = step_spec(false);
        spec.failover = true;
        spec.output_sandbox = vec!["app.out".to_string(), "app.err".to_string()];
        let job = executor.build_job(&spec);
        assert_eq!(job.commands.len(), 4);
        assert_eq!(job.commands[3].modules, vec!["Script", "FailoverRequest"]);
        assert_eq!(job.output_sandbox, vec!["app.out", "app.err"]);
    }

    #[test]
    fn test_generator_submit_skips_query() {
        let backend = MemoryBackend::new();
        let id = StepExecutor::new(&backend).submit(&step_spec(true)).unwrap();
        assert_eq!(backend.registration_count(), 1);
        assert!(backend.input_query(&id).is_none());
        assert!(backend.is_active(&id));
    }

    #[test]
    fn test_dependent_submit_attaches_query() {
        let backend = MemoryBackend::new();
        let id = StepExecutor::new(&backend).submit(&step_spec(false)).unwrap();
        let query = backend.input_query(&id).unwrap();
        assert_eq!(query["transformationID"], "1");
        assert_eq!(backend.request(&id).unwrap().group_size, Some(1));
    }

    #[test]
    fn test_duplicate_name_is_fatal_error() {
        let backend = MemoryBackend::new();
        let executor = StepExecutor::new(&backend);
        executor.submit(&step_spec(true)).unwrap();
        let result = executor.submit(&step_spec(true));
        assert!(matches!(result, Err(ProdError::DuplicateStepName(_))));
        assert_eq!(backend.registration_count(), 1);
    }

    #[test]
    fn test_move_request() {
        let backend = MemoryBackend::new();
        let request = MoveExecutor::new(&backend).build_request(&move_spec(MoveFlavor::Replication));
        assert_eq!(request.group_size, Some(5));
        assert_eq!(request.plugin.as_deref(), Some("Broadcast"));
        assert_eq!(request.target_se, vec!["IHEP-STORM", "JINR-JUNO"]);
        match request.body {
            TransformationBody::Operations(ops) => {
                assert_eq!(ops.len(), 1);
                assert_eq!(ops[0].name, "ReplicateAndRegister");
                assert_eq!(ops[0].parameters["TargetSE"], "IHEP-STORM,JINR-JUNO");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_moving_flavor_does_not_remove_sources() {
        let backend = MemoryBackend::new();
        let ops = MoveExecutor::new(&backend).build_body(&move_spec(MoveFlavor::Moving));
        assert!(ops.iter().all(|op| op.name != "RemoveReplica"));
    }

    #[test]
    fn test_move_submit_attaches_query() {
        let backend = MemoryBackend::new();
        let id = MoveExecutor::new(&backend)
            .submit(&move_spec(MoveFlavor::Replication))
            .unwrap();
        assert_eq!(backend.input_query(&id).unwrap()["transformationID"], "1");
    }
}
