//! Step and Move Planners
//!
//! Each `(tag, application)` pair moves through:
//!
//! ```text
//! NotPlanned -> Checking -> AlreadyExists
//!                        -> PredecessorMissing
//!                        -> PendingCreate -> Created | DryRun
//! ```
//!
//! `Checking` reads the step's own output directory first, so an existing
//! step is never re-linked. Only `PendingCreate` talks to the backend, and a
//! dry run leaves that state without any write. A step the backend already
//! knows by name but the catalog does not is adopted and its catalog entry
//! written again.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::dependency::DependencyResolver;
use super::layout::OutputLayout;
use crate::backend::job::quote;
use crate::backend::{ExecutionBackend, MoveExecutor, StepExecutor, TransformationId};
use crate::backend::executor::{MoveSpec, StepSpec};
use crate::catalog::{Metadata, MetadataStore, TRANSFORMATION_ID_KEY};
use crate::config::Config;
use crate::error::{ProdError, Result};
use crate::profile::{Stage, StageInput, MOVE_TRANSFORMATION_TYPE};
use crate::tag::template::has_placeholders;
use crate::tag::TagParams;

/// Identifier recorded for steps planned in a dry run.
pub const DRY_RUN_ID: &str = "dryrun";

/// Executable every production step runs.
const STEP_EXECUTABLE: &str = "bootstrap.sh";

/// Terminal state of one planned step or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "camelCase")]
pub enum StepOutcome {
    /// Registered with the backend under the given identifier
    Created(TransformationId),
    /// Assembled and logged only
    DryRun,
    /// Found from an earlier run; left untouched
    AlreadyExists(TransformationId),
    /// The input step has no transformation yet
    PredecessorMissing(String),
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::DryRun => "dry-run",
            Self::AlreadyExists(_) => "exists",
            Self::PredecessorMissing(_) => "missing input",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(id) => write!(f, "created ({})", id),
            Self::DryRun => f.write_str("dry-run"),
            Self::AlreadyExists(id) => write!(f, "already exists ({})", id),
            Self::PredecessorMissing(app) => write!(f, "no transformation for \"{}\"", app),
        }
    }
}

fn log_spec<T: Serialize + fmt::Debug>(label: &str, spec: &T) {
    match serde_yaml::to_string(spec) {
        Ok(yaml) => info!("{}: dry run, transformation not submitted\n{}", label, yaml),
        Err(e) => {
            debug!("Could not render {} as YAML: {}", label, e);
            info!("{}: dry run, transformation not submitted\n{:#?}", label, spec);
        }
    }
}

/// Plans workflow steps for one production.
pub struct StepPlanner<'a> {
    config: &'a Config,
    layout: &'a OutputLayout,
    store: &'a dyn MetadataStore,
    backend: &'a dyn ExecutionBackend,
    executor: StepExecutor<'a>,
    stamped_tags: BTreeSet<String>,
}

impl<'a> StepPlanner<'a> {
    pub fn new(
        config: &'a Config,
        layout: &'a OutputLayout,
        store: &'a dyn MetadataStore,
        backend: &'a dyn ExecutionBackend,
    ) -> Self {
        Self {
            config,
            layout,
            store,
            backend,
            executor: StepExecutor::new(backend),
            stamped_tags: BTreeSet::new(),
        }
    }

    /// Plans one stage for one tag.
    ///
    /// # Returns
    ///
    /// * `Ok(outcome)` - The terminal state reached
    /// * `Err(ProdError::StoreUnavailable)` - A catalog call failed
    /// * `Err(ProdError::DuplicateStepName)` - Another run registered the name
    ///   between lookup and registration
    pub fn plan(
        &mut self,
        deps: &mut DependencyResolver,
        tag: &str,
        stage: &Stage,
        params: &TagParams,
    ) -> Result<StepOutcome> {
        let application = stage.application;
        let output_path = self.layout.output_path(tag, application);

        if let Some(id) = deps.existing(tag, application)? {
            warn!(
                "{}: Transformation already exists with ID {} on {}",
                application, id, output_path
            );
            return Ok(StepOutcome::AlreadyExists(id));
        }

        let input_meta = match stage.input {
            StageInput::Generator => Metadata::new(),
            StageInput::Predecessor(previous) => {
                let meta = deps.input_meta(tag, previous)?;
                let Some(id) = meta.get(TRANSFORMATION_ID_KEY) else {
                    error!(
                        "{}: Transformation not found for previous application \"{}\"",
                        application, previous
                    );
                    return Ok(StepOutcome::PredecessorMissing(previous.to_string()));
                };
                info!(
                    "{}: Input transformation \"{}\" from \"{}\"",
                    application, id, previous
                );
                meta
            }
            StageInput::ExternalQuery => {
                let mut meta = self.config.input_query.clone().unwrap_or_default();
                meta.insert("tag".to_string(), tag.to_string());
                info!("{}: Input metadata {:?}", application, meta);
                meta
            }
        };

        let spec = self.assemble(tag, stage, params, input_meta);
        info!("{}: Create transformation '{}' on {}", application, spec.name, output_path);

        if self.config.dryrun {
            log_spec(application, &spec);
            deps.record(tag, application, DRY_RUN_ID);
            return Ok(StepOutcome::DryRun);
        }

        // registered by a run whose catalog writes failed
        let registered = self
            .backend
            .find_by_name(&spec.name)
            .map_err(|e| ProdError::from_backend(&spec.name, e))?;
        if let Some(id) = registered {
            warn!(
                "{}: Transformation '{}' already registered with ID {}, restoring catalog entry",
                application, spec.name, id
            );
            deps.record(tag, application, &id);
            self.persist(tag, application, &id)?;
            return Ok(StepOutcome::AlreadyExists(id));
        }

        let id = self.executor.submit(&spec)?;
        deps.record(tag, application, &id);
        self.persist(tag, application, &id)?;
        Ok(StepOutcome::Created(id))
    }

    /// Builds the full step specification without side effects.
    pub fn assemble(
        &self,
        tag: &str,
        stage: &Stage,
        params: &TagParams,
        input_meta: Metadata,
    ) -> StepSpec {
        let config = self.config;
        let application = stage.application;

        let template = config.mode_template(application);
        let mode = params.render(template);
        if params.is_empty() && has_placeholders(template) {
            warn!(
                "{}-mode: no tag parameters for '{}', template left unexpanded",
                application, tag
            );
        }
        if !mode.is_empty() {
            info!("{}-mode: {}", application, mode);
        }

        let mut extra_args = vec![config.evtmax.to_string(), config.seed.clone(), quote(&mode)];
        if config.profile.uses_directory_limit() {
            extra_args.push(config.max2dir.to_string());
        }

        StepSpec {
            name: self.layout.step_name(tag, application),
            transformation_type: stage.transformation_type.to_string(),
            group: config.trans_group.clone(),
            description: config.profile.describe(application, &config.process, tag),
            executable: STEP_EXECUTABLE.to_string(),
            software_version: config.software_version.clone(),
            application: application.to_string(),
            output_path: self.layout.output_path(tag, application),
            output_pattern: config.profile.output_pattern(application),
            output_se: config.output_se.clone(),
            output_mode: config.output_mode.clone(),
            extra_args,
            input_meta,
            generator: stage.is_generator(),
            max_tasks: config.number_of_tasks,
            sites: config.site.clone(),
            banned_sites: config.banned_site.clone(),
            output_sandbox: config.profile.output_sandbox(),
            failover: config.profile.uses_failover_request(),
        }
    }

    /// Writes the catalog entries that make the new step discoverable.
    fn persist(&mut self, tag: &str, application: &str, id: &str) -> Result<()> {
        if !self.stamped_tags.contains(tag) {
            for (path, meta) in self.layout.ancestor_stamps() {
                self.store.create_path(path)?;
                self.store.set_metadata(path, meta)?;
            }

            let tag_dir = self.layout.tag_dir(tag);
            let mut meta = Metadata::new();
            meta.insert("tag".to_string(), tag.to_string());
            self.store.create_path(&tag_dir)?;
            self.store.set_metadata(&tag_dir, &meta)?;
            self.stamped_tags.insert(tag.to_string());
        }

        let output_path = self.layout.output_path(tag, application);
        let mut meta = Metadata::new();
        meta.insert("application".to_string(), application.to_string());
        meta.insert(TRANSFORMATION_ID_KEY.to_string(), id.to_string());
        self.store.create_path(&output_path)?;
        self.store.set_metadata(&output_path, &meta)?;
        Ok(())
    }
}

/// Plans move/replication steps for one production.
pub struct MovePlanner<'a> {
    config: &'a Config,
    layout: &'a OutputLayout,
    backend: &'a dyn ExecutionBackend,
    executor: MoveExecutor<'a>,
}

impl<'a> MovePlanner<'a> {
    pub fn new(
        config: &'a Config,
        layout: &'a OutputLayout,
        backend: &'a dyn ExecutionBackend,
    ) -> Self {
        Self {
            config,
            layout,
            backend,
            executor: MoveExecutor::new(backend),
        }
    }

    /// Plans the move of `application`'s output for `tag`.
    pub fn plan(
        &self,
        deps: &DependencyResolver,
        tag: &str,
        application: &str,
    ) -> Result<StepOutcome> {
        let input_meta = deps.input_meta(tag, application)?;
        let Some(id) = input_meta.get(TRANSFORMATION_ID_KEY) else {
            error!(
                "{}-move: Transformation not found for application \"{}\"",
                application, application
            );
            return Ok(StepOutcome::PredecessorMissing(application.to_string()));
        };
        info!(
            "{}-move: Input transformation \"{}\" from \"{}\"",
            application, id, application
        );

        let spec = self.assemble(tag, application, input_meta);
        let label = format!("{}-move", application);
        info!("{}: Create transformation '{}'", label, spec.name);

        if self.config.dryrun {
            log_spec(&label, &spec);
            return Ok(StepOutcome::DryRun);
        }

        let existing = self
            .backend
            .find_by_name(&spec.name)
            .map_err(|e| ProdError::from_backend(&spec.name, e))?;
        if let Some(existing) = existing {
            warn!("{}: Transformation already exists with ID {}", label, existing);
            return Ok(StepOutcome::AlreadyExists(existing));
        }

        let id = self.executor.submit(&spec)?;
        Ok(StepOutcome::Created(id))
    }

    /// Builds the full move specification without side effects.
    pub fn assemble(&self, tag: &str, application: &str, input_meta: Metadata) -> MoveSpec {
        let config = self.config;
        MoveSpec {
            name: self.layout.move_name(tag, application, config.move_flavor),
            transformation_type: MOVE_TRANSFORMATION_TYPE.to_string(),
            group: config.trans_group.clone(),
            description: format!(
                "Move {} for {} with tag {}",
                application, config.process, tag
            ),
            application: application.to_string(),
            flavor: config.move_flavor,
            plugin: config.move_plugin.clone(),
            input_meta,
            source_se: config.move_source_se.clone(),
            target_se: config.move_target_se.clone(),
            group_size: config.move_group_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::catalog::MemoryStore;
    use crate::config::Overrides;
    use crate::production::Identity;
    use crate::Profile;

    const INI: &str = "\
[all]
softwareVersion = J17v1r1
process = Chain
outputType = production
seed = 42
evtmax = 100
njobs = 5
workflow = detsim elecsim
moveType = detsim
detsim-mode = gun --particles {0} --momentums {1}
";

    fn config(extra: &[(&str, &str)], profile: Profile) -> Config {
        let overrides: Overrides = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_ini_str(INI, &overrides, profile).unwrap()
    }

    fn params() -> TagParams {
        TagParams {
            positional: vec!["e+".to_string(), "1.398".to_string()],
            named: Default::default(),
        }
    }

    fn identity() -> Identity {
        Identity::new("u", "g", "juno")
    }

    #[test]
    fn test_assemble_generator_step() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Production.stage("detsim").unwrap();
        let spec = planner.assemble("e+_1.398MeV", stage, &params(), Metadata::new());

        assert_eq!(spec.name, "JUNOProd-J17v1r1-Chain-e+_1.398MeV-detsim");
        assert_eq!(spec.transformation_type, "MCSimulation-JUNO");
        assert_eq!(
            spec.extra_args,
            vec!["100", "42", "\"gun --particles e+ --momentums 1.398\""]
        );
        assert!(spec.generator);
        assert_eq!(spec.max_tasks, 5);
        assert_eq!(spec.output_pattern, "detsim-*.root");
        assert_eq!(
            spec.output_path,
            "/juno/production/J17v1r1/Chain/others/e+_1.398MeV/detsim"
        );
    }

    #[test]
    fn test_reconstruction_appends_directory_limit() {
        let config = config(
            &[("inputQuery", "{\"application\": \"detsim\"}"), ("max2dir", "500")],
            Profile::Reconstruction,
        );
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Reconstruction.stage("rec").unwrap();
        let spec = planner.assemble("t", stage, &TagParams::default(), Metadata::new());
        assert_eq!(spec.extra_args, vec!["100", "42", "\"\"", "500"]);
        assert_eq!(spec.output_pattern, "rec*-*.root");
        assert_eq!(spec.description, "rec for Chain");
    }

    #[test]
    fn test_existing_step_is_not_relinked() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let mut meta = Metadata::new();
        meta.insert(TRANSFORMATION_ID_KEY.to_string(), "11".to_string());
        let store = MemoryStore::new().with_metadata(&layout.output_path("t", "detsim"), meta);
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Production.stage("detsim").unwrap();
        let outcome = planner.plan(&mut deps, "t", stage, &params()).unwrap();

        assert_eq!(outcome, StepOutcome::AlreadyExists("11".to_string()));
        assert_eq!(store.set_calls(), 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_created_step_is_persisted() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Production.stage("detsim").unwrap();
        let outcome = planner.plan(&mut deps, "t", stage, &params()).unwrap();
        assert_eq!(outcome, StepOutcome::Created("1".to_string()));

        let step = store.peek(&layout.output_path("t", "detsim"));
        assert_eq!(step["transformationID"], "1");
        assert_eq!(step["application"], "detsim");
        assert_eq!(store.peek(&layout.tag_dir("t"))["tag"], "t");
        assert_eq!(store.peek("/juno/production/J17v1r1")["softwareVersion"], "J17v1r1");
        assert_eq!(store.peek("/juno/production/J17v1r1/Chain")["process"], "Chain");
        assert_eq!(deps.recorded("t", "detsim"), Some("1"));
    }

    #[test]
    fn test_registered_step_is_adopted() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let backend = MemoryBackend::new();
        let stage = Profile::Production.stage("detsim").unwrap();

        let first = MemoryStore::new();
        let mut deps = DependencyResolver::new(&config, &layout, &first);
        StepPlanner::new(&config, &layout, &first, &backend)
            .plan(&mut deps, "t", stage, &params())
            .unwrap();

        let store = MemoryStore::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);
        let outcome = planner.plan(&mut deps, "t", stage, &params()).unwrap();

        assert_eq!(outcome, StepOutcome::AlreadyExists("1".to_string()));
        assert_eq!(backend.registration_count(), 1);
        assert_eq!(store.peek(&layout.output_path("t", "detsim"))["transformationID"], "1");
        assert_eq!(store.peek(&layout.tag_dir("t"))["tag"], "t");
        assert_eq!(deps.recorded("t", "detsim"), Some("1"));
    }

    #[test]
    fn test_reconstruction_job_ends_with_failover() {
        let config = config(&[("inputQuery", "{\"application\": \"detsim\"}")], Profile::Reconstruction);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Reconstruction.stage("elecsim").unwrap();
        let spec = planner.assemble("t", stage, &TagParams::default(), Metadata::new());
        assert!(spec.failover);
        assert_eq!(spec.output_sandbox, vec!["app.out", "app.err", "Script3_CodeOutput.log"]);

        let production = self::config(&[], Profile::Production);
        let layout = OutputLayout::new(&production, &identity());
        let planner = StepPlanner::new(&production, &layout, &store, &backend);
        let stage = Profile::Production.stage("detsim").unwrap();
        let spec = planner.assemble("t", stage, &params(), Metadata::new());
        assert!(!spec.failover);
        assert_eq!(spec.output_sandbox, vec!["*log"]);
    }

    #[test]
    fn test_tag_stamped_once() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);

        let profile = Profile::Production;
        planner.plan(&mut deps, "t", profile.stage("detsim").unwrap(), &params()).unwrap();
        let after_first = store.set_calls();
        planner.plan(&mut deps, "t", profile.stage("elecsim").unwrap(), &params()).unwrap();

        // three ancestors + tag dir + step dir, then only the step dir
        assert_eq!(after_first, 5);
        assert_eq!(store.set_calls(), 6);
    }

    #[test]
    fn test_predecessor_from_run_cache() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);

        let profile = Profile::Production;
        planner.plan(&mut deps, "t", profile.stage("detsim").unwrap(), &params()).unwrap();
        let outcome = planner
            .plan(&mut deps, "t", profile.stage("elecsim").unwrap(), &params())
            .unwrap();

        let StepOutcome::Created(id) = outcome else {
            panic!("elecsim not created");
        };
        let query = backend.input_query(&id).unwrap();
        assert_eq!(query["transformationID"], "1");
        assert_eq!(query["application"], "detsim");
        assert_eq!(query["tag"], "t");
    }

    #[test]
    fn test_external_query_stage_injects_tag() {
        let config = config(
            &[("inputQuery", "{\"dirName\": \"ML\", \"application\": \"detsim\"}")],
            Profile::Reconstruction,
        );
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        let mut planner = StepPlanner::new(&config, &layout, &store, &backend);

        let stage = Profile::Reconstruction.stage("elecsim_rec").unwrap();
        let outcome = planner.plan(&mut deps, "t1", stage, &TagParams::default()).unwrap();
        let StepOutcome::Created(id) = outcome else {
            panic!("elecsim_rec not created");
        };

        let query = backend.input_query(&id).unwrap();
        assert_eq!(query["dirName"], "ML");
        assert_eq!(query["tag"], "t1");
        assert_eq!(backend.request(&id).unwrap().group_size, Some(1));
        // no ancestor stamps for reconstruction
        assert!(store.peek("/juno/production/J17v1r1").is_empty());
    }

    #[test]
    fn test_move_requires_step() {
        let config = config(&[], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let deps = DependencyResolver::new(&config, &layout, &store);
        let planner = MovePlanner::new(&config, &layout, &backend);

        let outcome = planner.plan(&deps, "t", "detsim").unwrap();
        assert_eq!(outcome, StepOutcome::PredecessorMissing("detsim".to_string()));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_move_created_then_exists() {
        let config = config(&[("moveTargetSE", "A B")], Profile::Production);
        let layout = OutputLayout::new(&config, &identity());
        let store = MemoryStore::new();
        let backend = MemoryBackend::new();
        let mut deps = DependencyResolver::new(&config, &layout, &store);
        deps.record("t", "detsim", "3");
        let planner = MovePlanner::new(&config, &layout, &backend);

        let first = planner.plan(&deps, "t", "detsim").unwrap();
        let StepOutcome::Created(id) = first else {
            panic!("move not created");
        };
        let request = backend.request(&id).unwrap();
        assert_eq!(request.name, "JUNOProd-J17v1r1-Chain-t-detsim-Replication");
        assert_eq!(request.transformation_type, "Replication-JUNO");
        assert_eq!(request.target_se, vec!["A", "B"]);
        assert_eq!(backend.input_query(&id).unwrap()["transformationID"], "3");

        let second = planner.plan(&deps, "t", "detsim").unwrap();
        assert_eq!(second, StepOutcome::AlreadyExists(id));
        assert_eq!(backend.registration_count(), 1);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(StepOutcome::Created("4".to_string()).to_string(), "created (4)");
        assert_eq!(
            StepOutcome::PredecessorMissing("calib".to_string()).to_string(),
            "no transformation for \"calib\""
        );
        assert_eq!(StepOutcome::DryRun.label(), "dry-run");
    }
}
