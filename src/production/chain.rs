//! Production Chain
//!
//! Drives a whole run: tags in configured order, for each tag the requested
//! workflow stages in pipeline order, then the requested moves in the same
//! order.

use log::{error, info};

use super::dependency::DependencyResolver;
use super::layout::{Identity, OutputLayout};
use super::planner::{MovePlanner, StepPlanner};
use super::report::{PlanKind, RunReport};
use crate::backend::ExecutionBackend;
use crate::catalog::MetadataStore;
use crate::config::{Config, TagErrorPolicy};
use crate::error::{ConfigError, Result};
use crate::tag::TagExpander;

/// A configured production bound to its collaborators.
///
/// # Example
///
/// ```
/// use prodchain::backend::MemoryBackend;
/// use prodchain::catalog::MemoryStore;
/// use prodchain::config::{Config, Overrides};
/// use prodchain::production::{Identity, ProductionChain};
/// use prodchain::Profile;
///
/// let ini = "[all]\nsoftwareVersion = J17\nprocess = Chain\ntags = a b\nworkflow = detsim\n";
/// let config = Config::from_ini_str(ini, &Overrides::new(), Profile::Production).unwrap();
/// let store = MemoryStore::new();
/// let backend = MemoryBackend::new();
///
/// let chain = ProductionChain::new(&config, &Identity::new("u", "g", "juno"), &store, &backend).unwrap();
/// let report = chain.run().unwrap();
/// assert_eq!(report.created(), 2);
/// ```
pub struct ProductionChain<'a> {
    config: &'a Config,
    layout: OutputLayout,
    expander: TagExpander,
    store: &'a dyn MetadataStore,
    backend: &'a dyn ExecutionBackend,
}

impl<'a> ProductionChain<'a> {
    /// Prepares a run. Fails only on an invalid tag pattern or converter.
    pub fn new(
        config: &'a Config,
        identity: &Identity,
        store: &'a dyn MetadataStore,
        backend: &'a dyn ExecutionBackend,
    ) -> std::result::Result<Self, ConfigError> {
        let expander = TagExpander::new(&config.tag_parser, &config.tag_param_converter)?;
        let layout = OutputLayout::new(config, identity);

        info!("Owner: {}", identity.username);
        info!("OwnerGroup: {}", identity.group);
        info!("VO: {}", identity.vo);
        info!("OutputRoot: {}", layout.output_root());
        info!("ProdRoot: {}", layout.prod_root());
        info!("ProdPrefix: {}", layout.prefix());

        Ok(Self {
            config,
            layout,
            expander,
            store,
            backend,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Plans every tag. Stops at the first fatal error.
    pub fn run(&self) -> Result<RunReport> {
        let config = self.config;
        let profile = config.profile;
        let mut deps = DependencyResolver::new(config, &self.layout, self.store);
        let mut steps = StepPlanner::new(config, &self.layout, self.store, self.backend);
        let moves = MovePlanner::new(config, &self.layout, self.backend);
        let mut report = RunReport::new();

        if config.dryrun {
            info!("Dry run: nothing will be registered or written");
        }

        for tag in &config.tags {
            if !config.ignore_workflow {
                let params = match self.expander.expand(tag) {
                    Ok(params) => params,
                    Err(err) => match config.on_tag_error {
                        TagErrorPolicy::Skip => {
                            error!("{}", err);
                            report.skip_tag(tag, err.to_string());
                            continue;
                        }
                        TagErrorPolicy::Abort => return Err(err),
                    },
                };
                info!("");
                info!("Tag \"{}\" with param: {}", tag, params);

                for stage in profile.stages() {
                    if !config.wants_step(stage.application) {
                        continue;
                    }
                    let outcome = steps.plan(&mut deps, tag, stage, &params)?;
                    report.record(
                        tag,
                        stage.application,
                        PlanKind::Step,
                        self.layout.step_name(tag, stage.application),
                        outcome,
                    );
                }
            }

            if !config.ignore_move {
                for stage in profile.stages() {
                    if !config.wants_move(stage.application) {
                        continue;
                    }
                    let outcome = moves.plan(&deps, tag, stage.application)?;
                    report.record(
                        tag,
                        stage.application,
                        PlanKind::Move,
                        self.layout
                            .move_name(tag, stage.application, config.move_flavor),
                        outcome,
                    );
                }
            }
        }

        info!(
            "Planned {} transformation(s) for {} tag(s) in {:.2?}",
            report.entries().len(),
            config.tags.len(),
            report.elapsed()
        );
        Ok(report)
    }
}
