//! Production Planning
//!
//! Turns a resolved [`Config`](crate::config::Config) into registered
//! transformations, one per requested `(tag, application)` pair, using the
//! metadata catalog as the dependency database.
//!
//! # Structure
//!
//! - [`layout`]: Output paths, transformation names, submitting identity
//! - [`dependency`]: Predecessor lookup through the run cache and catalog
//! - [`planner`]: Per-step and per-move state machines
//! - [`report`]: Outcomes collected over a run
//! - [`chain`]: The run loop over tags, stages and moves

pub mod chain;
pub mod dependency;
pub mod layout;
pub mod planner;
pub mod report;

pub use chain::ProductionChain;
pub use dependency::DependencyResolver;
pub use layout::{Identity, OutputLayout};
pub use planner::{MovePlanner, StepOutcome, StepPlanner, DRY_RUN_ID};
pub use report::{PlanEntry, PlanKind, RunReport};
