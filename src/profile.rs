//! Production Profiles
//!
//! A profile fixes the pipeline shape of one tool: which stages exist, in
//! which order they are planned, what each stage consumes, and the
//! profile-specific defaults of the configuration.

use serde::Serialize;

use crate::config::examples::{PRODUCTION_EXAMPLE, RECONSTRUCTION_EXAMPLE};

/// Transformation type used for every move/replication step.
pub const MOVE_TRANSFORMATION_TYPE: &str = "Replication-JUNO";

/// Which tool a run behaves as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Simulation chain starting from a generator stage.
    Production,
    /// Reconstruction chain consuming existing simulation output.
    Reconstruction,
}

/// Where a stage takes its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageInput {
    /// First stage: produces data from nothing, bounded by a task count.
    Generator,
    /// Consumes the output of the named application for the same tag.
    Predecessor(&'static str),
    /// Consumes files selected by the configured `inputQuery`.
    ExternalQuery,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub application: &'static str,
    pub transformation_type: &'static str,
    pub input: StageInput,
}

impl Stage {
    const fn new(
        application: &'static str,
        transformation_type: &'static str,
        input: StageInput,
    ) -> Self {
        Self {
            application,
            transformation_type,
            input,
        }
    }

    pub fn is_generator(&self) -> bool {
        self.input == StageInput::Generator
    }
}

const PRODUCTION_STAGES: &[Stage] = &[
    Stage::new("detsim", "MCSimulation-JUNO", StageInput::Generator),
    Stage::new("elecsim", "ElecSimulation-JUNO", StageInput::Predecessor("detsim")),
    Stage::new("calib", "Calibration-JUNO", StageInput::Predecessor("elecsim")),
    Stage::new("rec", "DataReconstruction-JUNO", StageInput::Predecessor("calib")),
];

const RECONSTRUCTION_STAGES: &[Stage] = &[
    Stage::new("elecsim", "ElecSimulation-JUNO", StageInput::ExternalQuery),
    Stage::new("calib", "Calibration-JUNO", StageInput::Predecessor("elecsim")),
    Stage::new("rec", "DataReconstruction-JUNO", StageInput::Predecessor("calib")),
    Stage::new("elecsim_rec", "ElecSimulation-JUNO", StageInput::ExternalQuery),
];

impl Profile {
    /// Short name used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Reconstruction => "reconstruction",
        }
    }

    /// Configuration file read when none is given.
    pub fn default_config_file(&self) -> &'static str {
        match self {
            Self::Production => "prod.ini",
            Self::Reconstruction => "rec.ini",
        }
    }

    /// Documented example configuration.
    pub fn example(&self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_EXAMPLE,
            Self::Reconstruction => RECONSTRUCTION_EXAMPLE,
        }
    }

    /// Workflow stages in their fixed planning order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::Production => PRODUCTION_STAGES,
            Self::Reconstruction => RECONSTRUCTION_STAGES,
        }
    }

    /// Looks up a stage by application name.
    pub fn stage(&self, application: &str) -> Option<&'static Stage> {
        self.stages().iter().find(|s| s.application == application)
    }

    /// Whether outputs are additionally split by detector position.
    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether step extra arguments carry the `max2dir` limit.
    pub fn uses_directory_limit(&self) -> bool {
        matches!(self, Self::Reconstruction)
    }

    /// Whether step jobs end with a failover request command.
    pub fn uses_failover_request(&self) -> bool {
        matches!(self, Self::Reconstruction)
    }

    /// Files returned in the output sandbox of step jobs.
    pub fn output_sandbox(&self) -> Vec<String> {
        let files: &[&str] = match self {
            Self::Production => &["*log"],
            Self::Reconstruction => &["app.out", "app.err", "Script3_CodeOutput.log"],
        };
        files.iter().map(|f| f.to_string()).collect()
    }

    /// Whether the run stamps the software-version/process/position
    /// directories with descriptive metadata.
    pub fn stamps_ancestors(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Glob of the files a stage writes.
    pub fn output_pattern(&self, application: &str) -> String {
        match self {
            Self::Production => format!("{}-*.root", application),
            Self::Reconstruction => format!("{}*-*.root", application),
        }
    }

    /// Human readable transformation description.
    pub fn describe(&self, application: &str, process: &str, tag: &str) -> String {
        match self {
            Self::Production => format!("{} for {} with tag {}", application, process, tag),
            Self::Reconstruction => format!("{} for {}", application, process),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
