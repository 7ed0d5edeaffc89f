//! Configuration Resolver
//!
//! Builds the immutable [`Config`] for a run from a two-tier INI file and
//! command-line overrides.
//!
//! Merge order, later entries winning:
//! 1. the `[all]` section
//! 2. command-line overrides
//! 3. the section named by the resolved `process`
//! 4. command-line overrides again
//!
//! Overrides are applied twice so that `process` may itself come from the
//! command line while explicitly given options still beat the process
//! section.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Serialize;

use super::ini::IniDocument;
use crate::catalog::Metadata;
use crate::error::ConfigError;
use crate::profile::{Profile, StageInput};

/// Command-line supplied options, keyed exactly like the INI options.
pub type Overrides = BTreeMap<String, String>;

/// Root classification of the output directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Production,
    Reconstruction,
    User,
}

impl OutputType {
    fn parse(value: &str) -> Self {
        match value {
            "production" => Self::Production,
            "reconstruction" => Self::Reconstruction,
            _ => Self::User,
        }
    }
}

/// Behaviour of a move/replication transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoveFlavor {
    /// Copy to the target storage elements, keeping the sources.
    Replication,
    /// Declared relocation flavor; source removal is not performed.
    Moving,
}

impl MoveFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replication => "Replication",
            Self::Moving => "Moving",
        }
    }
}

/// What a run does when a tag's parameter conversion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagErrorPolicy {
    /// Log the failure and continue with the next tag.
    Skip,
    /// Stop the whole run.
    Abort,
}

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub profile: Profile,
    pub process: String,
    pub software_version: String,
    /// Detector position; only present for positional profiles.
    pub position: Option<String>,

    pub prod_name: String,
    pub prod_name_suffix: String,
    pub trans_group: String,

    pub output_type: OutputType,
    pub output_sub_dir: String,
    pub output_se: String,
    pub output_mode: String,
    pub work_dir: String,

    pub tag_parser: String,
    pub tag_param_converter: String,
    pub on_tag_error: TagErrorPolicy,
    pub tags: Vec<String>,

    pub seed: String,
    pub evtmax: i64,
    pub number_of_tasks: u32,
    pub max2dir: u64,

    pub site: Vec<String>,
    pub banned_site: Vec<String>,
    pub workflow: Vec<String>,
    pub move_type: Vec<String>,

    pub move_flavor: MoveFlavor,
    pub move_plugin: String,
    pub move_group_size: u32,
    pub move_source_se: Vec<String>,
    pub move_target_se: Vec<String>,

    pub input_query: Option<Metadata>,

    pub dryrun: bool,
    pub ignore_workflow: bool,
    pub ignore_move: bool,

    /// Merged string options, used for per-application `<app>-mode` lookups.
    #[serde(skip)]
    raw: BTreeMap<String, String>,
}

impl Config {
    /// Loads the configuration file for `profile` and applies `overrides`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use prodchain::config::{Config, Overrides};
    /// use prodchain::Profile;
    ///
    /// let mut overrides = Overrides::new();
    /// overrides.insert("dryrun".to_string(), "true".to_string());
    /// let config = Config::load("prod.ini", &overrides, Profile::Production)?;
    /// assert!(config.dryrun);
    /// # Ok::<(), prodchain::error::ConfigError>(())
    /// ```
    pub fn load(
        path: impl AsRef<Path>,
        overrides: &Overrides,
        profile: Profile,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ini_str(&text, overrides, profile)
    }

    /// Resolves a configuration from INI text.
    pub fn from_ini_str(
        text: &str,
        overrides: &Overrides,
        profile: Profile,
    ) -> Result<Self, ConfigError> {
        let doc = IniDocument::parse(text)?;
        let raw = merge(&doc, overrides)?;
        let config = Self::resolve(raw, profile)?;
        debug!("Final param: {:?}", config);
        Ok(config)
    }

    fn resolve(raw: BTreeMap<String, String>, profile: Profile) -> Result<Self, ConfigError> {
        for key in ["softwareVersion", "process"] {
            if raw.get(key).map_or(true, |v| v.is_empty()) {
                return Err(ConfigError::MissingRequiredParameter(key.to_string()));
            }
        }

        let text = |key: &str, default: &str| -> String {
            raw.get(key).cloned().unwrap_or_else(|| default.to_string())
        };

        let process = text("process", "");

        let position = if profile.is_positional() {
            let position = text("position", "others");
            if position.is_empty() {
                return Err(ConfigError::MissingRequiredParameter("position".to_string()));
            }
            Some(position)
        } else {
            None
        };

        let tags = match raw.get("tag").filter(|t| !t.trim().is_empty()) {
            Some(tag) => vec![tag.trim().to_string()],
            None => parse_list(raw.get("tags").map_or("", String::as_str)),
        };

        let move_flavor = match text("moveFlavor", "Replication").as_str() {
            "Replication" => MoveFlavor::Replication,
            "Moving" => MoveFlavor::Moving,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "moveFlavor".to_string(),
                    value: other.to_string(),
                    reason: "expected Replication or Moving".to_string(),
                })
            }
        };

        let on_tag_error = match text("onTagError", "skip").to_lowercase().as_str() {
            "skip" => TagErrorPolicy::Skip,
            "abort" => TagErrorPolicy::Abort,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "onTagError".to_string(),
                    value: other.to_string(),
                    reason: "expected skip or abort".to_string(),
                })
            }
        };

        let config = Config {
            profile,
            software_version: text("softwareVersion", ""),
            position,
            prod_name: text("prodName", "JUNOProd"),
            prod_name_suffix: text("prodNameSuffix", ""),
            trans_group: text("transGroup", "JUNO-Prod"),
            output_type: OutputType::parse(&text("outputType", "user")),
            output_sub_dir: text("outputSubDir", ""),
            output_se: text("outputSE", "IHEP-STORM"),
            output_mode: text("outputMode", "closest"),
            work_dir: text("workDir", &process),
            tag_parser: text("tagParser", ""),
            tag_param_converter: text("tagParamConverter", ""),
            on_tag_error,
            tags,
            seed: text("seed", "0"),
            evtmax: parse_number(&raw, "evtmax", 1)?,
            number_of_tasks: parse_number(&raw, "njobs", 1)?,
            max2dir: parse_number(&raw, "max2dir", 10000)?,
            site: parse_list(&text("site", "")),
            banned_site: parse_list(&text("bannedsite", "")),
            workflow: parse_list(&text("workflow", "")),
            move_type: parse_list(&text("moveType", "")),
            move_flavor,
            move_plugin: text("movePlugin", "Broadcast"),
            move_group_size: parse_number(&raw, "moveGroupSize", 1)?,
            move_source_se: parse_list(&text("moveSourceSE", "IHEP-STORM")),
            move_target_se: parse_list(&text("moveTargetSE", "IHEP-STORM")),
            input_query: parse_query(raw.get("inputQuery"))?,
            dryrun: parse_bool(&text("dryrun", "false")),
            ignore_workflow: parse_bool(&text("ignoreWorkflow", "false")),
            ignore_move: parse_bool(&text("ignoreMove", "false")),
            process,
            raw,
        };

        config.check_input_query()?;
        Ok(config)
    }

    /// Query-fed stages cannot be planned without an input query.
    fn check_input_query(&self) -> Result<(), ConfigError> {
        if self.ignore_workflow || self.input_query.is_some() {
            return Ok(());
        }
        let needs_query = self
            .profile
            .stages()
            .iter()
            .any(|s| s.input == StageInput::ExternalQuery && self.wants_step(s.application));
        if needs_query {
            return Err(ConfigError::MissingRequiredParameter("inputQuery".to_string()));
        }
        Ok(())
    }

    /// Returns a merged option as written in the configuration.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    /// Returns the `<application>-mode` template, empty when not configured.
    pub fn mode_template(&self, application: &str) -> &str {
        self.get(&format!("{}-mode", application)).unwrap_or("")
    }

    /// Whether the workflow list requests this application.
    pub fn wants_step(&self, application: &str) -> bool {
        self.workflow.iter().any(|a| a == application)
    }

    /// Whether the move list requests this application.
    pub fn wants_move(&self, application: &str) -> bool {
        self.move_type.iter().any(|a| a == application)
    }
}

/// Applies the four-layer merge described in the module docs.
fn merge(doc: &IniDocument, overrides: &Overrides) -> Result<BTreeMap<String, String>, ConfigError> {
    let all = doc
        .section("all")
        .ok_or_else(|| ConfigError::MissingSection("all".to_string()))?;

    let mut merged: BTreeMap<String, String> = all.options.iter().cloned().collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    if let Some(process) = merged.get("process").filter(|p| !p.is_empty()).cloned() {
        let Some(section) = doc.section(&process) else {
            debug!("Sections in file: {:?}", doc.section_names());
            return Err(ConfigError::MissingSection(process));
        };
        merged.extend(section.options.iter().cloned());
    }

    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(merged)
}

/// Splits a whitespace separated list.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// `true`/`yes` in any case are true, everything else false.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "yes")
}

fn parse_number<T>(raw: &BTreeMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Parses the JSON object given as `inputQuery` into flat metadata.
fn parse_query(value: Option<&String>) -> Result<Option<Metadata>, ConfigError> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(value).map_err(|e| ConfigError::InvalidValue {
            key: "inputQuery".to_string(),
            value: value.clone(),
            reason: e.to_string(),
        })?;

    let query = object
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect();

    Ok(Some(query))
}
