//! Output Layout
//!
//! Computes every catalog path and transformation name of a production from
//! the configuration and the submitting identity. All values are pure
//! functions of their inputs, so repeated runs address the same paths.

use serde::Serialize;

use crate::catalog::{join_path, Metadata};
use crate::config::{Config, MoveFlavor, OutputType};

/// Who submits the production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub group: String,
    pub vo: String,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        group: impl Into<String>,
        vo: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            group: group.into(),
            vo: vo.into(),
        }
    }

    /// `/<vo>/user/<initial>/<username>`
    pub fn user_home(&self) -> String {
        let initial: String = self.username.chars().take(1).collect();
        join_path(
            "/",
            &[self.vo.as_str(), "user", initial.as_str(), self.username.as_str()],
        )
    }
}

/// Paths and names derived for one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputLayout {
    output_root: String,
    prod_root: String,
    prefix: String,
    ancestor_stamps: Vec<(String, Metadata)>,
}

impl OutputLayout {
    pub fn new(config: &Config, identity: &Identity) -> Self {
        let sub_dir = config.output_sub_dir.trim_matches('/');
        let output_root = match config.output_type {
            OutputType::Production => join_path("/", &[identity.vo.as_str(), "production", sub_dir]),
            OutputType::Reconstruction => {
                join_path("/", &[identity.vo.as_str(), "reconstruction", sub_dir])
            }
            OutputType::User => join_path(&identity.user_home(), &[sub_dir]),
        };

        let mut levels: Vec<(&str, &str, &str)> = vec![
            (
                "softwareVersion",
                config.software_version.as_str(),
                config.software_version.as_str(),
            ),
            ("process", config.work_dir.as_str(), config.process.as_str()),
        ];
        if let Some(position) = config.position.as_deref() {
            levels.push(("position", position, position));
        }

        let mut prod_root = output_root.clone();
        let mut ancestor_stamps = Vec::new();
        for (key, dir, value) in levels {
            prod_root = join_path(&prod_root, &[dir]);
            if config.profile.stamps_ancestors() {
                let mut meta = Metadata::new();
                meta.insert(key.to_string(), value.to_string());
                ancestor_stamps.push((prod_root.clone(), meta));
            }
        }

        let prefix = format!(
            "{}{}-{}-{}",
            config.prod_name, config.prod_name_suffix, config.software_version, config.work_dir
        );

        Self {
            output_root,
            prod_root,
            prefix,
            ancestor_stamps,
        }
    }

    pub fn output_root(&self) -> &str {
        &self.output_root
    }

    pub fn prod_root(&self) -> &str {
        &self.prod_root
    }

    /// Common prefix of every transformation name in this production.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tag_dir(&self, tag: &str) -> String {
        join_path(&self.prod_root, &[tag])
    }

    /// Directory holding the files of one step.
    pub fn output_path(&self, tag: &str, application: &str) -> String {
        join_path(&self.prod_root, &[tag, application])
    }

    pub fn step_name(&self, tag: &str, application: &str) -> String {
        format!("{}-{}-{}", self.prefix, tag, application)
    }

    pub fn move_name(&self, tag: &str, application: &str, flavor: MoveFlavor) -> String {
        format!("{}-{}", self.step_name(tag, application), flavor.as_str())
    }

    /// Directories between the output root and the tag directories, with
    /// the metadata describing each. Empty when the profile does not stamp.
    pub fn ancestor_stamps(&self) -> &[(String, Metadata)] {
        &self.ancestor_stamps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use crate::Profile;

    const INI: &str = "[all]\nsoftwareVersion = J17v1r1\nprocess = Chain\nposition = center\n";

    fn config(extra: &[(&str, &str)], profile: Profile) -> Config {
        let overrides: Overrides = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let text = match profile {
            Profile::Production => INI.to_string(),
            Profile::Reconstruction => format!("{}inputQuery = {{\"application\": \"detsim\"}}\n", INI),
        };
        Config::from_ini_str(&text, &overrides, profile).unwrap()
    }

    fn identity() -> Identity {
        Identity::new("zhangxm", "juno_user", "juno")
    }

    #[test]
    fn test_user_output_root() {
        let layout = OutputLayout::new(&config(&[("outputSubDir", "/prod/test/")], Profile::Production), &identity());
        assert_eq!(layout.output_root(), "/juno/user/z/zhangxm/prod/test");
        assert_eq!(layout.prod_root(), "/juno/user/z/zhangxm/prod/test/J17v1r1/Chain/center");
    }

    #[test]
    fn test_production_output_root() {
        let layout = OutputLayout::new(
            &config(&[("outputType", "production"), ("workDir", "ChainA")], Profile::Production),
            &identity(),
        );
        assert_eq!(layout.output_root(), "/juno/production");
        assert_eq!(layout.prod_root(), "/juno/production/J17v1r1/ChainA/center");
    }

    #[test]
    fn test_reconstruction_has_no_position_level() {
        let layout = OutputLayout::new(
            &config(&[("outputType", "reconstruction")], Profile::Reconstruction),
            &identity(),
        );
        assert_eq!(layout.prod_root(), "/juno/reconstruction/J17v1r1/Chain");
        assert!(layout.ancestor_stamps().is_empty());
    }

    #[test]
    fn test_names_and_paths() {
        let layout = OutputLayout::new(
            &config(&[("prodNameSuffix", "Test"), ("outputType", "production")], Profile::Production),
            &identity(),
        );
        assert_eq!(layout.prefix(), "JUNOProdTest-J17v1r1-Chain");
        assert_eq!(layout.step_name("e+_1MeV", "detsim"), "JUNOProdTest-J17v1r1-Chain-e+_1MeV-detsim");
        assert_eq!(
            layout.move_name("e+_1MeV", "rec", MoveFlavor::Replication),
            "JUNOProdTest-J17v1r1-Chain-e+_1MeV-rec-Replication"
        );
        assert_eq!(
            layout.output_path("e+_1MeV", "detsim"),
            "/juno/production/J17v1r1/Chain/center/e+_1MeV/detsim"
        );
    }

    #[test]
    fn test_ancestor_stamps() {
        let layout = OutputLayout::new(
            &config(&[("outputType", "production"), ("workDir", "W")], Profile::Production),
            &identity(),
        );
        let stamps = layout.ancestor_stamps();
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[0].0, "/juno/production/J17v1r1");
        assert_eq!(stamps[0].1["softwareVersion"], "J17v1r1");
        assert_eq!(stamps[1].0, "/juno/production/J17v1r1/W");
        assert_eq!(stamps[1].1["process"], "Chain");
        assert_eq!(stamps[2].1["position"], "center");
    }
}
