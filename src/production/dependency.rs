//! Dependency Resolution
//!
//! There is no dependency table: a step's predecessor is found by reading
//! the metadata of the predecessor's output directory. Steps created during
//! the current run are remembered in a run cache which takes precedence over
//! the store, so a chain created in one invocation (or planned in a dry run)
//! resolves without reading back its own writes.

use std::collections::BTreeMap;

use log::debug;

use super::layout::OutputLayout;
use crate::backend::TransformationId;
use crate::catalog::{Metadata, MetadataStore, TRANSFORMATION_ID_KEY};
use crate::config::Config;
use crate::error::Result;

/// Looks up step identifiers in the run cache and the metadata store.
pub struct DependencyResolver<'a> {
    store: &'a dyn MetadataStore,
    layout: &'a OutputLayout,
    base: Metadata,
    /// tag -> application -> transformation id
    cache: BTreeMap<String, BTreeMap<String, TransformationId>>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(config: &Config, layout: &'a OutputLayout, store: &'a dyn MetadataStore) -> Self {
        let mut base = Metadata::new();
        base.insert("softwareVersion".to_string(), config.software_version.clone());
        base.insert("process".to_string(), config.process.clone());
        if let Some(position) = &config.position {
            base.insert("position".to_string(), position.clone());
        }

        Self {
            store,
            layout,
            base,
            cache: BTreeMap::new(),
        }
    }

    /// Identifier stored on the step's output directory, if any.
    pub fn existing(&self, tag: &str, application: &str) -> Result<Option<TransformationId>> {
        let path = self.layout.output_path(tag, application);
        let meta = self.store.get_metadata(&path)?;
        Ok(meta
            .get(TRANSFORMATION_ID_KEY)
            .filter(|id| !id.is_empty())
            .cloned())
    }

    /// Metadata query selecting the files produced by `application` for
    /// `tag`. Carries `transformationID` only when the step is known.
    pub fn input_meta(&self, tag: &str, application: &str) -> Result<Metadata> {
        let mut meta = self.base.clone();
        meta.insert("tag".to_string(), tag.to_string());
        meta.insert("application".to_string(), application.to_string());

        let id = match self.recorded(tag, application) {
            Some(id) => Some(id.to_string()),
            None => self.existing(tag, application)?,
        };
        if let Some(id) = id {
            meta.insert(TRANSFORMATION_ID_KEY.to_string(), id);
        }

        Ok(meta)
    }

    /// Remembers a step created (or planned) in this run.
    pub fn record(&mut self, tag: &str, application: &str, id: &str) {
        debug!("Run cache: {}/{} -> {}", tag, application, id);
        self.cache
            .entry(tag.to_string())
            .or_default()
            .insert(application.to_string(), id.to_string());
    }

    pub fn recorded(&self, tag: &str, application: &str) -> Option<&str> {
        self.cache
            .get(tag)
            .and_then(|apps| apps.get(application))
            .map(String::as_str)
    }
}
