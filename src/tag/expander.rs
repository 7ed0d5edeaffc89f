//! Tag Expansion
//!
//! Turns a tag such as `e+_1.398MeV` into parameters for mode templates:
//! 1. Match the configured pattern (case-insensitive, anchored at the start)
//! 2. Collect every group positionally and named groups by name
//! 3. Run the optional converter program over both collections

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::converter::Converter;
use super::template;
use crate::error::{ConfigError, ProdError};

/// Parameters derived from one tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagParams {
    pub positional: Vec<String>,
    pub named: BTreeMap<String, String>,
}

impl TagParams {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Renders a mode template with these parameters.
    pub fn render(&self, template: &str) -> String {
        template::render(template, &self.positional, &self.named)
    }
}

impl fmt::Display for TagParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.positional, self.named)
    }
}

/// Compiled tag pattern and converter, built once per run.
#[derive(Debug, Clone, Default)]
pub struct TagExpander {
    pattern: Option<Regex>,
    converter: Option<Converter>,
}

impl TagExpander {
    /// Compiles the pattern and parses the converter.
    ///
    /// Empty strings disable the respective stage. Invalid input is a
    /// configuration error so that it surfaces before any planning.
    pub fn new(pattern: &str, converter: &str) -> Result<Self, ConfigError> {
        let pattern = if pattern.trim().is_empty() {
            None
        } else {
            let regex = RegexBuilder::new(&format!("^(?:{})", pattern))
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "tagParser".to_string(),
                    value: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Some(regex)
        };

        let converter = if converter.trim().is_empty() {
            None
        } else {
            let program = Converter::parse(converter).map_err(|e| ConfigError::InvalidValue {
                key: "tagParamConverter".to_string(),
                value: converter.to_string(),
                reason: e.to_string(),
            })?;
            debug!("Tag converter with {} statement(s)", program.len());
            Some(program)
        };

        Ok(Self { pattern, converter })
    }

    /// Expands a tag into its parameters.
    ///
    /// A missing pattern or a tag that does not match yields empty
    /// parameters. Only a failing converter is an error.
    pub fn expand(&self, tag: &str) -> Result<TagParams, ProdError> {
        let mut params = self.parse(tag);

        if let Some(converter) = &self.converter {
            converter
                .apply(&mut params.positional, &mut params.named)
                .map_err(|e| ProdError::TagConversion {
                    tag: tag.to_string(),
                    message: e.to_string(),
                })?;
            debug!("Converted params for tag '{}': {}", tag, params);
        }

        Ok(params)
    }

    fn parse(&self, tag: &str) -> TagParams {
        let Some(regex) = &self.pattern else {
            return TagParams::default();
        };

        let Some(captures) = regex.captures(tag) else {
            debug!("Tag '{}' does not match pattern '{}'", tag, regex.as_str());
            return TagParams::default();
        };

        let positional = captures
            .iter()
            .skip(1)
            .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();

        let named = regex
            .capture_names()
            .flatten()
            .map(|name| {
                let value = captures
                    .name(name)
                    .map_or_else(String::new, |m| m.as_str().to_string());
                (name.to_string(), value)
            })
            .collect();

        TagParams { positional, named }
    }
}

/// One-shot expansion for callers without a prepared [`TagExpander`].
pub fn expand(tag: &str, pattern: &str, converter: &str) -> Result<TagParams, ProdError> {
    TagExpander::new(pattern, converter)?.expand(tag)
}
