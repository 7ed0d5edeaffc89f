//! Run Configuration
//!
//! Loading, merging and validating the INI configuration of a production
//! run.
//!
//! # Structure
//!
//! - [`ini`]: INI document reader
//! - [`resolver`]: Two-tier merge, defaults and typed options
//! - [`examples`]: Example payloads shown by `--example`

pub mod examples;
pub mod ini;
pub mod resolver;

pub use ini::IniDocument;
pub use resolver::{Config, MoveFlavor, OutputType, Overrides, TagErrorPolicy};
