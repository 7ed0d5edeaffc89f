//! Tag Parameters
//!
//! Derives template parameters from production tags.
//!
//! - [`expander`]: Pattern matching and parameter collection
//! - [`converter`]: Restricted assignment language for rewriting parameters
//! - [`template`]: Placeholder rendering for `<application>-mode` options

pub mod converter;
pub mod expander;
pub mod template;

pub use converter::{ConvertError, Converter};
pub use expander::{expand, TagExpander, TagParams};
