//! Toolbox error types.
//!
//! The planning pipeline itself never fails; these cover the inputs it is
//! built from (user context and taxonomy).

use thiserror::Error;

/// Errors that can occur while preparing a planning request.
#[derive(Debug, Error)]
pub enum ToolboxError {
    /// The object to make was empty after sanitization.
    #[error("object to make is empty")]
    EmptyObject,

    /// Two taxonomy entries share a name.
    #[error("duplicate tool in taxonomy: '{name}'")]
    DuplicateTool { name: String },

    /// A taxonomy entry has a blank name.
    #[error("tool #{position} has an empty name")]
    EmptyToolName { position: usize },

    /// A taxonomy must contain at least one tool.
    #[error("taxonomy contains no tools")]
    EmptyTaxonomy,

    /// Taxonomy file could not be read or parsed.
    #[error("failed to load taxonomy from {path}: {reason}")]
    TaxonomyLoad { path: String, reason: String },
}
