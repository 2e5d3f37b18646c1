//! Error taxonomy for the merge library.
//!
//! Per-row failures (`MissingColumn`, `TemplateLoad`, `Save`) are caught at
//! the batch driver and turn into a logged skip; `SourceRead` and
//! `EmptySource` abort the batch before any row is attempted.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    /// A required token has no matching column in the current data row.
    #[error("data row has no column named {0:?}")]
    MissingColumn(String),

    /// The template collaborator could not produce a document copy.
    #[error("failed to load template: {0}")]
    TemplateLoad(String),

    /// The saver collaborator could not persist the output document.
    #[error("failed to save {path}: {reason}")]
    Save { path: PathBuf, reason: String },

    /// The tabular source could not be read at all.
    #[error("failed to read data source: {0}")]
    SourceRead(String),

    /// The tabular source was readable but yielded zero records.
    #[error("data source has no rows")]
    EmptySource,
}
