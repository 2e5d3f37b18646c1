//! Batch mail-merge for DOCX templates.
//!
//! Reads tabular records from a spreadsheet (or CSV), substitutes named
//! placeholder tokens inside a DOCX template at run granularity (coloring
//! the rewritten runs, leaving all other formatting byte-identical), and
//! writes one output document per record, its filename derived from a
//! format pattern.
//!
//! This library provides:
//! - `tokens`: raw replace-item specs split into atomic token names
//! - `record`: cell values and per-row normalization (`N/A` sentinel)
//! - `document` / `engine`: the in-memory document model and the run-level
//!   substitution engine
//! - `naming`: output filename derivation
//! - `docx` / `sheet`: the file-format collaborators (DOCX container,
//!   xlsx/csv sources, data-entry scaffold)
//! - `batch`: the per-row driver tying it all together
//!
//! Binaries:
//! - `docx-merge`: scaffold the data workbook (`init`) and run a batch (`run`)

pub mod batch;
pub mod config;
pub mod document;
pub mod docx;
pub mod engine;
pub mod error;
pub mod naming;
pub mod record;
pub mod sheet;
pub mod tokens;

pub use batch::{
    run_batch, BatchOptions, BatchProgress, BatchReport, DocumentSaver, RecordSource, RowFailure,
    TemplateLoader,
};
pub use config::{HighlightColor, MergeConfig};
pub use error::MergeError;
