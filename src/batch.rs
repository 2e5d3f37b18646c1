//! Batch driver: one output document per source row.
//!
//! Collaborators come in through trait seams so the driver owns nothing it
//! can hide: the record source, the template loader, and the saver are
//! passed in per call together with an explicit, immutable options value.
//! A single row's failure never aborts the batch; a source that cannot be
//! read or has no rows aborts before the first row is attempted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;

use crate::config::HighlightColor;
use crate::document::TemplateDocument;
use crate::engine::substitute_document;
use crate::error::MergeError;
use crate::naming::derive_filename;
use crate::record::{normalize_record, Record};

// ============================================================================
// Collaborator seams
// ============================================================================

/// Yields records in stable row order, plus the source's column names.
pub trait RecordSource {
    fn columns(&self) -> &[String];
    fn rows(&self) -> &[Record];
}

/// Produces a fresh, independent document copy on every call.
pub trait TemplateLoader {
    fn load(&self) -> Result<TemplateDocument, MergeError>;
}

/// Persists a document to a destination path, overwriting any existing file.
pub trait DocumentSaver {
    fn save(&self, doc: &TemplateDocument, path: &Path) -> Result<(), MergeError>;
}

// ============================================================================
// Options, progress, report
// ============================================================================

/// Everything one batch invocation needs, resolved up front.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Atomic token names, already split, in first-seen order.
    pub tokens: Vec<String>,
    /// Output filename format pattern.
    pub output_pattern: String,
    /// Directory output documents are written into.
    pub output_dir: PathBuf,
    /// Color applied to every rewritten run.
    pub color: HighlightColor,
    /// Worker count; `0` or `1` processes rows sequentially.
    pub jobs: usize,
}

/// Snapshot handed to the progress callback after each row.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    /// Rows attempted so far.
    pub completed: usize,
    /// Total rows in the source.
    pub total: usize,
    /// Rows failed so far.
    pub failed: usize,
}

/// One skipped row and why.
#[derive(Debug)]
pub struct RowFailure {
    /// Zero-based source row index (diagnostics print it one-based).
    pub row: usize,
    pub error: MergeError,
}

/// Outcome tally for a finished (or cancelled) batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Rows attempted (equals the source row count unless cancelled).
    pub attempted: usize,
    /// Output paths written, in source row order.
    pub outputs: Vec<PathBuf>,
    /// Skipped rows, in source row order.
    pub failures: Vec<RowFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Process every record in the source, in source row order.
///
/// Per record: normalize against the token list, load a fresh template
/// copy, substitute, derive the output filename, save. Any per-row failure
/// is logged (`row N: cause`), recorded in the report, and skipped.
///
/// `on_progress` fires after each row; returning `false` cancels the batch
/// cooperatively between rows. With `jobs > 1`, rows are processed on a
/// local worker pool (each task loads its own template copy) and
/// progress/diagnostics funnel through one aggregation point.
pub fn run_batch<L, S, F>(
    source: &dyn RecordSource,
    loader: &L,
    saver: &S,
    options: &BatchOptions,
    mut on_progress: F,
) -> Result<BatchReport, MergeError>
where
    L: TemplateLoader + Sync,
    S: DocumentSaver + Sync,
    F: FnMut(&BatchProgress) -> bool + Send,
{
    let rows = source.rows();
    if rows.is_empty() {
        return Err(MergeError::EmptySource);
    }
    let total = rows.len();

    let process_row = |record: &Record| -> Result<PathBuf, MergeError> {
        let values = normalize_record(record, &options.tokens)?;
        let mut doc = loader.load()?;
        let touched = substitute_document(&mut doc, &options.tokens, &values, options.color);
        log::debug!("rewrote {touched} runs");
        let filename = derive_filename(&options.output_pattern, &options.tokens, &values);
        let path = options.output_dir.join(filename);
        saver.save(&doc, &path)?;
        Ok(path)
    };

    let mut results: Vec<(usize, Result<PathBuf, MergeError>)> = if options.jobs > 1 {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("could not start {} workers ({e}); running sequentially", options.jobs);
                return run_sequential(rows, total, process_row, &mut on_progress);
            }
        };

        let cancelled = AtomicBool::new(false);
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let progress = Mutex::new(&mut on_progress);
        let collected: Mutex<Vec<(usize, Result<PathBuf, MergeError>)>> =
            Mutex::new(Vec::with_capacity(total));

        pool.install(|| {
            rows.par_iter().enumerate().for_each(|(row, record)| {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                let outcome = process_row(record);
                if outcome.is_err() {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                let keep_going = {
                    let mut callback = progress.lock().unwrap();
                    (*callback)(&BatchProgress {
                        completed: done,
                        total,
                        failed: failed.load(Ordering::Relaxed),
                    })
                };
                if !keep_going {
                    cancelled.store(true, Ordering::Relaxed);
                }
                collected.lock().unwrap().push((row, outcome));
            });
        });

        collected.into_inner().unwrap()
    } else {
        return run_sequential(rows, total, process_row, &mut on_progress);
    };

    results.sort_by_key(|(row, _)| *row);
    Ok(build_report(results))
}

fn run_sequential<F, P>(
    rows: &[Record],
    total: usize,
    process_row: P,
    on_progress: &mut F,
) -> Result<BatchReport, MergeError>
where
    P: Fn(&Record) -> Result<PathBuf, MergeError>,
    F: FnMut(&BatchProgress) -> bool,
{
    let mut results = Vec::with_capacity(total);
    let mut failed = 0usize;
    for (row, record) in rows.iter().enumerate() {
        let outcome = process_row(record);
        if outcome.is_err() {
            failed += 1;
        }
        results.push((row, outcome));
        let keep_going = on_progress(&BatchProgress {
            completed: results.len(),
            total,
            failed,
        });
        if !keep_going {
            log::warn!("batch cancelled after row {}", row + 1);
            break;
        }
    }
    Ok(build_report(results))
}

fn build_report(results: Vec<(usize, Result<PathBuf, MergeError>)>) -> BatchReport {
    let mut report = BatchReport {
        attempted: results.len(),
        ..BatchReport::default()
    };

    let mut by_path: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (row, outcome) in results {
        match outcome {
            Ok(path) => {
                by_path.entry(path.clone()).or_default().push(row);
                report.outputs.push(path);
            }
            Err(error) => {
                log::warn!("row {}: {}", row + 1, error);
                report.failures.push(RowFailure { row, error });
            }
        }
    }

    for (path, rows) in &by_path {
        if rows.len() > 1 {
            let rows: Vec<String> = rows.iter().map(|r| (r + 1).to_string()).collect();
            log::warn!(
                "rows {} derived the same output file {} (last write wins)",
                rows.join(", "),
                path.display()
            );
        }
    }

    report
}
