//! In-memory model of a template document.
//!
//! A document is an ordered sequence of body paragraphs plus an ordered
//! sequence of tables (rows of cells, each cell holding paragraphs). A
//! paragraph's visible text is the concatenation of its runs' texts; a run
//! is the smallest unit that carries its own formatting. Substitution only
//! ever rewrites run text and color. It never adds, removes, or reorders
//! runs, which is what lets a file-backed document splice its edits back
//! into the original XML on save.

use crate::docx::DocxBacking;

/// Smallest text-bearing unit with its own formatting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    pub text: String,
    /// Foreground color as an RRGGBB hex string, when explicitly set.
    pub color: Option<String>,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Run {
            text: text.into(),
            color: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Paragraph { runs }
    }

    /// The paragraph's visible text: its runs' texts concatenated in order.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

/// A mutable in-memory template document.
///
/// Loaded fresh from the template file for every record; never shared or
/// reused across records. When loaded from a `.docx` it carries an opaque
/// backing that the saver uses to write the mutated text back.
#[derive(Debug, Default)]
pub struct TemplateDocument {
    pub body: Vec<Paragraph>,
    pub tables: Vec<Table>,
    pub(crate) backing: Option<DocxBacking>,
}

impl TemplateDocument {
    /// A free-standing document with no file backing (used by tests and by
    /// callers that only need the substitution engine).
    pub fn new(body: Vec<Paragraph>, tables: Vec<Table>) -> Self {
        TemplateDocument {
            body,
            tables,
            backing: None,
        }
    }

    /// Every paragraph reachable from the document, body first, then each
    /// table's cells in row-major order. This traversal order is part of
    /// the saver's contract with the loader and must stay stable.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().chain(
            self.tables
                .iter()
                .flat_map(|t| t.rows.iter())
                .flat_map(|r| r.cells.iter())
                .flat_map(|c| c.paragraphs.iter()),
        )
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.body.iter_mut().chain(
            self.tables
                .iter_mut()
                .flat_map(|t| t.rows.iter_mut())
                .flat_map(|r| r.cells.iter_mut())
                .flat_map(|c| c.paragraphs.iter_mut()),
        )
    }
}
