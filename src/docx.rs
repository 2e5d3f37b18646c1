//! DOCX container collaborator: load templates into the document model and
//! splice mutated run text back into `word/document.xml`.
//!
//! A `.docx` is a zip archive; everything except the main document part is
//! carried through untouched, preserving entry order. The document part is
//! never round-tripped through a DOM: on load we record the byte span of
//! every run's text and color, and on save we splice the new content into
//! those spans in reverse offset order, so all formatting we did not touch
//! survives byte-for-byte.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::batch::{DocumentSaver, TemplateLoader};
use crate::document::{Paragraph, Run, Table, TableCell, TableRow, TemplateDocument};
use crate::error::MergeError;

/// Zip entry holding the main document part.
pub const DOCUMENT_ENTRY: &str = "word/document.xml";

// ─── Zip I/O ────────────────────────────────────────────────────────────────

/// Read a DOCX zip into an ordered list of (entry_name, bytes).
fn read_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>, MergeError> {
    let load_err = |e: &dyn std::fmt::Display| {
        MergeError::TemplateLoad(format!("{}: {}", path.display(), e))
    };
    let file = File::open(path).map_err(|e| load_err(&e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| load_err(&e))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| load_err(&e))?;
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(|e| load_err(&e))?;
        entries.push((name, data));
    }
    Ok(entries)
}

/// Write an ordered list of (entry_name, bytes) back to a DOCX zip.
/// STORED for media files and DEFLATED for everything else, matching the
/// typical DOCX layout that Word expects.
fn write_entries(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<(), MergeError> {
    let save_err = |e: &dyn std::fmt::Display| MergeError::Save {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let file = File::create(path).map_err(|e| save_err(&e))?;
    let mut zip = zip::ZipWriter::new(file);
    let deflated = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let stored =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        let opts = if name.starts_with("word/media/") {
            stored
        } else {
            deflated
        };
        zip.start_file(name.as_str(), opts).map_err(|e| save_err(&e))?;
        zip.write_all(data).map_err(|e| save_err(&e))?;
    }
    zip.finish().map_err(|e| save_err(&e))?;
    Ok(())
}

// ─── XML text escaping ──────────────────────────────────────────────────────

fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_xml_text(text: &str) -> String {
    // `&amp;` last, so already-unescaped entities are not unescaped twice.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ─── Document part scanning ─────────────────────────────────────────────────

lazy_static! {
    // Structural and run-level tags of interest. Longer names come before
    // their prefixes so leftmost-first alternation picks the right one.
    static ref TAG_RE: Regex =
        Regex::new(r"<(/?)w:(tbl|tr|tc|color|rPr|r|p|t)((?:\s[^>]*?)?)(/?)>").unwrap();
    static ref VAL_RE: Regex = Regex::new(r#"w:val="([^"]*)""#).unwrap();
}

/// Byte-range bookkeeping for one run, in the order the saver traverses the
/// model (body paragraphs, then tables row-major).
#[derive(Debug, Clone)]
pub(crate) struct RunSlot {
    /// Offset just past the run's opening tag; insertion point for a fresh
    /// `<w:rPr>` when the run has none.
    open_end: usize,
    /// Offset just inside an existing `<w:rPr>`.
    rpr_inner: Option<usize>,
    /// Span of an existing `<w:color .../>` element.
    color_span: Option<(usize, usize)>,
    /// Content span of each `<w:t>` in the run.
    text_spans: Vec<(usize, usize)>,
    original_text: String,
    original_color: Option<String>,
}

/// Retained load-time state that lets the saver splice edits back.
#[derive(Debug)]
pub(crate) struct DocxBacking {
    entries: Vec<(String, Vec<u8>)>,
    doc_xml: String,
    slots: Vec<RunSlot>,
}

#[derive(Default)]
struct RunAcc {
    open_end: usize,
    rpr_inner: Option<usize>,
    color_span: Option<(usize, usize)>,
    color_val: Option<String>,
    text_spans: Vec<(usize, usize)>,
    text: String,
    pending_text: Option<usize>,
}

impl RunAcc {
    fn finish(self) -> (Run, RunSlot) {
        let run = Run {
            text: self.text.clone(),
            color: self.color_val.clone(),
        };
        let slot = RunSlot {
            open_end: self.open_end,
            rpr_inner: self.rpr_inner,
            color_span: self.color_span,
            text_spans: self.text_spans,
            original_text: self.text,
            original_color: self.color_val,
        };
        (run, slot)
    }
}

type ParaAcc = (Paragraph, Vec<RunSlot>);

#[derive(Default)]
struct CellAcc {
    paras: Vec<ParaAcc>,
}

#[derive(Default)]
struct RowAcc {
    cells: Vec<CellAcc>,
}

#[derive(Default)]
struct TableAcc {
    rows: Vec<RowAcc>,
}

/// Scan the document part for body paragraphs and depth-one tables.
///
/// Paragraphs nested inside a table within a table cell are not modeled
/// (and therefore never substituted). Runs keep their byte spans so edits
/// can be spliced back.
fn parse_document_xml(xml: &str) -> (Vec<Paragraph>, Vec<Table>, Vec<RunSlot>) {
    let mut body: Vec<ParaAcc> = Vec::new();
    let mut tables: Vec<TableAcc> = Vec::new();

    let mut tbl_depth = 0usize;
    let mut para_depth = 0usize;
    let mut cur_para: Option<ParaAcc> = None;
    let mut cur_run: Option<RunAcc> = None;
    let mut in_rpr = false;

    let finish_para = |para: ParaAcc, tbl_depth: usize, body: &mut Vec<ParaAcc>, tables: &mut Vec<TableAcc>| {
        if tbl_depth == 0 {
            body.push(para);
        } else if tbl_depth == 1 {
            if let Some(cell) = tables
                .last_mut()
                .and_then(|t| t.rows.last_mut())
                .and_then(|r| r.cells.last_mut())
            {
                cell.paras.push(para);
            }
        }
    };

    for caps in TAG_RE.captures_iter(xml) {
        let whole = caps.get(0).expect("regex match");
        let closing = !caps[1].is_empty();
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let self_closing = !caps[4].is_empty();

        match (name, closing) {
            ("tbl", false) if !self_closing => {
                tbl_depth += 1;
                if tbl_depth == 1 {
                    tables.push(TableAcc::default());
                }
            }
            ("tbl", true) => {
                tbl_depth = tbl_depth.saturating_sub(1);
            }
            ("tr", false) if !self_closing => {
                if tbl_depth == 1 {
                    if let Some(table) = tables.last_mut() {
                        table.rows.push(RowAcc::default());
                    }
                }
            }
            ("tc", false) if !self_closing => {
                if tbl_depth == 1 {
                    if let Some(row) = tables.last_mut().and_then(|t| t.rows.last_mut()) {
                        row.cells.push(CellAcc::default());
                    }
                }
            }
            ("p", false) => {
                if self_closing {
                    // Empty paragraph.
                    if para_depth == 0 && tbl_depth <= 1 {
                        finish_para(
                            (Paragraph::default(), Vec::new()),
                            tbl_depth,
                            &mut body,
                            &mut tables,
                        );
                    }
                } else {
                    para_depth += 1;
                    if para_depth == 1 && tbl_depth <= 1 {
                        cur_para = Some((Paragraph::default(), Vec::new()));
                    }
                }
            }
            ("p", true) => {
                para_depth = para_depth.saturating_sub(1);
                if para_depth == 0 {
                    if let Some(para) = cur_para.take() {
                        finish_para(para, tbl_depth, &mut body, &mut tables);
                    }
                }
            }
            ("r", false) if !self_closing => {
                if para_depth == 1 && cur_para.is_some() && cur_run.is_none() {
                    cur_run = Some(RunAcc {
                        open_end: whole.end(),
                        ..RunAcc::default()
                    });
                }
            }
            ("r", true) => {
                in_rpr = false;
                if let (Some(run), Some(para)) = (cur_run.take(), cur_para.as_mut()) {
                    let (model_run, slot) = run.finish();
                    para.0.runs.push(model_run);
                    para.1.push(slot);
                }
            }
            ("rPr", false) if !self_closing => {
                if let Some(run) = cur_run.as_mut() {
                    in_rpr = true;
                    run.rpr_inner = Some(whole.end());
                }
            }
            ("rPr", true) => {
                in_rpr = false;
            }
            ("color", false) => {
                if in_rpr {
                    if let Some(run) = cur_run.as_mut() {
                        run.color_span = Some((whole.start(), whole.end()));
                        run.color_val = VAL_RE
                            .captures(&caps[3])
                            .map(|v| v[1].to_string());
                    }
                }
            }
            ("t", false) if !self_closing => {
                if let Some(run) = cur_run.as_mut() {
                    run.pending_text = Some(whole.end());
                }
            }
            ("t", true) => {
                if let Some(run) = cur_run.as_mut() {
                    if let Some(start) = run.pending_text.take() {
                        run.text_spans.push((start, whole.start()));
                        run.text.push_str(&unescape_xml_text(&xml[start..whole.start()]));
                    }
                }
            }
            _ => {}
        }
    }

    let mut slots = Vec::new();
    let mut model_body = Vec::new();
    for (para, para_slots) in body {
        model_body.push(para);
        slots.extend(para_slots);
    }
    let mut model_tables = Vec::new();
    for table in tables {
        let mut rows = Vec::new();
        for row in table.rows {
            let mut cells = Vec::new();
            for cell in row.cells {
                let mut paragraphs = Vec::new();
                for (para, para_slots) in cell.paras {
                    paragraphs.push(para);
                    slots.extend(para_slots);
                }
                cells.push(TableCell { paragraphs });
            }
            rows.push(TableRow { cells });
        }
        model_tables.push(Table { rows });
    }

    (model_body, model_tables, slots)
}

// ─── Splicing edits back ────────────────────────────────────────────────────

/// Rebuild the document part with each run's current text and color.
///
/// `runs` must be the model's runs in the canonical traversal order, one
/// per slot. Edits are applied in reverse offset order so earlier spans
/// stay valid.
fn splice_document_xml(xml: &str, slots: &[RunSlot], runs: &[&Run]) -> String {
    debug_assert_eq!(slots.len(), runs.len());

    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for (slot, run) in slots.iter().zip(runs.iter()) {
        if run.text != slot.original_text && !slot.text_spans.is_empty() {
            let (start, end) = slot.text_spans[0];
            edits.push((start, end, escape_xml_text(&run.text)));
            for &(start, end) in &slot.text_spans[1..] {
                edits.push((start, end, String::new()));
            }
        }
        if run.color != slot.original_color {
            // The engine only ever sets a color; a cleared one is left alone.
            if let Some(color) = &run.color {
                let elem = format!(r#"<w:color w:val="{}"/>"#, color);
                match (slot.color_span, slot.rpr_inner) {
                    (Some((start, end)), _) => edits.push((start, end, elem)),
                    (None, Some(pos)) => edits.push((pos, pos, elem)),
                    (None, None) => edits.push((
                        slot.open_end,
                        slot.open_end,
                        format!("<w:rPr>{}</w:rPr>", elem),
                    )),
                }
            }
        }
    }

    edits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut result = xml.to_string();
    for (start, end, replacement) in edits {
        result.replace_range(start..end, &replacement);
    }
    result
}

// ─── Collaborator implementations ───────────────────────────────────────────

/// Loads a fresh, independent document from the template path on every call.
pub struct DocxTemplateLoader {
    path: PathBuf,
}

impl DocxTemplateLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DocxTemplateLoader { path: path.into() }
    }
}

impl TemplateLoader for DocxTemplateLoader {
    fn load(&self) -> Result<TemplateDocument, MergeError> {
        let entries = read_entries(&self.path)?;
        let doc_xml = entries
            .iter()
            .find(|(name, _)| name == DOCUMENT_ENTRY)
            .map(|(_, data)| String::from_utf8_lossy(data).to_string())
            .ok_or_else(|| {
                MergeError::TemplateLoad(format!(
                    "{}: no {} entry",
                    self.path.display(),
                    DOCUMENT_ENTRY
                ))
            })?;
        let (body, tables, slots) = parse_document_xml(&doc_xml);
        log::debug!(
            "loaded template {} ({} body paragraphs, {} tables, {} runs)",
            self.path.display(),
            body.len(),
            tables.len(),
            slots.len()
        );
        Ok(TemplateDocument {
            body,
            tables,
            backing: Some(DocxBacking {
                entries,
                doc_xml,
                slots,
            }),
        })
    }
}

/// Persists a mutated document to a destination path, overwriting.
pub struct DocxSaver;

impl DocumentSaver for DocxSaver {
    fn save(&self, doc: &TemplateDocument, path: &Path) -> Result<(), MergeError> {
        let backing = doc.backing.as_ref().ok_or_else(|| MergeError::Save {
            path: path.to_path_buf(),
            reason: "document has no file backing".to_string(),
        })?;
        let runs: Vec<&Run> = doc.paragraphs().flat_map(|p| p.runs.iter()).collect();
        if runs.len() != backing.slots.len() {
            return Err(MergeError::Save {
                path: path.to_path_buf(),
                reason: "document structure diverged from its backing".to_string(),
            });
        }
        let new_xml = splice_document_xml(&backing.doc_xml, &backing.slots, &runs);
        let entries: Vec<(String, Vec<u8>)> = backing
            .entries
            .iter()
            .map(|(name, data)| {
                if name == DOCUMENT_ENTRY {
                    (name.clone(), new_xml.clone().into_bytes())
                } else {
                    (name.clone(), data.clone())
                }
            })
            .collect();
        write_entries(path, &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_DOC: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body>"#,
        r#"<w:p><w:pPr><w:rPr><w:color w:val="0000FF"/></w:rPr></w:pPr>"#,
        r#"<w:r><w:t xml:space="preserve">Hello </w:t></w:r>"#,
        r#"<w:r><w:rPr><w:b/></w:rPr><w:t>{NAME}</w:t></w:r>"#,
        r#"<w:r><w:rPr><w:color w:val="00FF00"/></w:rPr><w:t>!</w:t></w:r>"#,
        r#"</w:p>"#,
        r#"<w:tbl><w:tblPr/><w:tr><w:tc><w:tcPr/>"#,
        r#"<w:p><w:r><w:t>Dept: {DEPT}</w:t></w:r></w:p>"#,
        r#"</w:tc><w:tc><w:p><w:r><w:t>A &amp; B</w:t></w:r></w:p></w:tc>"#,
        r#"</w:tr></w:tbl>"#,
        r#"<w:p/>"#,
        r#"</w:body></w:document>"#,
    );

    #[test]
    fn parses_body_tables_and_runs() {
        let (body, tables, slots) = parse_document_xml(SIMPLE_DOC);
        assert_eq!(body.len(), 2); // the text paragraph and the empty <w:p/>
        assert_eq!(body[0].text(), "Hello {NAME}!");
        assert_eq!(body[0].runs.len(), 3);
        // The paragraph-mark color inside pPr must not leak onto the first run.
        assert_eq!(body[0].runs[0].color, None);
        assert_eq!(body[0].runs[2].color.as_deref(), Some("00FF00"));
        assert!(body[1].runs.is_empty());

        assert_eq!(tables.len(), 1);
        let cells = &tables[0].rows[0].cells;
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].paragraphs[0].text(), "Dept: {DEPT}");
        assert_eq!(cells[1].paragraphs[0].text(), "A & B");

        assert_eq!(slots.len(), 5);
    }

    #[test]
    fn splice_rewrites_text_and_colors() {
        let (body, tables, slots) = parse_document_xml(SIMPLE_DOC);
        let mut doc = TemplateDocument {
            body,
            tables,
            backing: None,
        };
        for para in doc.paragraphs_mut() {
            for run in &mut para.runs {
                if run.text.contains("{NAME}") {
                    run.text = run.text.replace("{NAME}", "Bob & Ann");
                    run.color = Some("FF0000".to_string());
                }
                if run.text.contains("{DEPT}") {
                    run.text = run.text.replace("{DEPT}", "R<D");
                    run.color = Some("FF0000".to_string());
                }
            }
        }
        let runs: Vec<&Run> = doc.paragraphs().flat_map(|p| p.runs.iter()).collect();
        let out = splice_document_xml(SIMPLE_DOC, &slots, &runs);

        assert!(out.contains("<w:t>Bob &amp; Ann</w:t>"));
        assert!(out.contains("<w:t>Dept: R&lt;D</w:t>"));
        // {NAME}'s run had an rPr without color: color inserted into it.
        assert!(out.contains(
            r#"<w:rPr><w:color w:val="FF0000"/><w:b/></w:rPr><w:t>Bob &amp; Ann</w:t>"#
        ));
        // The run without any rPr gained a fresh one.
        assert!(out.contains(r#"<w:r><w:rPr><w:color w:val="FF0000"/></w:rPr><w:t>Dept:"#));
        // Untouched runs keep their bytes.
        assert!(out.contains(r#"<w:t xml:space="preserve">Hello </w:t>"#));
        assert!(out.contains(r#"<w:color w:val="00FF00"/>"#));
        assert!(out.contains("<w:t>A &amp; B</w:t>"));
    }

    #[test]
    fn splice_replaces_an_existing_color_element() {
        let (body, tables, slots) = parse_document_xml(SIMPLE_DOC);
        let mut doc = TemplateDocument {
            body,
            tables,
            backing: None,
        };
        // Recolor the "!" run, which already carries 00FF00.
        doc.body[0].runs[2].color = Some("FF0000".to_string());
        let runs: Vec<&Run> = doc.paragraphs().flat_map(|p| p.runs.iter()).collect();
        let out = splice_document_xml(SIMPLE_DOC, &slots, &runs);
        assert!(!out.contains(r#"<w:color w:val="00FF00"/>"#));
        assert!(out.contains(r#"<w:rPr><w:color w:val="FF0000"/></w:rPr><w:t>!</w:t>"#));
        // The paragraph-mark color in pPr is untouched.
        assert!(out.contains(r#"<w:color w:val="0000FF"/>"#));
    }

    #[test]
    fn unchanged_document_splices_to_identical_bytes() {
        let (body, tables, slots) = parse_document_xml(SIMPLE_DOC);
        let doc = TemplateDocument {
            body,
            tables,
            backing: None,
        };
        let runs: Vec<&Run> = doc.paragraphs().flat_map(|p| p.runs.iter()).collect();
        assert_eq!(splice_document_xml(SIMPLE_DOC, &slots, &runs), SIMPLE_DOC);
    }

    #[test]
    fn nested_table_paragraphs_are_not_modeled() {
        let xml = concat!(
            r#"<w:body><w:tbl><w:tr><w:tc>"#,
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t>outer</w:t></w:r></w:p>"#,
            r#"</w:tc></w:tr></w:tbl></w:body>"#,
        );
        let (body, tables, slots) = parse_document_xml(xml);
        assert!(body.is_empty());
        assert_eq!(tables.len(), 1);
        let cell = &tables[0].rows[0].cells[0];
        assert_eq!(cell.paragraphs.len(), 1);
        assert_eq!(cell.paragraphs[0].text(), "outer");
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn escape_round_trip() {
        assert_eq!(escape_xml_text("a<b&c>d"), "a&lt;b&amp;c&gt;d");
        assert_eq!(unescape_xml_text("a&lt;b&amp;c&gt;d"), "a<b&c>d");
        assert_eq!(unescape_xml_text("&amp;lt;"), "&lt;");
    }
}
