//! Run-level placeholder substitution.

use crate::config::HighlightColor;
use crate::document::{Paragraph, TemplateDocument};
use crate::record::NormalizedRecord;

/// Replace every atomic token in the document with its normalized value.
///
/// Walks every paragraph reachable from the document (body, then each table
/// cell). For each token in list order: if the token occurs anywhere in the
/// paragraph's concatenated text, every run whose own text contains the
/// token is rewritten (all occurrences replaced) and recolored. Runs that
/// do not individually contain the full token are left untouched: a token
/// broken across run boundaries by the template's own formatting is not
/// found. Merging runs to fix that would discard formatting of the
/// unaffected portions, so the run-granularity behavior is kept.
///
/// Tokens absent from the document are silently skipped. Returns the number
/// of runs rewritten.
pub fn substitute_document(
    doc: &mut TemplateDocument,
    tokens: &[String],
    values: &NormalizedRecord,
    color: HighlightColor,
) -> usize {
    let mut touched = 0;
    for para in doc.paragraphs_mut() {
        touched += substitute_paragraph(para, tokens, values, color);
    }
    touched
}

fn substitute_paragraph(
    para: &mut Paragraph,
    tokens: &[String],
    values: &NormalizedRecord,
    color: HighlightColor,
) -> usize {
    let mut touched = 0;
    for token in tokens {
        let Some(value) = values.get(token) else {
            continue;
        };
        if !para.text().contains(token.as_str()) {
            continue;
        }
        for run in &mut para.runs {
            if run.text.contains(token.as_str()) {
                run.text = run.text.replace(token.as_str(), value);
                run.color = Some(color.hex().to_string());
                touched += 1;
            }
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Run, Table, TableCell, TableRow};
    use std::collections::HashMap;

    fn values(pairs: &[(&str, &str)]) -> NormalizedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrites_only_the_run_containing_the_token() {
        let mut doc = TemplateDocument::new(
            vec![Paragraph::new(vec![
                Run::new("Hello "),
                Run::new("{NAME}"),
                Run::new("!"),
            ])],
            vec![],
        );
        let n = substitute_document(
            &mut doc,
            &tokens(&["{NAME}"]),
            &values(&[("{NAME}", "Bob")]),
            HighlightColor::Red,
        );
        assert_eq!(n, 1);
        let runs = &doc.body[0].runs;
        assert_eq!(runs[0], Run::new("Hello "));
        assert_eq!(runs[1].text, "Bob");
        assert_eq!(runs[1].color.as_deref(), Some("FF0000"));
        assert_eq!(runs[2], Run::new("!"));
    }

    #[test]
    fn token_split_across_runs_is_not_replaced() {
        let mut doc = TemplateDocument::new(
            vec![Paragraph::new(vec![Run::new("{NA"), Run::new("ME}")])],
            vec![],
        );
        let n = substitute_document(
            &mut doc,
            &tokens(&["{NAME}"]),
            &values(&[("{NAME}", "Bob")]),
            HighlightColor::Red,
        );
        assert_eq!(n, 0);
        assert_eq!(doc.body[0].text(), "{NAME}");
        assert!(doc.body[0].runs.iter().all(|r| r.color.is_none()));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut doc = TemplateDocument::new(
            vec![Paragraph::new(vec![Run::new("Dear {NAME}")])],
            vec![],
        );
        let toks = tokens(&["{NAME}"]);
        let vals = values(&[("{NAME}", "Bob")]);
        assert_eq!(
            substitute_document(&mut doc, &toks, &vals, HighlightColor::Red),
            1
        );
        let snapshot = doc.body.clone();
        assert_eq!(
            substitute_document(&mut doc, &toks, &vals, HighlightColor::Red),
            0
        );
        assert_eq!(doc.body, snapshot);
    }

    #[test]
    fn substitutes_inside_table_cells() {
        let mut doc = TemplateDocument::new(
            vec![],
            vec![Table {
                rows: vec![TableRow {
                    cells: vec![
                        TableCell {
                            paragraphs: vec![Paragraph::new(vec![Run::new("{DEPT}")])],
                        },
                        TableCell {
                            paragraphs: vec![Paragraph::new(vec![Run::new("fixed")])],
                        },
                    ],
                }],
            }],
        );
        substitute_document(
            &mut doc,
            &tokens(&["{DEPT}"]),
            &values(&[("{DEPT}", "Sales")]),
            HighlightColor::Black,
        );
        let cells = &doc.tables[0].rows[0].cells;
        assert_eq!(cells[0].paragraphs[0].text(), "Sales");
        assert_eq!(
            cells[0].paragraphs[0].runs[0].color.as_deref(),
            Some("000000")
        );
        assert_eq!(cells[1].paragraphs[0].runs[0].color, None);
    }

    #[test]
    fn one_run_can_take_multiple_tokens() {
        let mut doc = TemplateDocument::new(
            vec![Paragraph::new(vec![Run::new("{A} and {B}")])],
            vec![],
        );
        substitute_document(
            &mut doc,
            &tokens(&["{A}", "{B}"]),
            &values(&[("{A}", "x"), ("{B}", "y")]),
            HighlightColor::Red,
        );
        assert_eq!(doc.body[0].text(), "x and y");
    }

    #[test]
    fn absent_token_is_silent() {
        let mut doc =
            TemplateDocument::new(vec![Paragraph::new(vec![Run::new("no tokens here")])], vec![]);
        let n = substitute_document(
            &mut doc,
            &tokens(&["{NAME}"]),
            &values(&[("{NAME}", "Bob")]),
            HighlightColor::Red,
        );
        assert_eq!(n, 0);
    }
}
