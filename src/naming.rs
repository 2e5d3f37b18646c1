//! Output filename derivation.

use crate::record::NormalizedRecord;

/// Canonical extension for output documents.
pub const OUTPUT_EXTENSION: &str = ".docx";

/// Derive an output filename from a format pattern and one record's values.
///
/// Tokens are processed in atomic-token-list order, each replacing every
/// literal occurrence of its name left to right across the pattern. Spans
/// produced by an earlier token's replacement are protected: a later
/// token's name occurring only inside an already-substituted value is not
/// replaced again. A pattern containing no known tokens passes through
/// unchanged apart from extension enforcement.
pub fn derive_filename(pattern: &str, tokens: &[String], values: &NormalizedRecord) -> String {
    let mut name: Vec<char> = pattern.chars().collect();
    // Protected char spans (start, end) in `name`, kept sorted by start.
    let mut protected: Vec<(usize, usize)> = Vec::new();

    for token in tokens {
        let Some(value) = values.get(token) else {
            continue;
        };
        let needle: Vec<char> = token.chars().collect();
        if needle.is_empty() {
            continue;
        }
        let replacement: Vec<char> = value.chars().collect();

        let mut pos = 0;
        while pos + needle.len() <= name.len() {
            let overlaps_protected = protected
                .iter()
                .any(|&(s, e)| pos < e && pos + needle.len() > s);
            if !overlaps_protected && name[pos..pos + needle.len()] == needle[..] {
                let delta = replacement.len() as isize - needle.len() as isize;
                name.splice(pos..pos + needle.len(), replacement.iter().copied());
                for span in &mut protected {
                    if span.0 >= pos + needle.len() {
                        span.0 = (span.0 as isize + delta) as usize;
                        span.1 = (span.1 as isize + delta) as usize;
                    }
                }
                protected.push((pos, pos + replacement.len()));
                pos += replacement.len();
            } else {
                pos += 1;
            }
        }
    }

    ensure_output_extension(name.into_iter().collect())
}

/// Append the canonical extension unless the name already ends with it
/// (case-insensitive check; existing casing is left alone).
pub fn ensure_output_extension(mut name: String) -> String {
    if !name.to_lowercase().ends_with(OUTPUT_EXTENSION) {
        name.push_str(OUTPUT_EXTENSION);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn substitutes_all_tokens() {
        let name = derive_filename(
            "Report_{NAME}_{DATE}.docx",
            &tokens(&["{NAME}", "{DATE}"]),
            &values(&[("{NAME}", "Alice"), ("{DATE}", "2024-01-01")]),
        );
        assert_eq!(name, "Report_Alice_2024-01-01.docx");
    }

    #[test]
    fn appends_extension_when_missing() {
        let name = derive_filename(
            "Report_{NAME}",
            &tokens(&["{NAME}"]),
            &values(&[("{NAME}", "Alice")]),
        );
        assert_eq!(name, "Report_Alice.docx");
    }

    #[test]
    fn uppercase_extension_is_kept_as_is() {
        assert_eq!(ensure_output_extension("Report.DOCX".into()), "Report.DOCX");
    }

    #[test]
    fn pattern_without_tokens_passes_through() {
        let name = derive_filename("static-name", &tokens(&["{NAME}"]), &values(&[]));
        assert_eq!(name, "static-name.docx");
    }

    #[test]
    fn replacement_values_are_not_re_substituted() {
        // {NAME}'s value contains {DATE}; the later token must only match
        // the pattern's own {DATE}, not the one inside the substituted value.
        let name = derive_filename(
            "{NAME}_{DATE}",
            &tokens(&["{NAME}", "{DATE}"]),
            &values(&[("{NAME}", "A{DATE}B"), ("{DATE}", "2024")]),
        );
        assert_eq!(name, "A{DATE}B_2024.docx");
    }

    #[test]
    fn duplicate_tokens_are_harmless() {
        let name = derive_filename(
            "{N}_{N}",
            &tokens(&["{N}", "{N}"]),
            &values(&[("{N}", "x")]),
        );
        assert_eq!(name, "x_x.docx");
    }
}
