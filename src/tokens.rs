//! Normalization of raw replace-item specs into atomic token names.
//!
//! A raw item is either a single token name or several names joined by a
//! delimiter (full-width `；` by default, the separator Chinese-locale data
//! entry typically produces). Splitting happens exactly once, right after
//! acquisition; everything downstream works on the flat list.

/// Default separator between token names inside one raw replace item.
pub const DEFAULT_DELIMITER: char = '；';

/// Split raw replace items into atomic token names.
///
/// Every output element is non-empty and trimmed. First-seen order is kept,
/// and so are duplicates: substitution is idempotent per unique token, so
/// deduplicating here would only make behavior harder to predict.
pub fn split_replace_items<S: AsRef<str>>(items: &[S], delimiter: char) -> Vec<String> {
    items
        .iter()
        .flat_map(|raw| raw.as_ref().split(delimiter))
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_delimited_item_into_atomic_tokens() {
        let items = ["姓名；部门".to_string()];
        assert_eq!(split_replace_items(&items, '；'), vec!["姓名", "部门"]);
    }

    #[test]
    fn keeps_plain_items_and_order() {
        let items = ["NAME", " DATE ", "DEPT；ROLE"];
        assert_eq!(
            split_replace_items(&items, '；'),
            vec!["NAME", "DATE", "DEPT", "ROLE"]
        );
    }

    #[test]
    fn drops_empty_pieces() {
        let items = ["；A；；B；", "   ", ""];
        assert_eq!(split_replace_items(&items, '；'), vec!["A", "B"]);
    }

    #[test]
    fn keeps_duplicates() {
        let items = ["A；B", "A"];
        assert_eq!(split_replace_items(&items, '；'), vec!["A", "B", "A"]);
    }

    #[test]
    fn delimiter_is_configurable() {
        let items = ["x,y , z"];
        assert_eq!(split_replace_items(&items, ','), vec!["x", "y", "z"]);
    }
}
