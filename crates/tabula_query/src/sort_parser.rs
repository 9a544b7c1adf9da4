//! Parser for the `sort` request parameter.

use tabula_core::{SortDirection, SortEntry};
use tracing::debug;

/// Parses sort parameters into an ordered entry list.
///
/// Each item may hold several comma separated field references. A leading
/// `-` sorts descending, a leading `+` or nothing ascending. Empty pieces are
/// skipped. Whether a field exists is decided later, during resolution.
pub fn parse_sort<S: AsRef<str>>(items: &[S]) -> Vec<SortEntry> {
    let mut entries = Vec::new();
    for piece in items.iter().flat_map(|item| item.as_ref().split(',')) {
        let piece = piece.trim();
        let (direction, field) = if let Some(rest) = piece.strip_prefix('-') {
            (SortDirection::Desc, rest.trim())
        } else if let Some(rest) = piece.strip_prefix('+') {
            (SortDirection::Asc, rest.trim())
        } else {
            (SortDirection::Asc, piece)
        };
        if field.is_empty() {
            if !piece.is_empty() {
                debug!(piece, "Skipping sort entry without field");
            }
            continue;
        }
        entries.push(SortEntry {
            field: field.to_string(),
            direction,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sets_direction() {
        let entries = parse_sort(&["-Population", "+Name", "Capital"]);
        assert_eq!(
            entries,
            vec![
                SortEntry::desc("Population"),
                SortEntry::asc("Name"),
                SortEntry::asc("Capital"),
            ]
        );
    }

    #[test]
    fn comma_separated_items_expand_in_order() {
        let entries = parse_sort(&["-A, B", "C"]);
        assert_eq!(
            entries,
            vec![SortEntry::desc("A"), SortEntry::asc("B"), SortEntry::asc("C")]
        );
    }

    #[test]
    fn empty_pieces_are_skipped() {
        let entries = parse_sort(&["", " , -", "Name,,"]);
        assert_eq!(entries, vec![SortEntry::asc("Name")]);
    }
}
