use std::collections::HashSet;

use crate::models::ContentItem;

/// Case- and whitespace-insensitive identity key for a title+year pair.
///
/// Used both for duplicate suppression in filtering and for merging
/// suggested follow-up results, so the two call sites cannot drift. The
/// year stays a literal string to tolerate partial dates.
pub fn normalize_key(title: &str, year: &str) -> String {
    format!("{}::{}", title.trim().to_lowercase(), year.trim())
}

pub fn item_key(item: &ContentItem) -> String {
    normalize_key(item.title(), item.year().unwrap_or(""))
}

/// Appends every incoming item whose normalized title+year key is absent
/// from `existing`, preserving incoming order among survivors. This is
/// deliberately not id-based: the same title suggested twice may resolve
/// to different provider ids.
pub fn merge_unique(existing: Vec<ContentItem>, incoming: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen: HashSet<String> = existing.iter().map(item_key).collect();
    let mut merged = existing;
    for item in incoming {
        if seen.insert(item_key(&item)) {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieItem;

    fn movie(id: i64, title: &str, date: &str) -> ContentItem {
        ContentItem::Movie(MovieItem {
            id,
            title: title.to_string(),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult: None,
            release_date: Some(date.to_string()),
            overview: String::new(),
        })
    }

    #[test]
    fn key_is_case_and_whitespace_insensitive() {
        assert_eq!(
            normalize_key("The Matrix", "1999"),
            normalize_key("  the matrix  ", "1999")
        );
    }

    #[test]
    fn merge_suppresses_case_variant_duplicates() {
        let existing = vec![movie(1, "dune", "2021-10-22")];
        let incoming = vec![movie(2, "Dune", "2021-09-15")];
        let merged = merge_unique(existing.clone(), incoming);
        assert_eq!(merged, existing);
    }

    #[test]
    fn remakes_with_different_years_are_both_kept() {
        let existing = vec![movie(1, "Dune", "1984-12-14")];
        let merged = merge_unique(existing, vec![movie(2, "Dune", "2021-10-22")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn incoming_order_is_preserved_among_survivors() {
        let existing = vec![movie(1, "A", "2000-01-01")];
        let incoming = vec![
            movie(2, "B", "2001-01-01"),
            movie(3, "a", "2000-06-01"), // duplicate of A by title+year
            movie(4, "C", "2002-01-01"),
        ];
        let merged = merge_unique(existing, incoming);
        let titles: Vec<_> = merged.iter().map(|i| i.title()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn duplicate_keys_within_one_incoming_batch_collapse() {
        let merged = merge_unique(
            Vec::new(),
            vec![movie(1, "X", "2020-01-01"), movie(2, " x ", "2020-02-02")],
        );
        assert_eq!(merged.len(), 1);
    }
}
