use std::collections::HashSet;

use crate::models::{ContentItem, ContentKey, UserRating};

/// Whether an item is restricted under the given safety flag.
///
/// Safety off short-circuits to `false`. With safety on, only a Movie whose
/// restricted flag is literally `Some(true)` counts: a missing flag is "not
/// restricted", and series are never restricted here (they go through a
/// separate external classification path).
pub fn is_restricted(item: &ContentItem, safety_enabled: bool) -> bool {
    if !safety_enabled {
        return false;
    }
    match item {
        ContentItem::Movie(m) => m.adult == Some(true),
        ContentItem::Series(_) => false,
    }
}

/// Latest rating record for a key. The external store enforces one active
/// rating per key, but a read taken mid-update may still contain a stale
/// record of the opposite kind; the last record wins.
pub fn latest_rating_for(records: &[UserRating], key: ContentKey) -> Option<&UserRating> {
    records.iter().rev().find(|r| r.key() == key)
}

/// The set of keys currently carrying a negative (disliked or hidden)
/// rating, resolving stale duplicates to the latest record per key.
pub fn negative_keys(records: &[UserRating]) -> HashSet<ContentKey> {
    let mut seen = HashSet::new();
    let mut negative = HashSet::new();
    for record in records.iter().rev() {
        if seen.insert(record.key()) && record.value.is_negative() {
            negative.insert(record.key());
        }
    }
    negative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, MovieItem, RatingValue, SeriesItem};

    fn movie(id: i64, adult: Option<bool>) -> ContentItem {
        ContentItem::Movie(MovieItem {
            id,
            title: format!("movie-{id}"),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult,
            release_date: None,
            overview: String::new(),
        })
    }

    fn series(id: i64) -> ContentItem {
        ContentItem::Series(SeriesItem {
            id,
            name: format!("series-{id}"),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            first_air_date: None,
            overview: String::new(),
        })
    }

    fn rating(id: i64, value: RatingValue) -> UserRating {
        UserRating {
            id,
            media_type: MediaType::Movie,
            value,
            item: None,
        }
    }

    #[test]
    fn safety_off_is_never_restricted() {
        assert!(!is_restricted(&movie(1, Some(true)), false));
    }

    #[test]
    fn only_an_explicit_true_flag_restricts() {
        assert!(is_restricted(&movie(1, Some(true)), true));
        assert!(!is_restricted(&movie(2, Some(false)), true));
        // missing flag degrades to "not restricted"
        assert!(!is_restricted(&movie(3, None), true));
    }

    #[test]
    fn series_are_never_restricted_by_this_flag() {
        assert!(!is_restricted(&series(1), true));
    }

    #[test]
    fn latest_record_wins_over_stale_opposite() {
        let records = vec![
            rating(7, RatingValue::Disliked),
            rating(7, RatingValue::Liked),
        ];
        let latest = latest_rating_for(&records, (MediaType::Movie, 7)).expect("record");
        assert_eq!(latest.value, RatingValue::Liked);
        assert!(!negative_keys(&records).contains(&(MediaType::Movie, 7)));
    }

    #[test]
    fn negative_keys_treats_hidden_as_disliked() {
        let records = vec![
            rating(1, RatingValue::Hidden),
            rating(2, RatingValue::Liked),
            rating(3, RatingValue::Disliked),
        ];
        let keys = negative_keys(&records);
        assert!(keys.contains(&(MediaType::Movie, 1)));
        assert!(!keys.contains(&(MediaType::Movie, 2)));
        assert!(keys.contains(&(MediaType::Movie, 3)));
    }
}
