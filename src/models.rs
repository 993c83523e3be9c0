use serde::{Deserialize, Serialize};

/// A catalog entry as returned by the upstream provider. Movies and series
/// live in separate id namespaces, so a movie id 5 and a series id 5 are
/// distinct entities; anything keyed by id must go through [`ContentItem::key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "media_type")]
pub enum ContentItem {
    #[serde(rename = "movie")]
    Movie(MovieItem),
    #[serde(rename = "tv")]
    Series(SeriesItem),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    /// Restricted-content flag. Only movies carry it; a missing flag means
    /// "not restricted".
    #[serde(default)]
    pub adult: Option<bool>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub overview: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Series,
}

/// Media-type qualified identifier. The only safe way to compare items
/// across the movie and series namespaces.
pub type ContentKey = (MediaType, i64);

impl ContentItem {
    pub fn id(&self) -> i64 {
        match self {
            ContentItem::Movie(m) => m.id,
            ContentItem::Series(s) => s.id,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            ContentItem::Movie(_) => MediaType::Movie,
            ContentItem::Series(_) => MediaType::Series,
        }
    }

    pub fn key(&self) -> ContentKey {
        (self.media_type(), self.id())
    }

    /// Display title. Movies store it under `title`, series under `name`;
    /// callers must never assume a single field name.
    pub fn title(&self) -> &str {
        match self {
            ContentItem::Movie(m) => &m.title,
            ContentItem::Series(s) => &s.name,
        }
    }

    pub fn release_date(&self) -> Option<&str> {
        match self {
            ContentItem::Movie(m) => m.release_date.as_deref(),
            ContentItem::Series(s) => s.first_air_date.as_deref(),
        }
    }

    /// Literal year portion of the release date, kept as a string to
    /// tolerate partial dates.
    pub fn year(&self) -> Option<&str> {
        self.release_date()
            .and_then(|d| d.split('-').next())
            .filter(|y| !y.is_empty())
    }

    pub fn popularity(&self) -> f64 {
        match self {
            ContentItem::Movie(m) => m.popularity,
            ContentItem::Series(s) => s.popularity,
        }
    }

    /// 0–10 scale; 0 means the provider has no rating data.
    pub fn vote_average(&self) -> f64 {
        match self {
            ContentItem::Movie(m) => m.vote_average,
            ContentItem::Series(s) => s.vote_average,
        }
    }

    pub fn vote_count(&self) -> u64 {
        match self {
            ContentItem::Movie(m) => m.vote_count,
            ContentItem::Series(s) => s.vote_count,
        }
    }

    pub fn overview(&self) -> &str {
        match self {
            ContentItem::Movie(m) => &m.overview,
            ContentItem::Series(s) => &s.overview,
        }
    }
}

/// A user's verdict on one content item, as stored by the external
/// user-data store. `Hidden` behaves exactly like `Disliked` for
/// filtering; the store enforces at most one active rating per key, but
/// transitional reads may still carry stale duplicates (see
/// [`crate::classify::latest_rating_for`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRating {
    pub id: i64,
    pub media_type: MediaType,
    pub value: RatingValue,
    /// Full item embedded for display without refetching.
    #[serde(default)]
    pub item: Option<ContentItem>,
}

impl UserRating {
    pub fn key(&self) -> ContentKey {
        (self.media_type, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingValue {
    Liked,
    Disliked,
    Hidden,
}

impl RatingValue {
    /// Disliked and Hidden both suppress an item from result surfaces.
    pub fn is_negative(&self) -> bool {
        matches!(self, RatingValue::Disliked | RatingValue::Hidden)
    }
}

/// Client-side search filters. Every field defaults to "all". The upstream
/// search endpoint does not honor them; they are applied after the fetch,
/// and an active spec forces full-result aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub content_type: ContentTypeFilter,
    pub rating: RatingFilter,
    pub year: YearFilter,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeFilter {
    #[default]
    All,
    Movie,
    Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RatingFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "7_plus")]
    SevenPlus,
    #[serde(rename = "8_plus")]
    EightPlus,
    #[serde(rename = "9_plus")]
    NinePlus,
}

impl RatingFilter {
    fn threshold(&self) -> Option<f64> {
        match self {
            RatingFilter::All => None,
            RatingFilter::SevenPlus => Some(7.0),
            RatingFilter::EightPlus => Some(8.0),
            RatingFilter::NinePlus => Some(9.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YearFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "2020s")]
    From2020s,
    #[serde(rename = "2010s")]
    From2010s,
    #[serde(rename = "2000s")]
    From2000s,
    #[serde(rename = "1990s")]
    From1990s,
    #[serde(rename = "older")]
    Older,
}

impl YearFilter {
    fn contains(&self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::From2020s => year >= 2020,
            YearFilter::From2010s => (2010..2020).contains(&year),
            YearFilter::From2000s => (2000..2010).contains(&year),
            YearFilter::From1990s => (1990..2000).contains(&year),
            YearFilter::Older => year < 1990,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Relevance,
    Popularity,
    Rating,
    Newest,
}

impl FilterSpec {
    /// True when any field differs from its default. Drives the
    /// fetch-all-pages path in the aggregator.
    pub fn is_active(&self) -> bool {
        *self != FilterSpec::default()
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        let type_ok = match self.content_type {
            ContentTypeFilter::All => true,
            ContentTypeFilter::Movie => item.media_type() == MediaType::Movie,
            ContentTypeFilter::Series => item.media_type() == MediaType::Series,
        };
        if !type_ok {
            return false;
        }
        if let Some(min) = self.rating.threshold() {
            if item.vote_average() < min {
                return false;
            }
        }
        if self.year != YearFilter::All {
            match item.year().and_then(|y| y.parse::<i32>().ok()) {
                Some(y) if self.year.contains(y) => {}
                _ => return false,
            }
        }
        true
    }

    /// Sorts in place. `Relevance` keeps the provider's order untouched;
    /// the others are stable, so ties keep their relative order.
    pub fn sort_items(&self, items: &mut [ContentItem]) {
        use std::cmp::Ordering;
        match self.sort {
            SortOrder::Relevance => {}
            SortOrder::Popularity => items.sort_by(|a, b| {
                b.popularity()
                    .partial_cmp(&a.popularity())
                    .unwrap_or(Ordering::Equal)
            }),
            SortOrder::Rating => items.sort_by(|a, b| {
                b.vote_average()
                    .partial_cmp(&a.vote_average())
                    .unwrap_or(Ordering::Equal)
            }),
            // ISO dates compare correctly as strings; undated items sink.
            SortOrder::Newest => items.sort_by(|a, b| b.release_date().cmp(&a.release_date())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie(id: i64, title: &str, date: Option<&str>) -> ContentItem {
        ContentItem::Movie(MovieItem {
            id,
            title: title.to_string(),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult: None,
            release_date: date.map(|d| d.to_string()),
            overview: String::new(),
        })
    }

    #[test]
    fn title_resolves_per_variant() {
        let m = movie(1, "Dune", None);
        let s = ContentItem::Series(SeriesItem {
            id: 1,
            name: "Severance".to_string(),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            first_air_date: None,
            overview: String::new(),
        });
        assert_eq!(m.title(), "Dune");
        assert_eq!(s.title(), "Severance");
    }

    #[test]
    fn same_numeric_id_in_both_namespaces_yields_distinct_keys() {
        let m = movie(5, "A", None);
        let s: ContentItem = serde_json::from_value(json!({
            "media_type": "tv", "id": 5, "name": "B"
        }))
        .expect("series deserialize");
        assert_ne!(m.key(), s.key());
    }

    #[test]
    fn year_is_the_literal_date_prefix() {
        assert_eq!(movie(1, "A", Some("2021-10-22")).year(), Some("2021"));
        assert_eq!(movie(2, "B", Some("2021")).year(), Some("2021"));
        assert_eq!(movie(3, "C", Some("")).year(), None);
        assert_eq!(movie(4, "D", None).year(), None);
    }

    #[test]
    fn missing_adult_flag_deserializes_as_none() {
        let item: ContentItem = serde_json::from_value(json!({
            "media_type": "movie", "id": 9, "title": "Flagless"
        }))
        .expect("movie deserialize");
        match item {
            ContentItem::Movie(m) => assert_eq!(m.adult, None),
            _ => panic!("expected movie"),
        }
    }

    #[test]
    fn default_spec_is_inactive_and_matches_everything() {
        let spec = FilterSpec::default();
        assert!(!spec.is_active());
        assert!(spec.matches(&movie(1, "A", None)));
    }

    #[test]
    fn rating_filter_drops_unrated_items() {
        let spec = FilterSpec {
            rating: RatingFilter::SevenPlus,
            ..FilterSpec::default()
        };
        assert!(spec.is_active());
        // vote_average 0 means "no rating data" and fails any threshold
        assert!(!spec.matches(&movie(1, "A", None)));
    }

    #[test]
    fn year_filter_requires_a_parsable_year() {
        let spec = FilterSpec {
            year: YearFilter::From2010s,
            ..FilterSpec::default()
        };
        assert!(spec.matches(&movie(1, "A", Some("2014-05-01"))));
        assert!(!spec.matches(&movie(2, "B", Some("2021-05-01"))));
        assert!(!spec.matches(&movie(3, "C", None)));
    }

    #[test]
    fn filter_enum_rejects_unknown_values() {
        assert!(serde_json::from_value::<RatingFilter>(json!("6_plus")).is_err());
    }
}
