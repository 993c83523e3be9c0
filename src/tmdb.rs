use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::debug;

use crate::models::{ContentItem, ContentTypeFilter, FilterSpec, MovieItem, SeriesItem};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";

/// One page of upstream search results. `total_results` is the count as
/// reported by the provider, before any client-side filtering. A page may
/// hold fewer items than the nominal page size even when more pages
/// remain; callers must not assume page-size uniformity.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchPage {
    pub page: u32,
    pub results: Vec<ContentItem>,
    pub total_pages: u32,
    pub total_results: u64,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn search(&self, query: &str, page: u32, spec: &FilterSpec) -> Result<SearchPage>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self.client.get(url).send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn search(&self, query: &str, page: u32, spec: &FilterSpec) -> Result<SearchPage> {
        #[derive(Deserialize)]
        struct RawPage {
            #[serde(default = "default_page")]
            page: u32,
            #[serde(default)]
            results: Vec<Value>,
            #[serde(default)]
            total_pages: u32,
            #[serde(default)]
            total_results: u64,
        }
        fn default_page() -> u32 {
            1
        }

        // The search endpoints don't honor rating/year filters and have no
        // server-side safety filter; both are applied client-side.
        let path = match spec.content_type {
            ContentTypeFilter::All => "search/multi",
            ContentTypeFilter::Movie => "search/movie",
            ContentTypeFilter::Series => "search/tv",
        };
        let url = format!(
            "{TMDB_BASE}/{path}?api_key={}&query={}&page={}&include_adult=true&language=en-US",
            self.api_key,
            urlencoding::encode(query),
            page
        );
        let raw: RawPage = self.get_json(&url).await?;

        let mut results = Vec::with_capacity(raw.results.len());
        for value in raw.results {
            match parse_result(spec.content_type, value) {
                Some(item) => results.push(item),
                // person hits and malformed entries are skipped, not errors
                None => debug!("skipping non-content search result"),
            }
        }

        Ok(SearchPage {
            page: raw.page,
            results,
            total_pages: raw.total_pages,
            total_results: raw.total_results,
        })
    }
}

/// Maps one raw search result to a content item. The movie and tv
/// endpoints omit the `media_type` discriminator, so the requested
/// content type decides the variant; multi-search results carry it.
fn parse_result(content_type: ContentTypeFilter, value: Value) -> Option<ContentItem> {
    match content_type {
        ContentTypeFilter::Movie => serde_json::from_value::<MovieItem>(value)
            .ok()
            .map(ContentItem::Movie),
        ContentTypeFilter::Series => serde_json::from_value::<SeriesItem>(value)
            .ok()
            .map(ContentItem::Series),
        ContentTypeFilter::All => match value.get("media_type").and_then(|v| v.as_str()) {
            Some("movie") => serde_json::from_value::<MovieItem>(value)
                .ok()
                .map(ContentItem::Movie),
            Some("tv") => serde_json::from_value::<SeriesItem>(value)
                .ok()
                .map(ContentItem::Series),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multi_search_skips_person_results() {
        let values = vec![
            json!({"media_type": "movie", "id": 1, "title": "A"}),
            json!({"media_type": "person", "id": 2, "name": "Somebody"}),
            json!({"media_type": "tv", "id": 3, "name": "B"}),
        ];
        let items: Vec<_> = values
            .into_iter()
            .filter_map(|v| parse_result(ContentTypeFilter::All, v))
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), "A");
        assert_eq!(items[1].title(), "B");
    }

    #[test]
    fn typed_endpoints_need_no_discriminator() {
        let raw = json!({"id": 7, "title": "Movie", "release_date": "1999-03-31"});
        let item = parse_result(ContentTypeFilter::Movie, raw).expect("movie");
        assert_eq!(item.year(), Some("1999"));
    }

    #[test]
    fn malformed_entries_are_dropped_not_raised() {
        let raw = json!({"media_type": "movie", "title": "No Id"});
        assert!(parse_result(ContentTypeFilter::All, raw).is_none());
    }

    #[test]
    fn has_more_tracks_the_page_cursor() {
        let page = SearchPage {
            page: 2,
            results: Vec::new(),
            total_pages: 3,
            total_results: 42,
        };
        assert!(page.has_more());
        let last = SearchPage { page: 3, ..page };
        assert!(!last.has_more());
    }
}
