//! Per-session search orchestration. One aggregator owns one search
//! surface: it fetches pages sequentially from the catalog, accumulates a
//! superset of every page when filters are active (filters can only report
//! honest "N of M" counts against the complete result set), and exposes
//! the filtered view. A new query supersedes any sweep still in flight:
//! every fetch and every state application is guarded by a generation
//! token, so results for an abandoned query are dropped silently.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::amplify;
use crate::filter;
use crate::models::{ContentItem, ContentKey, FilterSpec};
use crate::tmdb::CatalogApi;

/// Nominal number of items a result page should show after filtering.
pub const PAGE_FILL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FetchingPage,
    FetchingAll,
    Ready,
    Errored,
}

#[derive(Debug)]
struct SearchState {
    /// Session token. Bumped on submit/retry/reset; a sweep carrying an
    /// older generation must never touch state again.
    generation: u64,
    query: String,
    spec: FilterSpec,
    phase: Phase,
    buffer: Vec<ContentItem>,
    pages_fetched: u32,
    total_pages: u32,
    total_results: u64,
    has_all_results: bool,
    error: Option<String>,
}

impl SearchState {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            query: String::new(),
            spec: FilterSpec::default(),
            phase: Phase::Idle,
            buffer: Vec::new(),
            pages_fetched: 0,
            total_pages: 0,
            total_results: 0,
            has_all_results: false,
            error: None,
        }
    }
}

/// The filtered view handed to the consumer, always renderable whatever
/// the outcome: errors surface here as state, not as exceptions.
#[derive(Debug, Clone, Serialize)]
pub struct SearchView {
    pub phase: Phase,
    pub query: String,
    pub items: Vec<ContentItem>,
    pub shown: usize,
    pub hidden: usize,
    pub total_before: usize,
    /// Upstream count, before any client-side filtering.
    pub provider_total: u64,
    /// Post-filter total. Only present once every page has been fetched;
    /// until then `shown` is a provisional count scoped to fetched pages.
    pub filtered_total: Option<usize>,
    pub has_all_results: bool,
    pub error: Option<String>,
}

pub struct SearchAggregator {
    catalog: Arc<dyn CatalogApi>,
    state: Mutex<SearchState>,
}

impl SearchAggregator {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self {
            catalog,
            state: Mutex::new(SearchState::idle(0)),
        }
    }

    /// Starts a new search session, superseding any sweep in flight.
    pub async fn submit(&self, query: &str, spec: FilterSpec, safety_enabled: bool) {
        let generation = {
            let mut s = self.state.lock().await;
            let generation = s.generation + 1;
            *s = SearchState::idle(generation);
            s.query = query.to_string();
            s.spec = spec;
            s.phase = Phase::FetchingPage;
            generation
        };
        info!(query, "search submitted");
        self.sweep(generation, fill_target(&spec, safety_enabled))
            .await;
    }

    /// Fetches the next page(s) for the current session. Only meaningful
    /// on the cheap path: with filters active the superset is already
    /// complete and there is nothing more to load.
    pub async fn load_more(&self, safety_enabled: bool) {
        let (generation, target) = {
            let mut s = self.state.lock().await;
            if s.phase != Phase::Ready || s.spec.is_active() || s.pages_fetched >= s.total_pages {
                return;
            }
            s.phase = Phase::FetchingPage;
            let target = s.buffer.len() + amplify::page_size(safety_enabled, PAGE_FILL);
            (s.generation, Some(target))
        };
        self.sweep(generation, target).await;
    }

    /// Re-runs the current query from scratch after a provider failure.
    pub async fn retry(&self, safety_enabled: bool) {
        let (generation, spec) = {
            let mut s = self.state.lock().await;
            if s.phase != Phase::Errored {
                return;
            }
            let generation = s.generation + 1;
            let (query, spec) = (std::mem::take(&mut s.query), s.spec);
            *s = SearchState::idle(generation);
            s.query = query;
            s.spec = spec;
            s.phase = Phase::FetchingPage;
            (generation, spec)
        };
        self.sweep(generation, fill_target(&spec, safety_enabled))
            .await;
    }

    /// Discards the session and its buffers; also cancels any sweep still
    /// in flight for it.
    pub async fn reset(&self) {
        let mut s = self.state.lock().await;
        let generation = s.generation + 1;
        *s = SearchState::idle(generation);
    }

    /// Sequentially fetches pages until `target_len` items are buffered
    /// (`None` = every page). One outstanding request at a time; the
    /// generation is re-checked before each fetch and before applying any
    /// response, so a superseded sweep stops without touching state.
    async fn sweep(&self, generation: u64, target_len: Option<usize>) {
        loop {
            let (query, spec, next_page) = {
                let mut s = self.state.lock().await;
                if s.generation != generation {
                    debug!("superseded sweep stopped");
                    return;
                }
                let fetched_any = s.pages_fetched > 0;
                let exhausted = fetched_any && s.pages_fetched >= s.total_pages;
                let satisfied = match target_len {
                    Some(n) => fetched_any && s.buffer.len() >= n,
                    None => false,
                };
                if exhausted || satisfied {
                    s.phase = Phase::Ready;
                    s.has_all_results = s.pages_fetched >= s.total_pages;
                    info!(
                        query = %s.query,
                        pages = s.pages_fetched,
                        items = s.buffer.len(),
                        complete = s.has_all_results,
                        "search sweep finished"
                    );
                    return;
                }
                if fetched_any && target_len.is_none() {
                    s.phase = Phase::FetchingAll;
                }
                (s.query.clone(), s.spec, s.pages_fetched + 1)
            };

            match self.catalog.search(&query, next_page, &spec).await {
                Ok(page) => {
                    let mut s = self.state.lock().await;
                    if s.generation != generation {
                        debug!("stale response for superseded query dropped");
                        return;
                    }
                    s.pages_fetched = next_page;
                    s.total_pages = page.total_pages;
                    s.total_results = page.total_results;
                    s.buffer.extend(page.results);
                }
                Err(e) => {
                    let mut s = self.state.lock().await;
                    if s.generation != generation {
                        // cancellation is not an error
                        return;
                    }
                    warn!(query = %s.query, page = next_page, error = %e, "page fetch failed");
                    s.phase = Phase::Errored;
                    s.error = Some(e.to_string());
                    // the partial buffer is kept, but statistics must
                    // visibly reflect that it is incomplete
                    s.has_all_results = false;
                    return;
                }
            }
        }
    }

    /// The composed filtered view over the current buffer: restriction
    /// filter, then dislikes, then the filter spec.
    pub async fn view(&self, safety_enabled: bool, disliked: &HashSet<ContentKey>) -> SearchView {
        let s = self.state.lock().await;
        let total_before = s.buffer.len();
        let kept = filter::visible(&s.buffer, safety_enabled, disliked);
        let items = filter::apply_spec(&kept, &s.spec);
        let shown = items.len();
        SearchView {
            phase: s.phase,
            query: s.query.clone(),
            items,
            shown,
            hidden: total_before - shown,
            total_before,
            provider_total: s.total_results,
            filtered_total: s.has_all_results.then_some(shown),
            has_all_results: s.has_all_results,
            error: s.error.clone(),
        }
    }
}

/// How many buffered items satisfy one page of results. `None` means the
/// sweep must cover every page (filters need the complete set).
fn fill_target(spec: &FilterSpec, safety_enabled: bool) -> Option<usize> {
    if spec.is_active() {
        None
    } else {
        Some(amplify::page_size(safety_enabled, PAGE_FILL))
    }
}
