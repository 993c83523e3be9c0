use crate::amplify;
use crate::models::{
    ContentKey, ContentTypeFilter, FilterSpec, MediaType, RatingFilter, SortOrder, YearFilter,
};
use crate::search::{Phase, SearchAggregator};
use crate::suggest::{self, ChatMessage, SuggestApi, SuggestClient, SuggestError, SuggestMode};
use crate::tmdb::{CatalogApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const SUGGEST_BATCH: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub suggest: Option<Arc<dyn SuggestApi>>,
}

pub async fn run_server() -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::from_env()?);
    let suggest: Option<Arc<dyn SuggestApi>> = match SuggestClient::from_env() {
        Some(client) => Some(Arc::new(client)),
        None => {
            warn!("SUGGEST_API_KEY not set - smart search disabled");
            None
        }
    };

    let state = AppState { catalog, suggest };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3152));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", get(handle_search))
        .route("/api/suggest", post(handle_suggest))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Filter params deserialize straight into the closed enums, so an
/// unknown value is rejected at the boundary with a 400 before any fetch.
#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    content_type: ContentTypeFilter,
    #[serde(default)]
    rating: RatingFilter,
    #[serde(default)]
    year: YearFilter,
    #[serde(default)]
    sort: SortOrder,
    #[serde(default)]
    safety: bool,
    /// Comma list of `movie:<id>` / `tv:<id>` keys the user has disliked
    /// or hidden; the rating store itself lives outside this service.
    #[serde(default)]
    disliked: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if params.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "query must not be empty" })),
        )
            .into_response();
    }
    let disliked = match parse_disliked(params.disliked.as_deref().unwrap_or("")) {
        Ok(keys) => keys,
        Err(msg) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response();
        }
    };
    let spec = FilterSpec {
        content_type: params.content_type,
        rating: params.rating,
        year: params.year,
        sort: params.sort,
    };

    let aggregator = SearchAggregator::new(state.catalog.clone());
    aggregator.submit(&params.query, spec, params.safety).await;
    let view = aggregator.view(params.safety, &disliked).await;

    let status = if view.phase == Phase::Errored {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(view)).into_response()
}

#[derive(Debug, Deserialize)]
struct SuggestRequest {
    query: String,
    #[serde(default)]
    mode: SuggestMode,
    #[serde(default)]
    history: Vec<ChatMessage>,
    /// Title+year pairs already shown to the user.
    #[serde(default)]
    existing: Vec<(String, String)>,
    #[serde(default)]
    safety: bool,
}

async fn handle_suggest(State(state): State<AppState>, Json(req): Json<SuggestRequest>) -> Response {
    let Some(suggester) = state.suggest.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "suggestions are not configured" })),
        )
            .into_response();
    };

    // Ask for more than the page needs so client-side safety filtering
    // cannot starve the page.
    let limit = amplify::page_size(req.safety, SUGGEST_BATCH);
    let titles = match suggester
        .suggest(&req.query, req.mode, &req.history, &req.existing, limit)
        .await
    {
        Ok(titles) => titles,
        Err(SuggestError::Quota(msg)) => {
            // surfaced verbatim for user messaging, never retried here
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": msg }))).into_response();
        }
        Err(e) => {
            warn!("suggestion request failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let resolved = suggest::resolve_suggestions(state.catalog.as_ref(), &titles).await;
    let visible = crate::filter::by_restriction_flag(&resolved, req.safety);
    let results = suggest::merge_follow_up(Vec::new(), visible, &req.existing);
    (StatusCode::OK, Json(json!({ "results": results }))).into_response()
}

fn parse_disliked(raw: &str) -> Result<HashSet<ContentKey>, String> {
    let mut keys = HashSet::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (kind, id) = part
            .split_once(':')
            .ok_or_else(|| format!("invalid disliked entry '{part}'"))?;
        let media_type = match kind {
            "movie" => MediaType::Movie,
            "tv" | "series" => MediaType::Series,
            other => return Err(format!("unknown media type '{other}'")),
        };
        let id: i64 = id
            .parse()
            .map_err(|_| format!("invalid id in disliked entry '{part}'"))?;
        keys.insert((media_type, id));
    }
    Ok(keys)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_dislike_keys() {
        let keys = parse_disliked("movie:5, tv:5, series:9").expect("parse");
        assert!(keys.contains(&(MediaType::Movie, 5)));
        assert!(keys.contains(&(MediaType::Series, 5)));
        assert!(keys.contains(&(MediaType::Series, 9)));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn rejects_malformed_dislike_entries() {
        assert!(parse_disliked("movie").is_err());
        assert!(parse_disliked("book:1").is_err());
        assert!(parse_disliked("movie:abc").is_err());
    }

    #[test]
    fn empty_dislike_list_is_fine() {
        assert!(parse_disliked("").expect("parse").is_empty());
    }
}
