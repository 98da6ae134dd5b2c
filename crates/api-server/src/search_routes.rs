//! Ticker Search API Routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use market_core::{Market, MarketDataError};
use serde::{Deserialize, Serialize};
use ticker_search::{SearchCandidate, SearchTier};

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SearchParams {
    /// Free-text query matched against symbols and company names
    #[serde(default)]
    pub query: String,
    /// Maximum results (default 10, capped at 50)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Restrict to one market: `US` or `Japan`
    #[serde(default)]
    pub market: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub symbol: String,
    pub name: String,
    pub score: u8,
    pub market: Market,
    pub logo_url: Option<String>,
}

impl From<SearchCandidate> for SearchResultItem {
    fn from(c: SearchCandidate) -> Self {
        Self {
            symbol: c.symbol,
            name: c.name,
            score: c.score,
            market: c.market,
            logo_url: c.logo_url,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    /// True when the full directory was needed but unavailable
    pub degraded: bool,
    /// Whether the full directory contributed (`static` or `directory`)
    pub source: String,
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/markets/search", get(search_tickers))
}

#[utoipa::path(
    get,
    path = "/api/markets/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Ranked ticker matches", body = SearchResponse),
        (status = 400, description = "Empty query or unknown market")
    ),
    tag = "Search"
)]
pub async fn search_tickers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResponse>>, AppError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(MarketDataError::InvalidQuery.into());
    }

    let market = params
        .market
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(str::parse::<Market>)
        .transpose()?;
    let limit = params
        .limit
        .unwrap_or(state.config.search_default_limit)
        .clamp(1, state.config.search_max_limit);

    let outcome = state.search.search(query, limit, market).await;

    let results: Vec<SearchResultItem> = outcome.results.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(SearchResponse {
        total: results.len(),
        results,
        degraded: outcome.degraded.is_some(),
        source: match outcome.tier {
            SearchTier::Static => "static",
            SearchTier::Directory => "directory",
        }
        .to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let directory = stub_directory(false);
        let app = build_router(state_with(directory.clone()));

        for uri in ["/api/markets/search?query=", "/api/markets/search?query=%20%20", "/api/markets/search"] {
            let (status, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["success"], false);
            assert_eq!(body["code"], "INVALID_QUERY");
        }
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_symbol_ranks_first_without_directory() {
        let directory = stub_directory(false);
        let app = build_router(state_with(directory.clone()));

        let (status, body) = get(app, "/api/markets/search?query=aapl").await;

        assert_eq!(status, StatusCode::OK);
        let results = body["data"]["results"].as_array().unwrap();
        assert_eq!(results[0]["symbol"], "AAPL");
        assert_eq!(results[0]["score"], 100);
        assert_eq!(results[0]["market"], "US");
        assert!(results[0]["logoUrl"].is_string());
        assert_eq!(body["data"]["total"], results.len());
    }

    #[tokio::test]
    async fn test_directory_fallback_and_degraded_flag() {
        let directory = stub_directory(false);
        let app = build_router(state_with(directory.clone()));
        let (status, body) = get(app, "/api/markets/search?query=zion").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["results"][0]["symbol"], "ZION");
        assert_eq!(body["data"]["source"], "directory");
        assert_eq!(body["data"]["degraded"], false);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

        let failing = stub_directory(true);
        let app = build_router(state_with(failing));
        let (status, body) = get(app, "/api/markets/search?query=zion").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["degraded"], true);
        assert_eq!(body["data"]["total"], 0);
    }

    #[tokio::test]
    async fn test_market_filter_and_limit() {
        let app = build_router(state_with(stub_directory(false)));

        let (status, body) = get(app.clone(), "/api/markets/search?query=t&market=Japan&limit=200").await;
        assert_eq!(status, StatusCode::OK);
        let results = body["data"]["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 50);
        assert!(results.iter().all(|r| r["market"] == "Japan"));

        let (status, body) = get(app, "/api/markets/search?query=a&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_market_rejected() {
        let app = build_router(state_with(stub_directory(false)));
        let (status, body) = get(app, "/api/markets/search?query=apple&market=mars").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMETER");
    }
}
