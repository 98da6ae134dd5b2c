pub mod admin_routes;
pub mod config;
pub mod directory;
pub mod search_routes;
pub mod simulation_routes;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use market_core::{Market, MarketDataError, PriceHistoryProvider, TickerDirectory};
use polygon_client::PolygonClient;
use serde::Serialize;
use ticker_search::{builtin_tickers_for, BuiltinTickers, SearchOrchestrator};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ServerConfig;
use crate::directory::{DirectoryCache, MarketDirectory};

pub type TickerSearch = SearchOrchestrator<BuiltinTickers, Arc<DirectoryCache>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub search: Arc<TickerSearch>,
    pub directory: Arc<DirectoryCache>,
    pub prices: Arc<dyn PriceHistoryProvider>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        directory_source: Arc<dyn TickerDirectory>,
        prices: Arc<dyn PriceHistoryProvider>,
    ) -> Self {
        let directory = Arc::new(DirectoryCache::new(directory_source, config.directory_ttl()));
        let search = Arc::new(SearchOrchestrator::new(BuiltinTickers, directory.clone()));
        Self {
            config: Arc::new(config),
            search,
            directory,
            prices,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(code: &str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            code: Some(code.to_string()),
        }
    }
}

/// Handler error carrying the HTTP status and a stable machine-readable code
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self {
            status,
            code: default_code(status),
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

fn default_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::UNPROCESSABLE_ENTITY => "UNPROCESSABLE",
        StatusCode::SERVICE_UNAVAILABLE => "UNAVAILABLE",
        StatusCode::GATEWAY_TIMEOUT => "TIMEOUT",
        _ => "INTERNAL_ERROR",
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<MarketDataError> for AppError {
    fn from(error: MarketDataError) -> Self {
        let (status, code) = match &error {
            MarketDataError::InvalidQuery => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            MarketDataError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
            MarketDataError::InsufficientHistory { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_HISTORY")
            }
            MarketDataError::DataQuality(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DATA_QUALITY"),
            MarketDataError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            MarketDataError::DirectoryUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "DIRECTORY_UNAVAILABLE")
            }
            MarketDataError::ApiError(_) => (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_ERROR"),
            MarketDataError::Aborted => (StatusCode::GATEWAY_TIMEOUT, "ABORTED"),
        };
        Self {
            status,
            code,
            error: error.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} {}: {:#}", self.status.as_u16(), self.code, self.error);
        } else {
            tracing::debug!("{} {}: {}", self.status.as_u16(), self.code, self.error);
        }
        let body = ApiResponse::<()>::failure(self.code, self.error.to_string());
        (self.status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        search_routes::search_tickers,
        simulation_routes::run_simulation,
        admin_routes::reload_tickers,
    ),
    components(schemas(
        market_core::Market,
        search_routes::SearchResultItem,
        search_routes::SearchResponse,
        simulation_routes::SimulationBody,
        simulation_routes::ScenarioSummary,
        simulation_routes::SimulationResponse,
        admin_routes::ReloadResponse,
    )),
    tags(
        (name = "Search", description = "Ticker search"),
        (name = "Simulation", description = "Monte Carlo price projection"),
        (name = "Admin", description = "Directory maintenance"),
    )
)]
pub struct ApiDoc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
    directory_records: Option<usize>,
    directory_age_secs: Option<u64>,
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let snapshot = state.directory.status().await;
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        directory_records: snapshot.map(|(n, _)| n),
        directory_age_secs: snapshot.map(|(_, age)| age.as_secs()),
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(search_routes::search_routes())
        .merge(simulation_routes::simulation_routes())
        .merge(admin_routes::admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub fn init_tracing(json_logging: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!("PANIC at {}: {}", location, info);
    }));
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    init_tracing(config.json_logging);

    let api_key = config
        .polygon_api_key
        .clone()
        .context("POLYGON_API_KEY must be set")?;
    let polygon = Arc::new(
        PolygonClient::with_rate_limit(api_key, config.polygon_rate_limit)
            .with_max_directory_size(config.max_directory_size),
    );
    let directory_source = Arc::new(MarketDirectory::new(
        polygon.clone(),
        builtin_tickers_for(Market::Japan),
    ));

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, directory_source, polygon);

    // Warm the directory so the first slow-path search does not pay for it
    let directory = state.directory.clone();
    tokio::spawn(async move {
        if let Err(e) = directory.snapshot().await {
            tracing::warn!("Initial ticker directory load failed: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("API server listening on {}", bind_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
