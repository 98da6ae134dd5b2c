//! Monte Carlo Simulation API Routes
//!
//! Projections run on the blocking pool. When the request deadline passes,
//! the cancel flag stops the remaining runs and the request fails with 504.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use price_projection::service::{load_return_stats, project};
use price_projection::{CancelFlag, PathSampling, Projection, SimulationRequest};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

fn default_years() -> i32 {
    5
}

fn default_simulations() -> i32 {
    100
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SimulationBody {
    pub symbol: String,
    /// Horizon in years (1-30)
    #[serde(default = "default_years")]
    pub years: i32,
    /// Runs per scenario (10-1000)
    #[serde(default = "default_simulations")]
    pub simulations: i32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    /// Daily drift used for the scenario
    pub drift: f64,
    pub mean: f64,
    pub median: f64,
    pub percentile5: f64,
    pub percentile25: f64,
    pub percentile75: f64,
    pub percentile95: f64,
    pub probability_of_gain: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub symbol: String,
    pub years: i32,
    pub simulations: i32,
    /// Daily volatility of the history the projection was fitted on
    pub daily_volatility: f64,
    pub sample_count: usize,
    /// Per scenario, one path per run: the price at each year end,
    /// relative to a start price of 1.0
    pub scenarios: BTreeMap<String, Vec<Vec<f64>>>,
    pub summaries: BTreeMap<String, ScenarioSummary>,
}

impl SimulationResponse {
    fn from_projection(projection: Projection, simulations: i32) -> Self {
        let mut scenarios = BTreeMap::new();
        let mut summaries = BTreeMap::new();
        for (scenario, result) in projection.scenarios {
            let name = scenario.name().to_string();
            summaries.insert(
                name.clone(),
                ScenarioSummary {
                    drift: result.drift,
                    mean: result.summary.mean,
                    median: result.summary.median,
                    percentile5: result.summary.percentile_5,
                    percentile25: result.summary.percentile_25,
                    percentile75: result.summary.percentile_75,
                    percentile95: result.summary.percentile_95,
                    probability_of_gain: result.summary.probability_of_gain,
                },
            );
            scenarios.insert(name, result.paths);
        }

        Self {
            symbol: projection.symbol,
            years: projection.years,
            simulations,
            daily_volatility: projection.stats.sigma,
            sample_count: projection.stats.sample_count,
            scenarios,
            summaries,
        }
    }
}

pub fn simulation_routes() -> Router<AppState> {
    Router::new().route("/api/simulation", post(run_simulation))
}

#[utoipa::path(
    post,
    path = "/api/simulation",
    request_body = SimulationBody,
    responses(
        (status = 200, description = "Optimistic, base and pessimistic projections", body = SimulationResponse),
        (status = 400, description = "Parameters out of range"),
        (status = 404, description = "Unknown symbol"),
        (status = 422, description = "Price history too short or malformed"),
        (status = 504, description = "Simulation deadline exceeded")
    ),
    tag = "Simulation"
)]
pub async fn run_simulation(
    State(state): State<AppState>,
    Json(body): Json<SimulationBody>,
) -> Result<Json<ApiResponse<SimulationResponse>>, AppError> {
    let request = SimulationRequest::new(
        body.symbol.trim().to_uppercase(),
        body.years,
        body.simulations,
    );
    request.validate()?;

    let stats = load_return_stats(state.prices.as_ref(), &request.symbol).await?;
    tracing::info!(
        "Simulating {} for {} years x {} runs (sigma {:.5})",
        request.symbol,
        request.years,
        request.simulations,
        stats.sigma
    );

    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let simulations = request.simulations;
    let task = tokio::task::spawn_blocking(move || {
        let mut rng = rand::thread_rng();
        project(&request, stats, PathSampling::yearly(), &mut rng, Some(&*flag))
    });

    let projection = match tokio::time::timeout(state.config.simulation_timeout(), task).await {
        Ok(joined) => joined.map_err(|e| anyhow::anyhow!("Simulation task failed: {}", e))??,
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            tracing::warn!(
                "Simulation exceeded {}s deadline, cancelling",
                state.config.simulation_timeout_secs
            );
            return Err(AppError::with_status(
                StatusCode::GATEWAY_TIMEOUT,
                anyhow::anyhow!(
                    "Simulation did not finish within {} seconds",
                    state.config.simulation_timeout_secs
                ),
            ));
        }
    };

    Ok(Json(ApiResponse::success(SimulationResponse::from_projection(
        projection,
        simulations,
    ))))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use crate::build_router;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn post_json(body: &str) -> (StatusCode, serde_json::Value) {
        post_json_with(ServerConfig::default(), body).await
    }

    async fn post_json_with(config: ServerConfig, body: &str) -> (StatusCode, serde_json::Value) {
        let app = build_router(state_with_config(config, stub_directory(false)));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/simulation")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test]
    async fn test_simulation_shape_with_defaults() {
        let (status, body) = post_json(r#"{"symbol":"aapl"}"#).await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["symbol"], "AAPL");
        assert_eq!(data["years"], 5);
        assert_eq!(data["simulations"], 100);

        for name in ["optimistic", "base", "pessimistic"] {
            let paths = data["scenarios"][name].as_array().unwrap();
            assert_eq!(paths.len(), 100, "{name}");
            // one checkpoint per year, the last being the terminal price
            assert_eq!(paths[0].as_array().unwrap().len(), 5, "{name}");
            assert!(data["summaries"][name]["probabilityOfGain"].is_number());
        }
        let opt = data["summaries"]["optimistic"]["mean"].as_f64().unwrap();
        let pess = data["summaries"]["pessimistic"]["mean"].as_f64().unwrap();
        assert!(opt > pess);
    }

    #[tokio::test]
    async fn test_out_of_range_parameters() {
        for body in [
            r#"{"symbol":"AAPL","years":0}"#,
            r#"{"symbol":"AAPL","years":31}"#,
            r#"{"symbol":"AAPL","simulations":5}"#,
            r#"{"symbol":"AAPL","simulations":1001}"#,
            r#"{"symbol":"  "}"#,
        ] {
            let (status, json) = post_json(body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json["code"], "INVALID_PARAMETER");
        }
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let (status, json) = post_json(r#"{"symbol":"ZZZZ"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_short_history_is_unprocessable() {
        let (status, json) = post_json(r#"{"symbol":"NEWCO"}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "INSUFFICIENT_HISTORY");
    }

    #[tokio::test]
    async fn test_deadline_exceeded_is_gateway_timeout() {
        let config = ServerConfig {
            simulation_timeout_secs: 0,
            ..ServerConfig::default()
        };
        let (status, json) =
            post_json_with(config, r#"{"symbol":"AAPL","years":30,"simulations":1000}"#).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "TIMEOUT");
    }
}
