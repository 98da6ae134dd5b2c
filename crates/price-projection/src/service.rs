//! Projection entry point: validate, load history, estimate, simulate.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use market_core::{MarketDataError, PriceHistoryProvider};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::engine::{MonteCarloEngine, PathSampling, SimulationResult};
use crate::returns::{estimate_returns, ReturnStats};
use crate::scenario::Scenario;

/// A projection request as accepted from callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub symbol: String,
    pub years: i32,
    pub simulations: i32,
}

impl SimulationRequest {
    pub const YEARS_RANGE: std::ops::RangeInclusive<i32> = 1..=30;
    pub const SIMULATIONS_RANGE: std::ops::RangeInclusive<i32> = 10..=1000;

    pub fn new(symbol: impl Into<String>, years: i32, simulations: i32) -> Self {
        Self {
            symbol: symbol.into(),
            years,
            simulations,
        }
    }

    /// Check bounds before any data is fetched.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        if self.symbol.trim().is_empty() {
            return Err(MarketDataError::InvalidParameter(
                "symbol must not be empty".to_string(),
            ));
        }
        if !Self::YEARS_RANGE.contains(&self.years) {
            return Err(MarketDataError::InvalidParameter(format!(
                "years must be between {} and {}, got {}",
                Self::YEARS_RANGE.start(),
                Self::YEARS_RANGE.end(),
                self.years
            )));
        }
        if !Self::SIMULATIONS_RANGE.contains(&self.simulations) {
            return Err(MarketDataError::InvalidParameter(format!(
                "simulations must be between {} and {}, got {}",
                Self::SIMULATIONS_RANGE.start(),
                Self::SIMULATIONS_RANGE.end(),
                self.simulations
            )));
        }
        Ok(())
    }
}

/// Projection for one symbol, keyed by scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub symbol: String,
    pub years: i32,
    pub stats: ReturnStats,
    pub scenarios: BTreeMap<Scenario, SimulationResult>,
}

/// Fetch history for `symbol` and derive its return statistics.
pub async fn load_return_stats<P: PriceHistoryProvider + ?Sized>(
    provider: &P,
    symbol: &str,
) -> Result<ReturnStats, MarketDataError> {
    let history = provider.get_price_history(symbol).await?;
    tracing::debug!("Loaded {} price points for {}", history.len(), symbol);
    estimate_returns(&history)
}

/// Run the Monte Carlo engine for an already validated request.
pub fn project<R: RngCore + ?Sized>(
    request: &SimulationRequest,
    stats: ReturnStats,
    sampling: PathSampling,
    rng: &mut R,
    cancel: Option<&AtomicBool>,
) -> Result<Projection, MarketDataError> {
    let scenarios = MonteCarloEngine::with_sampling(sampling).run(
        &stats,
        request.years,
        request.simulations,
        rng,
        cancel,
    )?;

    Ok(Projection {
        symbol: request.symbol.clone(),
        years: request.years,
        stats,
        scenarios,
    })
}

/// Validate `request`, load the symbol's history from `provider` and project
/// all three scenarios.
pub async fn simulate<P, R>(
    provider: &P,
    request: &SimulationRequest,
    sampling: PathSampling,
    rng: &mut R,
    cancel: Option<&AtomicBool>,
) -> Result<Projection, MarketDataError>
where
    P: PriceHistoryProvider + ?Sized,
    R: RngCore + ?Sized,
{
    request.validate()?;
    let stats = load_return_stats(provider, &request.symbol).await?;
    project(request, stats, sampling, rng, cancel)
}
