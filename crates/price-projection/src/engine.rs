use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use market_core::{stats, MarketDataError};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::returns::ReturnStats;
use crate::scenario::Scenario;

/// Trading days per simulated year
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Shared flag a request layer raises to stop a running simulation
pub type CancelFlag = Arc<AtomicBool>;

/// Which prices of each simulated path are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSampling {
    /// Only the terminal price
    TerminalOnly,
    /// The price after every `n` trading days, plus the terminal price
    Every(u32),
    /// Every trading day
    Daily,
}

impl PathSampling {
    /// Yearly checkpoints
    pub fn yearly() -> Self {
        PathSampling::Every(TRADING_DAYS_PER_YEAR)
    }

    fn stride(&self) -> Option<usize> {
        match self {
            PathSampling::TerminalOnly => None,
            PathSampling::Every(n) => Some((*n).max(1) as usize),
            PathSampling::Daily => Some(1),
        }
    }
}

/// Distribution of terminal prices across runs (start price is 1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub mean: f64,
    pub median: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    /// Fraction of runs ending above the start price (0.0-1.0)
    pub probability_of_gain: f64,
}

impl TerminalSummary {
    fn from_terminals(terminals: &[f64]) -> Self {
        let sorted = stats::sorted(terminals);
        Self {
            mean: stats::mean(&sorted),
            median: stats::quantile_sorted(&sorted, 0.50),
            percentile_5: stats::quantile_sorted(&sorted, 0.05),
            percentile_25: stats::quantile_sorted(&sorted, 0.25),
            percentile_75: stats::quantile_sorted(&sorted, 0.75),
            percentile_95: stats::quantile_sorted(&sorted, 0.95),
            probability_of_gain: stats::fraction_above(&sorted, 1.0),
        }
    }
}

/// Simulated paths for one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario: Scenario,
    /// Daily drift applied to every step of every run
    pub drift: f64,
    /// One path per run; the last element is the terminal price
    pub paths: Vec<Vec<f64>>,
    pub summary: TerminalSummary,
}

impl SimulationResult {
    pub fn terminals(&self) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.last().copied()).collect()
    }
}

/// Geometric Brownian motion projection over the three scenarios.
///
/// Every run starts at a normalized price of 1.0 and steps one trading day at
/// a time:
///
/// `price *= exp((drift - sigma^2 / 2) * dt + sigma * sqrt(dt) * Z)`
///
/// with `dt = 1/252` and `Z ~ N(0, 1)` drawn fresh per step. `drift` is the
/// scenario's return quantile and `sigma` the historical daily volatility.
#[derive(Debug, Clone)]
pub struct MonteCarloEngine {
    sampling: PathSampling,
}

impl Default for MonteCarloEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MonteCarloEngine {
    /// Engine keeping terminal prices only
    pub fn new() -> Self {
        Self {
            sampling: PathSampling::TerminalOnly,
        }
    }

    pub fn with_sampling(sampling: PathSampling) -> Self {
        Self { sampling }
    }

    /// Run `simulations` paths of `years` years for each scenario.
    ///
    /// `rng` only seeds the per-run generators, so a seeded `rng` reproduces
    /// the same output regardless of how rayon schedules the runs. If
    /// `cancel` is raised, runs not yet started are skipped and the whole
    /// projection is discarded with `Aborted`.
    pub fn run<R: RngCore + ?Sized>(
        &self,
        stats: &ReturnStats,
        years: i32,
        simulations: i32,
        rng: &mut R,
        cancel: Option<&AtomicBool>,
    ) -> Result<BTreeMap<Scenario, SimulationResult>, MarketDataError> {
        if years <= 0 {
            return Err(MarketDataError::InvalidParameter(format!(
                "years must be positive, got {}",
                years
            )));
        }
        if simulations <= 0 {
            return Err(MarketDataError::InvalidParameter(format!(
                "simulations must be positive, got {}",
                simulations
            )));
        }

        let steps = years as usize * TRADING_DAYS_PER_YEAR as usize;
        let runs = simulations as usize;
        let sigma = stats.sigma;
        let stride = self.sampling.stride();

        // Seeds are drawn up front so the parallel section never touches `rng`
        let jobs: Vec<(Scenario, u64)> = Scenario::ALL
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(runs))
            .map(|s| (s, rng.next_u64()))
            .collect();

        // Run simulations in parallel using rayon
        let paths: Vec<Option<Vec<f64>>> = jobs
            .par_iter()
            .map(|&(scenario, seed)| {
                if is_cancelled(cancel) {
                    return None;
                }
                simulate_path(seed, stats.drift(scenario), sigma, steps, stride, cancel)
            })
            .collect();

        if paths.iter().any(Option::is_none) {
            tracing::warn!("Monte Carlo projection aborted before all runs completed");
            return Err(MarketDataError::Aborted);
        }

        let mut paths = paths.into_iter().flatten();
        let mut results = BTreeMap::new();
        for scenario in Scenario::ALL {
            let scenario_paths: Vec<Vec<f64>> = paths.by_ref().take(runs).collect();
            let terminals: Vec<f64> = scenario_paths
                .iter()
                .filter_map(|p| p.last().copied())
                .collect();
            results.insert(
                scenario,
                SimulationResult {
                    scenario,
                    drift: stats.drift(scenario),
                    summary: TerminalSummary::from_terminals(&terminals),
                    paths: scenario_paths,
                },
            );
        }

        tracing::debug!(
            "Monte Carlo projection: {} scenarios x {} runs x {} steps (sigma {:.5})",
            Scenario::ALL.len(),
            runs,
            steps,
            sigma
        );

        Ok(results)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// One run starting at 1.0. Records every `stride` steps when set; the
/// terminal price is always the last element. Returns `None` if `cancel` is
/// raised while the path is being stepped.
fn simulate_path(
    seed: u64,
    drift: f64,
    sigma: f64,
    steps: usize,
    stride: Option<usize>,
    cancel: Option<&AtomicBool>,
) -> Option<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dt = 1.0 / TRADING_DAYS_PER_YEAR as f64;
    let drift_term = (drift - 0.5 * sigma * sigma) * dt;
    let shock_scale = sigma * dt.sqrt();

    let capacity = stride.map_or(1, |s| steps.div_ceil(s));
    let mut path = Vec::with_capacity(capacity);
    let mut price = 1.0_f64;

    for step in 1..=steps {
        // Checked at the start of every simulated year
        if (step - 1) % TRADING_DAYS_PER_YEAR as usize == 0 && is_cancelled(cancel) {
            return None;
        }
        let z: f64 = rng.sample(StandardNormal);
        price *= (drift_term + shock_scale * z).exp();
        if let Some(s) = stride {
            if step % s == 0 && step != steps {
                path.push(price);
            }
        }
    }
    path.push(price);
    Some(path)
}
