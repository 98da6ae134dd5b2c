//! Return statistics derived from a daily close series.
//!
//! Volatility is the sample standard deviation of simple daily returns.
//! Scenario drifts are quantiles of the same sample rather than its mean,
//! so skewed histories produce asymmetric scenarios.

use std::collections::BTreeMap;

use market_core::{stats, MarketDataError, PricePoint};
use serde::{Deserialize, Serialize};

use crate::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    /// Number of daily returns (history length - 1)
    pub sample_count: usize,
    pub mean: f64,
    /// Daily volatility (sample standard deviation)
    pub sigma: f64,
    /// Daily drift per scenario
    pub drifts: BTreeMap<Scenario, f64>,
}

impl ReturnStats {
    pub fn drift(&self, scenario: Scenario) -> f64 {
        self.drifts.get(&scenario).copied().unwrap_or(0.0)
    }
}

/// Simple day-over-day returns of `history`.
///
/// Fails with `InsufficientHistory` below two points and with `DataQuality`
/// when a close is not a positive finite number or dates are not strictly
/// ascending.
pub fn daily_returns(history: &[PricePoint]) -> Result<Vec<f64>, MarketDataError> {
    if history.len() < 2 {
        return Err(MarketDataError::InsufficientHistory {
            points: history.len(),
        });
    }

    for (i, point) in history.iter().enumerate() {
        if !point.close.is_finite() || point.close <= 0.0 {
            return Err(MarketDataError::DataQuality(format!(
                "close at index {} ({}) is {}, expected a positive price",
                i, point.date, point.close
            )));
        }
        if i > 0 && point.date <= history[i - 1].date {
            return Err(MarketDataError::DataQuality(format!(
                "date at index {} ({}) does not follow {}",
                i,
                point.date,
                history[i - 1].date
            )));
        }
    }

    Ok(history
        .windows(2)
        .map(|w| (w[1].close - w[0].close) / w[0].close)
        .collect())
}

/// Derive volatility and per-scenario drift quantiles from `history`.
pub fn estimate_returns(history: &[PricePoint]) -> Result<ReturnStats, MarketDataError> {
    let returns = daily_returns(history)?;
    let sorted = stats::sorted(&returns);

    let drifts = Scenario::ALL
        .iter()
        .map(|&s| (s, stats::quantile_sorted(&sorted, s.quantile())))
        .collect();

    Ok(ReturnStats {
        sample_count: returns.len(),
        mean: stats::mean(&returns),
        sigma: stats::std_dev(&returns),
        drifts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn test_daily_returns() {
        let r = daily_returns(&series(&[100.0, 110.0, 99.0])).unwrap();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_drifts() {
        // returns: +10%, -10%, +20%, 0%
        let stats = estimate_returns(&series(&[100.0, 110.0, 99.0, 118.8, 118.8])).unwrap();
        assert_eq!(stats.sample_count, 4);
        // sorted: -0.1, 0.0, 0.1, 0.2
        assert!((stats.drift(Scenario::Pessimistic) - (-0.025)).abs() < 1e-9);
        assert!((stats.drift(Scenario::Base) - 0.05).abs() < 1e-9);
        assert!((stats.drift(Scenario::Optimistic) - 0.125).abs() < 1e-9);
        assert!((stats.mean - 0.05).abs() < 1e-9);
        assert!(stats.sigma > 0.0);
    }

    #[test]
    fn test_two_points_is_enough() {
        let stats = estimate_returns(&series(&[10.0, 11.0])).unwrap();
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.sigma, 0.0);
        assert!((stats.drift(Scenario::Optimistic) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_history() {
        assert_eq!(
            estimate_returns(&series(&[100.0])),
            Err(MarketDataError::InsufficientHistory { points: 1 })
        );
        assert_eq!(
            estimate_returns(&[]),
            Err(MarketDataError::InsufficientHistory { points: 0 })
        );
    }

    #[test]
    fn test_rejects_non_positive_close() {
        let err = estimate_returns(&series(&[100.0, 0.0, 101.0])).unwrap_err();
        assert!(matches!(err, MarketDataError::DataQuality(_)));
        let err = estimate_returns(&series(&[100.0, f64::NAN])).unwrap_err();
        assert!(matches!(err, MarketDataError::DataQuality(_)));
    }

    #[test]
    fn test_rejects_unsorted_dates() {
        let mut history = series(&[100.0, 101.0, 102.0]);
        history.swap(1, 2);
        let err = estimate_returns(&history).unwrap_err();
        assert!(matches!(err, MarketDataError::DataQuality(_)));

        let mut dup = series(&[100.0, 101.0]);
        dup[1].date = dup[0].date;
        assert!(matches!(
            estimate_returns(&dup),
            Err(MarketDataError::DataQuality(_))
        ));
    }
}
