//! Two-tier Search
//!
//! Runs the matcher over the static fast tier first and only falls back to
//! the full directory when the fast tier comes up short. A directory outage
//! degrades the answer to fast-tier results; it never fails the search.

use std::collections::HashSet;

use market_core::{Market, MarketDataError, StaticTickers, TickerDirectory};

use crate::matcher::{FuzzyMatcher, SearchCandidate};

/// Matches from the fast tier needed to skip the directory, capped by the limit
const FAST_TIER_MIN_MATCHES: usize = 3;

/// Which tiers contributed to a search answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    /// Answered from the static set alone
    Static,
    /// Static results merged with the full directory
    Directory,
}

/// Result of a two-tier search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchCandidate>,
    pub tier: SearchTier,
    /// Set when the directory was needed but could not be fetched
    pub degraded: Option<MarketDataError>,
}

impl SearchOutcome {
    fn from_static(results: Vec<SearchCandidate>) -> Self {
        Self {
            results,
            tier: SearchTier::Static,
            degraded: None,
        }
    }
}

pub struct SearchOrchestrator<S, D> {
    fast_tier: S,
    directory: D,
    matcher: FuzzyMatcher,
}

impl<S: StaticTickers, D: TickerDirectory> SearchOrchestrator<S, D> {
    pub fn new(fast_tier: S, directory: D) -> Self {
        Self {
            fast_tier,
            directory,
            matcher: FuzzyMatcher::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Search for `query`, returning at most `limit` candidates.
    pub async fn search(&self, query: &str, limit: usize, market: Option<Market>) -> SearchOutcome {
        if query.trim().is_empty() {
            return SearchOutcome::from_static(Vec::new());
        }

        let fast = self
            .matcher
            .search(query, &self.fast_tier.shared_static(), market, limit);

        if fast.len() >= limit.min(FAST_TIER_MIN_MATCHES) {
            tracing::debug!(
                "Search '{}' answered from static tier ({} matches)",
                query.trim(),
                fast.len()
            );
            return SearchOutcome::from_static(fast);
        }

        let records = match self.directory.fetch_shared().await {
            Ok(records) => records,
            Err(e) => {
                let err = match e {
                    MarketDataError::DirectoryUnavailable(_) => e,
                    other => MarketDataError::DirectoryUnavailable(other.to_string()),
                };
                tracing::warn!(
                    "Search '{}' falling back to static tier: {}",
                    query.trim(),
                    err
                );
                return SearchOutcome {
                    results: fast,
                    tier: SearchTier::Static,
                    degraded: Some(err),
                };
            }
        };

        let extra = self.matcher.search(query, &records, market, limit);
        let results = merge(fast, extra, limit);
        tracing::debug!(
            "Search '{}' merged with directory of {} records ({} matches)",
            query.trim(),
            records.len(),
            results.len()
        );

        SearchOutcome {
            results,
            tier: SearchTier::Directory,
            degraded: None,
        }
    }
}

/// Fast-tier results first, then directory results with unseen symbols.
fn merge(
    fast: Vec<SearchCandidate>,
    extra: Vec<SearchCandidate>,
    limit: usize,
) -> Vec<SearchCandidate> {
    let mut seen: HashSet<String> = fast.iter().map(|c| c.symbol.clone()).collect();
    let mut merged = fast;
    for candidate in extra {
        if merged.len() >= limit {
            break;
        }
        if seen.insert(candidate.symbol.clone()) {
            merged.push(candidate);
        }
    }
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use market_core::TickerRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Directory that records every fetch
    struct CountingDirectory {
        records: Vec<TickerRecord>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TickerDirectory for CountingDirectory {
        async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    /// Directory that must never be consulted
    struct ForbiddenDirectory;

    #[async_trait]
    impl TickerDirectory for ForbiddenDirectory {
        async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
            panic!("full directory must not be fetched");
        }
    }

    struct FailingDirectory;

    #[async_trait]
    impl TickerDirectory for FailingDirectory {
        async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
            Err(MarketDataError::ApiError("HTTP 503".to_string()))
        }
    }

    fn fast_tier() -> Vec<TickerRecord> {
        vec![
            TickerRecord::new("AAPL", "Apple Inc.", Market::Us),
            TickerRecord::new("AMZN", "Amazon.com, Inc.", Market::Us),
            TickerRecord::new("AMD", "Advanced Micro Devices, Inc.", Market::Us),
            TickerRecord::new("7203.T", "トヨタ自動車", Market::Japan)
                .with_english_name("Toyota Motor Corporation"),
        ]
    }

    fn full_directory() -> Vec<TickerRecord> {
        let mut records = fast_tier();
        records.extend(vec![
            TickerRecord::new("APLE", "Apple Hospitality REIT", Market::Us),
            TickerRecord::new("PINE", "Pineapple Energy", Market::Us),
            TickerRecord::new("7211.T", "三菱自動車工業", Market::Japan)
                .with_english_name("Mitsubishi Motors Corporation"),
            TickerRecord::new("TM", "Toyota Motor Corp ADR", Market::Us),
        ]);
        records
    }

    #[tokio::test]
    async fn test_short_circuit_skips_directory() {
        let orch = SearchOrchestrator::new(fast_tier(), ForbiddenDirectory);
        // "a" hits AAPL, AMZN and AMD in the fast tier
        let outcome = orch.search("a", 10, None).await;
        assert_eq!(outcome.tier, SearchTier::Static);
        assert!(outcome.results.len() >= 3);
        assert!(outcome.degraded.is_none());
    }

    #[tokio::test]
    async fn test_small_limit_short_circuits() {
        let orch = SearchOrchestrator::new(fast_tier(), ForbiddenDirectory);
        let outcome = orch.search("AAPL", 1, None).await;
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_fallback_merges_without_duplicates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let directory = CountingDirectory {
            records: full_directory(),
            calls: calls.clone(),
        };
        let orch = SearchOrchestrator::new(fast_tier(), directory);

        let outcome = orch.search("apple", 10, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.tier, SearchTier::Directory);

        let symbols: Vec<&str> = outcome.results.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "APLE", "PINE"]);
    }

    #[tokio::test]
    async fn test_fallback_applies_market_filter() {
        let directory = CountingDirectory {
            records: full_directory(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let orch = SearchOrchestrator::new(fast_tier(), directory);

        let outcome = orch.search("motor", 10, Some(Market::Japan)).await;
        assert_eq!(outcome.tier, SearchTier::Directory);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.market == Market::Japan));
        // fast-tier hit stays first
        assert_eq!(outcome.results[0].symbol, "7203.T");
    }

    #[tokio::test]
    async fn test_fallback_respects_limit() {
        let directory = CountingDirectory {
            records: full_directory(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let orch = SearchOrchestrator::new(fast_tier(), directory);
        let outcome = orch.search("apple", 2, None).await;
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_failure_degrades_to_fast_tier() {
        let orch = SearchOrchestrator::new(fast_tier(), FailingDirectory);
        let outcome = orch.search("apple", 10, None).await;
        assert_eq!(outcome.tier, SearchTier::Static);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].symbol, "AAPL");
        assert!(matches!(
            outcome.degraded,
            Some(MarketDataError::DirectoryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_touches_nothing() {
        let orch = SearchOrchestrator::new(fast_tier(), ForbiddenDirectory);
        let outcome = orch.search("", 10, None).await;
        assert!(outcome.results.is_empty());
        let outcome = orch.search("   ", 10, None).await;
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_exact_symbol_from_directory_tier() {
        let directory = CountingDirectory {
            records: full_directory(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let orch = SearchOrchestrator::new(fast_tier(), directory);
        let outcome = orch.search("TM", 10, None).await;
        assert_eq!(outcome.results[0].symbol, "TM");
        assert_eq!(outcome.results[0].score, 100);
    }
}
