//! Fuzzy Ticker Matcher
//!
//! Ranks directory entries against a free-text query. Each record is tested
//! against a fixed ladder of match rules over its symbol and name fields and
//! keeps the best score it earns:
//!
//! | rule                       | score |
//! |----------------------------|-------|
//! | symbol equals query        | 100   |
//! | a name equals query        | 100   |
//! | a name starts with query   | 90    |
//! | symbol contains query      | 90    |
//! | a name contains query      | 80    |
//!
//! Comparisons are case-insensitive. Results are ordered by score with a
//! stable sort, so equal scores keep the directory's scan order.

use std::collections::HashMap;

use market_core::{Market, TickerRecord};
use serde::{Deserialize, Serialize};

use crate::builtin::logo_url;

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub symbol: String,
    /// Display name (localized name, falling back to English name, then symbol)
    pub name: String,
    pub score: u8,
    pub market: Market,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Score awarded per match rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScores {
    pub symbol_exact: u8,
    pub name_exact: u8,
    pub name_prefix: u8,
    pub symbol_contains: u8,
    pub name_contains: u8,
}

impl Default for MatchScores {
    fn default() -> Self {
        Self {
            symbol_exact: 100,
            name_exact: 100,
            name_prefix: 90,
            symbol_contains: 90,
            name_contains: 80,
        }
    }
}

/// Staged exact/prefix/substring matcher
#[derive(Debug, Clone, Default)]
pub struct FuzzyMatcher {
    scores: MatchScores,
}

impl FuzzyMatcher {
    /// Create a matcher with the default scoring scheme
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matcher with custom scores
    pub fn with_scores(scores: MatchScores) -> Self {
        Self { scores }
    }

    /// Rank `records` against `query`.
    ///
    /// Returns at most `limit` candidates, highest score first, one per
    /// symbol. A blank query yields an empty list; rejecting it is the
    /// caller's job.
    pub fn search(
        &self,
        query: &str,
        records: &[TickerRecord],
        market: Option<Market>,
        limit: usize,
    ) -> Vec<SearchCandidate> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let mut candidates: Vec<SearchCandidate> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in records {
            let Some(score) = self.score(&needle, record) else {
                continue;
            };

            match positions.get(&record.symbol) {
                // Duplicate symbol: keep the first position, upgrade the score
                Some(&idx) => {
                    if score > candidates[idx].score {
                        candidates[idx] = Self::candidate(record, score);
                    }
                }
                None => {
                    positions.insert(record.symbol.clone(), candidates.len());
                    candidates.push(Self::candidate(record, score));
                }
            }
        }

        // Vec::sort_by is stable: equal scores keep scan order
        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        if let Some(m) = market {
            candidates.retain(|c| c.market == m);
        }
        candidates.truncate(limit);
        candidates
    }

    /// Best score `record` earns against the lowercased needle, if any.
    fn score(&self, needle: &str, record: &TickerRecord) -> Option<u8> {
        let s = &self.scores;
        let symbol = record.symbol.to_lowercase();
        let names: Vec<String> = record.name_fields().map(str::to_lowercase).collect();

        let mut best: Option<u8> = None;
        let mut award = |points: u8| {
            best = Some(best.map_or(points, |b| b.max(points)));
        };

        if symbol == needle {
            award(s.symbol_exact);
        }
        if names.iter().any(|n| n == needle) {
            award(s.name_exact);
        }
        if names.iter().any(|n| n.starts_with(needle)) {
            award(s.name_prefix);
        }
        if symbol.contains(needle) {
            award(s.symbol_contains);
        }
        if names.iter().any(|n| n.contains(needle)) {
            award(s.name_contains);
        }

        best
    }

    fn candidate(record: &TickerRecord, score: u8) -> SearchCandidate {
        let name = record
            .name_fields()
            .next()
            .unwrap_or(record.symbol.as_str())
            .to_string();
        SearchCandidate {
            symbol: record.symbol.clone(),
            name,
            score,
            market: record.market,
            logo_url: logo_url(&record.symbol).map(str::to_string),
        }
    }
}
