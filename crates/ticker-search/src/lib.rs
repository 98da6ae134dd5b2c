//! Ticker search: staged fuzzy matching over the ticker directory with a
//! two-tier (static, then full directory) lookup.

pub mod builtin;
pub mod matcher;
pub mod orchestrator;

pub use builtin::{builtin_tickers, builtin_tickers_for, logo_url, BuiltinTickers};
pub use matcher::{FuzzyMatcher, MatchScores, SearchCandidate};
pub use orchestrator::{SearchOrchestrator, SearchOutcome, SearchTier};
