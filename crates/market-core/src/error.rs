use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Invalid query: search text must contain at least one character")]
    InvalidQuery,

    #[error("Insufficient history: {points} price point(s), at least 2 required")]
    InsufficientHistory { points: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Ticker directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Data quality error: {0}")]
    DataQuality(String),

    #[error("Simulation aborted before all runs completed")]
    Aborted,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),
}
