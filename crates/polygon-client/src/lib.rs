use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, Utc};
use market_core::{Market, MarketDataError, PriceHistoryProvider, PricePoint, TickerDirectory, TickerRecord};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";

/// How far back price history is requested
const HISTORY_YEARS: u32 = 30;

/// Polygon ticker types included in the directory: common stock and funds
const DIRECTORY_TICKER_TYPES: &[&str] = &["CS", "ETF"];

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: std::time::Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Need to wait until the oldest request falls out of the window
            let oldest = match ts.front() {
                Some(&t) => t,
                None => continue,
            };
            let sleep_dur = (oldest + self.window).saturating_duration_since(now)
                + std::time::Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
    max_directory_size: usize,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        // Default 500 req/min for Starter plan. Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self::with_rate_limit(api_key, rate_limit)
    }

    pub fn with_rate_limit(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
            max_directory_size: 20_000,
        }
    }

    /// Cap on directory entries fetched per ticker type
    pub fn with_max_directory_size(mut self, max: usize) -> Self {
        self.max_directory_size = max;
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, MarketDataError> {
        let request = builder.build().map_err(|e| MarketDataError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| MarketDataError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await
                .map_err(|e| MarketDataError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(MarketDataError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    async fn error_for_status(response: reqwest::Response) -> MarketDataError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            MarketDataError::NotFound(body)
        } else {
            MarketDataError::ApiError(format!("HTTP {}: {}", status, body))
        }
    }

    /// Daily adjusted closes between `from` and `to`, ascending
    pub async fn get_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ])
        ).await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::ApiError(e.to_string()))?;

        closes_or_not_found(symbol, agg_response)
    }

    /// Get dividend history for a symbol
    pub async fn get_dividends(&self, symbol: &str, limit: u32) -> Result<Vec<DividendInfo>, MarketDataError> {
        let url = format!("{}/v3/reference/dividends", BASE_URL);

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("ticker", symbol),
                ("apiKey", &self.api_key as &str),
                ("limit", &limit.to_string()),
                ("order", "desc"),
            ])
        ).await?;

        if !response.status().is_success() {
            if response.status().as_u16() == 403 || response.status().as_u16() == 401 {
                return Ok(Vec::new());
            }
            return Err(Self::error_for_status(response).await);
        }

        let div_response: DividendResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::ApiError(e.to_string()))?;

        Ok(div_response.results)
    }

    /// List active tickers of one Polygon type (e.g. "CS", "ETF") as directory records.
    /// Paginates automatically. Returns up to `max_tickers` records.
    pub async fn list_ticker_records(
        &self,
        ticker_type: &str,
        max_tickers: usize,
    ) -> Result<Vec<TickerRecord>, MarketDataError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let page_limit = 1000;

        loop {
            let mut builder = self.client.get(&format!("{}/v3/reference/tickers", BASE_URL))
                .query(&[
                    ("apiKey", self.api_key.as_str()),
                    ("market", "stocks"),
                    ("active", "true"),
                    ("type", ticker_type),
                    ("limit", &page_limit.to_string()),
                    ("order", "asc"),
                    ("sort", "ticker"),
                ]);

            if let Some(ref c) = cursor {
                builder = builder.query(&[("cursor", c.as_str())]);
            }

            let response = self.send_request(builder).await?;
            if !response.status().is_success() {
                return Err(Self::error_for_status(response).await);
            }

            let body: TickerListResponse = response
                .json()
                .await
                .map_err(|e| MarketDataError::ApiError(e.to_string()))?;

            for entry in body.results {
                if let Some(record) = entry.into_record() {
                    records.push(record);
                    if records.len() >= max_tickers {
                        return Ok(records);
                    }
                }
            }

            // Follow pagination cursor
            cursor = match body.next_url {
                Some(ref next) => cursor_from_next_url(next),
                None => None,
            };
            if cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl TickerDirectory for PolygonClient {
    async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
        let mut records = Vec::new();
        for ticker_type in DIRECTORY_TICKER_TYPES {
            let batch = self
                .list_ticker_records(ticker_type, self.max_directory_size)
                .await
                .map_err(|e| MarketDataError::DirectoryUnavailable(e.to_string()))?;
            tracing::info!("Loaded {} Polygon tickers of type {}", batch.len(), ticker_type);
            records.extend(batch);
        }
        Ok(records)
    }
}

#[async_trait]
impl PriceHistoryProvider for PolygonClient {
    async fn get_price_history(&self, symbol: &str) -> Result<Vec<PricePoint>, MarketDataError> {
        ensure_listed_here(symbol)?;

        let to = Utc::now().date_naive();
        let from = to
            .checked_sub_months(Months::new(12 * HISTORY_YEARS))
            .unwrap_or(NaiveDate::MIN);

        let (closes, dividends) = tokio::join!(
            self.get_daily_closes(symbol, from, to),
            self.get_dividends(symbol, 1000),
        );
        let mut points = closes?;

        match dividends {
            Ok(divs) => attach_dividends(&mut points, &divs),
            // Dividends are informational; a failed lookup leaves them at zero
            Err(e) => tracing::warn!("Dividend lookup failed for {}: {}", symbol, e),
        }

        Ok(points)
    }
}

/// Convert aggregate bars to price points keyed by UTC trading date.
fn aggregates_to_points(results: Vec<AggregateResult>) -> Vec<PricePoint> {
    results
        .into_iter()
        .filter_map(|r| {
            let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
            Some(PricePoint::new(date, r.c))
        })
        .collect()
}

/// Polygon answers 200 with no bars for tickers it does not know.
fn closes_or_not_found(symbol: &str, response: AggregateResponse) -> Result<Vec<PricePoint>, MarketDataError> {
    let points = aggregates_to_points(response.results);
    if points.is_empty() {
        return Err(MarketDataError::NotFound(format!("no price history for {}", symbol)));
    }
    Ok(points)
}

/// Polygon only carries US listings; other markets are never requested.
fn ensure_listed_here(symbol: &str) -> Result<(), MarketDataError> {
    match Market::infer_from_symbol(symbol) {
        Market::Us => Ok(()),
        other => Err(MarketDataError::NotFound(format!(
            "no price history for {} ({} listings are not covered)",
            symbol, other
        ))),
    }
}

/// Add each dividend's cash amount to the point on its ex-dividend date.
fn attach_dividends(points: &mut [PricePoint], dividends: &[DividendInfo]) {
    let mut by_date: HashMap<NaiveDate, f64> = HashMap::new();
    for div in dividends {
        let (Some(date), Some(amount)) = (div.ex_dividend_date.as_deref(), div.cash_amount) else {
            continue;
        };
        if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            *by_date.entry(date).or_insert(0.0) += amount;
        }
    }
    for point in points.iter_mut() {
        if let Some(amount) = by_date.get(&point.date) {
            point.dividend = *amount;
        }
    }
}

/// Extract the `cursor` query parameter from Polygon's `next_url`.
fn cursor_from_next_url(next_url: &str) -> Option<String> {
    next_url
        .split("cursor=")
        .nth(1)
        .map(|s| s.split('&').next().unwrap_or(s).to_string())
        .filter(|c| !c.is_empty())
}

// Ticker list response
#[derive(Debug, Deserialize)]
struct TickerListResponse {
    #[serde(default)]
    results: Vec<TickerListEntry>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerListEntry {
    ticker: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    locale: Option<String>,
}

impl TickerListEntry {
    /// Directory record for a US listing; entries without a usable name or
    /// symbol are skipped.
    fn into_record(self) -> Option<TickerRecord> {
        if self.ticker.is_empty() || self.ticker.contains('/') {
            return None;
        }
        if self.locale.as_deref().is_some_and(|l| !l.eq_ignore_ascii_case("us")) {
            return None;
        }
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let market = Market::infer_from_symbol(&self.ticker);
        Some(TickerRecord::new(self.ticker, name, market))
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    c: f64, // close
}

// Dividend types
#[derive(Debug, Deserialize)]
struct DividendResponse {
    #[serde(default)]
    results: Vec<DividendInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendInfo {
    pub cash_amount: Option<f64>,
    pub ex_dividend_date: Option<String>,
    pub pay_date: Option<String>,
    pub declaration_date: Option<String>,
    pub frequency: Option<i32>,
    #[serde(default)]
    pub dividend_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_extraction() {
        let next = "https://api.polygon.io/v3/reference/tickers?cursor=YWN0aXZl&limit=1000";
        assert_eq!(cursor_from_next_url(next), Some("YWN0aXZl".to_string()));
        assert_eq!(cursor_from_next_url("https://api.polygon.io/v3/reference/tickers"), None);
        assert_eq!(cursor_from_next_url("https://x?cursor=&limit=1"), None);
    }

    #[test]
    fn test_ticker_entries_to_records() {
        let body: TickerListResponse = serde_json::from_str(
            r#"{
                "results": [
                    {"ticker": "AAPL", "name": "Apple Inc.", "locale": "us", "type": "CS"},
                    {"ticker": "NONAME", "locale": "us"},
                    {"ticker": "X:BTCUSD", "name": "Bitcoin", "locale": "global"},
                    {"ticker": "SPY", "name": "SPDR S&P 500 ETF Trust", "locale": "us"}
                ],
                "next_url": null
            }"#,
        )
        .unwrap();

        let records: Vec<TickerRecord> = body
            .results
            .into_iter()
            .filter_map(TickerListEntry::into_record)
            .collect();
        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "SPY"]);
        assert!(records.iter().all(|r| r.market == Market::Us));
    }

    #[test]
    fn test_aggregates_to_points() {
        let body: AggregateResponse = serde_json::from_str(
            r#"{"results": [
                {"t": 1704171600000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 185.64, "v": 1.0},
                {"t": 1704258000000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 184.25, "v": 1.0}
            ]}"#,
        )
        .unwrap();
        let points = aggregates_to_points(body.results);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[1].close, 184.25);
        assert!(points.iter().all(|p| p.dividend == 0.0));
    }

    #[test]
    fn test_empty_aggregates_are_not_found() {
        let body: AggregateResponse =
            serde_json::from_str(r#"{"ticker": "ZZZZQ", "resultsCount": 0, "status": "OK"}"#).unwrap();
        assert!(body.results.is_empty());
        assert!(matches!(
            closes_or_not_found("ZZZZQ", body),
            Err(MarketDataError::NotFound(_))
        ));

        let body: AggregateResponse =
            serde_json::from_str(r#"{"results": [{"t": 1704171600000, "c": 185.64}]}"#).unwrap();
        assert_eq!(closes_or_not_found("AAPL", body).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tokyo_symbols_not_found_without_request() {
        // Rejected before any request is sent
        let client = PolygonClient::with_rate_limit("test".to_string(), 1);
        let err = client.get_price_history("7203.T").await.unwrap_err();
        assert!(matches!(err, MarketDataError::NotFound(_)));
        assert!(ensure_listed_here("AAPL").is_ok());
    }

    #[test]
    fn test_attach_dividends_by_ex_date() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let mut points = vec![
            PricePoint::new(d(8), 188.0),
            PricePoint::new(d(9), 189.0),
            PricePoint::new(d(12), 187.0),
        ];
        let dividends = vec![
            DividendInfo {
                cash_amount: Some(0.24),
                ex_dividend_date: Some("2024-02-09".to_string()),
                pay_date: None,
                declaration_date: None,
                frequency: Some(4),
                dividend_type: Some("CD".to_string()),
            },
            DividendInfo {
                cash_amount: None,
                ex_dividend_date: Some("2024-02-12".to_string()),
                pay_date: None,
                declaration_date: None,
                frequency: None,
                dividend_type: None,
            },
        ];
        attach_dividends(&mut points, &dividends);
        assert_eq!(points[0].dividend, 0.0);
        assert_eq!(points[1].dividend, 0.24);
        assert_eq!(points[2].dividend, 0.0);
    }

    #[tokio::test]
    async fn test_rate_limiter_admits_up_to_max() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire())
                .await
                .expect("slot should be free");
        }
        let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(blocked.is_err());
    }
}
