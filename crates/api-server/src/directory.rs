//! Ticker Directory Snapshot
//!
//! The full directory is expensive to fetch, so the server keeps one shared
//! snapshot with a TTL. Readers clone the `Arc`; a refresh fetches without
//! holding the snapshot lock and only takes the write lock to swap the new
//! list in, so searches and health checks never wait on the provider.
//!
//! At most one refresh runs at a time. While it is in flight, readers of an
//! expired snapshot get the stale list immediately; only a cold cache waits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use market_core::{MarketDataError, TickerDirectory, TickerRecord};
use tokio::sync::{Mutex, RwLock};

#[derive(Clone)]
struct Snapshot {
    records: Arc<Vec<TickerRecord>>,
    loaded_at: Instant,
}

/// TTL-bound snapshot over a slow directory source
pub struct DirectoryCache {
    source: Arc<dyn TickerDirectory>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: Mutex<()>,
}

impl DirectoryCache {
    pub fn new(source: Arc<dyn TickerDirectory>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    async fn current(&self) -> Option<Snapshot> {
        self.snapshot.read().await.clone()
    }

    fn is_fresh(&self, snap: &Snapshot) -> bool {
        snap.loaded_at.elapsed() < self.ttl
    }

    /// Fetch from the source with no snapshot lock held, then swap.
    /// Callers hold the refresh mutex.
    async fn fetch_and_swap(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
        let records = Arc::new(self.source.fetch_all().await?);
        *self.snapshot.write().await = Some(Snapshot {
            records: records.clone(),
            loaded_at: Instant::now(),
        });
        tracing::info!("Ticker directory loaded: {} records", records.len());
        Ok(records)
    }

    /// Current snapshot, fetching from the source when missing or expired.
    ///
    /// An expired snapshot is returned as-is when another refresh is already
    /// running or when this refresh fails.
    pub async fn snapshot(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
        match self.current().await {
            Some(snap) if self.is_fresh(&snap) => Ok(snap.records),
            Some(stale) => {
                let Ok(_refresh) = self.refresh.try_lock() else {
                    return Ok(stale.records);
                };
                // A refresh may have completed between the read and the lock
                if let Some(snap) = self.current().await.filter(|s| self.is_fresh(s)) {
                    return Ok(snap.records);
                }
                match self.fetch_and_swap().await {
                    Ok(records) => Ok(records),
                    Err(e) => {
                        tracing::warn!(
                            "Ticker directory refresh failed, serving snapshot aged {}s: {}",
                            stale.loaded_at.elapsed().as_secs(),
                            e
                        );
                        Ok(stale.records)
                    }
                }
            }
            None => {
                let _refresh = self.refresh.lock().await;
                if let Some(snap) = self.current().await {
                    return Ok(snap.records);
                }
                self.fetch_and_swap().await
            }
        }
    }

    /// Fetch a fresh directory and swap it in, returning its size.
    ///
    /// The previous snapshot keeps serving until the new one is ready, and
    /// stays in place if the fetch fails.
    pub async fn reload(&self) -> Result<usize, MarketDataError> {
        let _refresh = self.refresh.lock().await;
        let records = self.fetch_and_swap().await?;
        Ok(records.len())
    }

    /// Record count and age of the current snapshot, if any
    pub async fn status(&self) -> Option<(usize, Duration)> {
        self.current()
            .await
            .map(|s| (s.records.len(), s.loaded_at.elapsed()))
    }
}

#[async_trait]
impl TickerDirectory for DirectoryCache {
    async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
        Ok(self.snapshot().await?.as_ref().clone())
    }

    async fn fetch_shared(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
        self.snapshot().await
    }
}

/// Provider directory extended with records the provider does not list
/// (the provider only covers US markets).
pub struct MarketDirectory<D> {
    provider: D,
    extra: Vec<TickerRecord>,
}

impl<D: TickerDirectory> MarketDirectory<D> {
    pub fn new(provider: D, extra: Vec<TickerRecord>) -> Self {
        Self { provider, extra }
    }
}

#[async_trait]
impl<D: TickerDirectory> TickerDirectory for MarketDirectory<D> {
    async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
        let mut records = self.provider.fetch_all().await?;
        records.extend(self.extra.iter().cloned());
        Ok(records)
    }
}
