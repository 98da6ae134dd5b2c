use std::sync::Arc;

use async_trait::async_trait;
use crate::{MarketDataError, PricePoint, TickerRecord};

/// Full ticker directory, potentially remote and slow
#[async_trait]
pub trait TickerDirectory: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError>;

    /// Shared view of the directory. Implementations that already hold the
    /// records behind an `Arc` override this to skip the copy.
    async fn fetch_shared(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
        Ok(Arc::new(self.fetch_all().await?))
    }
}

/// Small always-resident ticker set used as the fast search tier
pub trait StaticTickers: Send + Sync {
    fn fetch_static(&self) -> Vec<TickerRecord>;

    fn shared_static(&self) -> Arc<Vec<TickerRecord>> {
        Arc::new(self.fetch_static())
    }
}

/// Source of daily price history, ascending by date
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn get_price_history(&self, symbol: &str) -> Result<Vec<PricePoint>, MarketDataError>;
}

#[async_trait]
impl<T: TickerDirectory + ?Sized> TickerDirectory for Arc<T> {
    async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
        (**self).fetch_all().await
    }

    async fn fetch_shared(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
        (**self).fetch_shared().await
    }
}

#[async_trait]
impl<T: PriceHistoryProvider + ?Sized> PriceHistoryProvider for Arc<T> {
    async fn get_price_history(&self, symbol: &str) -> Result<Vec<PricePoint>, MarketDataError> {
        (**self).get_price_history(symbol).await
    }
}

impl StaticTickers for Vec<TickerRecord> {
    fn fetch_static(&self) -> Vec<TickerRecord> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Market;

    struct Fixed(Arc<Vec<TickerRecord>>);

    #[async_trait]
    impl TickerDirectory for Fixed {
        async fn fetch_all(&self) -> Result<Vec<TickerRecord>, MarketDataError> {
            Ok(self.0.as_ref().clone())
        }

        async fn fetch_shared(&self) -> Result<Arc<Vec<TickerRecord>>, MarketDataError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_arc_forwards_shared_fetch() {
        let records = Arc::new(vec![TickerRecord::new("AAPL", "Apple Inc.", Market::Us)]);
        let directory: Arc<dyn TickerDirectory> = Arc::new(Fixed(records.clone()));

        let shared = directory.fetch_shared().await.unwrap();
        assert!(Arc::ptr_eq(&shared, &records));
    }

    #[test]
    fn test_default_shared_static_copies_records() {
        let tier = vec![TickerRecord::new("7203.T", "トヨタ自動車", Market::Japan)];
        assert_eq!(tier.shared_static().as_ref(), &tier);
    }
}
