use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use common::{Candle, CandleSource, DataSource, Result, Timeframe};

use crate::SyntheticSource;

/// Live feed with transparent fallback to synthetic data.
///
/// Any failure or empty answer from the live source is logged and replaced
/// by a generated series, so callers always receive usable candles.
pub struct FallbackSource {
    live: Option<Arc<dyn CandleSource>>,
    synthetic: SyntheticSource,
}

impl FallbackSource {
    pub fn new(live: Option<Arc<dyn CandleSource>>, synthetic: SyntheticSource) -> Self {
        Self { live, synthetic }
    }
}

#[async_trait]
impl CandleSource for FallbackSource {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>> {
        if let Some(live) = &self.live {
            match live.fetch(symbol, timeframe, count).await {
                Ok(candles) if !candles.is_empty() => return Ok(candles),
                Ok(_) => {
                    warn!(symbol, timeframe = %timeframe, "No live data, falling back to sample data");
                }
                Err(e) => {
                    warn!(symbol, timeframe = %timeframe, error = %e, "Live feed failed, falling back to sample data");
                }
            }
        }
        Ok(self.synthetic.generate(symbol, timeframe, count, Utc::now()))
    }

    fn data_source(&self) -> DataSource {
        match &self.live {
            Some(live) => live.data_source(),
            None => DataSource::Synthetic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;

    struct FailingFeed;

    #[async_trait]
    impl CandleSource for FailingFeed {
        async fn fetch(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            Err(Error::Http("connection refused".into()))
        }

        fn data_source(&self) -> DataSource {
            DataSource::Live
        }
    }

    struct EmptyFeed;

    #[async_trait]
    impl CandleSource for EmptyFeed {
        async fn fetch(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }

        fn data_source(&self) -> DataSource {
            DataSource::Live
        }
    }

    struct FixedFeed;

    #[async_trait]
    impl CandleSource for FixedFeed {
        async fn fetch(&self, symbol: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            Ok(vec![Candle::new(symbol, Utc::now(), 2.0, 2.5, 1.5, 2.2, None)?])
        }

        fn data_source(&self) -> DataSource {
            DataSource::Live
        }
    }

    #[tokio::test]
    async fn failing_feed_falls_back_to_synthetic() {
        let source = FallbackSource::new(Some(Arc::new(FailingFeed)), SyntheticSource::seeded(3));
        let candles = source.fetch("EURUSD", Timeframe::M5, 40).await.unwrap();
        assert_eq!(candles.len(), 40);
    }

    #[tokio::test]
    async fn empty_feed_falls_back_to_synthetic() {
        let source = FallbackSource::new(Some(Arc::new(EmptyFeed)), SyntheticSource::seeded(3));
        let candles = source.fetch("XAUUSD", Timeframe::M15, 25).await.unwrap();
        assert_eq!(candles.len(), 25);
    }

    #[tokio::test]
    async fn live_data_passes_through() {
        let source = FallbackSource::new(Some(Arc::new(FixedFeed)), SyntheticSource::seeded(3));
        let candles = source.fetch("GBPUSD", Timeframe::M5, 40).await.unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close(), 2.2);
        assert_eq!(source.data_source(), DataSource::Live);
    }

    #[tokio::test]
    async fn without_live_feed_reports_sample_source() {
        let source = FallbackSource::new(None, SyntheticSource::seeded(3));
        assert_eq!(source.data_source(), DataSource::Synthetic);
        assert_eq!(source.fetch("EURUSD", Timeframe::M1, 5).await.unwrap().len(), 5);
    }
}
