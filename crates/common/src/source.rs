use async_trait::async_trait;

use crate::{Candle, DataSource, Result, Timeframe};

/// Abstraction over where candles come from.
///
/// `LiveFeedClient` implements this against the broker REST API.
/// `SyntheticSource` fabricates a random walk.
/// `FallbackSource` combines the two so callers always receive a series.
///
/// An `Ok` with an empty vector means "no data"; an `Err` means the
/// underlying fetch failed. Callers skip analysis in both cases.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `count` candles for `symbol`, ordered oldest to newest.
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>>;

    /// Which kind of data this source currently serves.
    fn data_source(&self) -> DataSource;
}
