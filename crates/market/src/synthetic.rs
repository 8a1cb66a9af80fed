use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, warn};

use common::{Candle, CandleSource, DataSource, Result, Timeframe};

/// Scale applied to the half-normal high/low offsets.
const WICK_SCALE: f64 = 1.5;
const PRICE_DECIMALS: f64 = 100_000.0;

/// Random-walk candle generator used when no live feed is available.
///
/// Each call picks one drift direction and magnitude, then walks `count`
/// candles where every open equals the previous close.
pub struct SyntheticSource {
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generate `count` candles ending one bucket before `now`, oldest first.
    pub fn generate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        now: DateTime<Utc>,
    ) -> Vec<Candle> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let volatility = volatility(symbol);
        let drift_sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let drift = drift_sign * rng.gen_range(0.1..0.5) * volatility;

        let mut candles = Vec::with_capacity(count);
        let mut prev_close = base_price(symbol);

        for i in 0..count {
            let open = round_price(prev_close);
            let up: f64 = rng.sample::<f64, _>(StandardNormal).abs();
            let down: f64 = rng.sample::<f64, _>(StandardNormal).abs();
            let high = open + up * volatility * WICK_SCALE;
            let low = open - down * volatility * WICK_SCALE;
            let close = rng.gen_range(low..=high) + drift;

            // Widen so the extremes still bound the body after the drift.
            let high = round_price(high.max(open).max(close));
            let low = round_price(low.min(open).min(close));
            let close = round_price(close);

            let timestamp = now - timeframe.duration() * (count - i) as i32;
            let volume = rng.gen_range(1_000.0..10_000.0_f64).floor();

            match Candle::new(symbol, timestamp, open, high, low, close, Some(volume)) {
                Ok(candle) => candles.push(candle),
                Err(e) => warn!(error = %e, "Discarding inconsistent synthetic candle"),
            }
            prev_close = close;
        }

        debug!(symbol, timeframe = %timeframe, count = candles.len(), "Generated sample data");
        candles
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleSource for SyntheticSource {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>> {
        Ok(self.generate(symbol, timeframe, count, Utc::now()))
    }

    fn data_source(&self) -> DataSource {
        DataSource::Synthetic
    }
}

/// Starting price for the first synthetic candle of `symbol`.
pub fn base_price(symbol: &str) -> f64 {
    match symbol {
        "EURUSD" => 1.0850,
        "GBPUSD" => 1.2650,
        "USDJPY" => 148.50,
        "XAUUSD" => 1980.0,
        _ => 1.0850,
    }
}

/// Per-candle volatility constant. Metals move in whole units, JPY crosses
/// in hundredths, everything else in pips.
pub fn volatility(symbol: &str) -> f64 {
    if symbol.starts_with("XAU") || symbol.starts_with("XAG") {
        5.0
    } else if symbol.contains("JPY") {
        0.2
    } else {
        0.002
    }
}

fn round_price(value: f64) -> f64 {
    (value * PRICE_DECIMALS).round() / PRICE_DECIMALS
}
