pub mod config;
pub mod indicators;
pub mod patterns;

pub use config::DetectorConfig;
pub use patterns::structure::market_snapshot;

use tracing::{debug, info};

use common::{Candle, Pattern, PatternType, Timeframe};

use crate::patterns::{
    DoubleExtremeDetector, EngulfingDetector, Extreme, LevelBreakDetector, PinBarDetector,
    StructureDetector,
};

/// Fewest candles any detection pass will look at.
pub const MIN_CANDLES: usize = 2;

/// One independent heuristic over the most recent candles.
pub trait Detector: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Candles required before `detect` is consulted.
    fn min_candles(&self) -> usize;

    /// Inspect `candles` (oldest first, most recent last) and return a
    /// pattern completed on the last candle, if any.
    fn detect(&self, candles: &[Candle]) -> Option<Pattern>;
}

/// The fixed battery of sub-detectors. Holds no mutable state, so running
/// it twice over the same candles yields the same patterns.
pub struct PatternDetector {
    config: DetectorConfig,
    detectors: Vec<Box<dyn Detector>>,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(EngulfingDetector::new(&config)),
            Box::new(PinBarDetector::new(&config)),
            Box::new(DoubleExtremeDetector::new(&config, Extreme::Top)),
            Box::new(DoubleExtremeDetector::new(&config, Extreme::Bottom)),
            Box::new(LevelBreakDetector::new(&config)),
            Box::new(StructureDetector::new(&config)),
        ];
        for d in &detectors {
            debug!(detector = d.name(), min_candles = d.min_candles(), "Registered detector");
        }
        Self { config, detectors }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run every sub-detector over `candles`. Too few candles yields an
    /// empty list, not an error.
    pub fn detect(&self, candles: &[Candle], timeframe: Timeframe) -> Vec<Pattern> {
        if candles.len() < MIN_CANDLES {
            return Vec::new();
        }
        let symbol = candles.last().map(|c| c.symbol()).unwrap_or_default();

        let patterns: Vec<Pattern> = self
            .detectors
            .iter()
            .filter(|d| candles.len() >= d.min_candles())
            .filter_map(|d| d.detect(candles))
            .collect();

        for p in &patterns {
            if p.pattern_type == PatternType::MarketStructure {
                debug!(symbol, timeframe = %timeframe, detail = %p.detail, "Market structure");
            } else {
                info!(
                    pattern = %p.pattern_type,
                    symbol,
                    timeframe = %timeframe,
                    confidence = %p.confidence,
                    "Pattern detected"
                );
            }
        }
        debug!(symbol, timeframe = %timeframe, count = patterns.len(), "Detection pass complete");
        patterns
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
