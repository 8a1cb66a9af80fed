use common::{Candle, Direction, Pattern, PatternDetail, PatternType};

use super::MAX_CONFIDENCE;
use crate::{Detector, DetectorConfig};

const BASE_CONFIDENCE: f64 = 70.0;
/// Confidence points per unit of body ratio above the minimum.
const RATIO_WEIGHT: f64 = 40.0;
/// Confidence points per unit of volume ratio above 1.0.
const VOLUME_WEIGHT: f64 = 10.0;

/// Two-candle reversal: the current body strictly contains the previous,
/// opposite-coloured body and is meaningfully larger.
#[derive(Debug, Clone)]
pub struct EngulfingDetector {
    min_body_ratio: f64,
    volume_cap: f64,
}

impl EngulfingDetector {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            min_body_ratio: cfg.engulfing_min_body_ratio,
            volume_cap: cfg.engulfing_volume_cap,
        }
    }
}

impl Detector for EngulfingDetector {
    fn name(&self) -> &'static str {
        "engulfing"
    }

    fn min_candles(&self) -> usize {
        2
    }

    fn detect(&self, candles: &[Candle]) -> Option<Pattern> {
        let [.., prev, cur] = candles else {
            return None;
        };

        let bullish = cur.is_bullish()
            && prev.is_bearish()
            && cur.open() <= prev.close()
            && cur.close() >= prev.open();
        let bearish = cur.is_bearish()
            && prev.is_bullish()
            && cur.open() >= prev.close()
            && cur.close() <= prev.open();

        let (pattern_type, direction) = if bullish {
            (PatternType::BullishEngulfing, Direction::Buy)
        } else if bearish {
            (PatternType::BearishEngulfing, Direction::Sell)
        } else {
            return None;
        };

        // prev is strictly bullish or bearish here, so its body is non-zero.
        let body_ratio = cur.body() / prev.body();
        if body_ratio < self.min_body_ratio {
            return None;
        }

        let volume_ratio = match (cur.volume(), prev.volume()) {
            (Some(cur_vol), Some(prev_vol)) if prev_vol > 0.0 => {
                Some((cur_vol / prev_vol).min(self.volume_cap))
            }
            _ => None,
        };

        let mut confidence = BASE_CONFIDENCE + (body_ratio - self.min_body_ratio) * RATIO_WEIGHT;
        if let Some(v) = volume_ratio.filter(|v| *v > 1.0) {
            confidence += (v - 1.0) * VOLUME_WEIGHT;
        }

        Some(Pattern::new(
            pattern_type,
            direction,
            confidence.min(MAX_CONFIDENCE),
            cur.timestamp(),
            PatternDetail::Engulfing { body_ratio, volume_ratio },
        ))
    }
}
