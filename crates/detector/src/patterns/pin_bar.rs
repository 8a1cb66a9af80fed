use common::{Candle, Direction, Pattern, PatternDetail, PatternType};

use super::MAX_CONFIDENCE;
use crate::{Detector, DetectorConfig};

const BASE_CONFIDENCE: f64 = 75.0;
const EXTREME_BONUS: f64 = 10.0;

/// Single-candle rejection: a small body with one dominant wick.
#[derive(Debug, Clone)]
pub struct PinBarDetector {
    max_body_ratio: f64,
    min_wick_ratio: f64,
    wick_dominance: f64,
    extreme_lookback: usize,
    extreme_tolerance: f64,
}

impl PinBarDetector {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            max_body_ratio: cfg.pin_max_body_ratio,
            min_wick_ratio: cfg.pin_min_wick_ratio,
            wick_dominance: cfg.pin_wick_dominance,
            extreme_lookback: cfg.pin_extreme_lookback,
            extreme_tolerance: cfg.pin_extreme_tolerance,
        }
    }

    /// Candles preceding the last one, bounded by the lookback.
    fn prior<'a>(&self, candles: &'a [Candle]) -> &'a [Candle] {
        let end = candles.len().saturating_sub(1);
        &candles[end.saturating_sub(self.extreme_lookback)..end]
    }

    fn near_high(&self, candles: &[Candle], cur: &Candle) -> bool {
        self.prior(candles)
            .iter()
            .map(Candle::high)
            .reduce(f64::max)
            .is_some_and(|h| cur.high() >= h * (1.0 - self.extreme_tolerance))
    }

    fn near_low(&self, candles: &[Candle], cur: &Candle) -> bool {
        self.prior(candles)
            .iter()
            .map(Candle::low)
            .reduce(f64::min)
            .is_some_and(|l| cur.low() <= l * (1.0 + self.extreme_tolerance))
    }
}

impl Detector for PinBarDetector {
    fn name(&self) -> &'static str {
        "pin_bar"
    }

    fn min_candles(&self) -> usize {
        1
    }

    fn detect(&self, candles: &[Candle]) -> Option<Pattern> {
        let cur = candles.last()?;
        let range = cur.range();
        if range <= 0.0 || cur.body() / range >= self.max_body_ratio {
            return None;
        }

        let upper = cur.upper_wick();
        let lower = cur.lower_wick();

        let (pattern_type, direction, wick, near_extreme) =
            if upper / range > self.min_wick_ratio && upper >= self.wick_dominance * lower {
                (PatternType::BearishPinbar, Direction::Sell, upper, self.near_high(candles, cur))
            } else if lower / range > self.min_wick_ratio && lower >= self.wick_dominance * upper {
                (PatternType::BullishPinbar, Direction::Buy, lower, self.near_low(candles, cur))
            } else {
                return None;
            };

        let mut confidence = BASE_CONFIDENCE;
        if near_extreme {
            confidence += EXTREME_BONUS;
        }

        Some(Pattern::new(
            pattern_type,
            direction,
            confidence.min(MAX_CONFIDENCE),
            cur.timestamp(),
            PatternDetail::PinBar { wick_ratio: wick / range, near_extreme },
        ))
    }
}
