use common::{Candle, Direction, Pattern, PatternDetail, PatternType};

use crate::{Detector, DetectorConfig};

const BASE_CONFIDENCE: f64 = 72.0;
const VOLUME_BONUS: f64 = 10.0;

/// Close beyond the recent resistance (max high) or support (min low),
/// with the breaching wick still close to the level.
#[derive(Debug, Clone)]
pub struct LevelBreakDetector {
    lookback: usize,
    proximity: f64,
    volume_factor: f64,
}

impl LevelBreakDetector {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self {
            lookback: cfg.level_lookback,
            proximity: cfg.level_proximity,
            volume_factor: cfg.level_volume_factor,
        }
    }
}

/// Current volume over the window average, when every candle carries volume.
fn volume_ratio(window: &[Candle], cur: &Candle) -> Option<f64> {
    let cur_vol = cur.volume()?;
    let total: f64 = window.iter().map(Candle::volume).sum::<Option<f64>>()?;
    let avg = total / window.len() as f64;
    (avg > 0.0).then(|| cur_vol / avg)
}

impl Detector for LevelBreakDetector {
    fn name(&self) -> &'static str {
        "level_break"
    }

    fn min_candles(&self) -> usize {
        self.lookback + 1
    }

    fn detect(&self, candles: &[Candle]) -> Option<Pattern> {
        let (cur, history) = candles.split_last()?;
        if history.len() < self.lookback {
            return None;
        }
        let window = &history[history.len() - self.lookback..];

        let resistance = window.iter().map(Candle::high).reduce(f64::max)?;
        let support = window.iter().map(Candle::low).reduce(f64::min)?;

        let (pattern_type, direction, level) = if cur.close() > resistance
            && resistance > 0.0
            && (cur.high() - resistance) / resistance <= self.proximity
        {
            (PatternType::ResistanceBreak, Direction::Buy, resistance)
        } else if cur.close() < support
            && support > 0.0
            && (support - cur.low()) / support <= self.proximity
        {
            (PatternType::SupportBreak, Direction::Sell, support)
        } else {
            return None;
        };

        let volume_ratio = volume_ratio(window, cur);
        let mut confidence = BASE_CONFIDENCE;
        if volume_ratio.is_some_and(|v| v >= self.volume_factor) {
            confidence += VOLUME_BONUS;
        }

        Some(Pattern::new(
            pattern_type,
            direction,
            confidence,
            cur.timestamp(),
            PatternDetail::LevelBreak { level, volume_ratio },
        ))
    }
}
