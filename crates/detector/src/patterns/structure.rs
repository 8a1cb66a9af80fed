use common::{Candle, Direction, MarketSnapshot, Pattern, PatternDetail, PatternType, Trend};

use crate::indicators::SmaIndicator;
use crate::{Detector, DetectorConfig};

const STRONG_CONFIDENCE: f64 = 65.0;
const WEAK_CONFIDENCE: f64 = 55.0;
const SIDEWAYS_CONFIDENCE: f64 = 40.0;
/// Added when the latest sweep points the same way as the trend.
const SWEEP_BONUS: f64 = 15.0;

/// Compare the short and long SMA of `closes`. Returns the trend and both
/// averages, or `None` with fewer closes than the long period.
pub fn classify_trend(closes: &[f64], cfg: &DetectorConfig) -> Option<(Trend, f64, f64)> {
    let short = SmaIndicator::new(cfg.structure_short_period).compute(closes)?;
    let long = SmaIndicator::new(cfg.structure_long_period).compute(closes)?;
    if long <= 0.0 {
        return None;
    }

    let spread = (short - long) / long;
    let trend = if spread > cfg.structure_strong_tolerance {
        Trend::StrongUp
    } else if spread > cfg.structure_tolerance {
        Trend::WeakUp
    } else if spread < -cfg.structure_strong_tolerance {
        Trend::StrongDown
    } else if spread < -cfg.structure_tolerance {
        Trend::WeakDown
    } else {
        Trend::Sideways
    };
    Some((trend, short, long))
}

/// False breakout on the latest candle: it pierces the previous extreme
/// but closes back the other way.
pub fn liquidity_sweep(prev: &Candle, cur: &Candle) -> Option<Direction> {
    if cur.high() > prev.high() && cur.is_bearish() {
        Some(Direction::Sell)
    } else if cur.low() < prev.low() && cur.is_bullish() {
        Some(Direction::Buy)
    } else {
        None
    }
}

/// Trend plus support/resistance over the recent window, attached to signals.
pub fn market_snapshot(candles: &[Candle], cfg: &DetectorConfig) -> Option<MarketSnapshot> {
    let closes: Vec<f64> = candles.iter().map(Candle::close).collect();
    let (trend, _, _) = classify_trend(&closes, cfg)?;

    let recent = &candles[candles.len().saturating_sub(cfg.snapshot_window)..];
    let support = recent.iter().map(Candle::low).reduce(f64::min)?;
    let resistance = recent.iter().map(Candle::high).reduce(f64::max)?;
    Some(MarketSnapshot { trend, support, resistance })
}

/// Always reports a coarse trend once enough candles exist. The record is
/// context for logging and never reaches signal admission.
#[derive(Debug, Clone)]
pub struct StructureDetector {
    config: DetectorConfig,
}

impl StructureDetector {
    pub fn new(cfg: &DetectorConfig) -> Self {
        Self { config: cfg.clone() }
    }
}

impl Detector for StructureDetector {
    fn name(&self) -> &'static str {
        "market_structure"
    }

    fn min_candles(&self) -> usize {
        self.config.structure_long_period
    }

    fn detect(&self, candles: &[Candle]) -> Option<Pattern> {
        let closes: Vec<f64> = candles.iter().map(Candle::close).collect();
        let (trend, short_sma, long_sma) = classify_trend(&closes, &self.config)?;

        let sweep = match candles {
            [.., prev, cur] => liquidity_sweep(prev, cur),
            _ => None,
        };

        let mut confidence = match trend {
            Trend::StrongUp | Trend::StrongDown => STRONG_CONFIDENCE,
            Trend::WeakUp | Trend::WeakDown => WEAK_CONFIDENCE,
            Trend::Sideways => SIDEWAYS_CONFIDENCE,
        };
        let direction = trend.direction();
        if direction != Direction::Neutral && sweep == Some(direction) {
            confidence += SWEEP_BONUS;
        }

        let last = candles.last()?;
        Some(Pattern::new(
            PatternType::MarketStructure,
            direction,
            confidence,
            last.timestamp(),
            PatternDetail::Structure { trend, short_sma, long_sma, sweep },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candle, from_closes};

    fn cfg() -> DetectorConfig {
        DetectorConfig::default()
    }

    fn rising(step: f64) -> Vec<f64> {
        (0..12).map(|i| 1.0800 + i as f64 * step).collect()
    }

    #[test]
    fn classifies_trend_strength() {
        let cfg = cfg();
        // SMA5 leads SMA10 by 2.5 steps: ~0.46% for 0.0020, ~0.14% for 0.0006
        assert_eq!(classify_trend(&rising(0.0020), &cfg).unwrap().0, Trend::StrongUp);
        assert_eq!(classify_trend(&rising(0.0006), &cfg).unwrap().0, Trend::WeakUp);
        assert_eq!(classify_trend(&rising(-0.0020), &cfg).unwrap().0, Trend::StrongDown);
        assert_eq!(classify_trend(&rising(-0.0006), &cfg).unwrap().0, Trend::WeakDown);
        assert_eq!(classify_trend(&[1.08; 12], &cfg).unwrap().0, Trend::Sideways);
    }

    #[test]
    fn too_few_closes_has_no_trend() {
        assert!(classify_trend(&[1.08; 9], &cfg()).is_none());
    }

    #[test]
    fn sweep_detection() {
        let prev = candle(0, 1.0840, 1.0850, 1.0830, 1.0845);
        let swept_high = candle(1, 1.0848, 1.0856, 1.0835, 1.0838);
        let swept_low = candle(1, 1.0835, 1.0846, 1.0825, 1.0844);
        let inside = candle(1, 1.0840, 1.0848, 1.0832, 1.0845);
        assert_eq!(liquidity_sweep(&prev, &swept_high), Some(Direction::Sell));
        assert_eq!(liquidity_sweep(&prev, &swept_low), Some(Direction::Buy));
        assert_eq!(liquidity_sweep(&prev, &inside), None);
    }

    #[test]
    fn sideways_structure_stays_below_alert_threshold() {
        let candles = from_closes(&[1.08; 12]);
        let p = StructureDetector::new(&cfg()).detect(&candles).unwrap();
        assert_eq!(p.pattern_type, PatternType::MarketStructure);
        assert_eq!(p.direction, Direction::Neutral);
        assert_eq!(p.confidence.value(), 40.0);
    }

    #[test]
    fn aligned_sweep_boosts_confidence() {
        let mut candles = from_closes(&rising(0.0020));
        let prev_high = candles.last().unwrap().high();
        let prev_low = candles.last().unwrap().low();
        // dips under the previous low and closes up: bullish sweep in an uptrend
        candles.push(candle(12, prev_low + 0.0002, prev_high, prev_low - 0.0005, prev_low + 0.0008));
        let p = StructureDetector::new(&cfg()).detect(&candles).unwrap();
        assert_eq!(p.direction, Direction::Buy);
        assert_eq!(p.confidence.value(), 80.0);
    }

    #[test]
    fn snapshot_reports_recent_levels() {
        let candles = from_closes(&rising(0.0020));
        let snap = market_snapshot(&candles, &cfg()).unwrap();
        assert_eq!(snap.trend, Trend::StrongUp);
        assert!(snap.support < snap.resistance);
        assert_eq!(snap.resistance, candles.last().unwrap().high());
    }
}
