use common::{Candle, Direction, Pattern, PatternDetail, PatternType};

use crate::{Detector, DetectorConfig};

const BASE_CONFIDENCE: f64 = 72.0;
/// Points added per extra multiple of the minimum depth.
const DEPTH_WEIGHT: f64 = 5.0;
const MAX_CONFIDENCE: f64 = 90.0;

/// Which side of the range the two extremes sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Top,
    Bottom,
}

/// Two comparable peaks (or troughs) a few candles apart with a meaningful
/// retracement between them. The second extreme must be recent, otherwise
/// one formation would keep firing while it scrolls through the window.
#[derive(Debug, Clone)]
pub struct DoubleExtremeDetector {
    extreme: Extreme,
    window: usize,
    min_spacing: usize,
    max_spacing: usize,
    tolerance: f64,
    min_depth: f64,
    max_age: usize,
}

impl DoubleExtremeDetector {
    pub fn new(cfg: &DetectorConfig, extreme: Extreme) -> Self {
        Self {
            extreme,
            window: cfg.double_window,
            min_spacing: cfg.double_min_spacing,
            max_spacing: cfg.double_max_spacing,
            tolerance: cfg.double_tolerance,
            min_depth: cfg.double_min_depth,
            max_age: cfg.double_max_age,
        }
    }

    /// Price the extreme is measured on: highs for tops, lows for bottoms.
    fn value(&self, c: &Candle) -> f64 {
        match self.extreme {
            Extreme::Top => c.high(),
            Extreme::Bottom => c.low(),
        }
    }

    /// Whether `a` is at least as extreme as `b`.
    fn dominates(&self, a: f64, b: f64) -> bool {
        match self.extreme {
            Extreme::Top => a >= b,
            Extreme::Bottom => a <= b,
        }
    }

    /// Indices of interior candles that are local extremes of the window.
    fn turning_points(&self, window: &[Candle]) -> Vec<usize> {
        (1..window.len().saturating_sub(1))
            .filter(|&k| {
                let v = self.value(&window[k]);
                self.dominates(v, self.value(&window[k - 1]))
                    && self.dominates(v, self.value(&window[k + 1]))
            })
            .collect()
    }

    /// Opposite extreme strictly between the two turning points.
    fn neckline(&self, between: &[Candle]) -> Option<f64> {
        match self.extreme {
            Extreme::Top => between.iter().map(Candle::low).reduce(f64::min),
            Extreme::Bottom => between.iter().map(Candle::high).reduce(f64::max),
        }
    }
}

impl Detector for DoubleExtremeDetector {
    fn name(&self) -> &'static str {
        match self.extreme {
            Extreme::Top => "double_top",
            Extreme::Bottom => "double_bottom",
        }
    }

    fn min_candles(&self) -> usize {
        self.min_spacing + 4
    }

    fn detect(&self, candles: &[Candle]) -> Option<Pattern> {
        let start = candles.len().saturating_sub(self.window);
        let window = &candles[start..];
        let points = self.turning_points(window);

        // Most recent pair first.
        for (j, &second) in points.iter().enumerate().rev() {
            if window.len() - 1 - second > self.max_age {
                break;
            }
            for &first in points[..j].iter().rev() {
                let spacing = second - first;
                if spacing < self.min_spacing {
                    continue;
                }
                if spacing > self.max_spacing {
                    break;
                }

                let a = self.value(&window[first]);
                let b = self.value(&window[second]);
                let outer = match self.extreme {
                    Extreme::Top => a.max(b),
                    Extreme::Bottom => a.min(b),
                };
                if outer <= 0.0 || (a - b).abs() / outer > self.tolerance {
                    continue;
                }

                let Some(neckline) = self.neckline(&window[first + 1..second]) else {
                    continue;
                };
                let depth = match self.extreme {
                    Extreme::Top => (a.min(b) - neckline) / a.min(b),
                    Extreme::Bottom => (neckline - a.max(b)) / a.max(b),
                };
                if depth < self.min_depth {
                    continue;
                }

                let confidence =
                    (BASE_CONFIDENCE + (depth / self.min_depth - 1.0) * DEPTH_WEIGHT).min(MAX_CONFIDENCE);
                let (pattern_type, direction) = match self.extreme {
                    Extreme::Top => (PatternType::DoubleTop, Direction::Sell),
                    Extreme::Bottom => (PatternType::DoubleBottom, Direction::Buy),
                };
                let last = window.last()?;
                return Some(Pattern::new(
                    pattern_type,
                    direction,
                    confidence,
                    last.timestamp(),
                    PatternDetail::DoubleExtreme { first: a, second: b, neckline },
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candle;

    fn top() -> DoubleExtremeDetector {
        DoubleExtremeDetector::new(&DetectorConfig::default(), Extreme::Top)
    }

    fn bottom() -> DoubleExtremeDetector {
        DoubleExtremeDetector::new(&DetectorConfig::default(), Extreme::Bottom)
    }

    /// Candles with the given highs and lows, body in the middle.
    fn series(points: &[(f64, f64)]) -> Vec<Candle> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| {
                let mid = (high + low) / 2.0;
                candle(i, mid, high, low, mid)
            })
            .collect()
    }

    #[test]
    fn double_top_four_candles_apart() {
        let candles = series(&[
            (1.0820, 1.0810),
            (1.0840, 1.0825),
            (1.0860, 1.0845), // first peak
            (1.0845, 1.0830),
            (1.0830, 1.0825), // trough
            (1.0845, 1.0832),
            (1.0859, 1.0846), // second peak
            (1.0840, 1.0828),
        ]);
        let p = top().detect(&candles).expect("double top expected");
        assert_eq!(p.pattern_type, PatternType::DoubleTop);
        assert_eq!(p.direction, Direction::Sell);
        assert!(p.confidence.value() >= 72.0 && p.confidence.value() <= 90.0);
        match p.detail {
            PatternDetail::DoubleExtreme { first, second, neckline } => {
                assert_eq!(first, 1.0860);
                assert_eq!(second, 1.0859);
                assert_eq!(neckline, 1.0825);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn stale_double_top_is_ignored() {
        let candles = series(&[
            (1.0820, 1.0810),
            (1.0840, 1.0825),
            (1.0860, 1.0845), // first peak
            (1.0845, 1.0830),
            (1.0830, 1.0825), // trough
            (1.0845, 1.0832),
            (1.0859, 1.0846), // second peak, five candles before the last
            (1.0840, 1.0828),
            (1.0835, 1.0822),
            (1.0830, 1.0818),
            (1.0825, 1.0812),
            (1.0820, 1.0808),
        ]);
        assert!(top().detect(&candles).is_none());

        let recent = &candles[..9];
        assert!(top().detect(recent).is_some());
    }

    #[test]
    fn double_bottom_mirror_case() {
        let candles = series(&[
            (1.0890, 1.0880),
            (1.0875, 1.0860),
            (1.0855, 1.0840), // first trough
            (1.0870, 1.0855),
            (1.0875, 1.0865), // peak
            (1.0868, 1.0855),
            (1.0854, 1.0841), // second trough
            (1.0865, 1.0852),
        ]);
        let p = bottom().detect(&candles).expect("double bottom expected");
        assert_eq!(p.pattern_type, PatternType::DoubleBottom);
        assert_eq!(p.direction, Direction::Buy);
    }

    #[test]
    fn unequal_peaks_are_rejected() {
        let candles = series(&[
            (1.0820, 1.0810),
            (1.0840, 1.0825),
            (1.0860, 1.0845),
            (1.0845, 1.0830),
            (1.0830, 1.0825),
            (1.0845, 1.0832),
            (1.0900, 1.0880), // 0.37% above the first peak
            (1.0880, 1.0860),
        ]);
        assert!(top().detect(&candles).is_none());
    }

    #[test]
    fn shallow_retracement_is_rejected() {
        let candles = series(&[
            (1.0820, 1.0810),
            (1.0840, 1.0825),
            (1.0860, 1.0850),
            (1.0858, 1.0852),
            (1.0857, 1.0854), // neckline only 0.07% below
            (1.0858, 1.0852),
            (1.0860, 1.0851),
            (1.0845, 1.0830),
        ]);
        assert!(top().detect(&candles).is_none());
    }

    #[test]
    fn adjacent_peaks_are_too_close() {
        let candles = series(&[
            (1.0820, 1.0810),
            (1.0860, 1.0845),
            (1.0830, 1.0820),
            (1.0860, 1.0846),
            (1.0830, 1.0820),
            (1.0825, 1.0815),
            (1.0820, 1.0810),
            (1.0815, 1.0805),
        ]);
        assert!(top().detect(&candles).is_none());
    }
}
