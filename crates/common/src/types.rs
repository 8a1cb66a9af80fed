use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Candle bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }

    /// Bucket length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3600,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::M1),
            "5m" | "5min" => Ok(Timeframe::M5),
            "15m" | "15min" => Ok(Timeframe::M15),
            "1h" | "60m" | "1hour" => Ok(Timeframe::H1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

/// One OHLC(+volume) sample.
///
/// Construction through [`Candle::new`] enforces
/// `low <= min(open, close) <= max(open, close) <= high`, so every
/// `Candle` in the system is consistent. Fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    symbol: String,
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<f64>,
}

impl Candle {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if ![open, high, low, close].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidCandle(format!(
                "{symbol} @ {timestamp}: non-finite price"
            )));
        }
        if low > open.min(close) || open.max(close) > high {
            return Err(Error::InvalidCandle(format!(
                "{symbol} @ {timestamp}: o={open} h={high} l={low} c={close} violates low <= body <= high"
            )));
        }
        Ok(Self {
            symbol,
            timestamp,
            open,
            high,
            low,
            close,
            volume: volume.filter(|v| v.is_finite() && *v >= 0.0),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> Option<f64> {
        self.volume
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}

/// Directional bias of a pattern or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Heuristic confidence score, always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Confidence(f64);

impl Confidence {
    pub const MAX: f64 = 100.0;

    /// Clamp `value` into `[0, 100]`. NaN maps to 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, Self::MAX))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

/// Coarse trend classification from moving-average comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    StrongUp,
    WeakUp,
    Sideways,
    WeakDown,
    StrongDown,
}

impl Trend {
    pub fn direction(&self) -> Direction {
        match self {
            Trend::StrongUp | Trend::WeakUp => Direction::Buy,
            Trend::StrongDown | Trend::WeakDown => Direction::Sell,
            Trend::Sideways => Direction::Neutral,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::StrongUp => write!(f, "STRONG_UPTREND"),
            Trend::WeakUp => write!(f, "WEAK_UPTREND"),
            Trend::Sideways => write!(f, "SIDEWAYS"),
            Trend::WeakDown => write!(f, "WEAK_DOWNTREND"),
            Trend::StrongDown => write!(f, "STRONG_DOWNTREND"),
        }
    }
}

/// Pattern tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    BullishEngulfing,
    BearishEngulfing,
    BullishPinbar,
    BearishPinbar,
    DoubleTop,
    DoubleBottom,
    ResistanceBreak,
    SupportBreak,
    MarketStructure,
}

impl PatternType {
    /// Context records describe the market around a signal; they are never
    /// alerted on their own.
    pub fn is_context(&self) -> bool {
        matches!(self, PatternType::MarketStructure)
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatternType::BullishEngulfing => "BULLISH_ENGULFING",
            PatternType::BearishEngulfing => "BEARISH_ENGULFING",
            PatternType::BullishPinbar => "BULLISH_PINBAR",
            PatternType::BearishPinbar => "BEARISH_PINBAR",
            PatternType::DoubleTop => "DOUBLE_TOP",
            PatternType::DoubleBottom => "DOUBLE_BOTTOM",
            PatternType::ResistanceBreak => "RESISTANCE_BREAK",
            PatternType::SupportBreak => "SUPPORT_BREAK",
            PatternType::MarketStructure => "MARKET_STRUCTURE",
        };
        f.write_str(label)
    }
}

/// Kind-specific measurements recorded alongside a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternDetail {
    Engulfing {
        body_ratio: f64,
        /// Current / previous volume, capped at 2.0. `None` without volume.
        volume_ratio: Option<f64>,
    },
    PinBar {
        wick_ratio: f64,
        near_extreme: bool,
    },
    DoubleExtreme {
        first: f64,
        second: f64,
        /// Price of the intervening trough (top) or peak (bottom).
        neckline: f64,
    },
    LevelBreak {
        level: f64,
        volume_ratio: Option<f64>,
    },
    Structure {
        trend: Trend,
        short_sma: f64,
        long_sma: f64,
        /// Direction implied by a liquidity sweep on the latest candle.
        sweep: Option<Direction>,
    },
}

impl fmt::Display for PatternDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternDetail::Engulfing { body_ratio, volume_ratio } => {
                write!(f, "body {body_ratio:.2}x previous")?;
                if let Some(v) = volume_ratio {
                    write!(f, ", volume {v:.2}x")?;
                }
                Ok(())
            }
            PatternDetail::PinBar { wick_ratio, near_extreme } => {
                write!(f, "wick {:.0}% of range", wick_ratio * 100.0)?;
                if *near_extreme {
                    write!(f, " at recent extreme")?;
                }
                Ok(())
            }
            PatternDetail::DoubleExtreme { first, second, neckline } => {
                write!(f, "extremes {first:.5} / {second:.5}, neckline {neckline:.5}")
            }
            PatternDetail::LevelBreak { level, volume_ratio } => {
                write!(f, "level {level:.5}")?;
                if let Some(v) = volume_ratio {
                    write!(f, ", volume {v:.2}x average")?;
                }
                Ok(())
            }
            PatternDetail::Structure { trend, short_sma, long_sma, sweep } => {
                write!(f, "{trend} (SMA5 {short_sma:.5} vs SMA10 {long_sma:.5})")?;
                if let Some(d) = sweep {
                    write!(f, ", {d} liquidity sweep")?;
                }
                Ok(())
            }
        }
    }
}

/// A detected pattern. Produced fresh on every detection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub pattern_type: PatternType,
    pub direction: Direction,
    pub confidence: Confidence,
    /// Timestamp of the candle the pattern completed on.
    pub timestamp: DateTime<Utc>,
    pub detail: PatternDetail,
}

impl Pattern {
    pub fn new(
        pattern_type: PatternType,
        direction: Direction,
        confidence: f64,
        timestamp: DateTime<Utc>,
        detail: PatternDetail,
    ) -> Self {
        Self {
            pattern_type,
            direction,
            confidence: Confidence::new(confidence),
            timestamp,
            detail,
        }
    }
}

/// Trend plus nearby levels at the time a signal was raised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub trend: Trend,
    pub support: f64,
    pub resistance: f64,
}

/// An admitted pattern, ready for delivery. Consumed once by the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub pattern_type: PatternType,
    pub confidence: Confidence,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub market_structure: Option<MarketSnapshot>,
}

impl Signal {
    pub fn from_pattern(
        pattern: &Pattern,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        market_structure: Option<MarketSnapshot>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            direction: pattern.direction,
            timeframe,
            pattern_type: pattern.pattern_type,
            confidence: pattern.confidence,
            reason: format!(
                "Pattern: {} with {} confidence ({})",
                pattern.pattern_type, pattern.confidence, pattern.detail
            ),
            timestamp: now,
            market_structure,
        }
    }
}

/// Where candles are coming from right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Live => write!(f, "REAL"),
            DataSource::Synthetic => write!(f, "SAMPLE"),
        }
    }
}

/// Current state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "STOPPED"),
            EngineState::Running => write!(f, "RUNNING"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Stop,
}

/// Counters shared between the scheduler (sole writer) and the command surface.
#[derive(Debug, Default)]
pub struct SignalStats {
    sent: AtomicU64,
    /// Unix millis of the last completed tick; 0 = never.
    last_tick_ms: AtomicI64,
}

impl SignalStats {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signals_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn record_tick(&self, at: DateTime<Utc>) {
        self.last_tick_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        match self.last_tick_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn candle_rejects_body_outside_range() {
        let err = Candle::new("EURUSD", ts(), 1.10, 1.09, 1.08, 1.085, None).unwrap_err();
        assert!(matches!(err, Error::InvalidCandle(_)));

        let err = Candle::new("EURUSD", ts(), 1.085, 1.09, 1.086, 1.088, None).unwrap_err();
        assert!(matches!(err, Error::InvalidCandle(_)));
    }

    #[test]
    fn candle_rejects_nan() {
        assert!(Candle::new("EURUSD", ts(), f64::NAN, 1.0, 1.0, 1.0, None).is_err());
    }

    #[test]
    fn candle_anatomy() {
        let c = Candle::new("EURUSD", ts(), 1.0850, 1.0870, 1.0840, 1.0845, Some(1200.0)).unwrap();
        assert!(c.is_bearish());
        assert!((c.body() - 0.0005).abs() < 1e-9);
        assert!((c.range() - 0.0030).abs() < 1e-9);
        assert!((c.upper_wick() - 0.0020).abs() < 1e-9);
        assert!((c.lower_wick() - 0.0005).abs() < 1e-9);
        assert_eq!(c.volume(), Some(1200.0));
    }

    #[test]
    fn negative_volume_is_dropped() {
        let c = Candle::new("EURUSD", ts(), 1.0, 1.0, 1.0, 1.0, Some(-5.0)).unwrap();
        assert_eq!(c.volume(), None);
    }

    #[test]
    fn confidence_is_clamped_at_creation() {
        assert_eq!(Confidence::new(140.0).value(), 100.0);
        assert_eq!(Confidence::new(-3.0).value(), 0.0);
        assert_eq!(Confidence::new(f64::NAN).value(), 0.0);
        assert_eq!(Confidence::new(72.6).to_string(), "73%");
    }

    #[test]
    fn timeframe_accepts_both_spellings() {
        assert_eq!("5min".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!("1hour".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert!("2h".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::M15.seconds(), 900);
    }

    #[test]
    fn signal_reason_mentions_pattern() {
        let pattern = Pattern::new(
            PatternType::BullishEngulfing,
            Direction::Buy,
            88.8,
            ts(),
            PatternDetail::Engulfing { body_ratio: 1.67, volume_ratio: None },
        );
        let signal = Signal::from_pattern(&pattern, "EURUSD", Timeframe::M5, None, ts());
        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.reason.contains("BULLISH_ENGULFING"));
        assert!(signal.reason.contains("89%"));
        assert!(signal.reason.contains("1.67x"));
    }

    #[test]
    fn stats_track_last_tick() {
        let stats = SignalStats::default();
        assert!(stats.last_tick().is_none());
        stats.record_tick(ts());
        stats.record_sent();
        assert_eq!(stats.last_tick(), Some(ts()));
        assert_eq!(stats.signals_sent(), 1);
    }
}
