use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use common::{AnalysisConfig, CandleSource, Result, Signal, SignalStats, Timeframe};
use detector::{market_snapshot, PatternDetector};
use policy::SignalPolicy;

use crate::Notifier;

/// Outcome of one pass over every symbol/timeframe pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub pairs: usize,
    pub failed: usize,
    pub sent: usize,
}

impl TickReport {
    pub fn all_failed(&self) -> bool {
        self.pairs > 0 && self.failed == self.pairs
    }
}

/// Fetch → detect → admit → notify for each configured pair.
///
/// Owns the cooldown state through `SignalPolicy`; only the engine task
/// ever calls `tick`.
pub struct Pipeline {
    source: Arc<dyn CandleSource>,
    detector: PatternDetector,
    policy: SignalPolicy,
    notifier: Notifier,
    symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
    candle_count: usize,
    stats: Arc<SignalStats>,
}

impl Pipeline {
    pub fn new(
        cfg: &AnalysisConfig,
        source: Arc<dyn CandleSource>,
        detector: PatternDetector,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            detector,
            policy: SignalPolicy::from_config(cfg),
            notifier,
            symbols: cfg.symbols.clone(),
            timeframes: cfg.timeframes.clone(),
            candle_count: cfg.candle_count,
            stats: Arc::new(SignalStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SignalStats> {
        self.stats.clone()
    }

    /// Symbol-major, timeframe-minor.
    fn pairs(&self) -> Vec<(String, Timeframe)> {
        self.symbols
            .iter()
            .flat_map(|s| self.timeframes.iter().map(move |tf| (s.clone(), *tf)))
            .collect()
    }

    /// Analyze every pair once. A failing pair is logged and skipped; it
    /// never stops the remaining pairs.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        for (symbol, timeframe) in self.pairs() {
            report.pairs += 1;
            match self.analyze_pair(&symbol, timeframe, now).await {
                Ok(sent) => report.sent += sent,
                Err(e) => {
                    report.failed += 1;
                    error!(symbol = %symbol, timeframe = %timeframe, error = %e, "Analysis failed");
                }
            }
        }
        self.stats.record_tick(now);
        debug!(pairs = report.pairs, failed = report.failed, sent = report.sent, "Tick complete");
        report
    }

    /// Returns the number of signals delivered for this pair.
    async fn analyze_pair(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let candles = self.source.fetch(symbol, timeframe, self.candle_count).await?;
        if candles.is_empty() {
            warn!(symbol, timeframe = %timeframe, "No data");
            return Ok(0);
        }

        let patterns = self.detector.detect(&candles, timeframe);
        let snapshot = market_snapshot(&candles, self.detector.config());

        let mut sent = 0;
        for pattern in patterns.iter().filter(|p| !p.pattern_type.is_context()) {
            if self.policy.admit(pattern, symbol, timeframe, now).is_err() {
                continue;
            }
            let signal = Signal::from_pattern(pattern, symbol, timeframe, snapshot, now);
            if self.notifier.notify(&signal).await {
                self.stats.record_sent();
                sent += 1;
                info!(
                    id = %signal.id,
                    symbol,
                    direction = %signal.direction,
                    timeframe = %timeframe,
                    reason = %signal.reason,
                    "Prediction"
                );
            }
        }
        Ok(sent)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
