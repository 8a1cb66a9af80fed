use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use common::{AnalysisConfig, Direction, Pattern, Timeframe};

/// Why a pattern did not become an alert.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    LowConfidence { confidence: f64, minimum: f64 },
    CoolingDown { remaining: Duration },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::LowConfidence { confidence, minimum } => {
                write!(f, "confidence {confidence:.0}% below minimum {minimum:.0}%")
            }
            Rejection::CoolingDown { remaining } => {
                write!(f, "cooldown active for another {}s", remaining.num_seconds())
            }
        }
    }
}

type CooldownKey = (String, Timeframe, Direction);

/// Gate between detection and notification.
///
/// Owned by the scheduler loop and only touched from that task, so the
/// cooldown map needs no locking.
#[derive(Debug)]
pub struct SignalPolicy {
    min_confidence: f64,
    cooldown: Duration,
    last_alert: HashMap<CooldownKey, DateTime<Utc>>,
}

impl SignalPolicy {
    pub fn new(min_confidence: f64, cooldown: Duration) -> Self {
        Self {
            min_confidence,
            cooldown,
            last_alert: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.min_confidence, cfg.cooldown())
    }

    /// Accept or reject `pattern` for (`symbol`, `timeframe`).
    ///
    /// On acceptance `now` is recorded for the key immediately, so a second
    /// pattern in the same direction later in the same tick is rejected.
    pub fn admit(
        &mut self,
        pattern: &Pattern,
        symbol: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let confidence = pattern.confidence.value();
        if confidence < self.min_confidence {
            debug!(
                symbol,
                pattern = %pattern.pattern_type,
                confidence,
                "Pattern below confidence threshold"
            );
            return Err(Rejection::LowConfidence {
                confidence,
                minimum: self.min_confidence,
            });
        }

        let key = (symbol.to_string(), timeframe, pattern.direction);
        if let Some(last) = self.last_alert.get(&key) {
            let elapsed = now - *last;
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                info!(
                    symbol,
                    timeframe = %timeframe,
                    direction = %pattern.direction,
                    remaining_secs = remaining.num_seconds(),
                    "Signal suppressed by cooldown"
                );
                return Err(Rejection::CoolingDown { remaining });
            }
        }

        self.last_alert.insert(key, now);
        Ok(())
    }

    /// Time of the last accepted alert for a key, if any.
    pub fn last_alert(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        direction: Direction,
    ) -> Option<DateTime<Utc>> {
        self.last_alert
            .get(&(symbol.to_string(), timeframe, direction))
            .copied()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
