use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use teloxide::utils::html::escape;
use tracing::{error, info};

use common::{AlertSink, DataSource, Direction, Signal, Timeframe};

/// Renders signals into the alert template and hands them to the sink.
///
/// Delivery failures are logged and reported as `false`; they never
/// propagate into the scheduler.
pub struct Notifier {
    sink: Arc<dyn AlertSink>,
    offset: FixedOffset,
}

impl Notifier {
    pub fn new(sink: Arc<dyn AlertSink>, utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { sink, offset }
    }

    /// Deliver one signal. Returns whether the channel accepted it.
    pub async fn notify(&self, signal: &Signal) -> bool {
        let text = self.format_signal(signal);
        match self.sink.post_message(&text).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    id = %signal.id,
                    symbol = %signal.symbol,
                    error = %e,
                    "Failed to deliver signal"
                );
                false
            }
        }
    }

    /// Post a free-form announcement such as the startup banner.
    pub async fn announce(&self, text: &str) -> bool {
        match self.sink.post_message(text).await {
            Ok(()) => {
                info!("Announcement sent");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to send announcement");
                false
            }
        }
    }

    pub fn format_signal(&self, signal: &Signal) -> String {
        let (emoji, action) = match signal.direction {
            Direction::Buy => ("🟢", "LONG"),
            Direction::Sell => ("🔴", "SHORT"),
            Direction::Neutral => ("🟡", "WAIT"),
        };

        let mut msg = format!(
            "🎯 <b>TRADING SIGNAL DETECTED</b> 🎯\n\n\
             {emoji} <b>Direction:</b> {action}\n\
             📊 <b>Symbol:</b> {symbol}\n\
             ⏰ <b>Timeframe:</b> {timeframe}\n\
             🔍 <b>Pattern:</b> {pattern}\n\
             💪 <b>Confidence:</b> {confidence}\n\n\
             📝 <b>Reason:</b>\n{reason}\n",
            symbol = escape(&signal.symbol),
            timeframe = signal.timeframe,
            pattern = signal.pattern_type,
            confidence = signal.confidence,
            reason = escape(&signal.reason),
        );

        if let Some(ms) = &signal.market_structure {
            msg.push_str(&format!(
                "\n📈 <b>Market:</b> {} | S {:.5} | R {:.5}\n",
                ms.trend, ms.support, ms.resistance
            ));
        }

        msg.push_str(&format!(
            "\n🕐 <b>Time:</b> {}\n\n⚠️ <i>Always use proper risk management</i>",
            self.local_time(signal.timestamp)
        ));
        msg
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        format!(
            "{} {}",
            at.with_timezone(&self.offset).format("%Y-%m-%d %H:%M:%S"),
            offset_label(self.offset)
        )
    }
}

/// Banner posted once the scheduler is running.
pub fn startup_message(symbols: &[String], timeframes: &[Timeframe], source: DataSource) -> String {
    let tfs: Vec<String> = timeframes.iter().map(Timeframe::to_string).collect();
    format!(
        "🤖 <b>Trading Bot Started</b>\n\
         📈 Monitoring {} symbols\n\
         ⏰ Timeframes: {}\n\
         💡 Using {source} market data",
        symbols.len(),
        tfs.join(", ")
    )
}

pub fn stopped_message() -> &'static str {
    "🛑 <b>Trading Bot Stopped</b>"
}

/// `UTC`, `UTC+7`, `UTC-3:30`.
fn offset_label(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        return "UTC".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let (h, m) = (secs.abs() / 3600, secs.abs() % 3600 / 60);
    if m == 0 {
        format!("UTC{sign}{h}")
    } else {
        format!("UTC{sign}{h}:{m:02}")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use common::{Error, MarketSnapshot, Pattern, PatternDetail, PatternType, Result, Trend};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn post_message(&self, text: &str) -> Result<()> {
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AlertSink for BrokenSink {
        async fn post_message(&self, _: &str) -> Result<()> {
            Err(Error::Notify("HTTP 502".into()))
        }
    }

    fn signal(snapshot: Option<MarketSnapshot>) -> Signal {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let pattern = Pattern::new(
            PatternType::BullishEngulfing,
            Direction::Buy,
            72.6,
            at,
            PatternDetail::Engulfing { body_ratio: 1.25, volume_ratio: None },
        );
        Signal::from_pattern(&pattern, "EURUSD", Timeframe::M5, snapshot, at)
    }

    #[test]
    fn renders_template_in_local_time() {
        let notifier = Notifier::new(Arc::new(RecordingSink::default()), 7);
        let text = notifier.format_signal(&signal(None));
        assert!(text.contains("🟢 <b>Direction:</b> LONG"));
        assert!(text.contains("<b>Symbol:</b> EURUSD"));
        assert!(text.contains("<b>Timeframe:</b> 5m"));
        assert!(text.contains("<b>Pattern:</b> BULLISH_ENGULFING"));
        assert!(text.contains("<b>Confidence:</b> 73%"));
        assert!(text.contains("2024-03-01 16:30:00 UTC+7"));
        assert!(!text.contains("Market:"));
    }

    #[test]
    fn renders_market_snapshot() {
        let notifier = Notifier::new(Arc::new(RecordingSink::default()), 0);
        let snap = MarketSnapshot { trend: Trend::WeakDown, support: 1.08123, resistance: 1.08987 };
        let text = notifier.format_signal(&signal(Some(snap)));
        assert!(text.contains("WEAK_DOWNTREND | S 1.08123 | R 1.08987"));
        assert!(text.contains("09:30:00 UTC\n"));
    }

    #[test]
    fn free_text_is_html_escaped() {
        let notifier = Notifier::new(Arc::new(RecordingSink::default()), 0);
        let mut s = signal(None);
        s.reason = "close < open & wick > body".into();
        let text = notifier.format_signal(&s);
        assert!(text.contains("close &lt; open &amp; wick &gt; body"));
    }

    #[test]
    fn offset_labels() {
        assert_eq!(offset_label(FixedOffset::east_opt(0).unwrap()), "UTC");
        assert_eq!(offset_label(FixedOffset::east_opt(7 * 3600).unwrap()), "UTC+7");
        assert_eq!(offset_label(FixedOffset::west_opt(5 * 3600).unwrap()), "UTC-5");
        assert_eq!(offset_label(FixedOffset::east_opt(5 * 3600 + 1800).unwrap()), "UTC+5:30");
    }

    #[test]
    fn startup_banner_lists_pairs() {
        let text = startup_message(
            &["EURUSD".into(), "XAUUSD".into()],
            &[Timeframe::M5, Timeframe::M15],
            DataSource::Synthetic,
        );
        assert!(text.contains("Monitoring 2 symbols"));
        assert!(text.contains("Timeframes: 5m, 15m"));
        assert!(text.contains("Using SAMPLE market data"));
    }

    #[tokio::test]
    async fn notify_reports_delivery() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(sink.clone(), 7);
        assert!(notifier.notify(&signal(None)).await);
        assert_eq!(sink.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_is_false_not_error() {
        let notifier = Notifier::new(Arc::new(BrokenSink), 7);
        assert!(!notifier.notify(&signal(None)).await);
        assert!(!notifier.announce("hello").await);
    }
}
