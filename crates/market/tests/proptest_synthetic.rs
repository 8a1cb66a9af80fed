use chrono::{TimeZone, Utc};
use common::Timeframe;
use market::SyntheticSource;
use proptest::prelude::*;

proptest! {
    /// Every generated candle keeps its body inside its range, for any seed and symbol.
    #[test]
    fn generated_candles_are_consistent(
        seed in any::<u64>(),
        symbol in prop::sample::select(vec!["EURUSD", "GBPUSD", "USDJPY", "XAUUSD", "AUDCAD"]),
        count in 1usize..150,
    ) {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let candles = SyntheticSource::seeded(seed).generate(symbol, Timeframe::M5, count, now);

        prop_assert_eq!(candles.len(), count);
        for c in &candles {
            prop_assert!(c.low() <= c.open().min(c.close()));
            prop_assert!(c.open().max(c.close()) <= c.high());
            prop_assert!(c.high().is_finite() && c.low().is_finite());
        }
    }
}
