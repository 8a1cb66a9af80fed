use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Detector thresholds. All keys are optional in the `[detector]` table of
/// the analysis file; missing keys keep the defaults below.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Current body must be at least this multiple of the previous body.
    pub engulfing_min_body_ratio: f64,
    /// Volume ratio used for the engulfing boost is capped here.
    pub engulfing_volume_cap: f64,

    /// Body / range must stay below this for a pin bar.
    pub pin_max_body_ratio: f64,
    /// Long wick / range must exceed this.
    pub pin_min_wick_ratio: f64,
    /// Long wick must be at least this multiple of the opposite wick.
    pub pin_wick_dominance: f64,
    /// Candles before the pin bar searched for a support/resistance extreme.
    pub pin_extreme_lookback: usize,
    /// Relative distance from that extreme still counted as "at" it.
    pub pin_extreme_tolerance: f64,

    pub double_window: usize,
    pub double_min_spacing: usize,
    pub double_max_spacing: usize,
    /// Max relative difference between the two extremes.
    pub double_tolerance: f64,
    /// Min relative depth of the intervening move.
    pub double_min_depth: f64,
    /// Max candles between the second extreme and the latest candle.
    pub double_max_age: usize,

    /// Candles before the current one used for support/resistance.
    pub level_lookback: usize,
    /// Breaching high/low must be within this fraction of the level.
    pub level_proximity: f64,
    /// Volume at or above this multiple of the window average confirms a break.
    pub level_volume_factor: f64,

    pub structure_short_period: usize,
    pub structure_long_period: usize,
    /// SMA spread inside this band is sideways.
    pub structure_tolerance: f64,
    /// SMA spread beyond this band is a strong trend.
    pub structure_strong_tolerance: f64,
    /// Candles used for the support/resistance of the market snapshot.
    pub snapshot_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            engulfing_min_body_ratio: 1.2,
            engulfing_volume_cap: 2.0,

            pin_max_body_ratio: 0.3,
            pin_min_wick_ratio: 0.6,
            pin_wick_dominance: 2.0,
            pin_extreme_lookback: 20,
            pin_extreme_tolerance: 0.001,

            double_window: 15,
            double_min_spacing: 3,
            double_max_spacing: 6,
            double_tolerance: 0.002,
            double_min_depth: 0.0015,
            double_max_age: 3,

            level_lookback: 25,
            level_proximity: 0.005,
            level_volume_factor: 1.5,

            structure_short_period: 5,
            structure_long_period: 10,
            structure_tolerance: 0.001,
            structure_strong_tolerance: 0.003,
            snapshot_window: 20,
        }
    }
}

impl DetectorConfig {
    /// Parse the `[detector]` table of a TOML document. Other tables are ignored.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            detector: DetectorConfig,
        }
        let file: File =
            toml::from_str(content).map_err(|e| Error::Config(format!("detector config: {e}")))?;
        file.detector.validate()?;
        Ok(file.detector)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Config(format!("detector.{msg}")));

        if self.engulfing_min_body_ratio < 1.0 {
            return fail("engulfing_min_body_ratio must be >= 1.0");
        }
        if self.engulfing_volume_cap < 1.0 {
            return fail("engulfing_volume_cap must be >= 1.0");
        }
        if !(0.0..1.0).contains(&self.pin_max_body_ratio)
            || !(0.0..1.0).contains(&self.pin_min_wick_ratio)
        {
            return fail("pin bar ratios must be within 0..1");
        }
        if self.double_min_spacing < 2 || self.double_min_spacing > self.double_max_spacing {
            return fail("double_min_spacing must be >= 2 and <= double_max_spacing");
        }
        if self.double_window < self.double_max_spacing + 2 {
            return fail("double_window must exceed double_max_spacing + 1");
        }
        if self.double_max_age == 0 {
            return fail("double_max_age must be > 0");
        }
        if self.level_lookback == 0 || self.snapshot_window == 0 {
            return fail("lookback windows must be > 0");
        }
        if self.structure_short_period == 0
            || self.structure_short_period >= self.structure_long_period
        {
            return fail("structure_short_period must be > 0 and < structure_long_period");
        }
        if self.structure_strong_tolerance < self.structure_tolerance {
            return fail("structure_strong_tolerance must be >= structure_tolerance");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DetectorConfig::default().validate().unwrap();
    }

    #[test]
    fn overrides_single_threshold() {
        let cfg = DetectorConfig::from_toml_str(
            "[analysis]\ninterval_secs = 60\n\n[detector]\nengulfing_min_body_ratio = 1.3\n",
        )
        .unwrap();
        assert_eq!(cfg.engulfing_min_body_ratio, 1.3);
        assert_eq!(cfg.level_lookback, 25);
    }

    #[test]
    fn rejects_inverted_sma_periods() {
        let err = DetectorConfig::from_toml_str(
            "[detector]\nstructure_short_period = 10\nstructure_long_period = 5\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
