use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, Timeframe};

const DEFAULT_FEED_BASE_URL: &str = "https://pocketoption.com/api";
const DEFAULT_ANALYSIS_CONFIG_PATH: &str = "config/analysis.toml";
/// Largest cooldown representable as a chrono duration in milliseconds.
const MAX_COOLDOWN_SECS: u64 = (i64::MAX / 1000) as u64;

/// All configuration loaded at startup: secrets from the environment,
/// analysis parameters from an optional TOML file.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: i64,

    // Live price feed; `None` means synthetic data only.
    pub feed: Option<FeedCredentials>,

    // Analysis parameters
    pub analysis: AnalysisConfig,
    pub analysis_config_path: String,
    /// False when the analysis file was absent and defaults are in use.
    pub analysis_file_found: bool,

    // Daily log files
    pub log_dir: String,
}

#[derive(Clone)]
pub struct FeedCredentials {
    pub base_url: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for FeedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCredentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Scheduler and policy parameters. Every key is optional in the file.
///
/// Example `config/analysis.toml`:
/// ```toml
/// [analysis]
/// symbols = ["EURUSD", "XAUUSD"]
/// timeframes = ["5m", "15m"]
/// interval_secs = 300
/// min_confidence = 70.0
/// cooldown_secs = 3600
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    /// Seconds between analysis ticks.
    pub interval_secs: u64,
    /// Candles requested per symbol/timeframe fetch.
    pub candle_count: usize,
    pub min_confidence: f64,
    /// Minimum seconds between alerts for one symbol/timeframe/direction.
    pub cooldown_secs: u64,
    /// Fixed UTC offset used when rendering alert timestamps.
    pub display_utc_offset_hours: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbols: ["EURUSD", "GBPUSD", "USDJPY", "XAUUSD"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeframes: vec![Timeframe::M5, Timeframe::M15],
            interval_secs: 300,
            candle_count: 100,
            min_confidence: 70.0,
            cooldown_secs: 3600,
            display_utc_offset_hours: 7,
        }
    }
}

impl AnalysisConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs as i64)
    }

    /// Parse the `[analysis]` table of a TOML document. Other tables are ignored.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            analysis: AnalysisConfig,
        }
        let file: File =
            toml::from_str(content).map_err(|e| Error::Config(format!("analysis config: {e}")))?;
        file.analysis.validate()?;
        Ok(file.analysis)
    }

    /// Load from `path`. `Ok(None)` when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map(Some)
    }

    fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(Error::Config("analysis.symbols must not be empty".into()));
        }
        if self.timeframes.is_empty() {
            return Err(Error::Config("analysis.timeframes must not be empty".into()));
        }
        if self.interval_secs == 0 {
            return Err(Error::Config("analysis.interval_secs must be > 0".into()));
        }
        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(Error::Config(format!(
                "analysis.cooldown_secs must be <= {MAX_COOLDOWN_SECS}, got {}",
                self.cooldown_secs
            )));
        }
        if self.candle_count < 2 {
            return Err(Error::Config("analysis.candle_count must be >= 2".into()));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "analysis.min_confidence must be within 0..=100, got {}",
                self.min_confidence
            )));
        }
        if self.display_utc_offset_hours.abs() > 14 {
            return Err(Error::Config(format!(
                "analysis.display_utc_offset_hours out of range: {}",
                self.display_utc_offset_hours
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load all configuration from environment variables and the analysis file.
    /// Loads `.env` if present. Missing Telegram credentials are an error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")?;
        let telegram_chat_id = telegram_chat_id.trim().parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "TELEGRAM_CHAT_ID must be a numeric chat id, got '{telegram_chat_id}'"
            ))
        })?;

        let feed = match (
            optional_env("POCKET_OPTION_EMAIL"),
            optional_env("POCKET_OPTION_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(FeedCredentials {
                base_url: optional_env("FEED_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string()),
                email,
                password,
            }),
            _ => None,
        };

        let analysis_config_path = optional_env("ANALYSIS_CONFIG_PATH")
            .unwrap_or_else(|| DEFAULT_ANALYSIS_CONFIG_PATH.to_string());
        let analysis = AnalysisConfig::load(&analysis_config_path)?;
        let analysis_file_found = analysis.is_some();

        Ok(Config {
            telegram_token: required_env("TELEGRAM_TOKEN")?,
            telegram_chat_id,
            feed,
            analysis: analysis.unwrap_or_default(),
            analysis_config_path,
            analysis_file_found,
            log_dir: optional_env("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

/// Unset and blank variables are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
