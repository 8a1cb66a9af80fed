use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{
    Candle, CandleSource, DataSource, Error, FeedCredentials, Result, Timeframe,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the broker price feed. Holds a cookie session after login.
pub struct LiveFeedClient {
    base_url: String,
    http: Client,
}

impl LiveFeedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build a client and log in. Fails if the broker rejects the credentials.
    pub async fn connect(creds: &FeedCredentials) -> Result<Self> {
        let client = Self::new(&creds.base_url)?;
        client.login(&creds.email, &creds.password).await?;
        info!(base_url = %client.base_url, "Connected to live price feed");
        Ok(client)
    }

    async fn login(&self, email: &str, password: &str) -> Result<()> {
        let url = format!("{}/login", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("login HTTP {status}: {body}")));
        }

        let login: LoginResponse = serde_json::from_str(&body)?;
        if !login.success {
            return Err(Error::Feed(format!(
                "login rejected: {}",
                login.message.unwrap_or_else(|| "unknown error".into())
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CandleSource for LiveFeedClient {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/candles", self.base_url);
        let timeframe_secs = timeframe.seconds().to_string();
        let count_param = count.to_string();

        debug!(symbol, timeframe = %timeframe, count, "Requesting candles from live feed");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("asset", symbol),
                ("timeframe", timeframe_secs.as_str()),
                ("count", count_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("candles HTTP {status}: {body}")));
        }

        let candles = parse_candles(symbol, &body)?;
        info!(symbol, timeframe = %timeframe, count = candles.len(), "Retrieved live candles");
        Ok(candles)
    }

    fn data_source(&self) -> DataSource {
        DataSource::Live
    }
}

/// Parse the feed's candle array. Rows that violate the OHLC invariant are
/// dropped; the result is sorted oldest first.
pub fn parse_candles(symbol: &str, body: &str) -> Result<Vec<Candle>> {
    let raw: Vec<RawCandle> = serde_json::from_str(body)?;

    let mut candles: Vec<Candle> = raw
        .into_iter()
        .filter_map(|r| {
            let Some(timestamp) = Utc.timestamp_opt(r.time, 0).single() else {
                warn!(symbol, time = r.time, "Dropping feed candle with bad timestamp");
                return None;
            };
            match Candle::new(symbol, timestamp, r.open, r.high, r.low, r.close, r.volume) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(error = %e, "Dropping inconsistent feed candle");
                    None
                }
            }
        })
        .collect();

    candles.sort_by_key(|c| c.timestamp());
    Ok(candles)
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

#[derive(Deserialize)]
struct RawCandle {
    /// Unix seconds.
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}
