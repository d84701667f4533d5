use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{instrument, trace};

/// Source of the Unix timestamp placed in signed requests
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Current time in whole Unix seconds
    async fn now(&self) -> Result<u64, ExchangeError>;
}

/// Local system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl TimeSource for SystemClock {
    async fn now(&self) -> Result<u64, ExchangeError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| ExchangeError::ClockUnavailable(format!("System clock before epoch: {}", e)))
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

#[async_trait]
impl TimeSource for FixedClock {
    async fn now(&self) -> Result<u64, ExchangeError> {
        Ok(self.0)
    }
}

/// Body of `GET /time`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerTime {
    pub iso: String,
    pub epoch: f64,
}

impl ServerTime {
    pub fn epoch_seconds(&self) -> u64 {
        self.epoch.trunc() as u64
    }
}

/// Parse a `/time` response into whole seconds
pub fn parse_server_time(body: &[u8]) -> Result<u64, ExchangeError> {
    let time: ServerTime = serde_json::from_slice(body).map_err(|e| {
        ExchangeError::ClockUnavailable(format!("Unreadable server time response: {}", e))
    })?;

    if !time.epoch.is_finite() || time.epoch < 0.0 {
        return Err(ExchangeError::ClockUnavailable(format!(
            "Server returned an invalid epoch: {}",
            time.epoch
        )));
    }

    Ok(time.epoch_seconds())
}

/// Reads the exchange clock through the public `/time` endpoint
///
/// Any failure surfaces as `ClockUnavailable`; there is no fallback to the
/// local clock.
#[derive(Debug, Clone)]
pub struct ExchangeClock {
    client: Client,
    url: String,
}

impl ExchangeClock {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/time", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TimeSource for ExchangeClock {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn now(&self) -> Result<u64, ExchangeError> {
        let response =
            self.client.get(&self.url).send().await.map_err(|e| {
                ExchangeError::ClockUnavailable(format!("Time request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ExchangeError::ClockUnavailable(format!("Failed to read time response: {}", e))
        })?;

        if !status.is_success() {
            return Err(ExchangeError::ClockUnavailable(format!(
                "Time endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let seconds = parse_server_time(&body)?;
        trace!(seconds, "exchange time");
        Ok(seconds)
    }
}
