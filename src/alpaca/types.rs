//! Alpaca API wire types

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::types::BarValidationError;
use crate::{Bar, Timeframe};

/// One page of `GET /v2/stocks/{symbol}/bars`
#[derive(Debug, Clone, Deserialize)]
pub struct BarsResponse {
    /// `null` when the range holds no bars
    #[serde(default)]
    pub bars: Option<Vec<AlpacaBar>>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Bar as returned by the data API, timestamp in UTC
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
}

impl AlpacaBar {
    /// Validated bar in exchange local time
    pub fn into_bar(self, tz: Tz, timeframe: Timeframe) -> Result<Bar, BarValidationError> {
        Bar::new(
            self.timestamp.with_timezone(&tz),
            timeframe,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}

/// `GET /v2/clock`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketClock {
    pub timestamp: DateTime<Utc>,
    pub is_open: bool,
    #[serde(default)]
    pub next_open: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_close: Option<DateTime<Utc>>,
}
