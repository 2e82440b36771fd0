//! Alpaca REST client
//!
//! Implements [`BarSource`] over the historical bars endpoint, following
//! `next_page_token` until the range is exhausted. Every request goes through
//! a shared token bucket sized from `requests_per_minute`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{BarsResponse, MarketClock};
use crate::common::{RateLimiter, RateLimiterConfig};
use crate::config::{AlpacaConfig, SessionConfig};
use crate::data::BarSource;
use crate::error::{ConfigError, FetchError};
use crate::session::Preflight;
use crate::{Bar, Symbol, Timeframe};

/// Maximum bars per page (Alpaca limit)
const MAX_BARS_PER_PAGE: u32 = 10_000;

/// Guard against a server that keeps handing out page tokens
const MAX_PAGES: usize = 100;

/// Alpaca API client
#[derive(Debug, Clone)]
pub struct AlpacaClient {
    client: Client,
    api_key: String,
    api_secret: String,
    trading_url: String,
    data_url: String,
    feed: String,
    verify_symbol: Symbol,
    tz: Tz,
    market_open: NaiveTime,
    limiter: Arc<RateLimiter>,
}

impl AlpacaClient {
    /// Create a client; fails when credentials are missing
    pub fn new(
        client: Client,
        config: &AlpacaConfig,
        session: &SessionConfig,
    ) -> Result<Self, ConfigError> {
        let (api_key, api_secret) = config.credentials()?;

        Ok(AlpacaClient {
            client,
            api_key,
            api_secret,
            trading_url: config.trading_url.trim_end_matches('/').to_string(),
            data_url: config.data_url.trim_end_matches('/').to_string(),
            feed: config.feed.clone(),
            verify_symbol: Symbol::new(&config.verify_symbol),
            tz: session.tz()?,
            market_open: session.market_open,
            limiter: Arc::new(RateLimiter::new(RateLimiterConfig::per_minute(
                config.requests_per_minute,
            ))),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FetchError> {
        self.limiter.acquire().await;

        let response = self.authed(request).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// Current market clock from the trading API
    pub async fn get_clock(&self) -> Result<MarketClock, FetchError> {
        let url = format!("{}/v2/clock", self.trading_url);
        self.send_json(self.client.get(&url)).await
    }

    /// Fetch every bar in `[start, end]`, following pagination
    pub async fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<Bar>, FetchError> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, symbol);
        let start_param = start
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_param = end
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut params = vec![
                ("timeframe", timeframe.as_str().to_string()),
                ("start", start_param.clone()),
                ("end", end_param.clone()),
                ("adjustment", "raw".to_string()),
                ("feed", self.feed.clone()),
                ("limit", MAX_BARS_PER_PAGE.to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("page_token", token.clone()));
            }

            debug!(
                "Fetching bars: symbol={}, timeframe={}, page={}",
                symbol, timeframe, page
            );

            let response: BarsResponse = self.send_json(self.client.get(&url).query(&params)).await?;

            for raw in response.bars.unwrap_or_default() {
                match raw.into_bar(self.tz, timeframe) {
                    Ok(bar) => bars.push(bar),
                    Err(e) => warn!("Dropping invalid {} {} bar: {}", symbol, timeframe, e),
                }
            }

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Check credentials and data entitlement before a session
    ///
    /// Reads the market clock, then the previous day's opening 15-minute bar
    /// for the configured probe symbol. Only the responses' status matters; an
    /// empty bar set (weekend, holiday) still counts as access.
    pub async fn verify(&self) -> bool {
        match self.get_clock().await {
            Ok(clock) => info!(
                "Alpaca connection OK, market {}",
                if clock.is_open { "open" } else { "closed" }
            ),
            Err(e) => {
                warn!("Alpaca API connection failed: {}", e);
                return false;
            }
        }

        let yesterday = Utc::now().with_timezone(&self.tz).date_naive() - Duration::days(1);
        let Some(start) = yesterday
            .and_time(self.market_open)
            .and_local_timezone(self.tz)
            .earliest()
        else {
            warn!("Cannot resolve {} {} in {}", yesterday, self.market_open, self.tz);
            return false;
        };
        let end = start + Duration::minutes(15);

        match self
            .fetch_bars(&self.verify_symbol, Timeframe::FifteenMinutes, start, end)
            .await
        {
            Ok(bars) => {
                info!(
                    "Market data access OK ({} {} bars for {})",
                    bars.len(),
                    Timeframe::FifteenMinutes,
                    self.verify_symbol
                );
                true
            }
            Err(e) => {
                warn!("Market data access failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl BarSource for AlpacaClient {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<Bar>, FetchError> {
        self.fetch_bars(symbol, timeframe, start, end).await
    }
}

#[async_trait]
impl Preflight for AlpacaClient {
    async fn verify(&self) -> bool {
        AlpacaClient::verify(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_new_requires_credentials() {
        let config = Config::default();
        let err = AlpacaClient::new(Client::new(), &config.alpaca, &config.session).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("ALPACA_KEY")));
    }

    #[test]
    fn test_new_trims_base_urls() {
        let mut config = Config::default();
        config.alpaca.api_key = Some("key".into());
        config.alpaca.api_secret = Some("secret".into());
        config.alpaca.data_url = "https://data.example.com/".into();

        let client = AlpacaClient::new(Client::new(), &config.alpaca, &config.session).unwrap();
        assert_eq!(client.data_url, "https://data.example.com");
        assert_eq!(client.tz, chrono_tz::America::New_York);
    }
}
