//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for API credentials.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::strategy::StrategyConfig;

pub const ALPACA_KEY_VAR: &str = "ALPACA_KEY";
pub const ALPACA_SECRET_VAR: &str = "ALPACA_SECRET";
pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_TOKEN";
pub const TELEGRAM_CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let mut config: Config = serde_json::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Load API credentials from environment if set
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ALPACA_KEY_VAR) {
            self.alpaca.api_key = Some(key);
        }
        if let Ok(secret) = std::env::var(ALPACA_SECRET_VAR) {
            self.alpaca.api_secret = Some(secret);
        }
        if let Ok(token) = std::env::var(TELEGRAM_TOKEN_VAR) {
            self.telegram.token = Some(token);
        }
        if let Ok(chat_id) = std::env::var(TELEGRAM_CHAT_ID_VAR) {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    /// Check everything that does not depend on credentials
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.tz()?;
        self.session.validate()?;
        self.strategy.validate()
    }
}

/// Alpaca market-data and trading API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(default = "default_trading_url")]
    pub trading_url: String,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Data feed: "iex" (free) or "sip"
    #[serde(default = "default_feed")]
    pub feed: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Symbol used by the startup data-access check
    #[serde(default = "default_verify_symbol")]
    pub verify_symbol: String,
}

fn default_trading_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}
fn default_data_url() -> String {
    "https://data.alpaca.markets".to_string()
}
fn default_feed() -> String {
    "iex".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_requests_per_minute() -> u32 {
    180
}
fn default_verify_symbol() -> String {
    "AAPL".to_string()
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        AlpacaConfig {
            api_key: None,
            api_secret: None,
            trading_url: default_trading_url(),
            data_url: default_data_url(),
            feed: default_feed(),
            timeout_secs: default_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            verify_symbol: default_verify_symbol(),
        }
    }
}

impl AlpacaConfig {
    /// Both credentials, or the name of the first missing variable
    pub fn credentials(&self) -> Result<(String, String), ConfigError> {
        let key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(ALPACA_KEY_VAR))?;
        let secret = self
            .api_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingCredential(ALPACA_SECRET_VAR))?;
        Ok((key, secret))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Telegram bot destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            token: None,
            chat_id: None,
            api_url: default_telegram_url(),
        }
    }
}

impl TelegramConfig {
    pub fn credentials(&self) -> Result<(String, String), ConfigError> {
        let token = self
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingCredential(TELEGRAM_TOKEN_VAR))?;
        let chat_id = self
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::MissingCredential(TELEGRAM_CHAT_ID_VAR))?;
        Ok((token, chat_id))
    }
}

/// Session schedule, all times in the exchange's local timezone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// IANA timezone name of the exchange
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Regular session open; the reference bar starts here
    #[serde(default = "default_market_open", with = "hhmm")]
    pub market_open: NaiveTime,

    /// Earliest time the reference bar is considered closed
    #[serde(default = "default_reference_ready", with = "hhmm")]
    pub reference_ready: NaiveTime,

    /// The `run` command refuses to start outside [start_window_open, start_window_close]
    #[serde(default = "default_start_window_open", with = "hhmm")]
    pub start_window_open: NaiveTime,
    #[serde(default = "default_start_window_close", with = "hhmm")]
    pub start_window_close: NaiveTime,

    /// Hard stop for the breakout scan loop
    #[serde(default = "default_scan_end", with = "hhmm")]
    pub scan_end: NaiveTime,

    /// Sleep between scan ticks (default: 60)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Sleep step while waiting for the reference bar (default: 10)
    #[serde(default = "default_wait_poll_secs")]
    pub wait_poll_secs: u64,

    /// Width of the 1-minute window fetched on each tick (default: 3)
    #[serde(default = "default_scan_window_minutes")]
    pub scan_window_minutes: i64,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
fn default_market_open() -> NaiveTime {
    hm(9, 30)
}
fn default_reference_ready() -> NaiveTime {
    hm(9, 46)
}
fn default_start_window_open() -> NaiveTime {
    hm(9, 25)
}
fn default_start_window_close() -> NaiveTime {
    hm(9, 46)
}
fn default_scan_end() -> NaiveTime {
    hm(14, 0)
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_wait_poll_secs() -> u64 {
    10
}
fn default_scan_window_minutes() -> i64 {
    3
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timezone: default_timezone(),
            market_open: default_market_open(),
            reference_ready: default_reference_ready(),
            start_window_open: default_start_window_open(),
            start_window_close: default_start_window_close(),
            scan_end: default_scan_end(),
            poll_interval_secs: default_poll_interval_secs(),
            wait_poll_secs: default_wait_poll_secs(),
            scan_window_minutes: default_scan_window_minutes(),
        }
    }
}

impl SessionConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_secs(self.wait_poll_secs)
    }

    pub fn in_start_window(&self, time: NaiveTime) -> bool {
        self.start_window_open <= time && time <= self.start_window_close
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_ready <= self.market_open {
            return Err(ConfigError::InvalidSchedule(format!(
                "reference_ready {} must be after market_open {}",
                self.reference_ready, self.market_open
            )));
        }
        if self.scan_end <= self.reference_ready {
            return Err(ConfigError::InvalidSchedule(format!(
                "scan_end {} must be after reference_ready {}",
                self.scan_end, self.reference_ready
            )));
        }
        if self.start_window_close < self.start_window_open {
            return Err(ConfigError::InvalidSchedule(
                "start window closes before it opens".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 || self.wait_poll_secs == 0 {
            return Err(ConfigError::InvalidSchedule(
                "poll intervals must be at least one second".to_string(),
            ));
        }
        if self.scan_window_minutes < 3 {
            return Err(ConfigError::InvalidSchedule(
                "scan window must cover at least 3 minutes".to_string(),
            ));
        }
        Ok(())
    }
}

/// "HH:MM" (or "HH:MM:SS") wall-clock times
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ConfirmationMode, DirectionFilter};

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.tz().unwrap(), chrono_tz::America::New_York);
        assert_eq!(config.strategy.watchlist.len(), 6);
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{
            "session": { "scan_end": "15:30", "poll_interval_secs": 30 },
            "strategy": {
                "watchlist": ["spy", "QQQ"],
                "direction_filter": "any",
                "confirmation": "crossover"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.session.scan_end, hm(15, 30));
        assert_eq!(config.session.market_open, hm(9, 30));
        assert_eq!(config.session.poll_interval_secs, 30);
        assert_eq!(config.strategy.watchlist[0].as_str(), "SPY");
        assert_eq!(config.strategy.direction_filter, DirectionFilter::Any);
        assert_eq!(config.strategy.confirmation, ConfirmationMode::Crossover);
        assert_eq!(config.strategy.quorum(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut config = Config::default();
        config.session.scan_end = hm(9, 40);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut config = Config::default();
        config.session.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let alpaca = AlpacaConfig {
            api_key: Some("key".to_string()),
            ..AlpacaConfig::default()
        };
        assert!(matches!(
            alpaca.credentials(),
            Err(ConfigError::MissingCredential(ALPACA_SECRET_VAR))
        ));

        let telegram = TelegramConfig::default();
        assert!(matches!(
            telegram.credentials(),
            Err(ConfigError::MissingCredential(TELEGRAM_TOKEN_VAR))
        ));
    }

    #[test]
    fn test_start_window() {
        let session = SessionConfig::default();
        assert!(session.in_start_window(hm(9, 25)));
        assert!(session.in_start_window(hm(9, 46)));
        assert!(!session.in_start_window(hm(9, 47)));
        assert!(!session.in_start_window(hm(8, 0)));
    }
}
