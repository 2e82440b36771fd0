//! Error taxonomy for the signal engine
//!
//! - `FetchError`: the market-data or notification transport failed
//! - `DataError`: what the engine sees when it asks for bars; distinguishes a
//!   normal data gap from a transient failure so callers branch explicitly
//! - `ConfigError`: fatal at startup

use thiserror::Error;

use crate::{Symbol, Timeframe};

/// Transport-level failure talking to an external service
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limit exceeded")]
    RateLimited,
}

/// Outcome of asking the bar source for a usable window
#[derive(Debug, Error)]
pub enum DataError {
    /// Empty or too-short window. A normal condition, never fatal.
    #[error("insufficient data for {symbol} {timeframe}: have {have}, need {need}")]
    InsufficientData {
        symbol: Symbol,
        timeframe: Timeframe,
        have: usize,
        need: usize,
    },

    /// Network/API failure; the caller skips this tick and tries again on the next one
    #[error("transient fetch error: {0}")]
    Transient(#[from] FetchError),
}

impl DataError {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, DataError::InsufficientData { .. })
    }
}

pub type DataResult<T> = Result<T, DataError>;

/// Invalid or missing configuration; the process aborts before scanning
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingCredential(&'static str),

    #[error("watchlist is empty")]
    EmptyWatchlist,

    #[error("no confirmation timeframes configured")]
    NoTimeframes,

    #[error("quorum {quorum} must be between 1 and {timeframes} (number of timeframes)")]
    InvalidQuorum { quorum: usize, timeframes: usize },

    #[error("MACD fast period ({fast}) must be shorter than slow period ({slow})")]
    InvalidMacd { fast: usize, slow: usize },

    #[error("invalid session schedule: {0}")]
    InvalidSchedule(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
