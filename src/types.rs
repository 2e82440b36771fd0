//! Core data types used across the signal engine

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for bar data
#[derive(Debug, Error)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    InvalidPrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Ticker symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into scan entries, signals and log fields on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.trim().to_uppercase().as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref().trim().to_uppercase().as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bar aggregation period, named the way the market-data API names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1Min")]
    OneMinute,
    #[serde(rename = "5Min")]
    FiveMinutes,
    #[serde(rename = "15Min")]
    FifteenMinutes,
    #[serde(rename = "30Min")]
    ThirtyMinutes,
    #[serde(rename = "1Hour")]
    OneHour,
}

impl Timeframe {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1Min",
            Timeframe::FiveMinutes => "5Min",
            Timeframe::FifteenMinutes => "15Min",
            Timeframe::ThirtyMinutes => "30Min",
            Timeframe::OneHour => "1Hour",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Timeframe::OneMinute => Duration::minutes(1),
            Timeframe::FiveMinutes => Duration::minutes(5),
            Timeframe::FifteenMinutes => Duration::minutes(15),
            Timeframe::ThirtyMinutes => Duration::minutes(30),
            Timeframe::OneHour => Duration::hours(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLC bar with its timestamp in exchange local time
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Tz>,
    pub timeframe: Timeframe,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar with validation
    pub fn new(
        timestamp: DateTime<Tz>,
        timeframe: Timeframe,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self {
            timestamp,
            timeframe,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    pub fn validate(&self) -> Result<(), BarValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarValidationError::InvalidPrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

/// Option-style trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price with exact decimal representation, always rounded to cents
///
/// Reference levels and signal prices are compared and printed at 2 decimal
/// places, so they are kept as `Decimal` instead of `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Price {
    const CENTS: u32 = 2;

    /// Round a raw quote to cents, half away from zero.
    /// Returns `None` for NaN or infinite input.
    pub fn from_f64(value: f64) -> Option<Self> {
        let raw = Decimal::from_f64(value)?;
        Some(Price(raw.round_dp_with_strategy(
            Self::CENTS,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    /// Convert to f64 for comparison against raw bar closes
    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Breakout threshold derived from the opening 15-minute bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceLevel {
    pub price: Price,
    /// Direction of the opening bar; `None` when it closed flat
    pub direction: Option<Direction>,
}

impl ReferenceLevel {
    /// Derive the level from the opening bar: close rounded to cents,
    /// direction from the sign of `close - open`
    pub fn from_opening_bar(bar: &Bar) -> Option<Self> {
        let price = Price::from_f64(bar.close)?;
        let direction = if bar.close > bar.open {
            Some(Direction::Call)
        } else if bar.close < bar.open {
            Some(Direction::Put)
        } else {
            None
        };
        Some(Self { price, direction })
    }
}

/// Confirmed breakout, produced at most once per security per session
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: Symbol,
    pub direction: Direction,
    pub price: Price,
    pub time: DateTime<Tz>,
}

impl Signal {
    /// Render the notification text
    pub fn message(&self, strategy_name: &str) -> String {
        format!(
            "📈 Strategy: {}\n📊 Ticker: {}\n📌 Signal: {} at {}\n💵 Price: ${}",
            strategy_name,
            self.symbol,
            self.direction,
            self.time.format("%H:%M"),
            self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use rust_decimal_macros::dec;

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            timestamp: New_York.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap(),
            timeframe: Timeframe::FifteenMinutes,
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_reference_level_direction() {
        let up = ReferenceLevel::from_opening_bar(&bar(99.0, 100.0)).unwrap();
        assert_eq!(up.direction, Some(Direction::Call));

        let down = ReferenceLevel::from_opening_bar(&bar(101.0, 100.0)).unwrap();
        assert_eq!(down.direction, Some(Direction::Put));

        let flat = ReferenceLevel::from_opening_bar(&bar(100.0, 100.0)).unwrap();
        assert_eq!(flat.direction, None);
    }

    #[test]
    fn test_reference_level_rounds_to_cents() {
        let level = ReferenceLevel::from_opening_bar(&bar(99.0, 100.456)).unwrap();
        assert_eq!(level.price.inner(), dec!(100.46));

        let level = ReferenceLevel::from_opening_bar(&bar(99.0, 100.004)).unwrap();
        assert_eq!(level.price.inner(), dec!(100.00));
    }

    #[test]
    fn test_price_display_always_two_decimals() {
        assert_eq!(Price::from_f64(100.6).unwrap().to_string(), "100.60");
        assert_eq!(Price::from_f64(7.0).unwrap().to_string(), "7.00");
        assert!(Price::from_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_signal_message_format() {
        let signal = Signal {
            symbol: Symbol::new("aapl"),
            direction: Direction::Call,
            price: Price::from_f64(100.6).unwrap(),
            time: New_York.with_ymd_and_hms(2024, 3, 12, 10, 5, 0).unwrap(),
        };

        assert_eq!(
            signal.message("Breakout Triple MACD"),
            "📈 Strategy: Breakout Triple MACD\n📊 Ticker: AAPL\n📌 Signal: CALL at 10:05\n💵 Price: $100.60"
        );
    }

    #[test]
    fn test_bar_validation() {
        let ts = New_York.with_ymd_and_hms(2024, 3, 12, 9, 31, 0).unwrap();
        assert!(Bar::new(ts, Timeframe::OneMinute, 10.0, 11.0, 9.0, 10.5, 100.0).is_ok());
        assert!(Bar::new(ts, Timeframe::OneMinute, 10.0, 9.0, 11.0, 10.5, 100.0).is_err());
        assert!(Bar::new(ts, Timeframe::OneMinute, 10.0, 11.0, 9.0, 12.0, 100.0).is_err());
        assert!(Bar::new(ts, Timeframe::OneMinute, f64::NAN, 11.0, 9.0, 10.0, 100.0).is_err());
    }

    #[test]
    fn test_timeframe_parsing() {
        let tf: Timeframe = serde_json::from_str("\"5Min\"").unwrap();
        assert_eq!(tf, Timeframe::FiveMinutes);
        assert!(serde_json::from_str::<Timeframe>("\"2Min\"").is_err());
        assert_eq!(serde_json::to_string(&Timeframe::FifteenMinutes).unwrap(), "\"15Min\"");
        assert_eq!(Timeframe::FifteenMinutes.duration(), Duration::minutes(15));
    }
}
