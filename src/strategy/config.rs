//! Breakout + MACD strategy parameters

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{Symbol, Timeframe};

/// Whether a breakout must agree with the opening bar's direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionFilter {
    /// Only breakouts in the opening bar's direction count; flat openings are excluded
    Institutional,
    /// Either direction counts
    Any,
}

/// How a single timeframe confirms momentum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// MACD is on the right side of its signal line at the last bar
    Alignment,
    /// MACD crossed its signal line between the last two bars
    Crossover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// One confirmation timeframe and how far back to fetch for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeWindow {
    pub timeframe: Timeframe,
    pub lookback_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Name printed in the signal message (default: "Breakout Triple MACD")
    #[serde(default = "default_name")]
    pub name: String,

    /// Securities scanned this session
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<Symbol>,

    /// Timeframe of the opening bar (default: 15Min)
    #[serde(default = "default_reference_timeframe")]
    pub reference_timeframe: Timeframe,

    #[serde(default = "default_direction_filter")]
    pub direction_filter: DirectionFilter,

    #[serde(default = "default_confirmation")]
    pub confirmation: ConfirmationMode,

    /// Confirmations required; defaults to 2 for alignment and every timeframe for crossover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<usize>,

    #[serde(default)]
    pub macd: MacdParams,

    /// Bars a timeframe needs before it may vote (default: 35)
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeWindow>,
}

fn default_name() -> String {
    "Breakout Triple MACD".to_string()
}
fn default_watchlist() -> Vec<Symbol> {
    ["AAPL", "SPY", "TSLA", "MSFT", "NVDA", "AMD"]
        .iter()
        .map(Symbol::new)
        .collect()
}
fn default_reference_timeframe() -> Timeframe {
    Timeframe::FifteenMinutes
}
fn default_direction_filter() -> DirectionFilter {
    DirectionFilter::Institutional
}
fn default_confirmation() -> ConfirmationMode {
    ConfirmationMode::Alignment
}
fn default_min_bars() -> usize {
    35
}
fn default_timeframes() -> Vec<TimeframeWindow> {
    vec![
        TimeframeWindow {
            timeframe: Timeframe::OneMinute,
            lookback_minutes: 600,
        },
        TimeframeWindow {
            timeframe: Timeframe::FiveMinutes,
            lookback_minutes: 3 * 24 * 60,
        },
        TimeframeWindow {
            timeframe: Timeframe::FifteenMinutes,
            lookback_minutes: 7 * 24 * 60,
        },
    ]
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            watchlist: default_watchlist(),
            reference_timeframe: default_reference_timeframe(),
            direction_filter: default_direction_filter(),
            confirmation: default_confirmation(),
            quorum: None,
            macd: MacdParams::default(),
            min_bars: default_min_bars(),
            timeframes: default_timeframes(),
        }
    }
}

impl StrategyConfig {
    /// Confirmations required for a signal
    pub fn quorum(&self) -> usize {
        self.quorum.unwrap_or(match self.confirmation {
            ConfirmationMode::Alignment => 2,
            ConfirmationMode::Crossover => self.timeframes.len(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchlist.is_empty() {
            return Err(ConfigError::EmptyWatchlist);
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::NoTimeframes);
        }

        let quorum = self.quorum();
        if quorum == 0 || quorum > self.timeframes.len() {
            return Err(ConfigError::InvalidQuorum {
                quorum,
                timeframes: self.timeframes.len(),
            });
        }

        if self.macd.fast == 0 || self.macd.signal == 0 || self.macd.fast >= self.macd.slow {
            return Err(ConfigError::InvalidMacd {
                fast: self.macd.fast,
                slow: self.macd.slow,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quorum_per_mode() {
        let mut config = StrategyConfig::default();
        assert_eq!(config.quorum(), 2);

        config.confirmation = ConfirmationMode::Crossover;
        assert_eq!(config.quorum(), 3);

        config.quorum = Some(2);
        assert_eq!(config.quorum(), 2);
    }

    #[test]
    fn test_quorum_out_of_range() {
        let config = StrategyConfig {
            quorum: Some(4),
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuorum {
                quorum: 4,
                timeframes: 3
            })
        ));
    }

    #[test]
    fn test_macd_periods_checked() {
        let config = StrategyConfig {
            macd: MacdParams {
                fast: 26,
                slow: 12,
                signal: 9,
            },
            ..StrategyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMacd { .. })));
    }

    #[test]
    fn test_empty_watchlist_rejected() {
        let config = StrategyConfig {
            watchlist: vec![],
            ..StrategyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyWatchlist)));
    }
}
