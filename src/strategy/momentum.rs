//! Multi-timeframe MACD confirmation
//!
//! Each configured timeframe casts a vote: confirmed, rejected, or skipped
//! (too few bars, fetch failure). Skipped timeframes count toward neither side
//! of the quorum.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{ConfirmationMode, MacdParams, StrategyConfig, TimeframeWindow};
use crate::data::{fetch_window, BarSource};
use crate::error::{DataError, DataResult};
use crate::indicators::macd;
use crate::{Direction, Symbol};

/// Outcome of one confirmation round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MomentumVote {
    pub confirmed: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub quorum: usize,
}

impl MomentumVote {
    pub fn passed(&self) -> bool {
        self.confirmed >= self.quorum
    }

    /// Timeframes that produced a verdict
    pub fn reporting(&self) -> usize {
        self.confirmed + self.rejected
    }
}

/// Decide one timeframe from its close series
///
/// Returns `None` when the oscillator has not settled on enough bars for the
/// chosen mode.
pub fn timeframe_confirms(
    closes: &[f64],
    params: MacdParams,
    mode: ConfirmationMode,
    direction: Direction,
) -> Option<bool> {
    let (macd_line, signal_line) = macd(closes, params.fast, params.slow, params.signal);
    let settled: Vec<(f64, f64)> = macd_line
        .iter()
        .zip(signal_line.iter())
        .filter_map(|(m, s)| Some(((*m)?, (*s)?)))
        .collect();

    match mode {
        ConfirmationMode::Alignment => {
            let &(m, s) = settled.last()?;
            Some(match direction {
                Direction::Call => m > s,
                Direction::Put => m < s,
            })
        }
        ConfirmationMode::Crossover => {
            if settled.len() < 2 {
                return None;
            }
            let (m_prev, s_prev) = settled[settled.len() - 2];
            let (m, s) = settled[settled.len() - 1];
            Some(match direction {
                Direction::Call => m_prev < s_prev && m > s,
                Direction::Put => m_prev > s_prev && m < s,
            })
        }
    }
}

pub struct MomentumConfirmer {
    source: Arc<dyn BarSource>,
    timeframes: Vec<TimeframeWindow>,
    params: MacdParams,
    mode: ConfirmationMode,
    quorum: usize,
    min_bars: usize,
}

impl MomentumConfirmer {
    pub fn new(source: Arc<dyn BarSource>, config: &StrategyConfig) -> Self {
        Self {
            source,
            timeframes: config.timeframes.clone(),
            params: config.macd,
            mode: config.confirmation,
            quorum: config.quorum(),
            min_bars: config.min_bars,
        }
    }

    pub fn mode(&self) -> ConfirmationMode {
        self.mode
    }

    /// True when enough timeframes confirm `direction` at `moment`
    pub async fn confirm(&self, symbol: &Symbol, moment: DateTime<Tz>, direction: Direction) -> bool {
        self.evaluate(symbol, moment, direction).await.passed()
    }

    /// Full vote breakdown for `direction` at `moment`
    pub async fn evaluate(
        &self,
        symbol: &Symbol,
        moment: DateTime<Tz>,
        direction: Direction,
    ) -> MomentumVote {
        let mut vote = MomentumVote {
            quorum: self.quorum,
            ..MomentumVote::default()
        };

        for window in &self.timeframes {
            match self.check_timeframe(symbol, window, moment, direction).await {
                Ok(true) => {
                    info!("  {} {}: MACD confirms {}", symbol, window.timeframe, direction);
                    vote.confirmed += 1;
                }
                Ok(false) => {
                    info!("  {} {}: MACD does not confirm {}", symbol, window.timeframe, direction);
                    vote.rejected += 1;
                }
                Err(DataError::InsufficientData { have, need, .. }) => {
                    info!(
                        "  {} {}: insufficient data ({}/{} bars), timeframe excluded",
                        symbol, window.timeframe, have, need
                    );
                    vote.skipped += 1;
                }
                Err(e) => {
                    warn!("  {} {}: {}, timeframe excluded", symbol, window.timeframe, e);
                    vote.skipped += 1;
                }
            }
        }

        debug!(
            "{} {} vote: {}/{} confirmed (quorum {}, {} skipped)",
            symbol,
            direction,
            vote.confirmed,
            vote.reporting(),
            vote.quorum,
            vote.skipped
        );

        vote
    }

    async fn check_timeframe(
        &self,
        symbol: &Symbol,
        window: &TimeframeWindow,
        moment: DateTime<Tz>,
        direction: Direction,
    ) -> DataResult<bool> {
        let start = moment - Duration::minutes(window.lookback_minutes);
        let bars = fetch_window(
            self.source.as_ref(),
            symbol,
            window.timeframe,
            start,
            moment,
            0,
        )
        .await?;

        let closes: Vec<f64> = bars
            .iter()
            .map(|b| b.close)
            .filter(|c| c.is_finite())
            .collect();

        let insufficient = || DataError::InsufficientData {
            symbol: symbol.clone(),
            timeframe: window.timeframe,
            have: closes.len(),
            need: self.min_bars,
        };

        if closes.len() < self.min_bars {
            return Err(insufficient());
        }

        timeframe_confirms(&closes, self.params, self.mode, direction).ok_or_else(insufficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 0.02 * (i * i) as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 200.0 - 0.02 * (i * i) as f64).collect()
    }

    /// Steady decline, then one bar that jumps well above the trend
    fn reversal_up(n: usize) -> Vec<f64> {
        let mut closes: Vec<f64> = (0..n - 1).map(|i| 150.0 - 0.5 * i as f64).collect();
        let last = closes[closes.len() - 1];
        closes.push(last + 10.0);
        closes
    }

    #[test]
    fn test_alignment_follows_trend() {
        let params = MacdParams::default();
        let mode = ConfirmationMode::Alignment;

        assert_eq!(timeframe_confirms(&rising(60), params, mode, Direction::Call), Some(true));
        assert_eq!(timeframe_confirms(&rising(60), params, mode, Direction::Put), Some(false));
        assert_eq!(timeframe_confirms(&falling(60), params, mode, Direction::Put), Some(true));
        assert_eq!(timeframe_confirms(&falling(60), params, mode, Direction::Call), Some(false));
    }

    #[test]
    fn test_crossover_requires_fresh_cross() {
        let params = MacdParams::default();
        let mode = ConfirmationMode::Crossover;

        assert_eq!(timeframe_confirms(&reversal_up(46), params, mode, Direction::Call), Some(true));
        assert_eq!(timeframe_confirms(&reversal_up(46), params, mode, Direction::Put), Some(false));
        // Already above the signal line on both bars: aligned but no cross
        assert_eq!(timeframe_confirms(&rising(60), params, mode, Direction::Call), Some(false));
    }

    #[test]
    fn test_unsettled_series_has_no_verdict() {
        let params = MacdParams::default();
        assert_eq!(
            timeframe_confirms(&rising(33), params, ConfirmationMode::Alignment, Direction::Call),
            None
        );
        // One settled point is enough to align but not to cross
        assert!(timeframe_confirms(&rising(34), params, ConfirmationMode::Alignment, Direction::Call).is_some());
        assert_eq!(
            timeframe_confirms(&rising(34), params, ConfirmationMode::Crossover, Direction::Call),
            None
        );
    }

    #[test]
    fn test_vote_quorum() {
        let vote = MomentumVote {
            confirmed: 2,
            rejected: 0,
            skipped: 1,
            quorum: 2,
        };
        assert!(vote.passed());
        assert_eq!(vote.reporting(), 2);

        let vote = MomentumVote {
            confirmed: 1,
            rejected: 0,
            skipped: 2,
            quorum: 2,
        };
        assert!(!vote.passed());
    }
}
