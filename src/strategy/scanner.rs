//! Breakout scanner
//!
//! Per-security state machine driven by polling ticks:
//!
//! ```text
//! Watching --breakout--> Confirming --quorum met--> Signaled (terminal)
//!     ^                      |
//!     +------rejected--------+
//! Excluded (terminal): no opening bar, or flat opening bar when the
//! institutional direction filter is on
//! ```
//!
//! The scanner owns every entry exclusively, so a security can only reach
//! `Signaled` once and a signal is sent at most once per session.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{DirectionFilter, StrategyConfig};
use super::momentum::MomentumConfirmer;
use crate::data::{fetch_window, BarSource};
use crate::error::DataError;
use crate::notify::Notifier;
use crate::{Direction, Price, ReferenceLevel, Signal, Symbol, Timeframe};

/// Bars fetched per tick: two completed closes plus the bar still forming
const PATTERN_BARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Watching,
    Confirming,
    Signaled,
    Excluded,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Signaled | ScanState::Excluded)
    }
}

/// Candidate direction for two completed closes against the reference level
///
/// Both closes must be strictly past the level on the same side. With the
/// institutional filter the side must also match the opening bar's direction.
pub fn detect_breakout(
    level: &ReferenceLevel,
    c1: f64,
    c2: f64,
    filter: DirectionFilter,
) -> Option<Direction> {
    let threshold = level.price.to_f64();
    let candidate = if c1 > threshold && c2 > threshold {
        Direction::Call
    } else if c1 < threshold && c2 < threshold {
        Direction::Put
    } else {
        return None;
    };

    match filter {
        DirectionFilter::Any => Some(candidate),
        DirectionFilter::Institutional if level.direction == Some(candidate) => Some(candidate),
        DirectionFilter::Institutional => None,
    }
}

#[derive(Debug, Clone)]
struct ScanEntry {
    symbol: Symbol,
    level: Option<ReferenceLevel>,
    state: ScanState,
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Securities that produced a usable bar window
    pub evaluated: usize,
    /// Securities skipped for missing data or fetch errors
    pub skipped: usize,
    /// Breakout candidates sent to confirmation
    pub candidates: usize,
    /// Candidates rejected by the momentum vote
    pub rejected: usize,
    pub signals: Vec<Signal>,
}

pub struct BreakoutScanner {
    source: Arc<dyn BarSource>,
    confirmer: MomentumConfirmer,
    notifier: Arc<dyn Notifier>,
    strategy_name: String,
    filter: DirectionFilter,
    scan_window: Duration,
    entries: Vec<ScanEntry>,
    signals: Vec<Signal>,
}

impl BreakoutScanner {
    /// Build the scan set from the session's reference levels
    pub fn new(
        source: Arc<dyn BarSource>,
        notifier: Arc<dyn Notifier>,
        config: &StrategyConfig,
        scan_window: Duration,
        levels: Vec<(Symbol, Option<ReferenceLevel>)>,
    ) -> Self {
        let filter = config.direction_filter;
        let entries = levels
            .into_iter()
            .map(|(symbol, level)| {
                let state = match level {
                    None => ScanState::Excluded,
                    Some(l) if filter == DirectionFilter::Institutional && l.direction.is_none() => {
                        ScanState::Excluded
                    }
                    Some(_) => ScanState::Watching,
                };
                if state == ScanState::Excluded {
                    info!("{} excluded from scanning", symbol);
                }
                ScanEntry {
                    symbol,
                    level,
                    state,
                }
            })
            .collect();

        Self {
            confirmer: MomentumConfirmer::new(source.clone(), config),
            source,
            notifier,
            strategy_name: config.name.clone(),
            filter,
            scan_window,
            entries,
            signals: Vec::new(),
        }
    }

    pub fn state(&self, symbol: &Symbol) -> Option<ScanState> {
        self.entries
            .iter()
            .find(|e| &e.symbol == symbol)
            .map(|e| e.state)
    }

    pub fn is_done(&self) -> bool {
        self.entries.iter().all(|e| e.state.is_terminal())
    }

    /// Every signal emitted this session, in emission order
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Evaluate every watching security once
    pub async fn tick(&mut self, now: DateTime<Tz>) -> TickReport {
        let mut report = TickReport::default();

        for idx in 0..self.entries.len() {
            if self.entries[idx].state != ScanState::Watching {
                continue;
            }
            self.scan_entry(idx, now, &mut report).await;
        }

        report
    }

    async fn scan_entry(&mut self, idx: usize, now: DateTime<Tz>, report: &mut TickReport) {
        let symbol = self.entries[idx].symbol.clone();
        let Some(level) = self.entries[idx].level else {
            self.entries[idx].state = ScanState::Excluded;
            return;
        };

        let bars = match fetch_window(
            self.source.as_ref(),
            &symbol,
            Timeframe::OneMinute,
            now - self.scan_window,
            now,
            PATTERN_BARS,
        )
        .await
        {
            Ok(bars) => bars,
            Err(DataError::InsufficientData { have, .. }) => {
                debug!("{} has {} recent 1Min bars, waiting for more", symbol, have);
                report.skipped += 1;
                return;
            }
            Err(e) => {
                warn!("Error scanning {}: {}", symbol, e);
                report.skipped += 1;
                return;
            }
        };
        report.evaluated += 1;

        // The newest bar may still be forming, so it is left out
        let n = bars.len();
        let c1 = bars[n - 3].close;
        let c2 = bars[n - 2].close;
        let moment = bars[n - 2].timestamp;

        let Some(direction) = detect_breakout(&level, c1, c2, self.filter) else {
            debug!(
                "{} no breakout: closes {:.2}, {:.2} vs level {}",
                symbol, c1, c2, level.price
            );
            return;
        };

        info!(
            "{} {} pattern detected at {}",
            symbol,
            direction,
            moment.format("%H:%M")
        );
        self.entries[idx].state = ScanState::Confirming;
        report.candidates += 1;

        let confirmed = self.confirmer.confirm(&symbol, moment, direction).await;
        let price = Price::from_f64(c2);

        match (confirmed, price) {
            (true, Some(price)) => {
                let signal = Signal {
                    symbol: symbol.clone(),
                    direction,
                    price,
                    time: moment,
                };
                self.entries[idx].state = ScanState::Signaled;
                info!("Signal fired: {} {} @ {}", symbol, direction, price);

                self.notifier
                    .send(&signal.message(&self.strategy_name))
                    .await;
                self.signals.push(signal.clone());
                report.signals.push(signal);
            }
            (true, None) => {
                warn!("{} confirmed but close {} is not a valid price", symbol, c2);
                self.entries[idx].state = ScanState::Watching;
            }
            (false, _) => {
                info!(
                    "{} signal discarded, MACD {:?} quorum not met",
                    symbol,
                    self.confirmer.mode()
                );
                self.entries[idx].state = ScanState::Watching;
                report.rejected += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, direction: Option<Direction>) -> ReferenceLevel {
        ReferenceLevel {
            price: Price::from_f64(price).unwrap(),
            direction,
        }
    }

    #[test]
    fn test_breakout_requires_both_closes_past_level() {
        let lvl = level(100.0, Some(Direction::Call));
        let any = DirectionFilter::Any;

        assert_eq!(detect_breakout(&lvl, 100.5, 100.6, any), Some(Direction::Call));
        assert_eq!(detect_breakout(&lvl, 99.5, 99.4, any), Some(Direction::Put));
        assert_eq!(detect_breakout(&lvl, 99.8, 100.1, any), None);
        assert_eq!(detect_breakout(&lvl, 100.1, 99.8, any), None);
    }

    #[test]
    fn test_breakout_equality_never_counts() {
        let lvl = level(50.0, Some(Direction::Call));
        let any = DirectionFilter::Any;

        assert_eq!(detect_breakout(&lvl, 50.0, 50.2, any), None);
        assert_eq!(detect_breakout(&lvl, 50.2, 50.0, any), None);
        assert_eq!(detect_breakout(&lvl, 50.0, 49.9, any), None);
        assert_eq!(detect_breakout(&lvl, 50.0, 50.0, any), None);
    }

    #[test]
    fn test_institutional_filter_requires_matching_direction() {
        let bullish = level(100.0, Some(Direction::Call));
        let bearish = level(100.0, Some(Direction::Put));
        let flat = level(100.0, None);
        let inst = DirectionFilter::Institutional;

        assert_eq!(detect_breakout(&bullish, 101.0, 101.5, inst), Some(Direction::Call));
        assert_eq!(detect_breakout(&bullish, 99.0, 98.5, inst), None);
        assert_eq!(detect_breakout(&bearish, 99.0, 98.5, inst), Some(Direction::Put));
        assert_eq!(detect_breakout(&bearish, 101.0, 101.5, inst), None);
        assert_eq!(detect_breakout(&flat, 101.0, 101.5, inst), None);
        assert_eq!(
            detect_breakout(&flat, 101.0, 101.5, DirectionFilter::Any),
            Some(Direction::Call)
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ScanState::Signaled.is_terminal());
        assert!(ScanState::Excluded.is_terminal());
        assert!(!ScanState::Watching.is_terminal());
        assert!(!ScanState::Confirming.is_terminal());
    }
}
