//! Reference level calculation
//!
//! The opening bar (09:30-09:45 local by default) is fetched once per session
//! per security; its close becomes the breakout threshold.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, warn};

use crate::data::BarSource;
use crate::error::{DataError, DataResult};
use crate::{ReferenceLevel, Symbol, Timeframe};

pub struct ReferenceLevelCalculator {
    source: Arc<dyn BarSource>,
    tz: Tz,
    market_open: NaiveTime,
    timeframe: Timeframe,
}

impl ReferenceLevelCalculator {
    pub fn new(
        source: Arc<dyn BarSource>,
        tz: Tz,
        market_open: NaiveTime,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            source,
            tz,
            market_open,
            timeframe,
        }
    }

    /// Local [open, open + timeframe] range for a session date
    ///
    /// Returns `None` only when the open falls into a DST gap.
    pub fn opening_range(&self, date: NaiveDate) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        let start = self
            .tz
            .from_local_datetime(&date.and_time(self.market_open))
            .earliest()?;
        Some((start, start + self.timeframe.duration()))
    }

    /// Reference level for one security, or `InsufficientData` when the
    /// opening bar is missing
    pub async fn compute(&self, symbol: &Symbol, date: NaiveDate) -> DataResult<ReferenceLevel> {
        let missing = || DataError::InsufficientData {
            symbol: symbol.clone(),
            timeframe: self.timeframe,
            have: 0,
            need: 1,
        };

        let (start, end) = self.opening_range(date).ok_or_else(missing)?;
        let bars = self
            .source
            .get_bars(symbol, self.timeframe, start, end)
            .await?;

        // The range end is inclusive, so the next bar may come back too
        let opening = bars
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .min_by_key(|b| b.timestamp)
            .ok_or_else(missing)?;

        ReferenceLevel::from_opening_bar(opening).ok_or_else(missing)
    }

    /// Compute levels for a whole watchlist; failures become `None`
    pub async fn compute_watchlist(
        &self,
        watchlist: &[Symbol],
        date: NaiveDate,
    ) -> Vec<(Symbol, Option<ReferenceLevel>)> {
        let mut levels = Vec::with_capacity(watchlist.len());

        for symbol in watchlist {
            let level = match self.compute(symbol, date).await {
                Ok(level) => {
                    info!(
                        "{} reference level {} (opening bar {})",
                        symbol,
                        level.price,
                        level
                            .direction
                            .map(|d| d.as_str())
                            .unwrap_or("FLAT")
                    );
                    Some(level)
                }
                Err(DataError::InsufficientData { .. }) => {
                    info!("{} has no {} opening bar for {}", symbol, self.timeframe, date);
                    None
                }
                Err(e) => {
                    warn!("{} reference level unavailable: {}", symbol, e);
                    None
                }
            };
            levels.push((symbol.clone(), level));
        }

        levels
    }
}
