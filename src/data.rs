//! Bar source abstraction
//!
//! The engine never talks to a market-data API directly; it asks a
//! `BarSource` for bars. `AlpacaClient` is the live implementation and
//! `MemoryBarSource` serves synthetic bars for tests.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DataError, DataResult, FetchError};
use crate::{Bar, Symbol, Timeframe};

/// Supplies OHLC bars for a symbol, timeframe and inclusive time range
///
/// Implementations return bars ascending by timestamp, normalized to the
/// exchange timezone. An empty vector means "no data for that range" and is
/// not an error.
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<Bar>, FetchError>;
}

/// Fetch a window and require at least `need` bars
pub async fn fetch_window(
    source: &dyn BarSource,
    symbol: &Symbol,
    timeframe: Timeframe,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    need: usize,
) -> DataResult<Vec<Bar>> {
    let mut bars = source.get_bars(symbol, timeframe, start, end).await?;
    bars.sort_by_key(|b| b.timestamp);

    if bars.len() < need {
        return Err(DataError::InsufficientData {
            symbol: symbol.clone(),
            timeframe,
            have: bars.len(),
            need,
        });
    }

    Ok(bars)
}

/// In-memory bar source keyed by (symbol, timeframe)
///
/// Range queries are inclusive on both ends. A (symbol, timeframe) pair can be
/// marked as failing to simulate transport errors.
#[derive(Debug, Default)]
pub struct MemoryBarSource {
    bars: Mutex<HashMap<(Symbol, Timeframe), Vec<Bar>>>,
    failing: Mutex<HashMap<(Symbol, Timeframe), String>>,
    requests: Mutex<Vec<(Symbol, Timeframe)>>,
}

impl MemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bars for a symbol; each bar carries its own timeframe
    pub fn insert(&self, symbol: &Symbol, bars: impl IntoIterator<Item = Bar>) {
        let mut store = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for bar in bars {
            store
                .entry((symbol.clone(), bar.timeframe))
                .or_default()
                .push(bar);
        }
        for series in store.values_mut() {
            series.sort_by_key(|b| b.timestamp);
        }
    }

    /// Replace every bar for (symbol, timeframe)
    pub fn replace(&self, symbol: &Symbol, timeframe: Timeframe, bars: Vec<Bar>) {
        let mut store = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        store.insert((symbol.clone(), timeframe), bars);
    }

    pub fn fail(&self, symbol: &Symbol, timeframe: Timeframe, reason: impl Into<String>) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert((symbol.clone(), timeframe), reason.into());
    }

    pub fn recover(&self, symbol: &Symbol, timeframe: Timeframe) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.remove(&(symbol.clone(), timeframe));
    }

    /// Number of requests made for a (symbol, timeframe) pair
    pub fn request_count(&self, symbol: &Symbol, timeframe: Timeframe) -> usize {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests
            .iter()
            .filter(|(s, tf)| s == symbol && *tf == timeframe)
            .count()
    }

    /// Total requests made for a symbol across all timeframes
    pub fn symbol_request_count(&self, symbol: &Symbol) -> usize {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.iter().filter(|(s, _)| s == symbol).count()
    }
}

#[async_trait]
impl BarSource for MemoryBarSource {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<Bar>, FetchError> {
        {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.push((symbol.clone(), timeframe));
        }

        {
            let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(reason) = failing.get(&(symbol.clone(), timeframe)) {
                return Err(FetchError::Api {
                    status: 503,
                    body: reason.clone(),
                });
            }
        }

        let store = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        Ok(store
            .get(&(symbol.clone(), timeframe))
            .map(|series| {
                series
                    .iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::America::New_York;

    fn minute_bars(start: DateTime<Tz>, closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::minutes(i as i64),
                timeframe: Timeframe::OneMinute,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 100.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_memory_source_range_is_inclusive() {
        let source = MemoryBarSource::new();
        let symbol = Symbol::new("SPY");
        let start = New_York.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        source.insert(&symbol, minute_bars(start, &[1.0, 2.0, 3.0, 4.0, 5.0]));

        let bars = source
            .get_bars(
                &symbol,
                Timeframe::OneMinute,
                start + Duration::minutes(1),
                start + Duration::minutes(3),
            )
            .await
            .unwrap();

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
        assert_eq!(source.request_count(&symbol, Timeframe::OneMinute), 1);
    }

    #[tokio::test]
    async fn test_fetch_window_reports_insufficient_data() {
        let source = MemoryBarSource::new();
        let symbol = Symbol::new("SPY");
        let start = New_York.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        source.insert(&symbol, minute_bars(start, &[1.0, 2.0]));

        let err = fetch_window(
            &source,
            &symbol,
            Timeframe::OneMinute,
            start,
            start + Duration::minutes(5),
            3,
        )
        .await
        .unwrap_err();

        assert!(err.is_insufficient());
    }

    #[tokio::test]
    async fn test_fetch_window_reports_transient_failure() {
        let source = MemoryBarSource::new();
        let symbol = Symbol::new("SPY");
        let start = New_York.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        source.fail(&symbol, Timeframe::OneMinute, "upstream down");

        let err = fetch_window(
            &source,
            &symbol,
            Timeframe::OneMinute,
            start,
            start + Duration::minutes(5),
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DataError::Transient(FetchError::Api { status: 503, .. })));
    }
}
