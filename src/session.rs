//! Session scheduler
//!
//! One session per trading day: verify access, check the start window, wait
//! for the opening bar to close, compute reference levels once, then tick the
//! breakout scanner at a fixed interval until every security is terminal or
//! the scan end time passes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, SessionConfig};
use crate::data::BarSource;
use crate::error::ConfigError;
use crate::notify::Notifier;
use crate::strategy::{BreakoutScanner, ReferenceLevelCalculator, StrategyConfig};
use crate::{ReferenceLevel, Signal, Symbol};

/// Source of local time and of waiting
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock in the exchange timezone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances time
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Tz>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Tz>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, time: DateTime<Tz>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = time;
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += step;
    }
}

/// Credential and connectivity check run before a session
#[async_trait]
pub trait Preflight: Send + Sync {
    async fn verify(&self) -> bool;
}

/// How a `run` ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    VerificationFailed,
    /// Started outside the start window; nothing was scanned
    OutsideStartWindow(DateTime<Tz>),
    Completed(SessionSummary),
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub date: NaiveDate,
    pub watchlist: usize,
    pub excluded: Vec<Symbol>,
    pub ticks: usize,
    pub signals: Vec<Signal>,
}

pub struct Session {
    schedule: SessionConfig,
    strategy: StrategyConfig,
    tz: Tz,
    source: Arc<dyn BarSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl Session {
    pub fn new(
        config: &Config,
        source: Arc<dyn BarSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            schedule: config.session.clone(),
            strategy: config.strategy.clone(),
            tz: config.session.tz()?,
            source,
            notifier,
            clock,
        })
    }

    /// Full session; `force` skips the start window check
    pub async fn run(&self, preflight: &dyn Preflight, force: bool) -> SessionOutcome {
        info!("Verifying market data access...");
        if !preflight.verify().await {
            warn!("Verification failed, check API keys or data subscription");
            return SessionOutcome::VerificationFailed;
        }

        let now = self.clock.now();
        if !force && !self.schedule.in_start_window(now.time()) {
            info!(
                "Started outside the operating window ({}, window {}-{}), strategy not run",
                now.format("%H:%M"),
                self.schedule.start_window_open.format("%H:%M"),
                self.schedule.start_window_close.format("%H:%M")
            );
            return SessionOutcome::OutsideStartWindow(now);
        }

        info!("Session active for {}", now.date_naive());
        SessionOutcome::Completed(self.trade_day().await)
    }

    /// Wait for the reference bar, compute levels, then scan
    pub async fn trade_day(&self) -> SessionSummary {
        self.wait_for_reference().await;

        let date = self.clock.now().date_naive();
        let calculator = ReferenceLevelCalculator::new(
            self.source.clone(),
            self.tz,
            self.schedule.market_open,
            self.strategy.reference_timeframe,
        );
        let levels = calculator
            .compute_watchlist(&self.strategy.watchlist, date)
            .await;

        self.scan(date, levels).await
    }

    /// Sleep in fixed steps until the opening bar has closed
    pub async fn wait_for_reference(&self) {
        let ready = self.schedule.reference_ready;
        if self.clock.now().time() < ready {
            info!(
                "Waiting for the {} opening bar to close ({})",
                self.strategy.reference_timeframe,
                ready.format("%H:%M")
            );
        }
        while self.clock.now().time() < ready {
            self.clock.sleep(self.schedule.wait_poll()).await;
        }
    }

    async fn scan(
        &self,
        date: NaiveDate,
        levels: Vec<(Symbol, Option<ReferenceLevel>)>,
    ) -> SessionSummary {
        let watchlist = levels.len();
        let mut scanner = BreakoutScanner::new(
            self.source.clone(),
            self.notifier.clone(),
            &self.strategy,
            chrono::Duration::minutes(self.schedule.scan_window_minutes),
            levels,
        );

        let excluded: Vec<Symbol> = self
            .strategy
            .watchlist
            .iter()
            .filter(|s| scanner.state(s).is_some_and(|st| st.is_terminal()))
            .cloned()
            .collect();

        info!(
            "Starting minute-by-minute scan of {} securities",
            watchlist - excluded.len()
        );

        let mut ticks = 0;
        loop {
            if scanner.is_done() {
                info!("Every security is signaled or excluded, scan finished");
                break;
            }
            let now = self.clock.now();
            if now.time() >= self.schedule.scan_end {
                info!("Scan end {} reached", self.schedule.scan_end.format("%H:%M"));
                break;
            }

            let report = scanner.tick(now).await;
            ticks += 1;
            debug!(
                "Tick {} at {}: {} evaluated, {} skipped, {} candidates, {} rejected, {} signals",
                ticks,
                now.format("%H:%M:%S"),
                report.evaluated,
                report.skipped,
                report.candidates,
                report.rejected,
                report.signals.len()
            );

            if scanner.is_done() {
                continue;
            }
            self.clock.sleep(self.schedule.poll_interval()).await;
        }

        let signals = scanner.signals().to_vec();
        info!("Session complete: {} ticks, {} signals", ticks, signals.len());

        SessionSummary {
            date,
            watchlist,
            excluded,
            ticks,
            signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2024, 3, 12, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new(at(9, 30));
        clock.sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), at(9, 31) + chrono::Duration::seconds(30));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
    }

    #[test]
    fn test_system_clock_uses_zone() {
        let clock = SystemClock::new(New_York);
        assert_eq!(clock.now().timezone(), New_York);
    }
}
