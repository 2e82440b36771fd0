//! Run command - one full signal session
//!
//! Verify access, check the start window, wait for the opening bar, then scan
//! until every security is done or the scan end time passes.

use anyhow::Result;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use breakout_signals::alpaca::AlpacaClient;
use breakout_signals::notify::{LogNotifier, Notifier, TelegramNotifier};
use breakout_signals::session::{Session, SessionOutcome, SystemClock};

use super::{http_client, load_config, runtime};

pub fn run(config_path: String, dry_run: bool, force: bool) -> Result<ExitCode> {
    let config = load_config(&config_path)?;
    let http = http_client(&config)?;

    let alpaca = Arc::new(AlpacaClient::new(http.clone(), &config.alpaca, &config.session)?);
    let notifier: Arc<dyn Notifier> = if dry_run {
        info!("Dry run: signals are logged, not sent");
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramNotifier::new(http, &config.telegram)?)
    };
    let clock = Arc::new(SystemClock::new(config.session.tz()?));
    let session = Session::new(&config, alpaca.clone(), notifier, clock)?;

    println!("\n{}", "=".repeat(60));
    println!("{}", config.strategy.name);
    println!("{}", "=".repeat(60));
    println!("  Watchlist:    {}", config.strategy.watchlist.len());
    println!("  Filter:       {:?}", config.strategy.direction_filter);
    println!(
        "  Confirmation: {:?} ({}/{} timeframes)",
        config.strategy.confirmation,
        config.strategy.quorum(),
        config.strategy.timeframes.len()
    );
    println!("  Scan end:     {}", config.session.scan_end.format("%H:%M"));
    println!("{}\n", "=".repeat(60));

    let outcome = runtime()?.block_on(session.run(alpaca.as_ref(), force));

    match outcome {
        SessionOutcome::VerificationFailed => {
            eprintln!("Could not start: check API keys or market data subscription");
            Ok(ExitCode::FAILURE)
        }
        SessionOutcome::OutsideStartWindow(now) => {
            println!(
                "Started outside the operating window ({}), strategy not run. Use --force to override.",
                now.format("%H:%M")
            );
            Ok(ExitCode::SUCCESS)
        }
        SessionOutcome::Completed(summary) => {
            println!("\n{}", "=".repeat(60));
            println!("SESSION SUMMARY {}", summary.date);
            println!("{}", "=".repeat(60));
            println!("  Securities:   {}", summary.watchlist);
            println!("  Excluded:     {}", summary.excluded.len());
            println!("  Ticks:        {}", summary.ticks);
            println!("  Signals:      {}", summary.signals.len());
            for signal in &summary.signals {
                println!(
                    "    {} {} at {} @ ${}",
                    signal.symbol,
                    signal.direction,
                    signal.time.format("%H:%M"),
                    signal.price
                );
            }
            println!("{}\n", "=".repeat(60));
            Ok(ExitCode::SUCCESS)
        }
    }
}
