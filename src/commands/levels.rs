//! Levels command - print the session's reference levels without scanning

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::process::ExitCode;
use std::sync::Arc;

use breakout_signals::alpaca::AlpacaClient;
use breakout_signals::strategy::ReferenceLevelCalculator;

use super::{http_client, load_config, runtime};

pub fn run(config_path: String, date: Option<String>) -> Result<ExitCode> {
    let config = load_config(&config_path)?;
    let tz = config.session.tz()?;

    let date = match date {
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", d))?,
        None => Utc::now().with_timezone(&tz).date_naive(),
    };

    let client = Arc::new(AlpacaClient::new(
        http_client(&config)?,
        &config.alpaca,
        &config.session,
    )?);
    let calculator = ReferenceLevelCalculator::new(
        client,
        tz,
        config.session.market_open,
        config.strategy.reference_timeframe,
    );

    let levels = runtime()?.block_on(calculator.compute_watchlist(&config.strategy.watchlist, date));

    println!("\n{}", "=".repeat(60));
    println!(
        "REFERENCE LEVELS {} ({} {})",
        date,
        config.strategy.reference_timeframe,
        config.session.market_open.format("%H:%M")
    );
    println!("{}", "=".repeat(60));
    println!("  {:<8} {:>12} {:>10}", "Ticker", "Level", "Direction");
    for (symbol, level) in &levels {
        match level {
            Some(level) => println!(
                "  {:<8} {:>12} {:>10}",
                symbol.as_str(),
                format!("${}", level.price),
                level.direction.map(|d| d.as_str()).unwrap_or("FLAT")
            ),
            None => println!("  {:<8} {:>12} {:>10}", symbol.as_str(), "-", "ABSENT"),
        }
    }
    println!("{}\n", "=".repeat(60));

    Ok(ExitCode::SUCCESS)
}
