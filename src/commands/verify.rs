//! Verify command - credential and data-access check only

use anyhow::Result;
use std::process::ExitCode;

use breakout_signals::alpaca::AlpacaClient;

use super::{http_client, load_config, runtime};

pub fn run(config_path: String) -> Result<ExitCode> {
    let config = load_config(&config_path)?;
    let client = AlpacaClient::new(http_client(&config)?, &config.alpaca, &config.session)?;

    if runtime()?.block_on(client.verify()) {
        println!("Alpaca credentials and market data access OK");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Verification failed: check API keys or market data subscription");
        Ok(ExitCode::FAILURE)
    }
}
