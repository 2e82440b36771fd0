pub mod levels;
pub mod run;
pub mod verify;

use anyhow::{Context, Result};
use breakout_signals::Config;

/// Load `.env`, then the JSON config with credentials from the environment
pub(crate) fn load_config(config_path: &str) -> Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub(crate) fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.alpaca.timeout())
        .build()
        .context("Failed to create HTTP client")
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}
