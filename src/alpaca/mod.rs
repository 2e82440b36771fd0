//! Alpaca API client for historical stock bars and the market clock
//! Market-data and trading endpoints both authenticate with the key/secret headers.

mod client;
mod types;

pub use client::AlpacaClient;
pub use types::*;
