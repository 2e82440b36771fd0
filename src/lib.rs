//! Breakout Signals
//!
//! Opening-range breakout signal engine for US equities. The close of the
//! first 15-minute bar sets a per-security threshold; two consecutive
//! 1-minute closes beyond it form a candidate, which is sent as a Telegram
//! alert only when MACD momentum agrees on enough timeframes.

pub mod alpaca;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod notify;
pub mod session;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use types::*;
