//! Opening-range breakout with triple-timeframe MACD confirmation
//!
//! - `reference`: the opening 15-minute bar becomes the breakout threshold
//! - `scanner`: per-security breakout state machine
//! - `momentum`: MACD vs signal line vote across timeframes

mod config;
pub mod momentum;
pub mod reference;
pub mod scanner;

pub use config::{ConfirmationMode, DirectionFilter, MacdParams, StrategyConfig, TimeframeWindow};
pub use momentum::{timeframe_confirms, MomentumConfirmer, MomentumVote};
pub use reference::ReferenceLevelCalculator;
pub use scanner::{detect_breakout, BreakoutScanner, ScanState, TickReport};
