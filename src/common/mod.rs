//! Common utilities shared across API clients

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
