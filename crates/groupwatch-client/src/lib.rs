//! GroupWatch client
//!
//! Provides:
//! - `RobloxClient`, the reqwest-backed `PlatformApi` implementation
//! - `PagedFetcher` for cursor- and offset-paged listings
//! - `RateLimitRetry`, a bounded fixed-backoff retry for HTTP 429

pub mod client;
mod dto;
pub mod paging;
pub mod retry;

pub use client::*;
pub use paging::*;
pub use retry::*;
