//! 弹性模式模块：提供限流器和可选重试策略。
//!
//! # Resilience Primitives Module
//!
//! Throughput control for talking to rate-limited APIs.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Sliding-window limiter bounding request starts per second |
//! | [`retry`] | Opt-in retry policy (disabled by default) |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use batch_fetch::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn demo() {
//! let limiter = RateLimiter::new(RateLimiterConfig::per_second(25));
//!
//! // Suspends until a request may start.
//! limiter.acquire().await;
//! # }
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterSnapshot};
pub use retry::RetryPolicy;
