#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile 🎟️
//!
//! Identity-keyed HTTP rate limiting for async Rust: fixed-window admission
//! decisions backed by pluggable atomic counter stores.
//!
//! ## Features
//!
//! - **Dual identity precedence**: API token overrides source IP, each class
//!   with its own request budget
//! - **Fixed window with refresh-on-success**: the window expiry resets on
//!   every allowed request, never on a denial
//! - **Pluggable counter stores** via the [`CounterStore`] trait (in-memory
//!   included; Redis in the `turnstile-redis` companion crate)
//! - **Tower middleware** ([`RateLimitLayer`]) that rejects over-budget
//!   requests with `429 Too Many Requests` before they reach your service
//! - **Fail-closed on store errors**: an unreachable store denies the
//!   request rather than waving it through
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{InMemoryCounterStore, Policy, RequestLimiter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RequestLimiter::new(
//!         InMemoryCounterStore::new(),
//!         Policy::new(5, Duration::from_secs(60)).expect("valid policy"),
//!         InMemoryCounterStore::new(),
//!         Policy::new(10, Duration::from_secs(60)).expect("valid policy"),
//!     );
//!
//!     // Token identity takes precedence over IP.
//!     assert!(limiter.allow_request("203.0.113.5", "").await);
//!     assert!(limiter.allow_request("", "some-token").await);
//! }
//! ```

pub mod identity;
pub mod limiter;
pub mod middleware;
pub mod prelude;
pub mod store;

// Re-exports
pub use identity::{api_token, client_ip, PeerAddr, FORWARDED_FOR_HEADER, TOKEN_HEADER};
pub use limiter::{
    InvalidPolicy, KeyedLimiter, Policy, RequestLimiter, IP_KEY_PREFIX, TOKEN_KEY_PREFIX,
};
pub use middleware::{RateLimitLayer, RateLimitService, DENIED_BODY};
pub use store::{CounterStore, InMemoryCounterStore};
