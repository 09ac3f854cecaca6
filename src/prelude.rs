//! Convenient re-exports for common Turnstile types.
pub use crate::{
    identity::{PeerAddr, FORWARDED_FOR_HEADER, TOKEN_HEADER},
    limiter::{InvalidPolicy, KeyedLimiter, Policy, RequestLimiter},
    middleware::{RateLimitLayer, RateLimitService},
    store::{CounterStore, InMemoryCounterStore},
};
