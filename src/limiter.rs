use crate::store::CounterStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key prefix for counters keyed by client IP.
pub const IP_KEY_PREFIX: &str = "ratelimit:ip:";
/// Key prefix for counters keyed by API token.
pub const TOKEN_KEY_PREFIX: &str = "ratelimit:token:";

/// Errors produced while building a [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPolicy {
    /// `max_requests` must be > 0.
    #[error("max_requests must be > 0")]
    ZeroMaxRequests,
    /// `block_duration` must be > 0.
    #[error("block_duration must be > 0")]
    ZeroBlockDuration,
}

/// Request budget for one identity class: how many requests may land in a
/// window, and how long the window lives once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    max_requests: u64,
    block_duration: Duration,
}

impl Policy {
    /// Create a policy, validating that both values are positive.
    pub fn new(max_requests: u64, block_duration: Duration) -> Result<Self, InvalidPolicy> {
        if max_requests == 0 {
            return Err(InvalidPolicy::ZeroMaxRequests);
        }
        if block_duration.is_zero() {
            return Err(InvalidPolicy::ZeroBlockDuration);
        }
        Ok(Self { max_requests, block_duration })
    }

    /// Maximum requests admitted per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// How long a window (and thus a block, once the budget is spent) lasts.
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

/// Fixed-window limiter for a single identity class.
///
/// The window expiry is refreshed on every allowed request and never on a
/// denial, so a sustained burst of denied requests cannot keep extending a
/// block. The limiter holds no counter state of its own; everything lives in
/// the [`CounterStore`].
pub struct KeyedLimiter<S> {
    store: Arc<S>,
    prefix: &'static str,
    policy: Policy,
}

impl<S> Clone for KeyedLimiter<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), prefix: self.prefix, policy: self.policy }
    }
}

impl<S> fmt::Debug for KeyedLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLimiter")
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S> KeyedLimiter<S>
where
    S: CounterStore,
{
    /// Create a limiter that namespaces its counters under `prefix`.
    pub fn new(store: S, prefix: &'static str, policy: Policy) -> Self {
        Self { store: Arc::new(store), prefix, policy }
    }

    /// Decide whether the request identified by `id` is admitted.
    ///
    /// Store failures deny the request (fail-closed); an unparseable stored
    /// value counts as zero (fail-open for parsing only). Denials never
    /// mutate the store.
    pub async fn check(&self, id: &str) -> bool {
        let key = format!("{}{}", self.prefix, id);

        let count = match self.store.get(&key).await {
            Ok(value) => value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0),
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "counter read failed; denying request");
                return false;
            }
        };

        if count >= self.policy.max_requests() {
            tracing::debug!(key = %key, count, "rate limit exceeded");
            return false;
        }

        if let Err(error) = self.store.incr(&key).await {
            tracing::warn!(key = %key, error = %error, "counter increment failed; denying request");
            return false;
        }
        if let Err(error) = self.store.expire(&key, self.policy.block_duration()).await {
            tracing::warn!(key = %key, error = %error, "counter expiry failed; denying request");
            return false;
        }

        tracing::debug!(key = %key, count = count + 1, "request allowed");
        true
    }
}

/// Two-class admission engine: token identity takes strict precedence over
/// source IP.
///
/// Stateless between calls except for what it reads from and writes to the
/// counter stores, so it can be shared freely across request tasks.
pub struct RequestLimiter<S> {
    ip: KeyedLimiter<S>,
    token: KeyedLimiter<S>,
}

impl<S> Clone for RequestLimiter<S> {
    fn clone(&self) -> Self {
        Self { ip: self.ip.clone(), token: self.token.clone() }
    }
}

impl<S> fmt::Debug for RequestLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("ip", &self.ip)
            .field("token", &self.token)
            .finish()
    }
}

impl<S> RequestLimiter<S>
where
    S: CounterStore,
{
    /// Create an engine with one policy per identity class.
    ///
    /// The two stores may be clones of the same backend; counters never
    /// collide because each class gets its own key prefix.
    pub fn new(ip_store: S, ip_policy: Policy, token_store: S, token_policy: Policy) -> Self {
        Self {
            ip: KeyedLimiter::new(ip_store, IP_KEY_PREFIX, ip_policy),
            token: KeyedLimiter::new(token_store, TOKEN_KEY_PREFIX, token_policy),
        }
    }

    /// Decide whether a request from `ip` carrying `token` is admitted.
    ///
    /// A non-empty token selects the token policy and key; the IP (and its
    /// store) is never consulted in that case, even if the token is invalid
    /// upstream. Empty strings are the "absent" signal for both inputs.
    pub async fn allow_request(&self, ip: &str, token: &str) -> bool {
        if !token.is_empty() {
            self.token.check(token).await
        } else {
            self.ip.check(ip).await
        }
    }
}
