//! Key-value coordination store.
//!
//! Caching, quota limiting and OTP state all live in one shared key-value
//! store. Components only rely on per-key atomic primitives; there are no
//! multi-key transactions.
//!
//! - [`RedisStore`]: production backend over a Redis connection manager.
//! - [`MemoryStore`]: in-process backend on the tokio clock, for tests and
//!   single-node setups.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Outcome of one atomic windowed increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Counter value after the increment.
    pub count: u64,
    /// Time until the window (the key) expires.
    pub remaining: Duration,
}

/// Minimal key-value surface shared by every component.
///
/// Every method is one round-trip and atomic per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value with an expiry, overwriting any previous value and TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete a key. Returns `true` if this call removed it.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Remaining time-to-live, or `None` if the key is missing or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Increment a counter; if the result is 1, set its expiry to `window`.
    ///
    /// Must run as one atomic step. A counter found without an expiry also
    /// gets `window` as its TTL, so a counter orphaned by an earlier failure
    /// cannot block its key forever.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Round a remaining duration up to whole seconds, as the store reports it.
pub(crate) fn whole_seconds(remaining: Duration) -> Duration {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    Duration::from_secs(secs)
}
