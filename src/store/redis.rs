//! Redis-backed key-value store.
//!
//! Uses a [`ConnectionManager`], which multiplexes one connection and
//! reconnects on failure; it is cheap to clone per command.

use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{AsyncCommands, Client, Script};
use async_trait::async_trait;
use tracing::info;

use super::{KeyValueStore, WindowCount};
use crate::{ItineraError, Result};

/// Increment + first-write expiry in one server-side step.
///
/// Also gives a TTL to a counter that has none, so a key left behind by a
/// non-scripted writer cannot pin the window shut.
const INCR_WINDOW_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
local window = tonumber(ARGV[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], window)
end
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
    redis.call('EXPIRE', KEYS[1], window)
    ttl = window
end
return {count, ttl}
";

/// [`KeyValueStore`] over a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    incr_window: Script,
}

impl RedisStore {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Some(Duration::from_secs(2)));

        let client = Client::open(url)
            .map_err(|e| ItineraError::Configuration(format!("invalid Redis URL: {e}")))?;
        let conn = client.get_connection_manager_with_config(config).await?;
        info!(url, "connected to Redis");

        Ok(Self::from_manager(conn))
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self {
            conn,
            incr_window: Script::new(INCR_WINDOW_SCRIPT),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // Redis rejects a zero expiry.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        // -2: missing key, -1: no expiry.
        let secs: i64 = conn.ttl(key).await?;
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let mut conn = self.conn.clone();
        let (count, ttl): (u64, i64) = self
            .incr_window
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowCount {
            count,
            remaining: Duration::from_secs(ttl.max(0) as u64),
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
