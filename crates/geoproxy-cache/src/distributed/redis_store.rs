//! Redis backend with native millisecond TTL.

use std::time::Duration;

use async_trait::async_trait;
use geoproxy_core::BackendError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::debug;

use super::{DistributedStore, namespaced};

/// Number of keys requested per SCAN round when clearing a namespace.
const SCAN_BATCH: usize = 500;

/// Deadline for the connect + `PING` handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Distributed store backed by Redis.
///
/// Values are stored as JSON text under `"<namespace>:<key>"` with a
/// `PX` expiry.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    /// Connects to `url` and verifies the server answers `PING` within
    /// [`CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] if the URL is invalid or the
    /// handshake fails or times out.
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, BackendError> {
        Self::connect_with_timeout(url, namespace, CONNECT_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect) with an explicit handshake deadline.
    pub async fn connect_with_timeout(
        url: &str,
        namespace: &str,
        deadline: Duration,
    ) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)
            .map_err(|e| BackendError::unavailable(format!("invalid redis url: {}", e)))?;

        let conn = tokio::time::timeout(deadline, Self::handshake(client))
            .await
            .map_err(|_| {
                BackendError::unavailable(format!(
                    "redis handshake timed out after {}ms",
                    deadline.as_millis()
                ))
            })??;

        debug!(namespace = %namespace, "Redis connection established");

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    async fn handshake(client: redis::Client) -> Result<ConnectionManager, BackendError> {
        // Handshake explicito: un servidor caido falla aqui, sin reintentos
        let mut check = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BackendError::unavailable(format!("redis connect failed: {}", e)))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut check)
            .await
            .map_err(|e| BackendError::unavailable(format!("redis PING failed: {}", e)))?;

        ConnectionManager::new(client)
            .await
            .map_err(|e| BackendError::unavailable(format!("redis connect failed: {}", e)))
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.namespace, key)
    }
}

#[async_trait]
impl DistributedStore for RedisStore {
    async fn try_get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(key)).await.map_err(io_error)?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let redis_key = self.key(key);

        let millis = px_millis(ttl);
        if millis == 0 {
            // TTL cero: no cachear, y no dejar un valor anterior visible
            let _: () = conn.del(redis_key).await.map_err(io_error)?;
            return Ok(());
        }

        let json = serde_json::to_string(value)?;
        let _: () = redis::cmd("SET")
            .arg(redis_key)
            .arg(json)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(io_error)?;
        Ok(())
    }

    async fn try_clear(&self) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let pattern = scan_pattern(&self.namespace);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(io_error)?;

            if !keys.is_empty() {
                removed += keys.len();
                let _: () = conn.del(keys).await.map_err(io_error)?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(namespace = %self.namespace, removed, "Redis namespace cleared");
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}

/// `PX` argument for `ttl`. Solo un TTL cero da 0; un TTL positivo menor
/// a 1ms se redondea hacia arriba.
fn px_millis(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// `MATCH` pattern for every key of `namespace`, with glob characters in
/// the namespace escaped.
fn scan_pattern(namespace: &str) -> String {
    let mut pattern = String::with_capacity(namespace.len() + 2);
    for c in namespace.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

fn io_error(e: redis::RedisError) -> BackendError {
    BackendError::io(e.to_string())
}
