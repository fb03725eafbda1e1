//! Document-table backend with an epoch-seconds TTL attribute.
//!
//! Rows follow the layout a DynamoDB-style table with TTL enabled expects:
//!
//! ```json
//! { "partitionKey": "<namespace>:<key>", "data": "<json>", "ttl": 1700000000, "createdAt": "2024-..." }
//! ```
//!
//! Such tables reap expired rows lazily (often hours late), so reads check
//! `ttl` themselves and treat an expired row as absent.
//!
//! There is no bulk delete: [`DistributedStore::try_clear`] is a no-op for
//! this backend. Rows age out through their `ttl`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use geoproxy_core::BackendError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{DistributedStore, namespaced};
use crate::clock::Clock;

/// A row of the cache table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    /// `"<namespace>:<key>"`.
    pub partition_key: String,
    /// The cached value as JSON text.
    pub data: String,
    /// Expiry as Unix epoch seconds.
    pub ttl: i64,
    /// Write time, RFC 3339.
    pub created_at: String,
}

impl TableRow {
    /// Returns true if the row's `ttl` has been reached at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.ttl.saturating_mul(1000)
    }
}

/// Minimal client interface for a document table.
///
/// Implement this over a real document-store SDK to use it as a cache
/// backend; [`MemoryTable`] is the in-process implementation.
#[async_trait]
pub trait DocumentTable: Send + Sync {
    /// Fetches the row with the given partition key.
    async fn get_item(&self, table: &str, partition_key: &str)
    -> Result<Option<TableRow>, BackendError>;

    /// Writes a row, replacing any row with the same partition key.
    async fn put_item(&self, table: &str, row: TableRow) -> Result<(), BackendError>;
}

/// In-process [`DocumentTable`], for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemoryTable {
    tables: RwLock<HashMap<String, HashMap<String, TableRow>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored row, expired or not.
    pub fn raw_row(&self, table: &str, partition_key: &str) -> Option<TableRow> {
        self.tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(partition_key))
            .cloned()
    }

    /// Returns the number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl DocumentTable for MemoryTable {
    async fn get_item(
        &self,
        table: &str,
        partition_key: &str,
    ) -> Result<Option<TableRow>, BackendError> {
        Ok(self.raw_row(table, partition_key))
    }

    async fn put_item(&self, table: &str, row: TableRow) -> Result<(), BackendError> {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(row.partition_key.clone(), row);
        Ok(())
    }
}

/// Distributed store over a [`DocumentTable`].
pub struct TableStore {
    client: Arc<dyn DocumentTable>,
    table: String,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl TableStore {
    pub fn new(
        client: Arc<dyn DocumentTable>,
        table: impl Into<String>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            namespace: namespace.into(),
            clock,
        }
    }

    /// Returns the table this store writes to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Expiry in epoch seconds, rounded up so a row never expires before
    /// its TTL has elapsed. A zero TTL yields an already-expired row.
    fn expiry_epoch(now: DateTime<Utc>, ttl: Duration) -> i64 {
        let now_ms = now.timestamp_millis();
        if ttl.is_zero() {
            return now_ms.div_euclid(1000);
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expiry_ms = now_ms.saturating_add(ttl_ms);
        expiry_ms.saturating_add(999).div_euclid(1000)
    }
}

#[async_trait]
impl DistributedStore for TableStore {
    async fn try_get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let partition_key = namespaced(&self.namespace, key);
        let Some(row) = self.client.get_item(&self.table, &partition_key).await? else {
            return Ok(None);
        };

        if row.is_expired(self.clock.wall_now()) {
            debug!(key = %partition_key, ttl = row.ttl, "Expired table row ignored");
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&row.data)?))
    }

    async fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), BackendError> {
        let now = self.clock.wall_now();
        let row = TableRow {
            partition_key: namespaced(&self.namespace, key),
            data: serde_json::to_string(value)?,
            ttl: Self::expiry_epoch(now, ttl),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        self.client.put_item(&self.table, row).await
    }

    async fn try_clear(&self) -> Result<(), BackendError> {
        debug!(table = %self.table, namespace = %self.namespace, "Table backend has no bulk clear; rows expire by ttl");
        Ok(())
    }

    fn name(&self) -> &str {
        "table"
    }
}
