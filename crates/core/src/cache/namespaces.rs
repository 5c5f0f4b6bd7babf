//! Namespace management and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::entries::format_timestamp;
use crate::Error;

/// Item counts and size estimate for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub items: u64,
    pub expired: u64,
    pub estimated_bytes: u64,
}

impl CacheDb {
    /// Create a namespace if it does not exist yet.
    pub async fn open_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, format_timestamp(Utc::now())],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All namespace names, in creation order.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY created_at ASC, name ASC")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and every entry in it.
    ///
    /// Returns false if no such namespace existed.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every namespace. Returns the number removed.
    pub async fn delete_all_namespaces(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM namespaces", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Item count, count of entries older than `max_age`, and stored byte estimate.
    pub async fn namespace_stats(
        &self, name: &str, max_age: Option<std::time::Duration>, now: DateTime<Utc>,
    ) -> Result<NamespaceStats, Error> {
        let name = name.to_string();
        let cutoff = max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| now.checked_sub_signed(age))
            .map(format_timestamp);

        self.conn
            .call(move |conn| -> Result<NamespaceStats, Error> {
                let (items, bytes): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(body) + LENGTH(headers_json) + LENGTH(url)), 0)
                    FROM entries WHERE namespace = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                let expired: i64 = match cutoff {
                    Some(cutoff) => conn.query_row(
                        "SELECT COUNT(*) FROM entries WHERE namespace = ?1 AND stored_at < ?2",
                        params![name, cutoff],
                        |row| row.get(0),
                    )?,
                    None => 0,
                };

                Ok(NamespaceStats { items: items as u64, expired: expired as u64, estimated_bytes: bytes as u64 })
            })
            .await
            .map_err(Error::from)
    }
}
