//! Cached response entries.
//!
//! One row per request identity per namespace. Writing an identity that is
//! already present replaces the body and resets `stored_at`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Row, types::Type};

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;

/// Method plus absolute URL (query included) identifying a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

impl RequestIdentity {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url: url.into() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn key_hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Snapshot of a response as stored in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A stored response together with its identity and write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub namespace: String,
    pub identity: RequestIdentity,
    pub response: StoredResponse,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True when the entry is older than `max_age` at `now`.
    pub fn is_expired(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        is_older_than(self.stored_at, max_age, now)
    }
}

/// Key snapshot used by sweeps: enough to age and delete an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub key_hash: String,
    pub url: String,
    pub stored_at: DateTime<Utc>,
}

impl EntryKey {
    pub fn is_expired(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        is_older_than(self.stored_at, max_age, now)
    }
}

fn is_older_than(stored_at: DateTime<Utc>, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now.signed_duration_since(stored_at) > max_age,
        Err(_) => false,
    }
}

/// Fixed-width UTC timestamp; lexicographic order matches time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn headers_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<(String, String)>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const ENTRY_COLUMNS: &str = "namespace, method, url, status, headers_json, body, stored_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        namespace: row.get(0)?,
        identity: RequestIdentity { method: row.get(1)?, url: row.get(2)? },
        response: StoredResponse { status: row.get(3)?, headers: headers_column(row, 4)?, body: row.get(5)? },
        stored_at: timestamp_column(row, 6)?,
    })
}

impl CacheDb {
    /// Store a response under `identity`, stamped with the current time.
    pub async fn put_entry(
        &self, namespace: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error> {
        self.put_entry_at(namespace, identity, response, Utc::now()).await
    }

    /// Store a response with an explicit `stored_at`.
    ///
    /// Creates the namespace if needed. Uses UPSERT semantics: an existing
    /// entry for the same identity is replaced and its timestamp reset.
    pub async fn put_entry_at(
        &self, namespace: &str, identity: &RequestIdentity, response: &StoredResponse, stored_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let identity = identity.clone();
        let key_hash = identity.key_hash();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        let status = response.status;
        let body = response.body.clone();
        let stored_at = format_timestamp(stored_at);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, format_timestamp(Utc::now())],
                )?;
                tx.execute(
                    "INSERT INTO entries (namespace, key_hash, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(namespace, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![namespace, key_hash, identity.method, identity.url, status, headers_json, body, stored_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an identity in one namespace, expired or not.
    pub async fn match_entry(&self, namespace: &str, identity: &RequestIdentity) -> Result<Option<CacheEntry>, Error> {
        let namespace = namespace.to_string();
        let key_hash = identity.key_hash();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE namespace = ?1 AND key_hash = ?2");
                let entry = conn
                    .query_row(&sql, params![namespace, key_hash], entry_from_row)
                    .optional()?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an identity across every namespace, freshest first.
    pub async fn match_any(&self, identity: &RequestIdentity) -> Result<Option<CacheEntry>, Error> {
        let key_hash = identity.key_hash();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE key_hash = ?1 ORDER BY stored_at DESC, id DESC LIMIT 1"
                );
                let entry = conn.query_row(&sql, params![key_hash], entry_from_row).optional()?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Snapshot of a namespace's keys, oldest first.
    pub async fn entry_keys(&self, namespace: &str) -> Result<Vec<EntryKey>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, url, stored_at FROM entries
                    WHERE namespace = ?1 ORDER BY stored_at ASC, id ASC",
                )?;
                let keys = stmt
                    .query_map(params![namespace], |row| {
                        Ok(EntryKey { key_hash: row.get(0)?, url: row.get(1)?, stored_at: timestamp_column(row, 2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns false if it was already gone.
    pub async fn delete_entry(&self, namespace: &str, key_hash: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE namespace = ?1 AND key_hash = ?2", params![namespace, key_hash])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the oldest entries until the namespace holds at most `max_items`.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_namespace(&self, namespace: &str, max_items: usize) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        let max = max_items as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM entries WHERE id IN (
                        SELECT id FROM entries WHERE namespace = ?1
                        ORDER BY stored_at ASC, id ASC LIMIT ?2
                    )",
                    params![namespace, count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const NS: &str = "fuelmaster-static-v5";

    fn response(body: &str) -> StoredResponse {
        StoredResponse {
            status: 200,
            headers: vec![("content-type".into(), "text/css".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_and_match_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = RequestIdentity::get("https://example.com/assets/css/styles.css");
        db.put_entry(NS, &id, &response("body { color: red }")).await.unwrap();

        let entry = db.match_entry(NS, &id).await.unwrap().unwrap();
        assert_eq!(entry.response, response("body { color: red }"));
        assert_eq!(entry.identity, id);
        assert_eq!(entry.response.header("Content-Type"), Some("text/css"));
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = RequestIdentity::get("https://example.com/missing.css");
        assert!(db.match_entry(NS, &id).await.unwrap().is_none());
        assert!(db.match_any(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_resets_timestamp() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = RequestIdentity::get("https://example.com/a.css");
        let old = Utc::now() - Duration::days(3);
        db.put_entry_at(NS, &id, &response("old"), old).await.unwrap();
        db.put_entry(NS, &id, &response("new")).await.unwrap();

        assert_eq!(db.count_entries(NS).await.unwrap(), 1);
        let entry = db.match_entry(NS, &id).await.unwrap().unwrap();
        assert_eq!(entry.response.body, b"new");
        assert!(entry.stored_at > old);
    }

    #[tokio::test]
    async fn test_match_any_prefers_freshest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = RequestIdentity::get("https://example.com/");
        let now = Utc::now();
        db.put_entry_at("fuelmaster-static-v5", &id, &response("static"), now - Duration::hours(2))
            .await
            .unwrap();
        db.put_entry_at("fuelmaster-dynamic-v5", &id, &response("dynamic"), now)
            .await
            .unwrap();

        let entry = db.match_any(&id).await.unwrap().unwrap();
        assert_eq!(entry.namespace, "fuelmaster-dynamic-v5");
    }

    #[tokio::test]
    async fn test_entry_keys_oldest_first_and_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        for (i, path) in ["c", "a", "b"].iter().enumerate() {
            let id = RequestIdentity::get(format!("https://example.com/{path}.png"));
            db.put_entry_at(NS, &id, &response(path), now - Duration::minutes(10 - i as i64))
                .await
                .unwrap();
        }

        let keys = db.entry_keys(NS).await.unwrap();
        let urls: Vec<&str> = keys.iter().map(|k| k.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/c.png", "https://example.com/a.png", "https://example.com/b.png"]);

        assert!(db.delete_entry(NS, &keys[0].key_hash).await.unwrap());
        assert!(!db.delete_entry(NS, &keys[0].key_hash).await.unwrap());
        assert_eq!(db.count_entries(NS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_trim_keeps_newest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        for i in 0..5 {
            let id = RequestIdentity::get(format!("https://example.com/{i}.png"));
            db.put_entry_at(NS, &id, &response("x"), now - Duration::minutes(10 - i))
                .await
                .unwrap();
        }

        assert_eq!(db.trim_namespace(NS, 2).await.unwrap(), 3);
        assert_eq!(db.trim_namespace(NS, 2).await.unwrap(), 0);

        let urls: Vec<String> = db.entry_keys(NS).await.unwrap().into_iter().map(|k| k.url).collect();
        assert_eq!(urls, vec!["https://example.com/3.png", "https://example.com/4.png"]);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry {
            namespace: NS.into(),
            identity: RequestIdentity::get("https://example.com/"),
            response: response(""),
            stored_at: now - Duration::minutes(10),
        };
        assert!(!entry.is_expired(std::time::Duration::from_secs(600), now));
        assert!(entry.is_expired(std::time::Duration::from_secs(599), now));
    }

    #[test]
    fn test_timestamp_format_sorts() {
        let a = Utc::now();
        let b = a + Duration::microseconds(1);
        assert!(format_timestamp(a) < format_timestamp(b));
    }
}
