//! SQLite-backed storage for tiered response caches.
//!
//! This module provides persistent, namespaced response storage using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named namespaces, one per tier and deployment version
//! - Request identities hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Oldest-first trimming and per-namespace statistics

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, EntryKey, RequestIdentity, StoredResponse};
pub use namespaces::NamespaceStats;
