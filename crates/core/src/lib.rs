//! Core types and shared functionality for tiercache.
//!
//! This crate provides:
//! - Tiered response cache with SQLite backend
//! - Tier, route and namespace policy tables
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod tier;

pub use cache::{CacheDb, CacheEntry, EntryKey, NamespaceStats, RequestIdentity, StoredResponse};
pub use config::AppConfig;
pub use error::Error;
pub use tier::{Namespaces, RequestKind, Route, Strategy, Tier, TierPolicy};
