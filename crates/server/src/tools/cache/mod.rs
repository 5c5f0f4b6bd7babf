//! Cache-related MCP tools.
//!
//! Fetching through the tiers, plus inspection and clearing of namespaces.

pub mod clear;
pub mod fetch;
pub mod info;
pub mod prefetch;
pub mod stats;

pub use clear::{CacheClearParams, clear_impl};
pub use fetch::{CacheFetchParams, fetch_impl};
pub use info::info_impl;
pub use prefetch::{CachePrefetchParams, prefetch_impl};
pub use stats::stats_impl;
