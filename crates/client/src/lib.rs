//! Client side of tiercache.
//!
//! This crate provides the network fetcher, request classification, the
//! cache policy executor, the expiry sweeper, the install/activate lifecycle
//! and the control-message facade used by the server.

pub mod classify;
pub mod executor;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod messages;
pub mod response;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{ClassifierRules, classify, is_interceptable};
pub use executor::{CacheExecutor, PrefetchReport};
pub use fetch::{Destination, FetchClient, FetchConfig, FetchRequest, FetchResponse, Fetcher, RequestMode};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleController, WorkerState};
pub use messages::{ControlMessage, ControlReply, ServiceWorker, StartReport};
pub use response::{CacheResponse, ResponseSource};
pub use sweeper::{SweepReport, Sweeper, sweep_once};
