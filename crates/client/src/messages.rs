//! Control messages and the worker facade.
//!
//! A page talks to the worker with `{ "type": ..., "payload": ... }`
//! messages. [`ServiceWorker`] ties the executor, lifecycle and sweeper
//! together and answers them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tiercache_core::{AppConfig, CacheDb, Error, NamespaceStats};

use crate::executor::{CacheExecutor, PrefetchReport};
use crate::fetch::{FetchRequest, Fetcher};
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleController, WorkerState};
use crate::response::CacheResponse;
use crate::sweeper::Sweeper;

/// A page-to-worker message. Payloads may be omitted where every field is
/// optional, so `{"type":"CLEAR_CACHE"}` clears everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetCacheInfo,
    ClearCache {
        #[serde(rename = "cacheName")]
        cache_name: Option<String>,
    },
    GetCacheStats,
    PrefetchImages {
        urls: Vec<String>,
    },
}

/// Wire shape before the payload is checked against the message type.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct ClearCachePayload {
    #[serde(rename = "cacheName", default)]
    cache_name: Option<String>,
}

#[derive(Deserialize)]
struct PrefetchPayload {
    urls: Vec<String>,
}

impl TryFrom<RawMessage> for ControlMessage {
    type Error = String;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let payload = raw.payload.filter(|p| !p.is_null());
        match raw.kind.as_str() {
            "SKIP_WAITING" => Ok(Self::SkipWaiting),
            "GET_CACHE_INFO" => Ok(Self::GetCacheInfo),
            "GET_CACHE_STATS" => Ok(Self::GetCacheStats),
            "CLEAR_CACHE" => {
                let body: ClearCachePayload = match payload {
                    Some(value) => serde_json::from_value(value).map_err(|e| format!("CLEAR_CACHE payload: {e}"))?,
                    None => ClearCachePayload::default(),
                };
                Ok(Self::ClearCache { cache_name: body.cache_name })
            }
            "PREFETCH_IMAGES" => {
                let value = payload.ok_or("PREFETCH_IMAGES requires a payload with urls")?;
                let body: PrefetchPayload =
                    serde_json::from_value(value).map_err(|e| format!("PREFETCH_IMAGES payload: {e}"))?;
                Ok(Self::PrefetchImages { urls: body.urls })
            }
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawMessage::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Ack { ok: bool },
    /// Item count per namespace.
    CacheInfo(BTreeMap<String, u64>),
    Cleared { success: bool },
    CacheStats(BTreeMap<String, NamespaceStats>),
    Prefetched(PrefetchReport),
}

/// What `start` did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartReport {
    pub install: InstallReport,
    pub sweeper_started: bool,
}

pub struct ServiceWorker {
    executor: CacheExecutor,
    lifecycle: LifecycleController,
    sweeper: Sweeper,
    manifest: Vec<String>,
}

impl ServiceWorker {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, config: &AppConfig) -> Result<Self, Error> {
        let executor = CacheExecutor::new(db.clone(), fetcher, config)?;
        let lifecycle = LifecycleController::new(executor.clone());
        let sweeper = Sweeper::new(db, config.namespaces(), config.sweep_interval());
        Ok(Self { executor, lifecycle, sweeper, manifest: config.install_manifest() })
    }

    pub fn executor(&self) -> &CacheExecutor {
        &self.executor
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Install with skip-waiting requested, so activation and client claim
    /// follow immediately, then start the sweeper.
    pub async fn start(&self) -> Result<StartReport, Error> {
        self.lifecycle.skip_waiting().await?;
        let install = self.lifecycle.install(&self.manifest).await?;
        let sweeper_started = self.sweeper.start();
        Ok(StartReport { install, sweeper_started })
    }

    pub fn stop(&self) {
        self.sweeper.stop();
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    /// Serve a request. Before clients are claimed the worker stays out of the way.
    pub async fn fetch(&self, request: FetchRequest) -> Result<CacheResponse, Error> {
        if !self.lifecycle.is_claimed() {
            return self.executor.passthrough(&request).await;
        }
        self.executor.handle(request).await
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        tracing::debug!(?message, "control message");
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(ControlReply::Ack { ok: true })
            }
            ControlMessage::GetCacheInfo => self.cache_info().await.map(ControlReply::CacheInfo),
            ControlMessage::ClearCache { cache_name } => {
                let success = self.clear_cache(cache_name.as_deref()).await;
                Ok(ControlReply::Cleared { success })
            }
            ControlMessage::GetCacheStats => self.cache_stats().await.map(ControlReply::CacheStats),
            ControlMessage::PrefetchImages { urls } => Ok(ControlReply::Prefetched(self.prefetch_images(&urls).await)),
        }
    }

    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        self.lifecycle.skip_waiting().await
    }

    /// Item count for every stored namespace, including foreign ones.
    pub async fn cache_info(&self) -> Result<BTreeMap<String, u64>, Error> {
        let db = self.executor.db();
        let mut info = BTreeMap::new();
        for name in db.namespace_names().await? {
            let count = db.count_entries(&name).await?;
            info.insert(name, count);
        }
        Ok(info)
    }

    /// Delete one namespace, or all of them when no name is given.
    ///
    /// Deleting a namespace that does not exist still succeeds.
    pub async fn clear_cache(&self, name: Option<&str>) -> bool {
        let db = self.executor.db();
        let result = match name {
            Some(name) => db.delete_namespace(name).await.map(u64::from),
            None => db.delete_all_namespaces().await,
        };
        match result {
            Ok(deleted) => {
                tracing::info!(namespace = name.unwrap_or("*"), deleted, "cache cleared");
                true
            }
            Err(err) => {
                tracing::error!(namespace = name.unwrap_or("*"), error = %err, "failed to clear cache");
                false
            }
        }
    }

    /// Per-namespace totals. Expiry counts only apply to current namespaces.
    pub async fn cache_stats(&self) -> Result<BTreeMap<String, NamespaceStats>, Error> {
        let db = self.executor.db();
        let namespaces = self.executor.namespaces();
        let now = Utc::now();
        let mut stats = BTreeMap::new();
        for name in db.namespace_names().await? {
            let max_age = namespaces.tier_of(&name).map(|tier| tier.policy().max_age);
            let entry = db.namespace_stats(&name, max_age, now).await?;
            stats.insert(name, entry);
        }
        Ok(stats)
    }

    pub async fn prefetch_images(&self, urls: &[String]) -> PrefetchReport {
        self.executor.prefetch_images(urls).await
    }
}
