//! Cache policy executor.
//!
//! One executor serves every intercepted request. The request kind picks a
//! route (tier + strategy) from the constant table in `tiercache_core::tier`;
//! the strategy decides the order of cache and network:
//!
//! - **Network-first** (navigation): network, then any cached copy, then the
//!   offline page. A page always gets some HTML.
//! - **Cache-first** (images, static assets): fresh tier entry, then network,
//!   then a stale copy, then a placeholder image (images) or the error
//!   (static assets).
//! - **Stale-while-revalidate** (API, generic): fresh tier entry plus a
//!   detached refresh, else a synchronous fetch, then a stale copy or any
//!   other tier's copy, then a structured 503.
//!
//! Only 2xx responses are written. Cache writes and reads never fail a
//! request: errors are logged and treated as a skipped write or a miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, Url};
use serde::Serialize;
use tiercache_core::{
    AppConfig, CacheDb, CacheEntry, Error, Namespaces, RequestIdentity, RequestKind, Route, Strategy, Tier,
};
use tokio::task::JoinHandle;

use crate::classify::{ClassifierRules, classify, is_interceptable};
use crate::fallback;
use crate::fetch::{Destination, FetchRequest, FetchResponse, Fetcher, resolve};
use crate::response::{CacheResponse, ResponseSource};

/// Outcome of a best-effort image prefetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct PrefetchReport {
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
}

/// Serves requests per tier policy. Cloning is cheap and shares storage.
#[derive(Clone)]
pub struct CacheExecutor {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    namespaces: Namespaces,
    rules: Arc<ClassifierRules>,
    origin: Url,
    timeout: Duration,
}

impl CacheExecutor {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self {
            db,
            fetcher,
            namespaces: config.namespaces(),
            rules: Arc::new(ClassifierRules::from_config(config)),
            origin,
            timeout: config.timeout(),
        })
    }

    /// Override the network deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Serve an intercepted request.
    ///
    /// # Errors
    ///
    /// Only a static asset with no network and no cached copy, or a
    /// pass-through request whose fetch fails, returns an error.
    pub async fn handle(&self, request: FetchRequest) -> Result<CacheResponse, Error> {
        if !is_interceptable(&request) || request.method != Method::GET {
            tracing::debug!(method = %request.method, url = %request.url, "passing request through");
            return self.passthrough(&request).await;
        }

        let kind = classify(&request, &self.rules);
        let route = kind.route();
        tracing::debug!(url = %request.url, ?kind, tier = %route.tier, strategy = ?route.strategy, "routing request");

        match route.strategy {
            Strategy::NetworkFirst => Ok(self.network_first(&request, route).await),
            Strategy::CacheFirst => self.cache_first(&request, kind, route).await,
            Strategy::StaleWhileRevalidate => Ok(self.stale_while_revalidate(&request, kind, route).await),
        }
    }

    /// Network only, nothing read or written.
    pub async fn passthrough(&self, request: &FetchRequest) -> Result<CacheResponse, Error> {
        self.fetch_network(request).await.map(CacheResponse::from_network)
    }

    async fn network_first(&self, request: &FetchRequest, route: Route) -> CacheResponse {
        let identity = request.identity();
        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(route.tier, &identity, &response).await;
                }
                CacheResponse::from_network(response)
            }
            Err(err) => {
                log_fetch_failure(&identity, &err);
                match self.lookup_any(&identity).await {
                    Some(entry) => {
                        let source = self.freshness(&entry);
                        CacheResponse::from_entry(entry, source)
                    }
                    None => {
                        tracing::info!(%identity, "serving offline page");
                        fallback::offline_page()
                    }
                }
            }
        }
    }

    async fn cache_first(&self, request: &FetchRequest, kind: RequestKind, route: Route) -> Result<CacheResponse, Error> {
        let identity = request.identity();
        let cached = self.lookup(route.tier, &identity).await;

        if let Some(entry) = &cached
            && !entry.is_expired(route.tier.policy().max_age, Utc::now())
        {
            tracing::debug!(%identity, tier = %route.tier, "cache hit");
            return Ok(CacheResponse::from_entry(entry.clone(), ResponseSource::Cache));
        }

        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(route.tier, &identity, &response).await;
                }
                Ok(CacheResponse::from_network(response))
            }
            Err(err) => {
                log_fetch_failure(&identity, &err);
                let stale = match cached {
                    Some(entry) => Some(entry),
                    None => self.lookup_any(&identity).await,
                };
                match (stale, kind) {
                    (Some(entry), _) => Ok(CacheResponse::from_entry(entry, ResponseSource::StaleCache)),
                    (None, RequestKind::Image) => Ok(fallback::placeholder_image()),
                    (None, _) => Err(err),
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &FetchRequest, kind: RequestKind, route: Route) -> CacheResponse {
        let identity = request.identity();
        let cached = self.lookup(route.tier, &identity).await;

        if let Some(entry) = &cached
            && !entry.is_expired(route.tier.policy().max_age, Utc::now())
        {
            tracing::debug!(%identity, tier = %route.tier, "serving cached entry, revalidating");
            self.revalidate_in_background(request.clone(), route.tier);
            return CacheResponse::from_entry(entry.clone(), ResponseSource::Cache);
        }

        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(route.tier, &identity, &response).await;
                }
                CacheResponse::from_network(response)
            }
            Err(err) => {
                log_fetch_failure(&identity, &err);
                if let Some(entry) = cached {
                    return CacheResponse::from_entry(entry, ResponseSource::StaleCache);
                }
                // pre-cached copies live in the static tier whatever the route
                if let Some(entry) = self.lookup_any(&identity).await {
                    let source = self.freshness(&entry);
                    return CacheResponse::from_entry(entry, source);
                }
                match kind {
                    RequestKind::Api => fallback::api_unavailable(Utc::now()),
                    _ => fallback::service_unavailable(),
                }
            }
        }
    }

    /// Detached refresh: the result is only ever a cache write.
    fn revalidate_in_background(&self, request: FetchRequest, tier: Tier) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let identity = request.identity();
            match this.fetch_network(&request).await {
                Ok(response) if response.is_ok() => {
                    this.store(tier, &identity, &response).await;
                    tracing::debug!(%identity, "revalidated");
                }
                Ok(response) => {
                    tracing::debug!(%identity, status = response.status.as_u16(), "revalidation not cacheable");
                }
                Err(err) => {
                    tracing::warn!(%identity, error = %err, "background revalidation failed");
                }
            }
        })
    }

    /// Fetch a URL into a tier, requiring a 2xx response and a successful write.
    ///
    /// Relative paths resolve against the configured origin.
    pub async fn cache_url(&self, tier: Tier, entry: &str) -> Result<(), Error> {
        let url = resolve(&self.origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))?;
        let mut request = FetchRequest::get(url.as_str())?;
        if tier == Tier::Image {
            request = request.with_destination(Destination::Image);
        }

        let response = self.fetch_network(&request).await?;
        if !response.is_ok() {
            return Err(Error::HttpError(format!("{url}: status {}", response.status.as_u16())));
        }

        let namespace = self.namespaces.name(tier);
        self.db
            .put_entry(&namespace, &request.identity(), &response.to_stored())
            .await?;
        self.enforce_ceiling(tier).await;
        Ok(())
    }

    /// Fetch each URL into the image tier; failures are reported, not raised.
    pub async fn prefetch_images(&self, urls: &[String]) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        for url in urls {
            match self.cache_url(Tier::Image, url).await {
                Ok(()) => report.fetched.push(url.clone()),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to prefetch image");
                    report.failed.push(url.clone());
                }
            }
        }
        report
    }

    /// Network fetch bounded by the deadline; the in-flight request is
    /// dropped (aborted) when it passes.
    async fn fetch_network(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(format!("{} after {}ms", request.url, self.timeout.as_millis()))),
        }
    }

    async fn lookup(&self, tier: Tier, identity: &RequestIdentity) -> Option<CacheEntry> {
        let namespace = self.namespaces.name(tier);
        match self.db.match_entry(&namespace, identity).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%identity, namespace, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn lookup_any(&self, identity: &RequestIdentity) -> Option<CacheEntry> {
        match self.db.match_any(identity).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%identity, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, tier: Tier, identity: &RequestIdentity, response: &FetchResponse) {
        let namespace = self.namespaces.name(tier);
        if let Err(err) = self.db.put_entry(&namespace, identity, &response.to_stored()).await {
            tracing::warn!(%identity, namespace, error = %err, "cache write failed");
            return;
        }
        self.enforce_ceiling(tier).await;
    }

    async fn enforce_ceiling(&self, tier: Tier) {
        let Some(max_items) = tier.policy().max_items else {
            return;
        };
        let namespace = self.namespaces.name(tier);
        match self.db.trim_namespace(&namespace, max_items).await {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(namespace, evicted, "trimmed to ceiling"),
            Err(err) => tracing::warn!(namespace, error = %err, "failed to trim namespace"),
        }
    }

    /// Cache if the entry is within its own tier's window, else stale.
    fn freshness(&self, entry: &CacheEntry) -> ResponseSource {
        match self.namespaces.tier_of(&entry.namespace) {
            Some(tier) if !entry.is_expired(tier.policy().max_age, Utc::now()) => ResponseSource::Cache,
            _ => ResponseSource::StaleCache,
        }
    }
}

fn log_fetch_failure(identity: &RequestIdentity, err: &Error) {
    if err.is_network_failure() {
        tracing::info!(%identity, error = %err, "network unavailable, falling back");
    } else {
        tracing::warn!(%identity, error = %err, "fetch failed, falling back");
    }
}
