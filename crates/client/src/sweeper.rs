//! Periodic expiry and ceiling enforcement.
//!
//! Each pass walks the current namespaces: entries older than the tier's
//! max age are deleted, then tiers with an item ceiling drop their oldest
//! surplus. Failures on an entry or a namespace are logged and skipped so one
//! bad row never stops the pass.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tiercache_core::{CacheDb, Error, Namespaces, Tier};
use tokio::task::JoinHandle;

/// Totals from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: u64,
    pub evicted: u64,
    pub failures: u64,
}

impl SweepReport {
    fn absorb(&mut self, other: SweepReport) {
        self.expired += other.expired;
        self.evicted += other.evicted;
        self.failures += other.failures;
    }
}

/// Run one pass over every current namespace.
///
/// Never stops early: a namespace whose keys cannot be read and an entry
/// that cannot be deleted each count as one failure.
pub async fn sweep_once(db: &CacheDb, namespaces: &Namespaces, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();
    for tier in Tier::ALL {
        let namespace = namespaces.name(tier);
        match sweep_namespace(db, &namespace, tier, now).await {
            Ok(swept) => report.absorb(swept),
            Err(err) => {
                tracing::warn!(namespace, error = %err, "failed to read namespace keys, skipping");
                report.failures += 1;
            }
        }
    }

    if report.expired > 0 || report.evicted > 0 || report.failures > 0 {
        tracing::info!(
            expired = report.expired,
            evicted = report.evicted,
            failures = report.failures,
            "sweep complete"
        );
    } else {
        tracing::debug!("sweep complete, nothing to remove");
    }
    report
}

async fn sweep_namespace(db: &CacheDb, namespace: &str, tier: Tier, now: DateTime<Utc>) -> Result<SweepReport, Error> {
    let policy = tier.policy();
    let mut report = SweepReport::default();

    let keys = db.entry_keys(namespace).await?;
    let mut live = Vec::with_capacity(keys.len());
    for key in keys {
        if !key.is_expired(policy.max_age, now) {
            live.push(key);
            continue;
        }
        match db.delete_entry(namespace, &key.key_hash).await {
            Ok(true) => report.expired += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(namespace, url = %key.url, error = %err, "failed to delete expired entry");
                report.failures += 1;
            }
        }
    }

    let Some(max_items) = policy.max_items else {
        return Ok(report);
    };
    let surplus = live.len().saturating_sub(max_items);
    for key in live.iter().take(surplus) {
        match db.delete_entry(namespace, &key.key_hash).await {
            Ok(true) => report.evicted += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(namespace, url = %key.url, error = %err, "failed to evict entry");
                report.failures += 1;
            }
        }
    }

    Ok(report)
}

/// Owns the background sweep task.
pub struct Sweeper {
    db: CacheDb,
    namespaces: Namespaces,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    pub fn new(db: CacheDb, namespaces: Namespaces, interval: Duration) -> Self {
        Self { db, namespaces, interval, task: Mutex::new(None) }
    }

    /// Start the periodic task. Returns false if one is already running.
    pub fn start(&self) -> bool {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("sweeper already running");
            return false;
        }

        let db = self.db.clone();
        let namespaces = self.namespaces.clone();
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately; the first real pass is one period out
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep_once(&db, &namespaces, Utc::now()).await;
            }
        }));

        tracing::info!(interval_secs = period.as_secs(), "sweeper started");
        true
    }

    /// Abort the periodic task, if any.
    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
            tracing::info!("sweeper stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// One pass now, independent of the schedule.
    pub async fn run_once(&self) -> SweepReport {
        sweep_once(&self.db, &self.namespaces, Utc::now()).await
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }
}
