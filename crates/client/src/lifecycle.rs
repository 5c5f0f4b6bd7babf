//! Install and activation lifecycle.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//! ```
//!
//! Install pre-warms the static tier from the manifest, best effort. Activation
//! removes namespaces left by earlier deployments and claims clients; until
//! then the worker does not intercept requests.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tiercache_core::{Error, Tier};
use tokio::sync::Mutex;

use crate::executor::CacheExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
    /// Whether a pending skip-waiting activated the worker right after install.
    pub activated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub failures: Vec<String>,
}

pub struct LifecycleController {
    executor: CacheExecutor,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LifecycleController {
    pub fn new(executor: CacheExecutor) -> Self {
        Self {
            executor,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Whether activation has claimed clients.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<WorkerState, Error> {
        let mut state = self.state.lock().await;
        if !from.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot move from {:?} to {to:?}", *state)));
        }
        let previous = *state;
        *state = to;
        tracing::debug!(from = ?previous, to = ?to, "lifecycle transition");
        Ok(previous)
    }

    /// Pre-cache every manifest entry into the static tier.
    ///
    /// One failing entry never aborts the rest. A repeated install (new
    /// manifest, same process) is allowed once the previous one finished.
    ///
    /// # Errors
    ///
    /// `InvalidState` while another install or activation is in progress.
    pub async fn install(&self, manifest: &[String]) -> Result<InstallReport, Error> {
        let previous = self
            .transition(&[WorkerState::Parsed, WorkerState::Installed, WorkerState::Activated], WorkerState::Installing)
            .await?;

        let namespace = self.executor.namespaces().name(Tier::Static);
        if let Err(err) = self.executor.db().open_namespace(&namespace).await {
            tracing::warn!(namespace, error = %err, "failed to open static namespace");
        }

        let mut report = InstallReport::default();
        for entry in manifest {
            match self.executor.cache_url(Tier::Static, entry).await {
                Ok(()) => report.cached.push(entry.clone()),
                Err(err) => {
                    tracing::warn!(entry = %entry, error = %err, "failed to pre-cache resource");
                    report.failed.push(entry.clone());
                }
            }
        }

        let next = if previous == WorkerState::Activated { WorkerState::Activated } else { WorkerState::Installed };
        *self.state.lock().await = next;
        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "install complete");

        if next == WorkerState::Installed && self.skip_waiting.load(Ordering::Acquire) {
            self.activate().await?;
            report.activated = true;
        }
        Ok(report)
    }

    /// Request immediate activation. If the worker is already installed it
    /// activates now; otherwise activation follows install.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        self.skip_waiting.store(true, Ordering::Release);
        if self.state().await == WorkerState::Installed {
            return self.activate().await.map(Some);
        }
        Ok(None)
    }

    /// Delete namespaces from earlier deployments, ensure the current ones
    /// exist, then claim clients.
    ///
    /// Namespaces not owned by this app are left alone. Activating an already
    /// active worker re-runs the cleanup.
    ///
    /// # Errors
    ///
    /// `InvalidState` before install has finished; storage errors listing
    /// namespaces.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(&[WorkerState::Installed, WorkerState::Activated], WorkerState::Activating)
            .await?;

        let result = self.cleanup().await;
        let mut state = self.state.lock().await;
        match result {
            Ok(report) => {
                *state = WorkerState::Activated;
                self.claimed.store(true, Ordering::Release);
                tracing::info!(deleted = report.deleted.len(), "activated, clients claimed");
                Ok(report)
            }
            Err(err) => {
                *state = WorkerState::Installed;
                Err(err)
            }
        }
    }

    async fn cleanup(&self) -> Result<ActivateReport, Error> {
        let db = self.executor.db();
        let namespaces = self.executor.namespaces();
        let mut report = ActivateReport::default();

        for name in db.namespace_names().await? {
            if !namespaces.is_owned(&name) || namespaces.is_current(&name) {
                continue;
            }
            match db.delete_namespace(&name).await {
                Ok(_) => {
                    tracing::info!(namespace = %name, "deleted outdated namespace");
                    report.deleted.push(name);
                }
                Err(err) => {
                    tracing::warn!(namespace = %name, error = %err, "failed to delete outdated namespace");
                    report.failures.push(name);
                }
            }
        }

        for name in namespaces.current() {
            db.open_namespace(&name).await?;
        }
        Ok(report)
    }
}
