//! worker_skip_waiting tool implementation.
//!
//! Requests immediate activation and reports the lifecycle state afterwards.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tiercache_client::{ActivateReport, ServiceWorker, WorkerState};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkipWaitingOutput {
    pub state: WorkerState,
    pub claimed: bool,
    /// Present when this call performed the activation.
    pub activation: Option<ActivateReport>,
}

/// Implementation of the worker_skip_waiting tool.
pub async fn skip_waiting_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let activation = worker.skip_waiting().await?;
    let output = SkipWaitingOutput {
        state: worker.state().await,
        claimed: worker.lifecycle().is_claimed(),
        activation,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{offline_worker, output};

    #[tokio::test]
    async fn test_skip_waiting_before_install() {
        let worker = offline_worker().await;
        let result = skip_waiting_impl(&worker).await.unwrap();
        let out: SkipWaitingOutput = output(&result);

        assert_eq!(out.state, WorkerState::Parsed);
        assert!(!out.claimed);
        assert!(out.activation.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_on_active_worker_is_noop() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let result = skip_waiting_impl(&worker).await.unwrap();
        let out: SkipWaitingOutput = output(&result);
        assert_eq!(out.state, WorkerState::Activated);
        assert!(out.claimed);
        worker.stop();
    }
}
