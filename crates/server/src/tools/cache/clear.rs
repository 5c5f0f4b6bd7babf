//! cache_clear tool implementation.
//!
//! Deletes one namespace, or every namespace when no name is given.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tiercache_client::ServiceWorker;

use crate::tools::json_result;

/// Parameters for the cache_clear tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearParams {
    /// Namespace to delete. All namespaces are deleted when omitted.
    pub cache_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    pub success: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(worker: &ServiceWorker, params: CacheClearParams) -> Result<CallToolResult, McpError> {
    let success = worker.clear_cache(params.cache_name.as_deref()).await;
    json_result(&CacheClearOutput { success })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{offline_worker, output};

    #[tokio::test]
    async fn test_clear_single_namespace() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let params = CacheClearParams { cache_name: Some("fuelmaster-api-v5".into()) };
        let result = clear_impl(&worker, params).await.unwrap();
        let out: CacheClearOutput = output(&result);
        assert!(out.success);

        let info = worker.cache_info().await.unwrap();
        assert_eq!(info.len(), 3);
        assert!(!info.contains_key("fuelmaster-api-v5"));
        worker.stop();
    }

    #[tokio::test]
    async fn test_clear_all() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let result = clear_impl(&worker, CacheClearParams::default()).await.unwrap();
        let out: CacheClearOutput = output(&result);
        assert!(out.success);
        assert!(worker.cache_info().await.unwrap().is_empty());
        worker.stop();
    }
}
