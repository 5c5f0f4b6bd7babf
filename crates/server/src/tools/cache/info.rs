//! cache_info tool implementation.
//!
//! Item count per stored namespace.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use tiercache_client::ServiceWorker;

use crate::tools::json_result;

/// Implementation of the cache_info tool.
pub async fn info_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let info = worker.cache_info().await?;
    json_result(&info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{offline_worker, output};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_info_lists_current_namespaces_after_start() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let result = info_impl(&worker).await.unwrap();
        let info: BTreeMap<String, u64> = output(&result);

        assert_eq!(info.len(), 4);
        assert_eq!(info["fuelmaster-static-v5"], 0);
        worker.stop();
    }
}
