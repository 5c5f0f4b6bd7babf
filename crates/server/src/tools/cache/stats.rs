//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use tiercache_client::ServiceWorker;

use crate::tools::json_result;

/// Implementation of the cache_stats tool.
pub async fn stats_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let stats = worker.cache_stats().await?;
    json_result(&stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{offline_worker, output};
    use std::collections::BTreeMap;
    use tiercache_core::{NamespaceStats, RequestIdentity, StoredResponse};

    #[tokio::test]
    async fn test_stats_report_items_and_bytes() {
        let worker = offline_worker().await;
        let response = StoredResponse { status: 200, headers: Vec::new(), body: vec![b'x'; 64] };
        worker
            .executor()
            .db()
            .put_entry("fuelmaster-images-v5", &RequestIdentity::get("https://a.example/1.png"), &response)
            .await
            .unwrap();

        let result = stats_impl(&worker).await.unwrap();
        let stats: BTreeMap<String, NamespaceStats> = output(&result);

        let images = &stats["fuelmaster-images-v5"];
        assert_eq!(images.items, 1);
        assert_eq!(images.expired, 0);
        assert!(images.estimated_bytes >= 64);
    }
}
