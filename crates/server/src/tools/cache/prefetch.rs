//! cache_prefetch_images tool implementation.
//!
//! Warms the image tier; individual failures are reported, not raised.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tiercache_client::ServiceWorker;

use crate::error::ServerError;
use crate::tools::json_result;

/// Parameters for the cache_prefetch_images tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePrefetchParams {
    /// Image URLs, absolute or relative to the site origin.
    pub urls: Vec<String>,
}

/// Implementation of the cache_prefetch_images tool.
pub async fn prefetch_impl(worker: &ServiceWorker, params: CachePrefetchParams) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(ServerError::InvalidInput("urls must not be empty".to_string()).into());
    }

    let report = worker.prefetch_images(&params.urls).await;
    json_result(&report)
}
