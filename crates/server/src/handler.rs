//! MCP server handler implementation.
//!
//! Routes tool calls onto the shared worker.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tiercache_client::ServiceWorker;

use crate::tools::cache::{
    CacheClearParams, CacheFetchParams, CachePrefetchParams, clear_impl, fetch_impl, info_impl, prefetch_impl,
    stats_impl,
};
use crate::tools::worker::skip_waiting_impl;

#[derive(Clone)]
pub struct TiercacheServer {
    worker: Arc<ServiceWorker>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TiercacheServer {
    pub fn new(worker: Arc<ServiceWorker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the tiered cache. Returns status, where the response came from (network, cache, stale_cache, fallback) and the body."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "List every cache namespace with its item count.")]
    async fn cache_info(&self) -> Result<CallToolResult, McpError> {
        info_impl(&self.worker).await
    }

    #[tool(description = "Delete one cache namespace by name, or all namespaces when no name is given.")]
    async fn cache_clear(&self, params: Parameters<CacheClearParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.worker, params.0).await
    }

    #[tool(description = "Per-namespace item count, expired item count and estimated stored bytes.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.worker).await
    }

    #[tool(description = "Fetch image URLs into the image cache. Reports which succeeded and which failed.")]
    async fn cache_prefetch_images(&self, params: Parameters<CachePrefetchParams>) -> Result<CallToolResult, McpError> {
        prefetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Activate the installed worker immediately and claim clients.")]
    async fn worker_skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.worker).await
    }
}

impl ServerHandler for TiercacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "tiercache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::offline_worker;

    #[tokio::test]
    async fn test_all_tools_registered() {
        let server = TiercacheServer::new(Arc::new(offline_worker().await));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_clear", "cache_fetch", "cache_info", "cache_prefetch_images", "cache_stats", "worker_skip_waiting"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = TiercacheServer::new(Arc::new(offline_worker().await));
        assert_eq!(server.get_info().server_info.name, "tiercache");
    }
}
