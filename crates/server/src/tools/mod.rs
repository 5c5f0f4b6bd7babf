//! MCP tool implementations.
//!
//! Each tool is a thin adapter from JSON parameters onto the
//! [`ServiceWorker`](tiercache_client::ServiceWorker); results are returned
//! as pretty-printed JSON text content.

pub mod cache;
pub mod worker;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ServerError;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ServerError::EncodeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
