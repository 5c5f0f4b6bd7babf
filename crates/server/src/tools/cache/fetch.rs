//! cache_fetch tool implementation.
//!
//! Runs one request through the worker exactly as a page would issue it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tiercache_client::response::STORED_AT_HEADER;
use tiercache_client::{Destination, FetchRequest, RequestMode, ResponseSource, ServiceWorker, fetch::Method};

use crate::error::ServerError;
use crate::tools::json_result;

/// Parameters for the cache_fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET is cached.
    pub method: Option<String>,

    /// Request mode: navigate, cors, no-cors or same-origin (default: cors).
    pub mode: Option<String>,

    /// Request destination: document, image, style, script or font.
    pub destination: Option<String>,

    /// Accept header sent with the request.
    pub accept: Option<String>,
}

/// Output from the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheFetchOutput {
    pub status: u16,
    pub source: ResponseSource,
    pub content_type: Option<String>,
    /// When the served copy was stored, for cached responses.
    pub stored_at: Option<String>,
    /// Body length in bytes.
    pub bytes: usize,
    /// Body text, when the body is valid UTF-8.
    pub body: Option<String>,
}

fn build_request(params: &CacheFetchParams) -> Result<FetchRequest, McpError> {
    let method = match params.method.as_deref() {
        Some(method) => Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| ServerError::InvalidInput(format!("invalid method {method:?}: {e}")))?,
        None => Method::GET,
    };

    let mut request = FetchRequest::new(method, &params.url)?;
    if let Some(mode) = &params.mode {
        request = request.with_mode(mode.parse::<RequestMode>()?);
    }
    if let Some(destination) = &params.destination {
        request = request.with_destination(destination.parse::<Destination>()?);
    }
    if let Some(accept) = &params.accept {
        request = request.with_accept(accept.clone());
    }
    Ok(request)
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(&params)?;
    let response = worker.fetch(request).await?;

    let stored_at = response
        .headers
        .get(STORED_AT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let output = CacheFetchOutput {
        status: response.status.as_u16(),
        source: response.source,
        content_type: response.content_type().map(str::to_string),
        stored_at,
        bytes: response.body.len(),
        body: std::str::from_utf8(&response.body).ok().map(str::to_string),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{offline_worker, output};

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let worker = offline_worker().await;
        let params = CacheFetchParams { url: "http://localhost:8080/".into(), mode: Some("navigate".into()), ..Default::default() };

        let result = fetch_impl(&worker, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let params = CacheFetchParams { url: "http://localhost:8080/".into(), mode: Some("navigate".into()), ..Default::default() };
        let result = fetch_impl(&worker, params).await.unwrap();
        let out: CacheFetchOutput = output(&result);

        assert_eq!(out.status, 200);
        assert_eq!(out.source, ResponseSource::Fallback);
        assert!(out.body.unwrap().contains("offline"));
        worker.stop();
    }

    #[tokio::test]
    async fn test_offline_api_gets_503_payload() {
        let worker = offline_worker().await;
        worker.start().await.unwrap();

        let params = CacheFetchParams {
            url: "https://api.open-meteo.com/v1/forecast?latitude=1&longitude=2".into(),
            ..Default::default()
        };
        let result = fetch_impl(&worker, params).await.unwrap();
        let out: CacheFetchOutput = output(&result);

        assert_eq!(out.status, 503);
        assert_eq!(out.content_type.as_deref(), Some("application/json"));
        worker.stop();
    }

    #[test]
    fn test_build_request_rejects_bad_mode() {
        let params = CacheFetchParams { url: "https://example.com/".into(), mode: Some("sideways".into()), ..Default::default() };
        assert!(build_request(&params).is_err());
    }

    #[test]
    fn test_build_request_method_and_destination() {
        let params = CacheFetchParams {
            url: "https://example.com/a".into(),
            method: Some("post".into()),
            destination: Some("image".into()),
            ..Default::default()
        };
        let request = build_request(&params).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.destination, Destination::Image);
    }
}
