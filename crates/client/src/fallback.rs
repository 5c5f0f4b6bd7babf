//! Synthesized responses for when neither network nor cache can answer.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;

use crate::response::CacheResponse;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body{font-family:system-ui,sans-serif;display:flex;min-height:100vh;margin:0;align-items:center;justify-content:center;background:#f5f5f5;color:#222}
main{text-align:center;padding:2rem}
button{margin-top:1rem;padding:.6rem 1.2rem;border:0;border-radius:6px;background:#1e88e5;color:#fff;cursor:pointer}
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page is not available without a connection. Check your network and try again.</p>
<button onclick="location.reload()">Retry</button>
</main>
</body>
</html>
"#;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="150" viewBox="0 0 200 150"><rect width="200" height="150" fill="#e0e0e0"/><text x="100" y="80" font-family="sans-serif" font-size="14" text-anchor="middle" fill="#757575">Image unavailable</text></svg>"##;

/// Self-contained HTML document for navigations that fail with no cache.
pub fn offline_page() -> CacheResponse {
    CacheResponse::synthesized(StatusCode::OK, "text/html; charset=utf-8", OFFLINE_PAGE)
}

/// Minimal inline SVG for images that fail with no cache.
pub fn placeholder_image() -> CacheResponse {
    CacheResponse::synthesized(StatusCode::OK, "image/svg+xml", PLACEHOLDER_SVG)
}

#[derive(Debug, Serialize)]
struct Unavailable {
    error: &'static str,
    cached: bool,
    timestamp: i64,
}

/// 503 JSON payload for API requests that fail with no cache.
pub fn api_unavailable(now: DateTime<Utc>) -> CacheResponse {
    let payload = Unavailable { error: "Network unavailable", cached: false, timestamp: now.timestamp_millis() };
    let body = serde_json::to_vec(&payload).unwrap_or_default();
    CacheResponse::synthesized(StatusCode::SERVICE_UNAVAILABLE, "application/json", body)
}

/// 503 plain-text response for other requests that fail with no cache.
pub fn service_unavailable() -> CacheResponse {
    CacheResponse::synthesized(StatusCode::SERVICE_UNAVAILABLE, "text/plain; charset=utf-8", "Service Unavailable")
}
