//! Responses handed back to the page.

use bytes::Bytes;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use tiercache_core::CacheEntry;

use crate::fetch::FetchResponse;

/// Header carrying the time a cached response was stored.
pub const STORED_AT_HEADER: &str = "x-cache-stored-at";

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Fresh from the network.
    Network,
    /// A cache entry within its tier's expiry window.
    Cache,
    /// An expired cache entry used because the network failed.
    StaleCache,
    /// Synthesized: offline page, placeholder image or error payload.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub headers: header::HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl CacheResponse {
    pub fn from_network(response: FetchResponse) -> Self {
        Self { status: response.status, headers: response.headers, body: response.body, source: ResponseSource::Network }
    }

    /// Rebuild a response from a stored entry. Entries with an unparseable
    /// status are served as 200, since only ok responses are ever stored.
    pub fn from_entry(entry: CacheEntry, source: ResponseSource) -> Self {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &entry.response.headers {
            if let (Ok(name), Ok(value)) =
                (header::HeaderName::from_bytes(name.as_bytes()), header::HeaderValue::from_str(value))
            {
                headers.append(name, value);
            }
        }
        if let Ok(value) = header::HeaderValue::from_str(&entry.stored_at.to_rfc3339()) {
            headers.insert(STORED_AT_HEADER, value);
        }

        Self {
            status: StatusCode::from_u16(entry.response.status).unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(entry.response.body),
            source,
        }
    }

    pub(crate) fn synthesized(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
        Self { status, headers, body: body.into(), source: ResponseSource::Fallback }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
