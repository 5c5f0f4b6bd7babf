//! Scripted fetcher for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::{StatusCode, Url, header};
use tiercache_core::Error;
use tokio::sync::Semaphore;

use crate::fetch::{FetchRequest, FetchResponse, Fetcher};

#[derive(Clone)]
enum Reply {
    Respond { status: u16, content_type: &'static str, body: Bytes },
    Fail,
    Hang,
}

/// Replies per URL; unknown URLs fail like an offline network.
#[derive(Default)]
pub(crate) struct MockFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for a permit on `gate` before replying.
    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self { gate: Some(gate), ..Self::default() }
    }

    pub(crate) fn respond(&self, url: &str, status: u16, content_type: &'static str, body: &str) {
        let reply = Reply::Respond { status, content_type, body: Bytes::from(body.to_string()) };
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    pub(crate) fn fail(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
    }

    pub(crate) fn hang(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Hang);
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| Error::Network(e.to_string()))?;
        }

        let reply = self.replies.lock().unwrap().get(&url).cloned().unwrap_or(Reply::Fail);
        match reply {
            Reply::Respond { status, content_type, body } => {
                let mut headers = header::HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
                Ok(FetchResponse {
                    url: Url::parse(&url).unwrap(),
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    body,
                    fetch_ms: 1,
                })
            }
            Reply::Fail => Err(Error::Network(format!("{url}: connection refused"))),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Network(format!("{url}: hung")))
            }
        }
    }
}
