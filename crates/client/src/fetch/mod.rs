//! Network side of the cache: requests, responses and the HTTP fetcher.
//!
//! ### Requests
//! - `FetchRequest` carries what the classifier looks at: method, URL,
//!   request mode, destination and the Accept header.
//! - http(s) URLs are canonicalized (lowercase host, no fragment, query kept).
//!   Other schemes are kept verbatim so they can be passed through untouched.
//!
//! ### Fetching
//! - `Fetcher` is the seam between the cache executor and the network.
//! - `FetchClient` implements it with reqwest: rustls, compression, limited
//!   redirects, byte ceiling. Non-2xx statuses are successful fetches.

pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, header};
use std::str::FromStr;
use std::time::{Duration, Instant};

pub use reqwest::{Method, StatusCode};

pub use self::url::{UrlError, canonicalize, resolve};

use tiercache_core::{Error, RequestIdentity, StoredResponse};

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(Self::Navigate),
            "cors" => Ok(Self::Cors),
            "no-cors" => Ok(Self::NoCors),
            "same-origin" => Ok(Self::SameOrigin),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// What the response will be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    #[default]
    Empty,
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "style" => Ok(Self::Style),
            "script" => Ok(Self::Script),
            "font" => Ok(Self::Font),
            "" => Ok(Self::Empty),
            other => Err(Error::InvalidInput(format!("unknown destination: {other}"))),
        }
    }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub accept: Option<String>,
}

impl FetchRequest {
    /// Build a request from a method and raw URL string.
    pub fn new(method: Method, url_str: &str) -> Result<Self, Error> {
        let parsed = Url::parse(url_str.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let url = match parsed.scheme() {
            "http" | "https" => canonicalize(parsed.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))?,
            _ => parsed,
        };

        Ok(Self { method, url, mode: RequestMode::default(), destination: Destination::default(), accept: None })
    }

    pub fn get(url_str: &str) -> Result<Self, Error> {
        Self::new(Method::GET, url_str)
    }

    /// A top-level page load.
    pub fn navigate(url_str: &str) -> Result<Self, Error> {
        Ok(Self::get(url_str)?
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
            .with_accept("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Storage identity: method plus absolute URL.
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.method.as_str(), self.url.as_str())
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Only 2xx responses are written to the cache.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Snapshot for storage. Header values that are not valid UTF-8 are dropped.
    pub fn to_stored(&self) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        StoredResponse { status: self.status.as_u16(), headers, body: self.body.to_vec() }
    }
}

/// Seam between the cache executor and the network.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Transport failures are errors; any HTTP status is a response.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "tiercache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 5s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "tiercache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(5000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &tiercache_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn map_send_error(&self, url: &Url, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(format!("{url} after {}ms", self.config.timeout.as_millis()))
        } else {
            Error::Network(format!("{url}: {err}"))
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(&request.url, e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(&request.url, e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            fetch_ms,
            bytes = body.len(),
            "fetched"
        );

        Ok(FetchResponse { url, status, headers, body, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "tiercache/0.1");
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = tiercache_core::AppConfig { timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from_app(&app);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.user_agent, app.user_agent);
    }

    #[test]
    fn test_request_canonicalizes_http() {
        let request = FetchRequest::get("https://EXAMPLE.com/index.html#top").unwrap();
        assert_eq!(request.url.as_str(), "https://example.com/index.html");
        assert_eq!(request.identity(), RequestIdentity::get("https://example.com/index.html"));
    }

    #[test]
    fn test_request_keeps_other_schemes() {
        let request = FetchRequest::get("chrome-extension://abcdef/popup.js").unwrap();
        assert_eq!(request.url.scheme(), "chrome-extension");
    }

    #[test]
    fn test_request_rejects_garbage() {
        assert!(matches!(FetchRequest::get("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_mode_and_destination() {
        assert_eq!("navigate".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("No-Cors".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert_eq!("image".parse::<Destination>().unwrap(), Destination::Image);
        assert!(matches!("iframe".parse::<Destination>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_navigate_request() {
        let request = FetchRequest::navigate("https://example.com/").unwrap();
        assert_eq!(request.mode, RequestMode::Navigate);
        assert!(request.accept.as_deref().unwrap().contains("text/html"));
    }

    #[test]
    fn test_to_stored() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "image/png".parse().unwrap());
        let response = FetchResponse {
            url: Url::parse("https://example.com/a.png").unwrap(),
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"png"),
            fetch_ms: 3,
        };

        assert!(response.is_ok());
        assert_eq!(response.content_type(), Some("image/png"));
        let stored = response.to_stored();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.body, b"png");
        assert_eq!(stored.header("content-type"), Some("image/png"));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let config = FetchConfig::default();
        let client = FetchClient::new(config);
        assert!(client.is_ok());
    }
}
