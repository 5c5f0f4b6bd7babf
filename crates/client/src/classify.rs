//! Request classification.
//!
//! Maps an intercepted request to exactly one [`RequestKind`]. First match wins:
//!
//! 1. Navigation: navigate mode, or a GET accepting `text/html`
//! 2. Image: image destination, or a raster/vector extension
//! 3. Static asset: stylesheet/script/font extension, allow-listed path, or
//!    known external stylesheet
//! 4. API: weather/geocoding host, or an `/api/` path segment
//! 5. Generic
//!
//! Extensions are matched on the URL path, so query strings do not hide them.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use tiercache_core::{AppConfig, RequestKind};

use crate::fetch::{Destination, FetchRequest, RequestMode};

static IMAGE_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$").expect("valid image regex"));

static STATIC_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(css|js|woff|woff2|ttf|eot)$").expect("valid static regex"));

/// Site-specific lists the classifier consults.
#[derive(Debug, Clone, Default)]
pub struct ClassifierRules {
    /// Paths always treated as static assets (e.g. `/app-ads.txt`).
    pub static_assets: Vec<String>,
    /// URL prefixes of external stylesheets.
    pub external_resources: Vec<String>,
    /// Hosts serving API responses; subdomains match too.
    pub api_hosts: Vec<String>,
}

impl ClassifierRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            static_assets: config.static_assets.clone(),
            external_resources: config.external_resources.clone(),
            api_hosts: config.api_hosts.clone(),
        }
    }
}

/// Only http(s) requests go through the cache; anything else (extension
/// pages, data URLs) passes straight to the network.
pub fn is_interceptable(request: &FetchRequest) -> bool {
    matches!(request.url.scheme(), "http" | "https")
}

pub fn classify(request: &FetchRequest, rules: &ClassifierRules) -> RequestKind {
    if is_navigation(request) {
        RequestKind::Navigation
    } else if is_image(request) {
        RequestKind::Image
    } else if is_static_asset(request, rules) {
        RequestKind::StaticAsset
    } else if is_api(request, rules) {
        RequestKind::Api
    } else {
        RequestKind::Generic
    }
}

fn is_navigation(request: &FetchRequest) -> bool {
    request.mode == RequestMode::Navigate
        || (request.method == Method::GET && request.accept.as_deref().is_some_and(|a| a.contains("text/html")))
}

fn is_image(request: &FetchRequest) -> bool {
    request.destination == Destination::Image || IMAGE_EXT.is_match(request.url.path())
}

fn is_static_asset(request: &FetchRequest, rules: &ClassifierRules) -> bool {
    let url = request.url.as_str();
    STATIC_EXT.is_match(request.url.path())
        || rules
            .static_assets
            .iter()
            .any(|asset| request.url.path() == asset || url.ends_with(asset.as_str()))
        || rules.external_resources.iter().any(|r| url.starts_with(r.as_str()))
}

fn is_api(request: &FetchRequest, rules: &ClassifierRules) -> bool {
    let host_match = request.url.host_str().is_some_and(|host| {
        rules
            .api_hosts
            .iter()
            .any(|api| host == api || host.strip_suffix(api.as_str()).is_some_and(|sub| sub.ends_with('.')))
    });
    host_match || request.url.path().contains("/api/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassifierRules {
        ClassifierRules::from_config(&AppConfig::default())
    }

    fn kind(request: FetchRequest) -> RequestKind {
        classify(&request, &rules())
    }

    #[test]
    fn test_navigation_by_mode() {
        let request = FetchRequest::get("https://fuelmaster.example/").unwrap().with_mode(RequestMode::Navigate);
        assert_eq!(kind(request), RequestKind::Navigation);
    }

    #[test]
    fn test_navigation_by_accept_header() {
        let request = FetchRequest::get("https://fuelmaster.example/privacy.html")
            .unwrap()
            .with_accept("text/html");
        assert_eq!(kind(request), RequestKind::Navigation);
    }

    #[test]
    fn test_navigation_wins_over_extension() {
        let request = FetchRequest::navigate("https://fuelmaster.example/assets/img/logo.jpg").unwrap();
        assert_eq!(kind(request), RequestKind::Navigation);
    }

    #[test]
    fn test_post_with_html_accept_is_not_navigation() {
        let request = FetchRequest::new(Method::POST, "https://fuelmaster.example/form")
            .unwrap()
            .with_accept("text/html");
        assert_eq!(kind(request), RequestKind::Generic);
    }

    #[test]
    fn test_image_by_destination_and_extension() {
        let by_dest = FetchRequest::get("https://fuelmaster.example/avatar")
            .unwrap()
            .with_destination(Destination::Image);
        assert_eq!(kind(by_dest), RequestKind::Image);

        let by_ext = FetchRequest::get("https://fuelmaster.example/assets/img/Screenshot-1-DARK.JPG").unwrap();
        assert_eq!(kind(by_ext), RequestKind::Image);

        let with_query = FetchRequest::get("https://fuelmaster.example/icon.svg?v=3").unwrap();
        assert_eq!(kind(with_query), RequestKind::Image);
    }

    #[test]
    fn test_logo_is_image_before_static_allow_list() {
        let request = FetchRequest::get("https://fuelmaster.example/assets/img/logo.jpg").unwrap();
        assert_eq!(kind(request), RequestKind::Image);
    }

    #[test]
    fn test_static_assets() {
        for url in [
            "https://fuelmaster.example/assets/css/styles.css",
            "https://fuelmaster.example/assets/js/script.js",
            "https://fuelmaster.example/fonts/a.woff2",
            "https://fuelmaster.example/app-ads.txt",
            "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0-beta3/css/all.min.css",
        ] {
            assert_eq!(kind(FetchRequest::get(url).unwrap()), RequestKind::StaticAsset, "{url}");
        }
    }

    #[test]
    fn test_api_requests() {
        for url in [
            "https://api.open-meteo.com/v1/forecast?latitude=55.75&longitude=37.62&current_weather=true",
            "https://geocode.maps.co/reverse?lat=1&lon=2",
            "https://fuelmaster.example/api/prices",
        ] {
            assert_eq!(kind(FetchRequest::get(url).unwrap()), RequestKind::Api, "{url}");
        }
    }

    #[test]
    fn test_api_host_suffix_requires_label_boundary() {
        let request = FetchRequest::get("https://notgeocode.maps.co/reverse").unwrap();
        assert_eq!(kind(request), RequestKind::Generic);
    }

    #[test]
    fn test_generic() {
        let request = FetchRequest::get("https://fuelmaster.example/manifest.json").unwrap();
        assert_eq!(kind(request), RequestKind::Generic);
    }

    #[test]
    fn test_interceptable() {
        assert!(is_interceptable(&FetchRequest::get("http://localhost:8080/").unwrap()));
        assert!(!is_interceptable(&FetchRequest::get("chrome-extension://abc/x.js").unwrap()));
    }
}
