//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TIERCACHE_*)
//! 2. TOML config file (if TIERCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::tier::Namespaces;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TIERCACHE_*)
/// 2. TOML config file (if TIERCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application prefix shared by all namespace names.
    ///
    /// Set via TIERCACHE_APP_NAME environment variable.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Deployment version suffix shared by all four tier namespaces.
    ///
    /// Set via TIERCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path to SQLite cache database.
    ///
    /// Set via TIERCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Site origin that relative manifest paths resolve against.
    ///
    /// Set via TIERCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via TIERCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network deadline in milliseconds; fetches are aborted past it.
    ///
    /// Set via TIERCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via TIERCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Period of the expiry sweep in seconds.
    ///
    /// Set via TIERCACHE_SWEEP_INTERVAL_SECS environment variable.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Critical resources pre-cached on install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Static assets pre-cached on install and always classified as static.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// External stylesheets cached alongside the static tier.
    #[serde(default = "default_external_resources")]
    pub external_resources: Vec<String>,

    /// Hosts whose responses belong to the API tier.
    #[serde(default = "default_api_hosts")]
    pub api_hosts: Vec<String>,
}

fn default_app_name() -> String {
    "fuelmaster".into()
}

fn default_cache_version() -> String {
    "v5".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tiercache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "tiercache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/assets/css/styles.css", "/assets/js/script.js", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_static_assets() -> Vec<String> {
    vec!["/assets/img/logo.jpg".into(), "/app-ads.txt".into()]
}

fn default_external_resources() -> Vec<String> {
    vec!["https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0-beta3/css/all.min.css".into()]
}

fn default_api_hosts() -> Vec<String> {
    vec!["api.open-meteo.com".into(), "geocode.maps.co".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            cache_version: default_cache_version(),
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            precache: default_precache(),
            static_assets: default_static_assets(),
            external_resources: default_external_resources(),
            api_hosts: default_api_hosts(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Namespace naming for the running deployment.
    pub fn namespaces(&self) -> Namespaces {
        Namespaces::new(&self.app_name, &self.cache_version)
    }

    /// Everything pre-cached on install: critical resources, static assets,
    /// then external resources.
    pub fn install_manifest(&self) -> Vec<String> {
        self.precache
            .iter()
            .chain(&self.static_assets)
            .chain(&self.external_resources)
            .cloned()
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TIERCACHE_`
    /// 2. TOML file from `TIERCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TIERCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TIERCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.app_name, "fuelmaster");
        assert_eq!(config.cache_version, "v5");
        assert_eq!(config.db_path, PathBuf::from("./tiercache.sqlite"));
        assert_eq!(config.user_agent, "tiercache/0.1");
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.sweep_interval_secs, 3_600);
        assert_eq!(config.api_hosts.len(), 2);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(5_000));
        assert_eq!(config.sweep_interval(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_install_manifest_order() {
        let config = AppConfig {
            precache: vec!["/".into()],
            static_assets: vec!["/logo.jpg".into()],
            external_resources: vec!["https://cdn.example.com/a.css".into()],
            ..Default::default()
        };
        assert_eq!(config.install_manifest(), vec!["/", "/logo.jpg", "https://cdn.example.com/a.css"]);
    }

    #[test]
    fn test_namespaces_from_config() {
        let config = AppConfig { cache_version: "v6".into(), ..Default::default() };
        assert_eq!(config.namespaces().name(crate::Tier::Static), "fuelmaster-static-v6");
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tiercache.toml", "cache_version = \"v7\"\ntimeout_ms = 2000\n")?;
            jail.set_env("TIERCACHE_CONFIG_FILE", "tiercache.toml");
            jail.set_env("TIERCACHE_TIMEOUT_MS", "3000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "v7");
            assert_eq!(config.timeout_ms, 3000);
            assert_eq!(config.app_name, "fuelmaster");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TIERCACHE_TIMEOUT_MS", "10");
            assert!(matches!(AppConfig::load(), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
