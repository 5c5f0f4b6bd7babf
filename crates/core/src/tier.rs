//! Cache tiers, per-tier policies and versioned namespace names.
//!
//! The whole caching policy lives in two constant tables: [`Tier::policy`]
//! (expiry window and item ceiling per tier) and [`RequestKind::route`]
//! (which tier and strategy serve each kind of request).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DAY: u64 = 24 * 60 * 60;

/// A named cache partition with its own expiry and eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Static,
    Dynamic,
    Image,
    Api,
}

/// Expiry window and optional item ceiling for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub max_age: Duration,
    pub max_items: Option<usize>,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Static, Tier::Dynamic, Tier::Image, Tier::Api];

    /// Slug used inside namespace names.
    pub fn slug(self) -> &'static str {
        match self {
            Tier::Static => "static",
            Tier::Dynamic => "dynamic",
            Tier::Image => "images",
            Tier::Api => "api",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Tier> {
        Tier::ALL.into_iter().find(|t| t.slug() == slug)
    }

    pub fn policy(self) -> TierPolicy {
        match self {
            Tier::Static => TierPolicy { max_age: Duration::from_secs(30 * DAY), max_items: None },
            Tier::Dynamic => TierPolicy { max_age: Duration::from_secs(DAY), max_items: Some(100) },
            Tier::Image => TierPolicy { max_age: Duration::from_secs(7 * DAY), max_items: Some(50) },
            Tier::Api => TierPolicy { max_age: Duration::from_secs(10 * 60), max_items: None },
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// How a request is served relative to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// Classification of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Navigation,
    Image,
    StaticAsset,
    Api,
    Generic,
}

/// Tier and strategy serving a request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub tier: Tier,
    pub strategy: Strategy,
}

impl RequestKind {
    pub fn route(self) -> Route {
        let (tier, strategy) = match self {
            RequestKind::Navigation => (Tier::Dynamic, Strategy::NetworkFirst),
            RequestKind::Image => (Tier::Image, Strategy::CacheFirst),
            RequestKind::StaticAsset => (Tier::Static, Strategy::CacheFirst),
            RequestKind::Api => (Tier::Api, Strategy::StaleWhileRevalidate),
            RequestKind::Generic => (Tier::Dynamic, Strategy::StaleWhileRevalidate),
        };
        Route { tier, strategy }
    }
}

/// Versioned namespace naming: `<app>-<tier>-<version>`.
///
/// All four tiers share one version suffix. A stored namespace owned by the
/// app whose name is not current belongs to an earlier deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    app: String,
    version: String,
}

impl Namespaces {
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        Self { app: app.into(), version: version.into() }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, tier: Tier) -> String {
        format!("{}-{}-{}", self.app, tier.slug(), self.version)
    }

    pub fn current(&self) -> Vec<String> {
        Tier::ALL.into_iter().map(|t| self.name(t)).collect()
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.tier_of(name).is_some()
    }

    /// Tier of a namespace, only if it carries the running version.
    pub fn tier_of(&self, name: &str) -> Option<Tier> {
        let rest = name.strip_prefix(&self.app)?.strip_prefix('-')?;
        let slug = rest.strip_suffix(&self.version)?.strip_suffix('-')?;
        Tier::from_slug(slug)
    }

    /// Whether the namespace was created by this app, any version.
    pub fn is_owned(&self, name: &str) -> bool {
        name.strip_prefix(&self.app).is_some_and(|rest| rest.starts_with('-'))
    }
}
