//! Cache tiers and their policies

use core_runtime::config::{CacheLimits, TierLimits};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A named cache policy bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheTier {
    Static,
    Dynamic,
    Api,
    Image,
    Font,
    OfflineFallback,
}

/// Read algorithm applied to a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl CacheTier {
    pub const ALL: [CacheTier; 6] = [
        CacheTier::Static,
        CacheTier::Dynamic,
        CacheTier::Api,
        CacheTier::Image,
        CacheTier::Font,
        CacheTier::OfflineFallback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CacheTier::Static => "static",
            CacheTier::Dynamic => "dynamic",
            CacheTier::Api => "api",
            CacheTier::Image => "image",
            CacheTier::Font => "font",
            CacheTier::OfflineFallback => "offline-fallback",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            CacheTier::Static | CacheTier::Font | CacheTier::Image | CacheTier::OfflineFallback => {
                Strategy::CacheFirst
            }
            CacheTier::Api => Strategy::NetworkFirst,
            CacheTier::Dynamic => Strategy::StaleWhileRevalidate,
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved policy for one tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPolicy {
    pub tier: CacheTier,
    /// Store namespace, e.g. `api-v1`
    pub store_name: String,
    pub max_age: Duration,
    pub max_entries: usize,
}

/// Policies for every tier under one cache version
#[derive(Debug, Clone)]
pub struct TierTable {
    version: String,
    policies: Vec<TierPolicy>,
}

impl TierTable {
    pub fn new(version: &str, limits: &CacheLimits) -> Self {
        let policies = CacheTier::ALL
            .iter()
            .map(|&tier| {
                let TierLimits {
                    max_age,
                    max_entries,
                } = match tier {
                    CacheTier::Static => limits.static_assets,
                    CacheTier::Dynamic => limits.dynamic,
                    CacheTier::Api => limits.api,
                    CacheTier::Image => limits.image,
                    CacheTier::Font => limits.font,
                    CacheTier::OfflineFallback => limits.offline_fallback,
                };
                TierPolicy {
                    tier,
                    store_name: format!("{}-{}", tier.name(), version),
                    max_age,
                    max_entries,
                }
            })
            .collect();

        Self {
            version: version.to_string(),
            policies,
        }
    }

    pub fn policy(&self, tier: CacheTier) -> &TierPolicy {
        // Built in ALL order
        &self.policies[tier as usize]
    }

    pub fn policies(&self) -> &[TierPolicy] {
        &self.policies
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether a store namespace belongs to the current version
    pub fn owns_store(&self, name: &str) -> bool {
        self.policies.iter().any(|p| p.store_name == name)
    }
}
