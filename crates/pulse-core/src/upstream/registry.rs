//! Static description of the upstream telemetry sources.
//!
//! The registry is built once at startup and never changes afterwards. It lists the
//! optional consolidated source and the individual fallback sources, each identified by
//! an [`EndpointKey`] that also determines which [`Domain`] its payload decodes into.

use crate::types::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic key of an upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKey {
    Consolidated,
    Blockchain,
    Mempool,
    Mining,
    Staking,
    Sidechains,
}

impl EndpointKey {
    /// Individual (fallback) keys in request order.
    pub const INDIVIDUAL: [EndpointKey; 5] = [
        EndpointKey::Blockchain,
        EndpointKey::Mempool,
        EndpointKey::Mining,
        EndpointKey::Staking,
        EndpointKey::Sidechains,
    ];

    /// Returns a static string representation for log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consolidated => "consolidated",
            Self::Blockchain => "blockchain",
            Self::Mempool => "mempool",
            Self::Mining => "mining",
            Self::Staking => "staking",
            Self::Sidechains => "sidechains",
        }
    }

    /// Returns the domain an individual source feeds, or `None` for the consolidated source.
    #[must_use]
    pub fn domain(&self) -> Option<Domain> {
        match self {
            Self::Consolidated => None,
            Self::Blockchain => Some(Domain::Chain),
            Self::Mempool => Some(Domain::Mempool),
            Self::Mining => Some(Domain::Mining),
            Self::Staking => Some(Domain::Staking),
            Self::Sidechains => Some(Domain::Sidechains),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream source: its key, request path and whether it is the consolidated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub key: EndpointKey,
    pub path: String,
    pub is_consolidated: bool,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn new(key: EndpointKey, path: impl Into<String>) -> Self {
        Self { key, path: path.into(), is_consolidated: key == EndpointKey::Consolidated }
    }
}

/// Request paths for every upstream source, relative to the upstream base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPaths {
    #[serde(default = "default_consolidated_path")]
    pub consolidated: String,
    #[serde(default = "default_blockchain_path")]
    pub blockchain: String,
    #[serde(default = "default_mempool_path")]
    pub mempool: String,
    #[serde(default = "default_mining_path")]
    pub mining: String,
    #[serde(default = "default_staking_path")]
    pub staking: String,
    #[serde(default = "default_sidechains_path")]
    pub sidechains: String,
}

fn default_consolidated_path() -> String {
    "/api/consolidated-data".to_string()
}

fn default_blockchain_path() -> String {
    "/api/blockchain-info".to_string()
}

fn default_mempool_path() -> String {
    "/api/mempool/size".to_string()
}

fn default_mining_path() -> String {
    "/api/mining-info".to_string()
}

fn default_staking_path() -> String {
    "/api/real-staking-data".to_string()
}

fn default_sidechains_path() -> String {
    "/api/verus-pbaas".to_string()
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            consolidated: default_consolidated_path(),
            blockchain: default_blockchain_path(),
            mempool: default_mempool_path(),
            mining: default_mining_path(),
            staking: default_staking_path(),
            sidechains: default_sidechains_path(),
        }
    }
}

impl EndpointPaths {
    /// Returns the configured path for `key`.
    #[must_use]
    pub fn path(&self, key: EndpointKey) -> &str {
        match key {
            EndpointKey::Consolidated => &self.consolidated,
            EndpointKey::Blockchain => &self.blockchain,
            EndpointKey::Mempool => &self.mempool,
            EndpointKey::Mining => &self.mining,
            EndpointKey::Staking => &self.staking,
            EndpointKey::Sidechains => &self.sidechains,
        }
    }

    /// Iterates `(key, path)` for every source including the consolidated one.
    pub fn iter(&self) -> impl Iterator<Item = (EndpointKey, &str)> {
        std::iter::once(EndpointKey::Consolidated)
            .chain(EndpointKey::INDIVIDUAL)
            .map(move |key| (key, self.path(key)))
    }
}

/// Immutable set of upstream sources consulted by the fallback composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRegistry {
    consolidated: Option<EndpointDescriptor>,
    individual: Vec<EndpointDescriptor>,
}

impl EndpointRegistry {
    /// Builds the registry from configured paths.
    ///
    /// When `use_consolidated` is `false` every cycle goes straight to the individual sources.
    #[must_use]
    pub fn from_paths(paths: &EndpointPaths, use_consolidated: bool) -> Self {
        let consolidated = use_consolidated
            .then(|| EndpointDescriptor::new(EndpointKey::Consolidated, paths.path(EndpointKey::Consolidated)));
        let individual = EndpointKey::INDIVIDUAL
            .into_iter()
            .map(|key| EndpointDescriptor::new(key, paths.path(key)))
            .collect();
        Self { consolidated, individual }
    }

    /// Builds a registry from explicit descriptors.
    ///
    /// Descriptors flagged as consolidated are ignored in the individual list; duplicate
    /// keys keep their first occurrence.
    #[must_use]
    pub fn new(
        consolidated: Option<EndpointDescriptor>,
        individual: impl IntoIterator<Item = EndpointDescriptor>,
    ) -> Self {
        let mut seen = Vec::new();
        let individual = individual
            .into_iter()
            .filter(|d| !d.is_consolidated)
            .filter(|d| {
                if seen.contains(&d.key) {
                    false
                } else {
                    seen.push(d.key);
                    true
                }
            })
            .collect();
        Self { consolidated, individual }
    }

    #[must_use]
    pub fn consolidated(&self) -> Option<&EndpointDescriptor> {
        self.consolidated.as_ref()
    }

    #[must_use]
    pub fn individual(&self) -> &[EndpointDescriptor] {
        &self.individual
    }

    /// Looks up a descriptor by key.
    #[must_use]
    pub fn descriptor(&self, key: EndpointKey) -> Option<&EndpointDescriptor> {
        self.consolidated.iter().chain(self.individual.iter()).find(|d| d.key == key)
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::from_paths(&EndpointPaths::default(), true)
    }
}
