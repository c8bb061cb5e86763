//! Core type definitions for telemetry domains, decoded payloads and snapshots.
//!
//! # Type Categories
//!
//! ## Domain Identity
//! - [`Domain`], [`DomainSet`]: closed set of telemetry categories and a compact set over them
//!
//! ## Decoded Payloads
//! - [`ChainStats`], [`MiningStats`], [`MempoolStats`], [`NetworkStats`], [`StakingStats`],
//!   [`SidechainInfo`]: typed views of upstream `data` objects
//! - [`DomainPayload`]: tagged variant produced at the deserialization boundary
//!
//! ## Snapshots
//! - [`PartialSnapshot`]: the domains one cycle managed to refresh
//! - [`Snapshot`]: latest known value for every domain, owned by the state store
//!
//! Chain, mempool and sidechain payloads have one required field that identifies a usable
//! response. Mining, network and staking payloads only need to be a JSON object; any of
//! their fields may be absent. Extra or missing optional fields never reject an
//! otherwise valid payload. Both the camelCase spelling produced by explorer APIs and the
//! all-lowercase spelling of daemon RPC results are accepted.

use chrono::{DateTime, Utc};
use serde::{
    de::{self, DeserializeOwned},
    Deserialize, Serialize, Serializer,
};
use serde_json::Value;
use std::fmt;
use tokio::time::Instant;

/// A category of telemetry tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Chain,
    Mining,
    Mempool,
    Network,
    Staking,
    Sidechains,
}

impl Domain {
    /// Every domain, in snapshot field order.
    pub const ALL: [Domain; 6] = [
        Domain::Chain,
        Domain::Mining,
        Domain::Mempool,
        Domain::Network,
        Domain::Staking,
        Domain::Sidechains,
    ];

    /// Domains whose presence makes a consolidated response usable on its own.
    pub const RECOGNIZED: [Domain; 4] =
        [Domain::Chain, Domain::Mining, Domain::Mempool, Domain::Staking];

    /// Returns a static string representation for log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Mining => "mining",
            Self::Mempool => "mempool",
            Self::Network => "network",
            Self::Staking => "staking",
            Self::Sidechains => "sidechains",
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact set of [`Domain`] values backed by a bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DomainSet(u8);

impl DomainSet {
    /// The empty set.
    pub const EMPTY: DomainSet = DomainSet(0);

    /// Returns a set containing every domain.
    #[must_use]
    pub fn all() -> Self {
        Domain::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, domain: Domain) {
        self.0 |= domain.bit();
    }

    pub fn remove(&mut self, domain: Domain) {
        self.0 &= !domain.bit();
    }

    #[must_use]
    pub fn contains(&self, domain: Domain) -> bool {
        self.0 & domain.bit() != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn union(self, other: DomainSet) -> DomainSet {
        DomainSet(self.0 | other.0)
    }

    #[must_use]
    pub fn difference(self, other: DomainSet) -> DomainSet {
        DomainSet(self.0 & !other.0)
    }

    /// Iterates the contained domains in snapshot field order.
    pub fn iter(&self) -> impl Iterator<Item = Domain> {
        let set = *self;
        Domain::ALL.into_iter().filter(move |d| set.contains(*d))
    }
}

impl FromIterator<Domain> for DomainSet {
    fn from_iter<I: IntoIterator<Item = Domain>>(iter: I) -> Self {
        let mut set = DomainSet::EMPTY;
        for domain in iter {
            set.insert(domain);
        }
        set
    }
}

impl fmt::Debug for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for DomainSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|d| d.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl Serialize for DomainSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Blockchain head and sync progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub blocks: u64,
    pub headers: Option<u64>,
    #[serde(alias = "bestblockhash")]
    pub best_block_hash: Option<String>,
    pub difficulty: Option<f64>,
    pub chain: Option<String>,
    #[serde(alias = "verificationprogress")]
    pub verification_progress: Option<f64>,
    #[serde(alias = "size_on_disk")]
    pub size_on_disk: Option<u64>,
}

/// Mining difficulty and network hash rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    pub difficulty: Option<f64>,
    pub blocks: Option<u64>,
    #[serde(alias = "networkhashps")]
    pub network_hashrate: Option<f64>,
    #[serde(alias = "localhashps")]
    pub local_hashrate: Option<f64>,
    #[serde(alias = "pooledtx")]
    pub pooled_tx: Option<u64>,
}

/// Pending transaction pool size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolStats {
    pub size: u64,
    pub bytes: Option<u64>,
    pub usage: Option<u64>,
    #[serde(alias = "total_fee")]
    pub total_fee: Option<f64>,
}

/// Peer connectivity of the serving node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub connections: Option<u32>,
    pub version: Option<u64>,
    pub subversion: Option<String>,
    #[serde(alias = "protocolversion")]
    pub protocol_version: Option<u64>,
    #[serde(alias = "relayfee")]
    pub relay_fee: Option<f64>,
}

/// Proof-of-stake participation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingStats {
    #[serde(alias = "networkweight", alias = "netstakeweight")]
    pub network_weight: Option<f64>,
    pub apy: Option<f64>,
    #[serde(alias = "stakingsupply")]
    pub staking_supply: Option<f64>,
    pub staking: Option<bool>,
}

/// One sidechain (PBaaS chain) known to the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidechainInfo {
    pub name: String,
    #[serde(alias = "currencyid")]
    pub currency_id: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "height", alias = "lastconfirmedheight")]
    pub block_height: Option<u64>,
}

/// Sidechain responses arrive either as a bare list or wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SidechainList {
    Bare(Vec<SidechainInfo>),
    Wrapped {
        #[serde(alias = "pbaas")]
        chains: Vec<SidechainInfo>,
    },
}

impl SidechainList {
    fn into_vec(self) -> Vec<SidechainInfo> {
        match self {
            Self::Bare(chains) | Self::Wrapped { chains } => chains,
        }
    }
}

/// Deserializes a stats struct, accepting only JSON objects.
fn from_object<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    let found = match &value {
        Value::Object(_) => return serde_json::from_value(value),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(de::Error::custom(format!("expected a JSON object, found {found}")))
}

/// A decoded upstream payload for exactly one domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainPayload {
    Chain(ChainStats),
    Mining(MiningStats),
    Mempool(MempoolStats),
    Network(NetworkStats),
    Staking(StakingStats),
    Sidechains(Vec<SidechainInfo>),
}

impl DomainPayload {
    /// Decodes a raw `data` value into the typed payload for `domain`.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the value does not have the expected shape.
    pub fn decode(domain: Domain, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match domain {
            Domain::Chain => Self::Chain(from_object(value)?),
            Domain::Mining => Self::Mining(from_object(value)?),
            Domain::Mempool => Self::Mempool(from_object(value)?),
            Domain::Network => Self::Network(from_object(value)?),
            Domain::Staking => Self::Staking(from_object(value)?),
            Domain::Sidechains => {
                Self::Sidechains(serde_json::from_value::<SidechainList>(value)?.into_vec())
            }
        })
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        match self {
            Self::Chain(_) => Domain::Chain,
            Self::Mining(_) => Domain::Mining,
            Self::Mempool(_) => Domain::Mempool,
            Self::Network(_) => Domain::Network,
            Self::Staking(_) => Domain::Staking,
            Self::Sidechains(_) => Domain::Sidechains,
        }
    }
}

/// The domains refreshed by one cycle. Absent fields were not updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSnapshot {
    pub chain: Option<ChainStats>,
    pub mining: Option<MiningStats>,
    pub mempool: Option<MempoolStats>,
    pub network: Option<NetworkStats>,
    pub staking: Option<StakingStats>,
    pub sidechains: Option<Vec<SidechainInfo>>,
}

impl PartialSnapshot {
    /// Stores `payload` in the field matching its domain, replacing any earlier value.
    pub fn insert(&mut self, payload: DomainPayload) {
        match payload {
            DomainPayload::Chain(v) => self.chain = Some(v),
            DomainPayload::Mining(v) => self.mining = Some(v),
            DomainPayload::Mempool(v) => self.mempool = Some(v),
            DomainPayload::Network(v) => self.network = Some(v),
            DomainPayload::Staking(v) => self.staking = Some(v),
            DomainPayload::Sidechains(v) => self.sidechains = Some(v),
        }
    }

    #[must_use]
    pub fn domains(&self) -> DomainSet {
        let mut set = DomainSet::EMPTY;
        if self.chain.is_some() {
            set.insert(Domain::Chain);
        }
        if self.mining.is_some() {
            set.insert(Domain::Mining);
        }
        if self.mempool.is_some() {
            set.insert(Domain::Mempool);
        }
        if self.network.is_some() {
            set.insert(Domain::Network);
        }
        if self.staking.is_some() {
            set.insert(Domain::Staking);
        }
        if self.sidechains.is_some() {
            set.insert(Domain::Sidechains);
        }
        set
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains().is_empty()
    }
}

impl FromIterator<DomainPayload> for PartialSnapshot {
    fn from_iter<I: IntoIterator<Item = DomainPayload>>(iter: I) -> Self {
        let mut partial = PartialSnapshot::default();
        for payload in iter {
            partial.insert(payload);
        }
        partial
    }
}

/// Monotonic time of the last successful refresh of each domain.
#[derive(Debug, Clone, Copy, Default)]
struct DomainClock([Option<Instant>; 6]);

impl DomainClock {
    fn get(&self, domain: Domain) -> Option<Instant> {
        self.0[domain.index()]
    }

    fn set(&mut self, domain: Domain, at: Instant) {
        self.0[domain.index()] = Some(at);
    }

    fn clear(&mut self, domain: Domain) {
        self.0[domain.index()] = None;
    }
}

/// The merged, latest-known value of every domain.
///
/// Only the state store constructs new snapshots; consumers receive them behind an `Arc`
/// and never mutate them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub chain: Option<ChainStats>,
    pub mining: Option<MiningStats>,
    pub mempool: Option<MempoolStats>,
    pub network: Option<NetworkStats>,
    pub staking: Option<StakingStats>,
    pub sidechains: Vec<SidechainInfo>,
    /// Wall-clock time of the last cycle that refreshed at least one domain.
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    refreshed: DomainClock,
}

impl Snapshot {
    /// Returns `true` if a value is cached for `domain`.
    ///
    /// Sidechains count as present once any list (even an empty one) has been received.
    #[must_use]
    pub fn has(&self, domain: Domain) -> bool {
        match domain {
            Domain::Chain => self.chain.is_some(),
            Domain::Mining => self.mining.is_some(),
            Domain::Mempool => self.mempool.is_some(),
            Domain::Network => self.network.is_some(),
            Domain::Staking => self.staking.is_some(),
            Domain::Sidechains => self.refreshed.get(Domain::Sidechains).is_some(),
        }
    }

    /// Returns the set of domains with a cached value.
    #[must_use]
    pub fn domains(&self) -> DomainSet {
        Domain::ALL.into_iter().filter(|d| self.has(*d)).collect()
    }

    /// Returns when `domain` was last refreshed successfully.
    #[must_use]
    pub fn refreshed_at(&self, domain: Domain) -> Option<Instant> {
        self.refreshed.get(domain)
    }

    /// Copies every present field of `partial` into this snapshot and stamps those domains.
    pub(crate) fn apply(&mut self, partial: PartialSnapshot, at: Instant) {
        let PartialSnapshot { chain, mining, mempool, network, staking, sidechains } = partial;
        if let Some(v) = chain {
            self.chain = Some(v);
            self.refreshed.set(Domain::Chain, at);
        }
        if let Some(v) = mining {
            self.mining = Some(v);
            self.refreshed.set(Domain::Mining, at);
        }
        if let Some(v) = mempool {
            self.mempool = Some(v);
            self.refreshed.set(Domain::Mempool, at);
        }
        if let Some(v) = network {
            self.network = Some(v);
            self.refreshed.set(Domain::Network, at);
        }
        if let Some(v) = staking {
            self.staking = Some(v);
            self.refreshed.set(Domain::Staking, at);
        }
        if let Some(v) = sidechains {
            self.sidechains = v;
            self.refreshed.set(Domain::Sidechains, at);
        }
    }

    /// Drops the cached value of `domain`.
    pub(crate) fn evict(&mut self, domain: Domain) {
        match domain {
            Domain::Chain => self.chain = None,
            Domain::Mining => self.mining = None,
            Domain::Mempool => self.mempool = None,
            Domain::Network => self.network = None,
            Domain::Staking => self.staking = None,
            Domain::Sidechains => self.sidechains = Vec::new(),
        }
        self.refreshed.clear(domain);
    }
}
