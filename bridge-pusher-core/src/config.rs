use crate::{
    error::PusherError,
    types::{AssetSymbol, ChainId, Permille},
};
use alloy::primitives::{address, Address};
use std::{collections::HashSet, fmt, str::FromStr, time::Duration};
use tracing::debug;

pub const DEFAULT_DEVIATION_PERMILLE: Permille = 50;
pub const DEFAULT_TRIGGER_ADDRESS: Address = address!("252Cd6aEe2E776f6B80d92DB360e8D9716eA25Bc");
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const DEFAULT_CONDITIONAL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MANDATORY_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the cache is anchored to a new value when its dispatch produced no successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Update the cache after every dispatch attempt, even if every chain failed.
    #[default]
    Always,
    /// Update the cache only when at least one chain accepted the transaction.
    OnAnySuccess,
}

impl FromStr for AnchorPolicy {
    type Err = PusherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(AnchorPolicy::Always),
            "on-any-success" | "on_any_success" => Ok(AnchorPolicy::OnAnySuccess),
            other => Err(PusherError::Config(format!(
                "unknown anchor policy '{other}' (expected 'always' or 'on-any-success')"
            ))),
        }
    }
}

impl fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorPolicy::Always => f.write_str("always"),
            AnchorPolicy::OnAnySuccess => f.write_str("on-any-success"),
        }
    }
}

/// Runtime configuration of the pusher. Built once at startup.
#[derive(Clone, PartialEq)]
pub struct PusherConfig {
    /// Hex encoded secp256k1 key of the account paying for dispatches.
    pub private_key: String,
    pub trigger_address: Address,
    /// Metadata contract address. Discovered from the trigger contract when `None`.
    pub metadata_address: Option<Address>,
    pub rpc_url: String,
    pub destination_chains: Vec<ChainId>,
    pub assets: Vec<AssetSymbol>,
    /// Relative change, in parts per thousand, that triggers a conditional update.
    pub deviation_permille: Permille,
    pub conditional_interval: Duration,
    pub mandatory_interval: Duration,
    pub gas_limit: u64,
    /// Upper bound on how long in-flight cycles may run after shutdown is requested.
    pub drain_timeout: Duration,
    pub anchor_policy: AnchorPolicy,
}

// Keep the key out of logs.
impl fmt::Debug for PusherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PusherConfig")
            .field("private_key", &"<redacted>")
            .field("trigger_address", &self.trigger_address)
            .field("metadata_address", &self.metadata_address)
            .field("rpc_url", &self.rpc_url)
            .field("destination_chains", &self.destination_chains)
            .field("assets", &self.assets)
            .field("deviation_permille", &self.deviation_permille)
            .field("conditional_interval", &self.conditional_interval)
            .field("mandatory_interval", &self.mandatory_interval)
            .field("gas_limit", &self.gas_limit)
            .field("drain_timeout", &self.drain_timeout)
            .field("anchor_policy", &self.anchor_policy)
            .finish()
    }
}

impl PusherConfig {
    /// Creates a config with defaults for everything but the required settings.
    pub fn new(
        private_key: impl Into<String>,
        rpc_url: impl Into<String>,
        destination_chains: Vec<ChainId>,
        assets: Vec<AssetSymbol>,
    ) -> Self {
        Self {
            private_key: private_key.into(),
            trigger_address: DEFAULT_TRIGGER_ADDRESS,
            metadata_address: None,
            rpc_url: rpc_url.into(),
            destination_chains,
            assets,
            deviation_permille: DEFAULT_DEVIATION_PERMILLE,
            conditional_interval: DEFAULT_CONDITIONAL_INTERVAL,
            mandatory_interval: DEFAULT_MANDATORY_INTERVAL,
            gas_limit: DEFAULT_GAS_LIMIT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            anchor_policy: AnchorPolicy::default(),
        }
    }

    /// Checks the invariants the scheduler and dispatcher rely on.
    pub fn validate(&self) -> Result<(), PusherError> {
        if self.private_key.trim().is_empty() {
            return Err(PusherError::Config("private key is not set".to_string()));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(PusherError::Config("RPC endpoint is not set".to_string()));
        }
        if self.destination_chains.is_empty() {
            return Err(PusherError::Config(
                "no destination chains configured".to_string(),
            ));
        }
        if self.assets.is_empty() {
            return Err(PusherError::Config("no assets configured".to_string()));
        }

        let mut unique_chains = HashSet::new();
        for chain in &self.destination_chains {
            if !unique_chains.insert(*chain) {
                return Err(PusherError::Config(format!(
                    "duplicate destination chain: {chain}"
                )));
            }
        }

        let mut unique_assets = HashSet::new();
        for asset in &self.assets {
            if asset.trim().is_empty() {
                return Err(PusherError::Config("blank asset symbol".to_string()));
            }
            if !unique_assets.insert(asset.as_str()) {
                return Err(PusherError::Config(format!("duplicate asset: {asset}")));
            }
        }

        if self.conditional_interval.is_zero() || self.mandatory_interval.is_zero() {
            return Err(PusherError::Config(
                "update intervals must be non-zero".to_string(),
            ));
        }
        if self.mandatory_interval < self.conditional_interval {
            return Err(PusherError::Config(format!(
                "mandatory interval ({:?}) is shorter than conditional interval ({:?})",
                self.mandatory_interval, self.conditional_interval
            )));
        }
        if self.gas_limit == 0 {
            return Err(PusherError::Config("gas limit must be non-zero".to_string()));
        }

        debug!(
            chains = self.destination_chains.len(),
            assets = self.assets.len(),
            "Successfully validated pusher config"
        );
        Ok(())
    }
}

/// Parses a comma separated list of destination chain ids, e.g. `"43113, 11155111"`.
pub fn parse_chain_list(raw: &str) -> Result<Vec<ChainId>, PusherError> {
    split_list(raw)
        .map(|item| {
            item.parse::<ChainId>().map_err(|e| {
                PusherError::Config(format!("invalid destination chain id '{item}': {e}"))
            })
        })
        .collect()
}

/// Parses a comma separated list of asset symbols, e.g. `"BTC/USD,ETH/USD"`.
pub fn parse_asset_list(raw: &str) -> Result<Vec<AssetSymbol>, PusherError> {
    Ok(split_list(raw).map(str::to_string).collect())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
