//! Scripted [`BlockchainClient`] used by the unit tests.

use crate::{abi, chain::BlockchainClient, types::ChainId};
use alloy::{
    consensus::{TxEnvelope, TxLegacy},
    primitives::{keccak256, Address, Bytes, TxHash},
    sol_types::{SolCall, SolValue},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

pub const NETWORK_ID: u64 = 2;
pub const GAS_PRICE: u128 = 1_000_000_000;

/// A transaction accepted by [`MockClient::send_transaction`].
#[derive(Debug, Clone)]
pub struct Submitted {
    pub tx: TxLegacy,
    pub chain: ChainId,
    pub symbol: String,
}

#[derive(Debug, Default)]
struct State {
    prices: HashMap<String, (u128, u128)>,
    failing_feeds: HashSet<String>,
    metadata_address: Option<Address>,
    // Pending nonce as the node sees it.
    node_nonce: u64,
    // Pending nonce reported by a lagging node, if set.
    stale_pending_nonce: Option<u64>,
    // Accept any nonce at or above the pending one, then drop the transaction
    // from the pool without advancing the pending nonce.
    drop_accepted: bool,
    // Fail `pending_nonce` for the next n calls.
    nonce_failures: usize,
    gas_failures: usize,
    rejected_chains: HashSet<ChainId>,
    submitted: Vec<Submitted>,
    feed_calls: usize,
}

#[derive(Debug, Default)]
pub struct MockClient {
    state: Mutex<State>,
    send_delay: Option<Duration>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_delay(delay: Duration) -> Self {
        Self {
            state: Mutex::default(),
            send_delay: Some(delay),
        }
    }

    pub fn set_price(&self, symbol: &str, value: u128) {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(symbol.to_string(), (value, 0));
    }

    pub fn fail_feed(&self, symbol: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_feeds
            .insert(symbol.to_string());
    }

    pub fn set_metadata_address(&self, address: Address) {
        self.state.lock().unwrap().metadata_address = Some(address);
    }

    pub fn set_node_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().node_nonce = nonce;
    }

    pub fn report_stale_pending_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().stale_pending_nonce = Some(nonce);
    }

    pub fn drop_accepted_transactions(&self) {
        self.state.lock().unwrap().drop_accepted = true;
    }

    pub fn fail_next_nonce_lookups(&self, count: usize) {
        self.state.lock().unwrap().nonce_failures = count;
    }

    pub fn fail_next_gas_lookups(&self, count: usize) {
        self.state.lock().unwrap().gas_failures = count;
    }

    pub fn reject_chain(&self, chain: ChainId) {
        self.state.lock().unwrap().rejected_chains.insert(chain);
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn feed_calls(&self) -> usize {
        self.state.lock().unwrap().feed_calls
    }
}

#[async_trait]
impl BlockchainClient for MockClient {
    async fn pending_nonce(&self, _account: Address) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if state.nonce_failures > 0 {
            state.nonce_failures -= 1;
            return Err(anyhow!("nonce lookup timed out"));
        }
        Ok(state.stale_pending_nonce.unwrap_or(state.node_nonce))
    }

    async fn suggest_gas_price(&self) -> Result<u128> {
        let mut state = self.state.lock().unwrap();
        if state.gas_failures > 0 {
            state.gas_failures -= 1;
            return Err(anyhow!("gas price lookup timed out"));
        }
        Ok(GAS_PRICE)
    }

    async fn network_id(&self) -> Result<u64> {
        Ok(NETWORK_ID)
    }

    async fn call_contract(&self, _target: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        if data.as_ref() == abi::encode_metadata_contract().as_ref() {
            let address = state
                .metadata_address
                .ok_or_else(|| anyhow!("execution reverted"))?;
            return Ok(address.abi_encode().into());
        }

        let call = abi::IOracleMetadata::getValueCall::abi_decode(&data, true)?;
        state.feed_calls += 1;
        if state.failing_feeds.contains(&call.key) {
            return Err(anyhow!("execution reverted"));
        }
        let reply = state
            .prices
            .get(&call.key)
            .copied()
            .ok_or_else(|| anyhow!("unknown key {}", call.key))?;
        Ok(reply.abi_encode_params().into())
    }

    async fn send_transaction(&self, tx: &TxEnvelope) -> Result<TxHash> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let TxEnvelope::Legacy(signed) = tx else {
            return Err(anyhow!("expected a legacy transaction"));
        };
        let legacy = signed.tx().clone();
        let call = abi::IOracleTrigger::dispatchToChainCall::abi_decode(&legacy.input, true)?;

        let mut state = self.state.lock().unwrap();
        if state.rejected_chains.contains(&call._destinationDomain) {
            return Err(anyhow!("insufficient funds for gas"));
        }
        if state.drop_accepted {
            if legacy.nonce < state.node_nonce {
                return Err(anyhow!("nonce too low"));
            }
        } else if legacy.nonce != state.node_nonce {
            return Err(anyhow!(
                "nonce mismatch: expected {}, got {}",
                state.node_nonce,
                legacy.nonce
            ));
        } else {
            state.node_nonce += 1;
        }
        let hash = keccak256(
            [legacy.nonce.to_be_bytes(), (state.submitted.len() as u64).to_be_bytes()].concat(),
        );
        state.submitted.push(Submitted {
            tx: legacy,
            chain: call._destinationDomain,
            symbol: call.key,
        });
        Ok(hash)
    }
}
