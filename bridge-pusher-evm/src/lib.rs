use alloy::{
    consensus::TxEnvelope,
    eips::eip2718::Encodable2718,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bridge_pusher_core::chain::BlockchainClient;
use std::fmt::{Debug, Formatter};
use tracing::{debug, info, instrument};

/// EVM JSON-RPC implementation of the BlockchainClient trait.
pub struct EvmClient<P> {
    provider: P,
    endpoint: String,
}

impl<P> Debug for EvmClient<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl<P: Provider> EvmClient<P> {
    pub fn new(provider: P, endpoint: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Connects to the node at `endpoint_url` (`http://` or `https://`).
pub async fn connect(endpoint_url: &str) -> Result<EvmClient<impl Provider + 'static>> {
    // Transactions arrive signed, so no nonce, gas or wallet fillers.
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .on_builtin(endpoint_url)
        .await
        .with_context(|| format!("Failed to connect to RPC endpoint {endpoint_url}"))?;
    info!(endpoint = %endpoint_url, "Connected EVM RPC provider");

    Ok(EvmClient::new(provider, endpoint_url))
}

#[async_trait]
impl<P: Provider + 'static> BlockchainClient for EvmClient<P> {
    #[instrument(skip(self), level = "debug")]
    async fn pending_nonce(&self, account: Address) -> Result<u64> {
        let nonce = self
            .provider
            .get_transaction_count(account)
            .pending()
            .await
            .with_context(|| format!("Failed to get pending nonce for {account}"))?;
        debug!(nonce, "Fetched pending nonce");
        Ok(nonce)
    }

    async fn suggest_gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .context("Failed to get gas price")
    }

    async fn network_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("Failed to get chain id")
    }

    #[instrument(skip(self, data), level = "debug")]
    async fn call_contract(&self, target: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default()
            .with_to(target)
            .with_input(data);
        self.provider
            .call(request)
            .await
            .with_context(|| format!("eth_call to {target} failed"))
    }

    async fn send_transaction(&self, tx: &TxEnvelope) -> Result<TxHash> {
        let encoded = tx.encoded_2718();
        debug!(tx_hash = %tx.tx_hash(), bytes = encoded.len(), "Submitting raw transaction to node");
        let pending = self
            .provider
            .send_raw_transaction(&encoded)
            .await
            .context("Failed to submit transaction")?;
        Ok(*pending.tx_hash())
    }
}
