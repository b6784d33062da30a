use crate::{
    abi,
    chain::BlockchainClient,
    error::{DispatchError, PusherError},
    types::{ChainId, DispatchOutcome},
};
use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    network::TxSignerSync,
    primitives::{Address, TxHash, TxKind, U256},
    signers::{local::PrivateKeySigner, Signer},
};
use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

// Tracks the next nonce for the signer within one dispatch call.
#[derive(Debug, Default)]
struct NonceManager {
    next_nonce: Option<u64>,
}

impl NonceManager {
    /// Picks the nonce for the next transaction.
    ///
    /// The node's pending nonce can lag behind transactions it accepted a
    /// moment ago, so the locally tracked value wins when it is ahead.
    fn resolve(&self, pending_nonce: u64) -> u64 {
        match self.next_nonce {
            Some(next) if next > pending_nonce => {
                debug!(next, pending_nonce, "Node pending nonce is behind, using tracked nonce");
                next
            }
            _ => pending_nonce,
        }
    }

    fn advance(&mut self, used_nonce: u64) {
        self.next_nonce = Some(used_nonce + 1);
    }

    /// Forgets the tracked nonce, so the next transaction uses the node's value.
    fn reset(&mut self) {
        warn!("Resetting tracked nonce.");
        self.next_nonce = None;
    }
}

/// Builds, signs and submits one `dispatchToChain` transaction per destination chain.
///
/// All transactions are sent from the same account on the source chain. The
/// submission lock is held for a whole fan-out, so two dispatches never build
/// transactions at the same time, whichever asset they carry.
pub struct TransactionDispatcher<C: BlockchainClient> {
    client: Arc<C>,
    signer: PrivateKeySigner,
    network_id: u64,
    trigger_address: Address,
    gas_limit: u64,
    submission_lock: Mutex<()>,
}

impl<C: BlockchainClient> Debug for TransactionDispatcher<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionDispatcher")
            .field("client", &self.client)
            .field("signer", &self.signer.address()) // Show only address
            .field("network_id", &self.network_id)
            .field("trigger_address", &self.trigger_address)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

impl<C: BlockchainClient> TransactionDispatcher<C> {
    /// Creates a dispatcher signing with `private_key` (hex, `0x` optional).
    ///
    /// Queries the client's network id once and binds the signer to it.
    pub async fn new(
        client: Arc<C>,
        private_key: &str,
        trigger_address: Address,
        gas_limit: u64,
    ) -> Result<Self, PusherError> {
        let mut signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| PusherError::Config(format!("invalid private key: {e}")))?;

        let network_id = client
            .network_id()
            .await
            .map_err(|e| PusherError::ClientInit(format!("failed to get network id: {e:#}")))?;
        signer.set_chain_id(Some(network_id));

        info!(
            signer = %signer.address(),
            network_id,
            trigger = %trigger_address,
            "Initialized dispatch signer"
        );

        Ok(Self {
            client,
            signer,
            network_id,
            trigger_address,
            gas_limit,
            submission_lock: Mutex::new(()),
        })
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn network_id(&self) -> u64 {
        self.network_id
    }

    /// Dispatches `asset` to every chain in `chains`, in order.
    ///
    /// A failure on one chain is logged and recorded in its outcome; the
    /// remaining chains are still dispatched.
    #[instrument(skip(self, chains), level = "info")]
    pub async fn dispatch(&self, asset: &str, value: f64, chains: &[ChainId]) -> Vec<DispatchOutcome> {
        let _submission = self.submission_lock.lock().await;
        info!(count = chains.len(), "Dispatching price update");

        // Every call starts again from the node's pending nonce. A transaction
        // the node accepted and later dropped must not keep the tracked nonce
        // ahead of the network for good.
        let mut nonce_manager = NonceManager::default();
        let mut outcomes = Vec::with_capacity(chains.len());
        for &chain in chains {
            let result = self.dispatch_to_chain(&mut nonce_manager, asset, chain).await;
            match &result {
                Ok(tx_hash) => info!(%asset, chain, %tx_hash, "Transaction sent."),
                Err(e) => error!(%asset, chain, error = %e, "Dispatch failed, skipping chain."),
            }
            outcomes.push(DispatchOutcome {
                asset: asset.to_string(),
                chain,
                result,
            });
        }
        outcomes
    }

    async fn dispatch_to_chain(
        &self,
        nonce_manager: &mut NonceManager,
        asset: &str,
        chain: ChainId,
    ) -> Result<TxHash, DispatchError> {
        let pending_nonce = self
            .client
            .pending_nonce(self.signer.address())
            .await
            .map_err(|e| DispatchError::NonceOrGasFetch(format!("nonce: {e:#}")))?;
        let gas_price = self
            .client
            .suggest_gas_price()
            .await
            .map_err(|e| DispatchError::NonceOrGasFetch(format!("gas price: {e:#}")))?;

        let input = abi::encode_dispatch(chain, asset)?;
        let nonce = nonce_manager.resolve(pending_nonce);

        let mut tx = TxLegacy {
            chain_id: Some(self.network_id),
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.trigger_address),
            value: U256::ZERO,
            input,
        };
        debug!(%asset, chain, nonce, gas_price, gas_limit = self.gas_limit, "Signing dispatch transaction");

        let signature = match self.signer.sign_transaction_sync(&mut tx) {
            Ok(signature) => signature,
            Err(e) => {
                nonce_manager.reset();
                return Err(DispatchError::Signing(e.to_string()));
            }
        };
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));

        match self.client.send_transaction(&envelope).await {
            Ok(tx_hash) => {
                nonce_manager.advance(nonce);
                Ok(tx_hash)
            }
            Err(e) => {
                // The node may or may not have seen the transaction, so fall
                // back to its view of the nonce next time.
                nonce_manager.reset();
                Err(DispatchError::Submission(format!("{e:#}")))
            }
        }
    }
}
