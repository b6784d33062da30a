use alloy::{
    consensus::TxEnvelope,
    primitives::{Address, Bytes, TxHash},
};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait representing the source chain RPC layer.
///
/// Implementors connect to the chain hosting the metadata and trigger
/// contracts. The pusher reads prices through it and submits every
/// dispatch transaction to it, whatever the destination chain.
#[async_trait]
pub trait BlockchainClient: Send + Sync + Debug {
    /// Returns the nonce of `account` including transactions still pending in the mempool.
    async fn pending_nonce(&self, account: Address) -> Result<u64>;

    /// Returns the node's suggested legacy gas price, in wei.
    async fn suggest_gas_price(&self) -> Result<u128>;

    /// Returns the identifier of the network the client is connected to.
    ///
    /// Transactions are signed for this network (EIP-155), so it is only
    /// queried once when the signer is bound.
    async fn network_id(&self) -> Result<u64>;

    /// Executes a read-only call of `data` against `target` at the latest block.
    async fn call_contract(&self, target: Address, data: Bytes) -> Result<Bytes>;

    /// Broadcasts a signed transaction.
    ///
    /// Success only means the node accepted the transaction, not that it was mined.
    async fn send_transaction(&self, tx: &TxEnvelope) -> Result<TxHash>;
}
