use crate::{
    abi,
    chain::BlockchainClient,
    error::PusherError,
    types::PriceObservation,
};
use alloy::primitives::Address;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads aggregated prices from the metadata contract.
#[derive(Debug)]
pub struct PriceFeed<C: BlockchainClient> {
    client: Arc<C>,
    metadata_address: Address,
}

impl<C: BlockchainClient> PriceFeed<C> {
    pub fn new(client: Arc<C>, metadata_address: Address) -> Self {
        Self {
            client,
            metadata_address,
        }
    }

    pub fn metadata_address(&self) -> Address {
        self.metadata_address
    }

    /// Fetches the latest value of `asset`.
    ///
    /// Fails with [`PusherError::FeedUnavailable`] if the call reverts, the
    /// node is unreachable, or the reply cannot be decoded.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(&self, asset: &str) -> Result<PriceObservation, PusherError> {
        let reply = self
            .client
            .call_contract(self.metadata_address, abi::encode_get_value(asset))
            .await
            .map_err(|e| PusherError::FeedUnavailable {
                asset: asset.to_string(),
                reason: format!("{e:#}"),
            })?;

        let (value, aux) =
            abi::decode_get_value(&reply).map_err(|e| PusherError::FeedUnavailable {
                asset: asset.to_string(),
                reason: format!("malformed getValue reply: {e}"),
            })?;

        let observation = PriceObservation::new(value, aux);
        debug!(
            %asset,
            raw = value,
            aux,
            price = observation.as_f64(),
            "Fetched latest value from metadata contract"
        );
        Ok(observation)
    }
}

/// Asks the trigger contract which metadata contract it reads from.
pub async fn discover_metadata_address<C: BlockchainClient>(
    client: &C,
    trigger_address: Address,
) -> Result<Address, PusherError> {
    let reply = client
        .call_contract(trigger_address, abi::encode_metadata_contract())
        .await
        .map_err(|e| {
            PusherError::ClientInit(format!(
                "metadataContract() call on {trigger_address} failed: {e:#}"
            ))
        })?;
    let address = abi::decode_metadata_contract(&reply).map_err(|e| {
        PusherError::ClientInit(format!(
            "malformed metadataContract() reply from {trigger_address}: {e}"
        ))
    })?;
    debug!(%trigger_address, metadata_address = %address, "Discovered metadata contract");
    Ok(address)
}
