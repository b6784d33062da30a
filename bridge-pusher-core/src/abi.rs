//! Contract bindings for the oracle trigger and metadata contracts.

use crate::{error::DispatchError, types::ChainId};
use alloy::{
    primitives::{Address, Bytes},
    sol,
    sol_types::SolCall,
};

sol! {
    interface IOracleTrigger {
        function dispatchToChain(uint32 _destinationDomain, string key) external payable;
        function metadataContract() external view returns (address);
    }

    interface IOracleMetadata {
        function getValue(string key) external view returns (uint128, uint128);
    }
}

/// Encodes `getValue(symbol)` for the metadata contract.
pub fn encode_get_value(symbol: &str) -> Bytes {
    IOracleMetadata::getValueCall {
        key: symbol.to_string(),
    }
    .abi_encode()
    .into()
}

/// Decodes the `(uint128, uint128)` reply of `getValue`.
pub fn decode_get_value(data: &[u8]) -> Result<(u128, u128), alloy::sol_types::Error> {
    let ret = IOracleMetadata::getValueCall::abi_decode_returns(data, true)?;
    Ok((ret._0, ret._1))
}

/// Encodes `dispatchToChain(chain, symbol)` for the trigger contract.
pub fn encode_dispatch(chain: ChainId, symbol: &str) -> Result<Bytes, DispatchError> {
    if symbol.trim().is_empty() {
        return Err(DispatchError::Encode("asset symbol is empty".to_string()));
    }
    Ok(IOracleTrigger::dispatchToChainCall {
        _destinationDomain: chain,
        key: symbol.to_string(),
    }
    .abi_encode()
    .into())
}

pub fn encode_metadata_contract() -> Bytes {
    IOracleTrigger::metadataContractCall {}.abi_encode().into()
}

pub fn decode_metadata_contract(data: &[u8]) -> Result<Address, alloy::sol_types::Error> {
    Ok(IOracleTrigger::metadataContractCall::abi_decode_returns(data, true)?._0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{primitives::address, sol_types::SolValue};

    #[test]
    fn test_dispatch_selector_and_arguments() {
        let data = encode_dispatch(43113, "BTC/USD").unwrap();
        assert_eq!(&data[..4], IOracleTrigger::dispatchToChainCall::SELECTOR.as_slice());

        let call = IOracleTrigger::dispatchToChainCall::abi_decode(&data, true).unwrap();
        assert_eq!(call._destinationDomain, 43113);
        assert_eq!(call.key, "BTC/USD");
    }

    #[test]
    fn test_dispatch_rejects_blank_symbol() {
        assert!(matches!(
            encode_dispatch(1, "  "),
            Err(DispatchError::Encode(_))
        ));
    }

    #[test]
    fn test_decode_get_value() {
        let reply = (1_050_000_000u128, 1_700_000_000u128).abi_encode_params();
        assert_eq!(decode_get_value(&reply).unwrap(), (1_050_000_000, 1_700_000_000));
    }

    #[test]
    fn test_decode_get_value_truncated_reply() {
        let reply = (1_050_000_000u128, 7u128).abi_encode_params();
        assert!(decode_get_value(&reply[..40]).is_err());
        assert!(decode_get_value(&[]).is_err());
    }

    #[test]
    fn test_decode_metadata_contract() {
        let metadata = address!("b77690Eb2E97E235Bbc198588166a6F7Cb69e008");
        let reply = metadata.abi_encode();
        assert_eq!(decode_metadata_contract(&reply).unwrap(), metadata);
    }

    #[test]
    fn test_get_value_carries_symbol() {
        let data = encode_get_value("ETH/USD");
        let call = IOracleMetadata::getValueCall::abi_decode(&data, true).unwrap();
        assert_eq!(call.key, "ETH/USD");
    }
}
