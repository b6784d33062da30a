use crate::types::AssetSymbol;
use thiserror::Error;

/// Errors raised by the pusher outside of a single chain dispatch.
///
/// `Config` and `ClientInit` only occur at startup and stop the process.
/// `FeedUnavailable` skips one asset for one cycle.
#[derive(Debug, Error)]
pub enum PusherError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to initialize chain client: {0}")]
    ClientInit(String),

    #[error("price feed unavailable for {asset}: {reason}")]
    FeedUnavailable { asset: AssetSymbol, reason: String },
}

/// Failure of one step while dispatching to a single destination chain.
///
/// Every variant is recoverable: the chain is skipped and the remaining
/// chains are still dispatched.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to fetch nonce or gas price: {0}")]
    NonceOrGasFetch(String),

    #[error("failed to encode dispatch call: {0}")]
    Encode(String),

    #[error("failed to sign transaction: {0}")]
    Signing(String),

    #[error("failed to submit transaction: {0}")]
    Submission(String),
}
