pub mod abi;
pub mod cache;
pub mod chain;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod feed;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export key types/functions for easier use by other crates
pub use cache::PriceCache;
pub use chain::BlockchainClient;
pub use config::{AnchorPolicy, PusherConfig};
pub use dispatcher::TransactionDispatcher;
pub use error::{DispatchError, PusherError};
pub use evaluator::DeviationEvaluator;
pub use feed::{discover_metadata_address, PriceFeed};
pub use scheduler::{CycleOutcome, UpdateScheduler};
pub use types::{AssetSymbol, ChainId, CycleKind, DispatchOutcome, PriceObservation};
