use alloy::primitives::Address;
use anyhow::{Context, Result};
use bridge_pusher_core::{
    config::{parse_asset_list, parse_chain_list, DEFAULT_TRIGGER_ADDRESS},
    discover_metadata_address,
    types::Permille,
    AnchorPolicy, PriceFeed, PusherConfig, TransactionDispatcher, UpdateScheduler,
};
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Hex encoded private key of the account sending dispatch transactions.
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Oracle trigger contract address on the source chain.
    #[clap(long, env = "ORACLE_TRIGGER_ADDRESS", default_value_t = DEFAULT_TRIGGER_ADDRESS)]
    trigger_address: Address,

    /// Metadata contract address. Discovered from the trigger contract if omitted.
    #[clap(long, env = "METADATA_ADDRESS")]
    metadata_address: Option<Address>,

    /// Source chain RPC endpoint URL.
    #[clap(long, env = "DIA_RPC")]
    rpc_url: String,

    /// Comma separated destination chain ids.
    #[clap(long, env = "DESTINATION_CHAINS")]
    destination_chains: String,

    /// Comma separated asset symbols, e.g. "BTC/USD,ETH/USD".
    #[clap(long, env = "SUPPORTED_ASSETS")]
    supported_assets: String,

    /// Relative price change, in parts per thousand, that triggers an update. 0 updates on every check.
    #[clap(long, env = "DEVIATION_PERMILLE", default_value_t = 50)]
    deviation_permille: Permille,

    /// Frequency (in seconds) of deviation checks.
    #[clap(long, env = "CONDITIONAL_INTERVAL_SECS", default_value_t = 10)]
    conditional_interval_secs: u64,

    /// Frequency (in seconds) of unconditional pushes.
    #[clap(long, env = "MANDATORY_INTERVAL_SECS", default_value_t = 60)]
    mandatory_interval_secs: u64,

    /// Gas limit of each dispatch transaction.
    #[clap(long, env = "GAS_LIMIT", default_value_t = 300_000)]
    gas_limit: u64,

    /// Seconds in-flight updates may take to finish after shutdown is requested.
    #[clap(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Whether to record a price as propagated when every chain rejected it ("always" or "on-any-success").
    #[clap(long, env = "ANCHOR_POLICY", default_value = "always")]
    anchor_policy: AnchorPolicy,

    /// Log level (e.g., trace, debug, info, warn, error).
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<PusherConfig> {
        let mut config = PusherConfig::new(
            self.private_key,
            self.rpc_url,
            parse_chain_list(&self.destination_chains)?,
            parse_asset_list(&self.supported_assets)?,
        );
        config.trigger_address = self.trigger_address;
        config.metadata_address = self.metadata_address;
        config.deviation_permille = self.deviation_permille;
        config.conditional_interval = Duration::from_secs(self.conditional_interval_secs);
        config.mandatory_interval = Duration::from_secs(self.mandatory_interval_secs);
        config.gas_limit = self.gas_limit;
        config.drain_timeout = Duration::from_secs(self.drain_timeout_secs);
        config.anchor_policy = self.anchor_policy;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine, the variables may come from the environment.
    let dotenv_result = dotenv::dotenv();
    let args = Args::parse();

    // --- Setup Logging ---
    let log_level = args
        .log_level
        .parse::<Level>()
        .context("Invalid log level specified")?;
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default tracing subscriber failed")?;

    info!("Starting oracle bridge pusher...");
    if let Err(e) = dotenv_result {
        debug!(error = %e, "No .env file loaded");
    }

    // --- Load Configuration ---
    let config = args.into_config().context("Configuration error")?;
    debug!(?config, "Loaded configuration");

    // --- Initialize Components ---
    info!(url = %config.rpc_url, "Initializing EVM client");
    let client = Arc::new(
        bridge_pusher_evm::connect(&config.rpc_url)
            .await
            .context("Failed to initialize client")?,
    );

    let dispatcher = TransactionDispatcher::new(
        Arc::clone(&client),
        &config.private_key,
        config.trigger_address,
        config.gas_limit,
    )
    .await
    .context("Failed to initialize dispatcher")?;
    info!(
        endpoint = client.endpoint(),
        network_id = dispatcher.network_id(),
        signer = %dispatcher.signer_address(),
        "Connected to source chain"
    );

    let metadata_address = match config.metadata_address {
        Some(address) => address,
        None => discover_metadata_address(client.as_ref(), config.trigger_address)
            .await
            .context("Failed to discover metadata contract")?,
    };
    let feed = PriceFeed::new(Arc::clone(&client), metadata_address);
    info!(metadata_address = %feed.metadata_address(), "Using metadata contract");

    let scheduler = Arc::new(UpdateScheduler::new(&config, feed, dispatcher));

    // --- Start Scheduler ---
    let shutdown = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down."),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal, shutting down."),
    }
    shutdown.cancel();

    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "Scheduler task did not shut down cleanly");
    }
    info!("Oracle bridge pusher stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec![
            "bridge-pusher",
            "--private-key",
            KEY,
            "--rpc-url",
            "http://localhost:8545",
            "--destination-chains",
            "43113,11155111",
            "--supported-assets",
            "BTC/USD, ETH/USD",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults_build_valid_config() {
        let config = parse(&[]).unwrap().into_config().unwrap();
        assert_eq!(config.trigger_address, DEFAULT_TRIGGER_ADDRESS);
        assert_eq!(config.destination_chains, vec![43113, 11155111]);
        assert_eq!(config.assets, vec!["BTC/USD".to_string(), "ETH/USD".to_string()]);
        assert_eq!(config.deviation_permille, 50);
        assert_eq!(config.conditional_interval, Duration::from_secs(10));
        assert_eq!(config.mandatory_interval, Duration::from_secs(60));
        assert_eq!(config.anchor_policy, AnchorPolicy::Always);
        assert_eq!(config.metadata_address, None);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--deviation-permille",
            "10",
            "--anchor-policy",
            "on-any-success",
            "--metadata-address",
            "0xb77690Eb2E97E235Bbc198588166a6F7Cb69e008",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.deviation_permille, 10);
        assert_eq!(config.anchor_policy, AnchorPolicy::OnAnySuccess);
        assert!(config.metadata_address.is_some());
    }

    #[test]
    fn test_invalid_chain_list_is_config_error() {
        let err = parse(&["--destination-chains", "fuji"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid destination chain id"));
    }

    #[test]
    fn test_zero_deviation_permille_is_accepted() {
        let config = parse(&["--deviation-permille", "0"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.deviation_permille, 0);
    }

    #[test]
    fn test_invalid_anchor_policy_rejected_by_parser() {
        assert!(parse(&["--anchor-policy", "sometimes"]).is_err());
    }
}
