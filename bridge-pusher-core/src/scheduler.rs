use crate::{
    cache::PriceCache,
    chain::BlockchainClient,
    config::{AnchorPolicy, PusherConfig},
    dispatcher::TransactionDispatcher,
    error::PusherError,
    evaluator::{Decision, DeviationEvaluator},
    feed::PriceFeed,
    types::{AssetSymbol, ChainId, CycleKind, DispatchOutcome},
};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, instrument, warn};

/// What a single update cycle did for one asset.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A conditional cycle found another cycle already holding the asset.
    Busy,
    /// The price could not be read; nothing was dispatched.
    FeedUnavailable(PusherError),
    /// Deviation stayed below the threshold; nothing was dispatched.
    Unchanged(Decision),
    /// Transactions were dispatched. `anchored` tells whether the cache took `value`.
    Dispatched {
        value: f64,
        outcomes: Vec<DispatchOutcome>,
        anchored: bool,
    },
}

/// Orchestrates the conditional and mandatory update cadences over the configured assets.
#[derive(Debug)]
pub struct UpdateScheduler<C: BlockchainClient> {
    feed: PriceFeed<C>,
    evaluator: DeviationEvaluator,
    dispatcher: TransactionDispatcher<C>,
    cache: PriceCache,
    assets: Vec<AssetSymbol>,
    chains: Vec<ChainId>,
    anchor_policy: AnchorPolicy,
    conditional_interval: Duration,
    mandatory_interval: Duration,
    drain_timeout: Duration,
}

impl<C: BlockchainClient + 'static> UpdateScheduler<C> {
    pub fn new(
        config: &PusherConfig,
        feed: PriceFeed<C>,
        dispatcher: TransactionDispatcher<C>,
    ) -> Self {
        Self {
            feed,
            evaluator: DeviationEvaluator::new(config.deviation_permille),
            dispatcher,
            cache: PriceCache::new(),
            assets: config.assets.clone(),
            chains: config.destination_chains.clone(),
            anchor_policy: config.anchor_policy,
            conditional_interval: config.conditional_interval,
            mandatory_interval: config.mandatory_interval,
            drain_timeout: config.drain_timeout,
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Runs both cadences until `shutdown` is cancelled.
    ///
    /// Each tick spawns one cycle per asset and returns to the timers without
    /// waiting for them. After cancellation no new cycles start; in-flight
    /// cycles get up to the drain timeout to finish.
    #[instrument(skip_all, name = "scheduler_loop")]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            assets = ?self.assets,
            chains = ?self.chains,
            conditional = ?self.conditional_interval,
            mandatory = ?self.mandatory_interval,
            "Starting update scheduler..."
        );

        let tracker = TaskTracker::new();
        // First ticks fire one full period after start.
        let start = Instant::now();
        let mut conditional = interval_at(start + self.conditional_interval, self.conditional_interval);
        let mut mandatory = interval_at(start + self.mandatory_interval, self.mandatory_interval);
        conditional.set_missed_tick_behavior(MissedTickBehavior::Skip);
        mandatory.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no new cycles will start.");
                    break;
                }
                // Polled before the conditional timer so that on coinciding
                // ticks the mandatory cycle takes the asset first.
                _ = mandatory.tick() => self.spawn_cycles(&tracker, CycleKind::Mandatory),
                _ = conditional.tick() => self.spawn_cycles(&tracker, CycleKind::Conditional),
            }
        }

        tracker.close();
        info!(in_flight = tracker.len(), timeout = ?self.drain_timeout, "Draining in-flight cycles.");
        match timeout(self.drain_timeout, tracker.wait()).await {
            Ok(()) => info!("Update scheduler stopped."),
            Err(_) => warn!(
                in_flight = tracker.len(),
                "Drain timeout elapsed, leaving unfinished cycles behind."
            ),
        }
    }

    fn spawn_cycles(self: &Arc<Self>, tracker: &TaskTracker, kind: CycleKind) {
        debug!(%kind, assets = self.assets.len(), chains = self.chains.len(), "Tick");
        for asset in &self.assets {
            let scheduler = Arc::clone(self);
            let asset = asset.clone();
            tracker.spawn(async move {
                scheduler.run_cycle(&asset, kind).await;
            });
        }
    }

    /// Runs one fetch, evaluate, dispatch and anchor cycle for `asset`.
    ///
    /// The asset stays locked for the whole cycle. A conditional cycle gives up
    /// if the asset is already locked, a mandatory one waits for it.
    #[instrument(skip(self, kind), fields(%kind))]
    pub async fn run_cycle(&self, asset: &str, kind: CycleKind) -> CycleOutcome {
        let mut guard = match kind {
            CycleKind::Conditional => match self.cache.try_lock(asset) {
                Some(guard) => guard,
                None => {
                    debug!(%asset, "Another cycle is in flight for this asset, skipping.");
                    return CycleOutcome::Busy;
                }
            },
            CycleKind::Mandatory => self.cache.lock(asset).await,
        };

        let observation = match self.feed.fetch(asset).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(%asset, error = %e, "Failed to get latest value. Skipping asset for this cycle.");
                return CycleOutcome::FeedUnavailable(e);
            }
        };
        let value = observation.as_f64();
        let previous = guard.get();

        match kind {
            CycleKind::Conditional => {
                let decision = self.evaluator.decide(previous, value);
                if !decision.should_propagate() {
                    info!(%asset, ?previous, value, ?decision, "Deviation threshold not met.");
                    return CycleOutcome::Unchanged(decision);
                }
                info!(%asset, ?previous, value, ?decision, "Deviation threshold met, triggering update.");
            }
            CycleKind::Mandatory => {
                info!(%asset, ?previous, value, "Mandatory update, triggering update.");
            }
        }

        let outcomes = self.dispatcher.dispatch(asset, value, &self.chains).await;
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();

        let anchored = match self.anchor_policy {
            AnchorPolicy::Always => true,
            AnchorPolicy::OnAnySuccess => succeeded > 0,
        };
        if anchored {
            guard.update(value);
            debug!(asset = guard.asset(), value, "Anchored propagated value.");
        } else {
            warn!(%asset, value, "No chain accepted the update, keeping previous baseline.");
        }

        info!(
            %asset,
            succeeded,
            failed = outcomes.len() - succeeded,
            anchored,
            "Finished update cycle."
        );
        CycleOutcome::Dispatched {
            value,
            outcomes,
            anchored,
        }
    }
}
