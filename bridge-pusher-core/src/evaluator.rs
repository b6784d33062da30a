use crate::{cache::PriceCache, types::Permille};
use tracing::debug;

/// Why an observation should or should not be propagated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// No value was ever propagated for the asset.
    Bootstrap,
    /// The last propagated value is zero, so relative deviation is undefined.
    ZeroBaseline,
    /// Relative deviation reached the threshold.
    Deviation(f64),
    /// Relative deviation stayed below the threshold.
    WithinThreshold(f64),
}

impl Decision {
    pub fn should_propagate(&self) -> bool {
        !matches!(self, Decision::WithinThreshold(_))
    }
}

/// Decides whether a new observation deviates enough from the last
/// propagated value to be pushed to the destination chains.
#[derive(Debug, Clone, Copy)]
pub struct DeviationEvaluator {
    threshold_permille: Permille,
}

impl DeviationEvaluator {
    pub fn new(threshold_permille: Permille) -> Self {
        Self { threshold_permille }
    }

    /// Threshold as a fraction, e.g. 50 permille is `0.05`.
    pub fn threshold(&self) -> f64 {
        self.threshold_permille as f64 / 1000.0
    }

    pub fn decide(&self, previous: Option<f64>, new_value: f64) -> Decision {
        let Some(previous) = previous else {
            return Decision::Bootstrap;
        };
        if previous == 0.0 {
            return Decision::ZeroBaseline;
        }

        let deviation = (new_value - previous).abs() / previous.abs();
        if deviation >= self.threshold() {
            Decision::Deviation(deviation)
        } else {
            Decision::WithinThreshold(deviation)
        }
    }

    /// Checks `new_value` against the value cached for `asset`.
    pub async fn should_propagate(&self, asset: &str, new_value: f64, cache: &PriceCache) -> bool {
        let decision = self.decide(cache.get(asset).await, new_value);
        debug!(%asset, new_value, ?decision, "Evaluated deviation");
        decision.should_propagate()
    }
}
