use crate::types::AssetSymbol;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<Option<f64>>>;

/// Last successfully propagated value per asset.
///
/// Every asset owns a separate async mutex, so cycles for different assets
/// never wait on each other. Holding an [`AssetGuard`] gives exclusive
/// access to one asset for the duration of a whole update cycle.
#[derive(Debug, Default)]
pub struct PriceCache {
    slots: DashMap<AssetSymbol, Slot>,
}

/// Exclusive handle on one asset's cache entry.
#[derive(Debug)]
pub struct AssetGuard {
    asset: AssetSymbol,
    value: OwnedMutexGuard<Option<f64>>,
}

impl AssetGuard {
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Last propagated value, `None` if the asset was never propagated.
    pub fn get(&self) -> Option<f64> {
        *self.value
    }

    pub fn update(&mut self, value: f64) {
        *self.value = Some(value);
    }
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, asset: &str) -> Slot {
        if let Some(slot) = self.slots.get(asset) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(asset.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        )
    }

    /// Waits for exclusive access to `asset`.
    pub async fn lock(&self, asset: &str) -> AssetGuard {
        let value = self.slot(asset).lock_owned().await;
        AssetGuard {
            asset: asset.to_string(),
            value,
        }
    }

    /// Returns `None` if another cycle currently holds `asset`.
    pub fn try_lock(&self, asset: &str) -> Option<AssetGuard> {
        let value = self.slot(asset).try_lock_owned().ok()?;
        Some(AssetGuard {
            asset: asset.to_string(),
            value,
        })
    }

    pub async fn get(&self, asset: &str) -> Option<f64> {
        self.lock(asset).await.get()
    }

    /// Sets or overwrites the entry for `asset`.
    pub async fn update(&self, asset: &str, value: f64) {
        self.lock(asset).await.update(value);
    }
}
