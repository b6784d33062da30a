use crate::error::DispatchError;
use alloy::primitives::TxHash;
use std::fmt;

/// Number of decimal places the metadata contract uses for its fixed-point values.
pub const PRICE_DECIMALS: u32 = 8;

/// Represents a price observation read from the metadata contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceObservation {
    /// Fixed-point value, scaled by `10^decimals`.
    pub value: u128,
    /// Second field returned by `getValue`. Its meaning is contract specific;
    /// it is carried for logging and never consumed.
    pub aux: u128,
    pub decimals: u32,
}

impl PriceObservation {
    pub fn new(value: u128, aux: u128) -> Self {
        Self {
            value,
            aux,
            decimals: PRICE_DECIMALS,
        }
    }

    /// Converts the fixed-point value to a float.
    ///
    /// Both operands are exact below 2^53, and IEEE division rounds once, so in
    /// that range the result is the nearest `f64` to the decimal value.
    pub fn as_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Which of the two cadences triggered a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Dispatches only when the deviation threshold is crossed.
    Conditional,
    /// Dispatches unconditionally.
    Mandatory,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Conditional => f.write_str("conditional"),
            CycleKind::Mandatory => f.write_str("mandatory"),
        }
    }
}

/// Result of dispatching one asset to one destination chain.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub asset: AssetSymbol,
    pub chain: ChainId,
    pub result: Result<TxHash, DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

// Type aliases for clarity
pub type AssetSymbol = String;
pub type ChainId = u32;
pub type Permille = u64;
