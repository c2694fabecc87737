//! Static instrument data consumed by the book and the lifecycle tracker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The slice of a security definition this crate actually reads: price
/// step for dense indexing and step validation, and the multipliers
/// driving explicit quantity-kind conversions.
///
/// Venue-specific definition tables live in the owning connector; a book
/// receives a ready-made `Instrument` (usually behind an `Arc`) and never
/// mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instrument {
    symbol: String,
    sec_id: u64,
    px_step: f64,
    /// Asset-A units per contract.
    contract_mult: f64,
    /// Contracts per lot.
    lot_size: f64,
}

impl Instrument {
    /// Build an instrument, validating the numeric parameters.
    ///
    /// Returns `None` when `sec_id` is zero or any of the step/multiplier
    /// values is non-positive or non-finite.
    pub fn new(
        symbol: &str,
        sec_id: u64,
        px_step: f64,
        contract_mult: f64,
        lot_size: f64,
    ) -> Option<Self> {
        let ok = sec_id != 0
            && px_step.is_finite()
            && px_step > 0.0
            && contract_mult.is_finite()
            && contract_mult > 0.0
            && lot_size.is_finite()
            && lot_size > 0.0;
        ok.then(|| Instrument {
            symbol: symbol.to_string(),
            sec_id,
            px_step,
            contract_mult,
            lot_size,
        })
    }

    /// Full symbol, used in log lines.
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Numeric security id.
    #[inline]
    pub fn sec_id(&self) -> u64 {
        self.sec_id
    }

    /// Minimum price increment.
    #[inline]
    pub fn px_step(&self) -> f64 {
        self.px_step
    }

    /// Asset-A units per contract.
    #[inline]
    pub fn contract_mult(&self) -> f64 {
        self.contract_mult
    }

    /// Contracts per lot.
    #[inline]
    pub fn lot_size(&self) -> f64 {
        self.lot_size
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
