//! Tolerance-compared price type.
//!
//! [`Price`] wraps an `f64` where NaN means "no price". All comparisons go
//! through a fixed tolerance so that prices reconstructed from step
//! arithmetic compare equal to prices parsed off the wire. Code elsewhere
//! in the crate never inspects the raw bits directly; it uses the
//! predicates defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A price. Default-constructs to "empty" (NaN).
///
/// Deltas and scale factors are plain `f64`s; there is deliberately no
/// `Price + Price` or `Price * Price` — only the difference of two prices
/// is meaningful, and it is an `f64`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Price(f64);

impl Default for Price {
    #[inline]
    fn default() -> Self {
        Price::empty()
    }
}

impl Price {
    /// Comparison tolerance: at least 10x smaller than any known price
    /// step, yet large enough not to be blurred by `f64` rounding.
    pub const TOL: f64 = 1e-13;

    /// An empty (NaN) price.
    #[inline]
    pub const fn empty() -> Self {
        Price(f64::NAN)
    }

    /// Construct from a raw `f64` value.
    #[inline]
    pub const fn new(val: f64) -> Self {
        Price(val)
    }

    /// The raw `f64` value (may be NaN).
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// True iff a price is actually present.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Consistent with `== 0.0` under tolerance.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.abs() < Self::TOL
    }

    /// Consistent with `> 0.0` under tolerance.
    #[inline]
    pub fn is_pos(self) -> bool {
        self.0 >= Self::TOL
    }

    /// Consistent with `< 0.0` under tolerance.
    #[inline]
    pub fn is_neg(self) -> bool {
        self.0 <= -Self::TOL
    }

    /// Round down to a multiple of `px_step`.
    ///
    /// An exact multiple may still land just below its own value after
    /// division, so the floor argument is nudged up by the tolerance.
    #[inline]
    pub fn round_down(self, px_step: f64) -> Self {
        debug_assert!(px_step > Self::TOL);
        Price((self.0 / px_step + Self::TOL).floor() * px_step)
    }

    /// Round up to a multiple of `px_step` (the mirror of [`round_down`]).
    ///
    /// [`round_down`]: Price::round_down
    #[inline]
    pub fn round_up(self, px_step: f64) -> Self {
        debug_assert!(px_step > Self::TOL);
        Price((self.0 / px_step - Self::TOL).ceil() * px_step)
    }

    /// Round to the nearest multiple of `px_step`.
    #[inline]
    pub fn round_to_step(self, px_step: f64) -> Self {
        debug_assert!(px_step > Self::TOL);
        Price((self.0 / px_step).round() * px_step)
    }
}

impl PartialEq for Price {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        (self.0 - other.0).abs() < Self::TOL
    }
}

impl PartialOrd for Price {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if *self == *other {
            Some(std::cmp::Ordering::Equal)
        } else {
            self.0.partial_cmp(&other.0)
        }
    }
}

impl std::ops::Add<f64> for Price {
    type Output = Price;
    #[inline]
    fn add(self, delta: f64) -> Price {
        Price(self.0 + delta)
    }
}

impl std::ops::AddAssign<f64> for Price {
    #[inline]
    fn add_assign(&mut self, delta: f64) {
        self.0 += delta;
    }
}

impl std::ops::Sub<f64> for Price {
    type Output = Price;
    #[inline]
    fn sub(self, delta: f64) -> Price {
        Price(self.0 - delta)
    }
}

impl std::ops::Sub<Price> for Price {
    type Output = f64;
    #[inline]
    fn sub(self, rhs: Price) -> f64 {
        self.0 - rhs.0
    }
}

impl std::ops::Mul<f64> for Price {
    type Output = Price;
    #[inline]
    fn mul(self, factor: f64) -> Price {
        Price(self.0 * factor)
    }
}

impl std::ops::Div<f64> for Price {
    type Output = Price;
    #[inline]
    fn div(self, divisor: f64) -> Price {
        debug_assert!(divisor != 0.0);
        Price(self.0 / divisor)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arithmetic mid of two prices. NaN if either side is empty.
#[inline]
pub fn arith_mid(left: Price, right: Price) -> Price {
    Price::new(0.5 * (left.value() + right.value()))
}

/// A totally-ordered key for storing finite prices in a `BTreeMap`.
///
/// Only constructed from finite prices; the sparse book never stores an
/// empty level, so the total order over the raw bits is the numeric order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PxKey(u64);

impl PxKey {
    #[inline]
    pub(crate) fn from_px(px: Price) -> Self {
        debug_assert!(px.is_finite());
        let bits = px.value().to_bits();
        // Flip the encoding so that the integer order of the key matches
        // the numeric order of the price, negatives included.
        let key = if bits >> 63 == 0 {
            bits | (1 << 63)
        } else {
            !bits
        };
        PxKey(key)
    }

    #[inline]
    pub(crate) fn px(self) -> Price {
        let bits = if self.0 >> 63 == 1 {
            self.0 & !(1 << 63)
        } else {
            !self.0
        };
        Price::new(f64::from_bits(bits))
    }
}
