//! Order book error types

use crate::types::{SeqNum, Side};
use std::fmt;

/// Errors that can occur within the book engine.
///
/// Sequencing and argument violations are only produced when the book is
/// configured strict; in relaxed mode the same conditions are swallowed
/// (no-op update) or surfaced as [`UpdateEffect::Error`]. The corruption
/// variants (`DepthUnderflow`, `SideCorrupt`, `NonMonotonicVwap`) are
/// raised unconditionally: they mean upstream bookkeeping is broken and
/// the book contents can no longer be trusted.
///
/// [`UpdateEffect::Error`]: crate::orderbook::UpdateEffect::Error
#[derive(Debug)]
#[non_exhaustive]
pub enum BookError {
    /// Malformed call arguments (wrong orders-log mode, inconsistent
    /// action/qty combination, bad constructor parameter).
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A sequence counter went backwards (or failed the continuity rule)
    /// outside init mode, with strict checking enabled.
    SequenceInversion {
        /// Which counter: `"seq_num"` or `"rpt_seq"`.
        counter: &'static str,
        /// The sequence number carried by the rejected update.
        got: SeqNum,
        /// The last sequence number the book had applied.
        last: SeqNum,
    },

    /// An update arrived in init mode after init mode was already over.
    InitModeReentry,

    /// A price is not a multiple of the instrument's price step (strict
    /// mode; relaxed books round to the nearest step instead).
    OffStepPrice {
        /// The offending price (or price delta).
        px: f64,
        /// The configured price step.
        px_step: f64,
    },

    /// The tracked depth of a side would go negative.
    DepthUnderflow {
        /// The side whose depth was being decremented.
        side: Side,
    },

    /// A side-level invariant broke (e.g. the side became empty while
    /// trimming to max depth, or depth reached zero on a non-empty side).
    /// The affected side is emptied before this is returned.
    SideCorrupt {
        /// The corrupt side.
        side: Side,
        /// Description of the broken invariant.
        message: String,
    },

    /// Consecutive VWAP bands moved toward the top of the book. Never
    /// happens on a consistent book; indicates corrupt level data.
    NonMonotonicVwap {
        /// Index of the band that violated monotonicity.
        band: usize,
    },

    /// Malformed VWAP request (reduction coefficient outside [0, 1],
    /// multiple bands against full-amount liquidity, non-positive
    /// cumulative volume).
    BadVwapParams {
        /// Description of the problem.
        message: String,
    },

    /// The subscriber list is full.
    TooManySubscribers {
        /// The fixed capacity of the subscriber list.
        limit: usize,
    },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::InvalidArgument { message } => {
                write!(f, "invalid argument: {message}")
            }
            BookError::SequenceInversion { counter, got, last } => {
                write!(
                    f,
                    "sequence inversion on {counter}: got {got}, last applied {last}"
                )
            }
            BookError::InitModeReentry => {
                write!(f, "cannot switch back to init mode")
            }
            BookError::OffStepPrice { px, px_step } => {
                write!(f, "price {px} is not a multiple of price step {px_step}")
            }
            BookError::DepthUnderflow { side } => {
                write!(f, "{side} depth underflow")
            }
            BookError::SideCorrupt { side, message } => {
                write!(f, "{side} side corrupt: {message}")
            }
            BookError::NonMonotonicVwap { band } => {
                write!(f, "non-monotonic VWAP result at band {band}")
            }
            BookError::BadVwapParams { message } => {
                write!(f, "bad VWAP params: {message}")
            }
            BookError::TooManySubscribers { limit } => {
                write!(f, "too many subscribers (limit {limit})")
            }
        }
    }
}

impl std::error::Error for BookError {}
