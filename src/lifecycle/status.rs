//! Request lifecycle enums.
//!
//! Terminal-ness and status strength are exposed as explicit predicate
//! tables rather than through the variant declaration order, so that
//! reordering a variant can never silently change accounting logic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one request within an order's chain.
///
/// A `Cancel` request being `Confirmed` means its *target* was cancelled
/// (the subject request is then marked `Cancelled`). There is no
/// per-request part-filled terminal state: partial fills are a property
/// of the whole order, tracked on [`ActiveOrder`].
///
/// [`ActiveOrder`]: crate::lifecycle::ActiveOrder
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Created but not sent yet (e.g. held back by flow control).
    #[default]
    Indicated,
    /// Sent out by the connector.
    New,
    /// Acknowledged by the exchange.
    Acked,
    /// Confirmed (resting) at the exchange.
    Confirmed,
    /// Confirmed and partially filled.
    PartFilled,
    /// End of life for the whole order: cancelled.
    Cancelled,
    /// End of life for this request only: superseded by a later one.
    Replaced,
    /// End of life for this request: rejected/failed. The whole order
    /// may or may not have failed with it.
    Failed,
    /// End of life for the whole order: completely filled.
    Filled,
}

impl RequestStatus {
    /// Explicit progression rank (weakest 0 .. strongest 8). Named table,
    /// independent of the variant declaration order.
    pub fn rank(self) -> u8 {
        match self {
            RequestStatus::Indicated => 0,
            RequestStatus::New => 1,
            RequestStatus::Acked => 2,
            RequestStatus::Confirmed => 3,
            RequestStatus::PartFilled => 4,
            RequestStatus::Cancelled => 5,
            RequestStatus::Replaced => 6,
            RequestStatus::Failed => 7,
            RequestStatus::Filled => 8,
        }
    }

    /// True for the four end-of-life statuses.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Cancelled
                | RequestStatus::Replaced
                | RequestStatus::Failed
                | RequestStatus::Filled
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Indicated => "Indicated",
            RequestStatus::New => "New",
            RequestStatus::Acked => "Acked",
            RequestStatus::Confirmed => "Confirmed",
            RequestStatus::PartFilled => "PartFilled",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Replaced => "Replaced",
            RequestStatus::Failed => "Failed",
            RequestStatus::Filled => "Filled",
        };
        f.write_str(s)
    }
}

/// Kind of one request within an order's chain (not the type of the
/// whole order — see [`OrderKind`]).
///
/// `ModLegCancel`/`ModLegNew` are the two legs of a cancel-new tandem
/// emulating a modify on venues without native modify support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Initial placement.
    New,
    /// In-place modification.
    Modify,
    /// Cancellation of the whole order.
    Cancel,
    /// Cancel leg of an emulated modify.
    ModLegCancel,
    /// New leg of an emulated modify.
    ModLegNew,
}

impl RequestKind {
    /// Placement-like kinds: the ones allowed to start a chain (and the
    /// only ones without a target request).
    #[inline]
    pub fn is_new_kind(self) -> bool {
        matches!(self, RequestKind::New | RequestKind::ModLegNew)
    }

    /// Cancellation-like kinds: carry no quantity of their own and are
    /// skipped by fill accounting.
    #[inline]
    pub fn is_cancel_kind(self) -> bool {
        matches!(self, RequestKind::Cancel | RequestKind::ModLegCancel)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestKind::New => "New",
            RequestKind::Modify => "Modify",
            RequestKind::Cancel => "Cancel",
            RequestKind::ModLegCancel => "ModLegCancel",
            RequestKind::ModLegNew => "ModLegNew",
        };
        f.write_str(s)
    }
}

/// Type of the whole order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Resting limit order.
    Limit,
    /// Aggressive market order; always immediate-or-cancel.
    Market,
    /// Stop order.
    Stop,
}

/// Time-in-force of the whole order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Undefined; resolved by the venue default.
    Undefined,
    /// Good for the trading day.
    Day,
    /// Good till cancelled.
    GoodTillCancel,
    /// Immediate or cancel.
    ImmedOrCancel,
    /// Fill or kill.
    FillOrKill,
    /// Good till the given expiry date.
    GoodTillDate,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeInForce::Undefined => "Undefined",
            TimeInForce::Day => "Day",
            TimeInForce::GoodTillCancel => "GoodTillCancel",
            TimeInForce::ImmedOrCancel => "ImmedOrCancel",
            TimeInForce::FillOrKill => "FillOrKill",
            TimeInForce::GoodTillDate => "GoodTillDate",
        };
        f.write_str(s)
    }
}
