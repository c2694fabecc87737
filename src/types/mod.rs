//! Leaf value types shared by the book engine and the lifecycle tracker.

pub mod instrument;
pub mod price;
pub mod qty;
pub mod time;

pub use instrument::Instrument;
pub use price::{Price, arith_mid};
pub use qty::{
    AnyKind, Contracts, KindTag, Lots, Qty, QtyA, QtyB, QtyConvError, QtyKind, QtyRepr, RawQty,
    convert, is_valid_qty_rep,
};
pub use time::Ts;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Book side. Bids buy, asks sell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The buy side.
    Bid,
    /// The sell side.
    Ask,
}

impl Side {
    /// True for [`Side::Bid`].
    #[inline]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// The other side.
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Bid => "Bid",
            Side::Ask => "Ask",
        })
    }
}

/// Externally-assigned numeric identifier of an order, request or trade.
/// Zero means "none"; valid ids start from 1.
pub type OrderId = u64;

/// Sequence number (global or per-instrument report sequence). Signed so
/// that -1 can mean "never updated"; valid values start from 1.
pub type SeqNum = i64;

/// Opaque handle of a subscribed strategy. The book never dereferences
/// it; the owning connector maps it back to the actual strategy object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrategyId(pub u32);

/// Opaque handle of a market-data or order-management connector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ConnectorId(pub u32);
