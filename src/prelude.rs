//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use bookcore_rs::prelude::*;
//! ```

// Book engine
pub use crate::orderbook::{
    BookConfig, BookEntry, BookError, BookRepr, OrderBook, Subscription, TopOfBook,
};

// Update protocol
pub use crate::orderbook::{UpdateAction, UpdateEffect, UpdateMode, UpdatedSides};

// Snapshots
pub use crate::orderbook::{BookSnapshot, LevelSnapshot};

// VWAP
pub use crate::orderbook::{MAX_BANDS, VwapParams};

// Order lifecycle
pub use crate::lifecycle::{
    ActiveOrder, OrderError, OrderKind, OrderRequest, RequestKind, RequestStatus, TimeInForce,
    Trade,
};

// Value types
pub use crate::types::{
    ConnectorId, Contracts, Instrument, Lots, OrderId, Price, Qty, QtyA, QtyB, QtyKind, RawQty,
    SeqNum, Side, StrategyId, Ts,
};
