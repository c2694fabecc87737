//! # In-Memory Order Book Engine and Order Lifecycle Tracker
//!
//! A cache-friendly limit order book implementation for low-latency
//! market-data connectors, together with the request-chain bookkeeping
//! that tracks an order's life from submission through fill, cancel or
//! failure.
//!
//! ## Key Features
//!
//! - **Dense and sparse price-level storage**: a fixed array indexed by
//!   price-step offset for O(1) updates on tight books, or an ordered
//!   map for wide/irregular price ranges — selected per book at
//!   construction.
//!
//! - **Order-level (MBO) tracking**: an optional flat slot arena keyed
//!   by numeric order id chains individual orders under their price
//!   levels, keeping the aggregated quantity and the order chain in
//!   lockstep.
//!
//! - **Sequence-gated updates**: global sequence numbers and
//!   per-instrument report sequences with configurable continuity;
//!   stale or duplicate updates are swallowed in relaxed mode and hard
//!   errors in strict mode.
//!
//! - **Effect classification**: every update reports how strong the
//!   observable change was (`None`/`L2`/`L1Qty`/`L1Px`/`Error`), so the
//!   owning connector can dispatch strategy callbacks selectively.
//!
//! - **Consistency restoration**: crossed books are repaired by
//!   discarding liquidity from the stalest-updated side.
//!
//! - **Multi-band VWAP**: single-pass band computation with own-order
//!   exclusion, in-flight aggressive demand, and optional discounting
//!   of suspected manipulative single-order levels; full-amount
//!   (non-sweepable) liquidity is honoured.
//!
//! - **Unit-safe quantities**: kind-tagged quantities (contracts, lots,
//!   base/quote currency) that never mix implicitly, over whole or
//!   fractional representations.
//!
//! - **Order lifecycle chains**: one [`ActiveOrder`] per client order
//!   owns its chronological request chain and fills; terminal-state
//!   queries (`is_filled`/`is_cancelled`/`has_failed`) walk the chain
//!   backward and treat a self-contradictory chain as a hard error.
//!
//! ## Concurrency Model
//!
//! Single-writer per instrument: the owning connector serializes all
//! mutating calls onto one thread and the structures take no locks.
//! Concurrent readers consume [`BookSnapshot`]s, never live state.
//!
//! ## Status
//!
//! The engine core is feature-complete; venue protocol decoding,
//! session management and persistence live in the host system.

pub mod lifecycle;
pub mod orderbook;
pub mod prelude;
pub mod types;

pub use lifecycle::{
    ActiveOrder, OrderError, OrderKind, OrderRequest, ReqTimes, RequestKind, RequestStatus,
    TimeInForce, Trade,
};
pub use orderbook::{
    BookConfig, BookEntry, BookError, BookRepr, BookSnapshot, LevelSnapshot, OrderBook, OrderSlot,
    Subscription, TopOfBook, UpdateAction, UpdateEffect, UpdateMode, UpdatedSides, VwapParams,
};
pub use types::{
    AnyKind, ConnectorId, Contracts, Instrument, KindTag, Lots, OrderId, Price, Qty, QtyA, QtyB,
    QtyConvError, QtyKind, QtyRepr, RawQty, SeqNum, Side, StrategyId, Ts, arith_mid, convert,
};
