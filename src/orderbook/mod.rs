//! Order book engine: dense/sparse price-level storage, sequence-gated
//! updates, order-level (MBO) tracking, consistency restoration, and
//! liquidity-weighted price queries.

pub mod book;
/// Price-level entries and the per-order slot arena.
pub mod entry;
pub mod error;
/// Point-in-time serde snapshots for reporting and late readers.
pub mod snapshot;
/// The update protocol and its effect classification.
pub mod update;
/// Traversal, VWAP bands, deepest price and mid price.
pub mod vwap;

pub use book::{BookConfig, BookRepr, MAX_SUBSCRIBERS, OrderBook, Subscription, TopOfBook};
pub use entry::{BookEntry, OrderSlot};
pub use error::BookError;
pub use snapshot::{BookSnapshot, LevelSnapshot};
pub use update::{UpdateAction, UpdateEffect, UpdateMode, UpdatedSides};
pub use vwap::{MAX_BANDS, VwapParams};
