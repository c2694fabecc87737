//! Point-in-time book snapshots.
//!
//! The live book is single-writer and never shared; reporting tools and
//! late-arriving readers work off a [`BookSnapshot`] taken between
//! updates. Snapshots are plain serde values, so they can be dumped as
//! JSON for offline inspection.

use super::book::OrderBook;
use super::error::BookError;
use crate::types::{KindTag, Price, Qty, QtyRepr, SeqNum, Side};
use serde::{Deserialize, Serialize};

/// One price level inside a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Level price.
    pub px: Price,
    /// Aggregated quantity, widened to `f64` for uniformity.
    pub qty: f64,
    /// Number of orders (0 when the book is aggregate-only).
    pub n_orders: u32,
}

/// A frozen copy of a book's visible state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Instrument symbol.
    pub symbol: String,
    /// Bid levels, best first.
    pub bids: Vec<LevelSnapshot>,
    /// Ask levels, best first.
    pub asks: Vec<LevelSnapshot>,
    /// Last applied per-instrument report sequence.
    pub last_rpt_seq: SeqNum,
    /// Last applied global sequence number.
    pub last_seq_num: SeqNum,
}

impl BookSnapshot {
    /// Render as a JSON string.
    pub fn to_json(&self) -> Result<String, BookError> {
        serde_json::to_string(self).map_err(|e| BookError::InvalidArgument {
            message: format!("snapshot serialization failed: {e}"),
        })
    }
}

impl OrderBook {
    /// Capture up to `depth` levels per side (`0` = all) in one pass.
    pub fn snapshot<K: KindTag, R: QtyRepr>(&self, depth: usize) -> BookSnapshot {
        let mut snap = BookSnapshot {
            symbol: self.instr.symbol().to_string(),
            bids: Vec::new(),
            asks: Vec::new(),
            last_rpt_seq: self.last_rpt_seq,
            last_seq_num: self.last_seq_num,
        };
        for side in [Side::Bid, Side::Ask] {
            let out = if side.is_bid() {
                &mut snap.bids
            } else {
                &mut snap.asks
            };
            self.traverse(side, depth, |_, px, entry| {
                let qty: Qty<K, R> = entry.qty(self.cfg.qty_kind, self.cfg.with_frac);
                out.push(LevelSnapshot {
                    px,
                    qty: qty.to_f64(),
                    n_orders: entry.n_orders(),
                });
                true
            });
        }
        snap
    }
}
