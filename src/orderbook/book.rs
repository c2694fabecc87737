//! Core book state: configuration, the two sides, sequencing state,
//! subscriptions, and the non-update operations (clear, invalidate,
//! correction, consistency).

use super::entry::{BookEntry, OrderSlots};
use super::error::BookError;
use super::update::{UpdateEffect, UpdatedSides};
use crate::types::price::PxKey;
use crate::types::{
    Instrument, KindTag, OrderId, Price, Qty, QtyKind, QtyRepr, SeqNum, Side, StrategyId,
    is_valid_qty_rep,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Hard cap on subscriptions per book; generously above any real
/// per-instrument strategy count.
pub const MAX_SUBSCRIBERS: usize = 64;

/// L1-only price pair: the minimal book every feed maintains.
///
/// The full [`OrderBook`] embeds one and keeps it in lockstep with its
/// level storage; trade-capture style feeds that only ever see top-of-book
/// prices use it stand-alone through the relaxed/strict setters.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopOfBook {
    pub(crate) bid: Price,
    pub(crate) ask: Price,
}

impl TopOfBook {
    /// Best bid price (NaN when the bid side is empty).
    #[inline]
    pub fn best_bid_px(&self) -> Price {
        self.bid
    }

    /// Best ask price (NaN when the ask side is empty).
    #[inline]
    pub fn best_ask_px(&self) -> Price {
        self.ask
    }

    /// Install a new best bid. On a collision with the ask the ask is
    /// invalidated as the outdated one and `false` is returned; relaxed
    /// mode tolerates equality within the price tolerance.
    pub fn set_best_bid(&mut self, px: Price, relaxed: bool) -> bool {
        if !px.is_finite() {
            return false;
        }
        self.bid = px;
        let collides = if relaxed {
            self.bid > self.ask
        } else {
            self.bid >= self.ask
        };
        if collides {
            self.ask = Price::empty();
            return false;
        }
        true
    }

    /// Install a new best ask; the mirror of [`set_best_bid`].
    ///
    /// [`set_best_bid`]: TopOfBook::set_best_bid
    pub fn set_best_ask(&mut self, px: Price, relaxed: bool) -> bool {
        if !px.is_finite() {
            return false;
        }
        self.ask = px;
        let collides = if relaxed {
            self.bid > self.ask
        } else {
            self.bid >= self.ask
        };
        if collides {
            self.bid = Price::empty();
            return false;
        }
        true
    }

    /// A book missing either side is still consistent; otherwise the bid
    /// must be strictly below the ask.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        if !(self.bid.is_finite() && self.ask.is_finite()) {
            true
        } else {
            self.bid < self.ask
        }
    }
}

/// Physical representation of a book side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookRepr {
    /// Fixed-size array indexed by price-step offset around the first
    /// observed price. O(1) updates, bounded range.
    Dense,
    /// Ordered map keyed by price. Unbounded range, O(log n) updates.
    Sparse,
}

/// Book construction parameters. The defaults describe the common case:
/// a dense, sweepable, whole-contracts book with both sequence counters
/// enabled and no order log.
#[derive(Clone, Debug)]
pub struct BookConfig {
    /// Dense array or sparse map storage.
    pub repr: BookRepr,
    /// Full-amount (non-sweepable) liquidity: a VWAP band must be covered
    /// by a single price level.
    pub full_amount: bool,
    /// Quantity kind stored at the levels.
    pub qty_kind: QtyKind,
    /// Fractional (`f64`) vs whole (`i64`) quantities.
    pub with_frac: bool,
    /// Enforce the global sequence counter.
    pub with_seq_nums: bool,
    /// Enforce the per-instrument report sequence counter.
    pub with_rpt_seqs: bool,
    /// Report sequences must advance by exactly 1 outside init mode.
    pub cont_rpt_seqs: bool,
    /// The feed only ever delivers full snapshots (no incremental
    /// updates, no init mode, no order log).
    pub snapshots_only: bool,
    /// Tolerate out-of-range and off-step prices instead of reporting
    /// errors (round to the nearest step, skip unreachable levels).
    pub relaxed: bool,
    /// Escalate sequencing/argument violations to hard errors.
    pub strict: bool,
    /// Dense only: number of allocated price levels per side.
    pub total_levels: usize,
    /// Dense aggregate only: maximum tracked depth, 0 = unlimited.
    pub max_depth: u32,
    /// Order-log slot count; 0 disables order-level (MBO) tracking.
    pub max_orders: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        BookConfig {
            repr: BookRepr::Dense,
            full_amount: false,
            qty_kind: QtyKind::Contracts,
            with_frac: false,
            with_seq_nums: true,
            with_rpt_seqs: true,
            cont_rpt_seqs: false,
            snapshots_only: false,
            relaxed: false,
            strict: false,
            total_levels: 1001,
            max_depth: 0,
            max_orders: 0,
        }
    }
}

/// Dense (equi-spaced) side storage. Levels sit in ascending price order
/// for both sides; `best`/`worst` are indices into `entries`, -1 when the
/// side is empty. For bids `worst <= best`, for asks `best <= worst`.
#[derive(Debug)]
pub(crate) struct DenseSide {
    pub(crate) entries: Vec<BookEntry>,
    pub(crate) best: i32,
    pub(crate) worst: i32,
    pub(crate) depth: u32,
}

impl DenseSide {
    fn new(levels: usize) -> Self {
        DenseSide {
            entries: vec![BookEntry::default(); levels],
            best: -1,
            worst: -1,
            depth: 0,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.best < 0
    }

    #[inline]
    pub(crate) fn best_entry(&self) -> Option<&BookEntry> {
        (self.best >= 0).then(|| &self.entries[self.best as usize])
    }

    pub(crate) fn reset_indices(&mut self) {
        self.best = -1;
        self.worst = -1;
        self.depth = 0;
    }

    /// Zero out the populated range only; sweeping the whole allocation
    /// would be needlessly expensive for deep books.
    fn clear_levels(&mut self, orders: &mut OrderSlots) {
        if self.best < 0 {
            return;
        }
        let lo = self.best.min(self.worst) as usize;
        let hi = self.best.max(self.worst) as usize;
        for entry in &mut self.entries[lo..=hi] {
            if !orders.is_disabled() {
                orders.reset_chain(entry.first_order);
            }
            *entry = BookEntry::default();
        }
        self.reset_indices();
    }
}

/// Sparse (map-based) side storage: one ascending map per side, bids read
/// in reverse. Levels exist only while they hold quantity.
#[derive(Debug, Default)]
pub(crate) struct SparseSide {
    pub(crate) map: BTreeMap<PxKey, BookEntry>,
}

impl SparseSide {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub(crate) fn best_key(&self, is_bid: bool) -> Option<PxKey> {
        if is_bid {
            self.map.last_key_value().map(|(k, _)| *k)
        } else {
            self.map.first_key_value().map(|(k, _)| *k)
        }
    }

    #[inline]
    pub(crate) fn best_entry(&self, is_bid: bool) -> Option<&BookEntry> {
        if is_bid {
            self.map.last_key_value().map(|(_, e)| e)
        } else {
            self.map.first_key_value().map(|(_, e)| e)
        }
    }

    fn clear_levels(&mut self, orders: &mut OrderSlots) {
        if !orders.is_disabled() {
            for entry in self.map.values() {
                orders.reset_chain(entry.first_order);
            }
        }
        self.map.clear();
    }
}

/// One side of the book, in either representation.
#[derive(Debug)]
pub(crate) enum SideLevels {
    Dense(DenseSide),
    Sparse(SparseSide),
}

impl SideLevels {
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            SideLevels::Dense(d) => d.is_empty(),
            SideLevels::Sparse(s) => s.is_empty(),
        }
    }

    #[inline]
    pub(crate) fn best_entry(&self, is_bid: bool) -> Option<&BookEntry> {
        match self {
            SideLevels::Dense(d) => d.best_entry(),
            SideLevels::Sparse(s) => s.best_entry(is_bid),
        }
    }
}

/// A strategy subscribed to this book's update events, with the weakest
/// effect it still wants to hear about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// Handle of the subscribed strategy.
    pub strategy: StrategyId,
    /// Minimum effect level the strategy is interested in.
    pub min_level: UpdateEffect,
}

/// In-memory limit order book for one instrument.
///
/// Single-writer by design: the owning connector serializes all mutating
/// calls onto one thread, and the book takes no locks. Concurrent readers
/// work off [`snapshot`]s, never the live structure.
///
/// [`snapshot`]: OrderBook::snapshot
#[derive(Debug)]
pub struct OrderBook {
    pub(crate) instr: Arc<Instrument>,
    pub(crate) cfg: BookConfig,
    pub(crate) top: TopOfBook,
    pub(crate) bids: SideLevels,
    pub(crate) asks: SideLevels,
    pub(crate) orders: OrderSlots,
    pub(crate) init_mode_over: bool,
    pub(crate) initialised: bool,
    pub(crate) last_rpt_seq: SeqNum,
    pub(crate) last_seq_num: SeqNum,
    pub(crate) last_updated_bid: bool,
    pub(crate) subscribers: Vec<Subscription>,
}

impl OrderBook {
    /// Create an empty book.
    ///
    /// The recommended dense `total_levels` depends on how long the book
    /// is supposed to run without a reset (price drift eats into the
    /// allocated range from the first observed price outward).
    pub fn new(instr: Arc<Instrument>, cfg: BookConfig) -> Result<Self, BookError> {
        if cfg.repr == BookRepr::Dense && cfg.total_levels == 0 {
            return Err(BookError::InvalidArgument {
                message: "dense book needs total_levels > 0".into(),
            });
        }
        if cfg.snapshots_only && cfg.max_orders > 0 {
            return Err(BookError::InvalidArgument {
                message: "snapshots-only mode is incompatible with an order log".into(),
            });
        }
        if cfg.max_orders > 0 && cfg.max_depth != 0 {
            return Err(BookError::InvalidArgument {
                message: "order-log books track unlimited depth (max_depth must be 0)".into(),
            });
        }
        let mk_side = || match cfg.repr {
            BookRepr::Dense => SideLevels::Dense(DenseSide::new(cfg.total_levels)),
            BookRepr::Sparse => SideLevels::Sparse(SparseSide::default()),
        };
        Ok(OrderBook {
            orders: OrderSlots::new(cfg.max_orders),
            bids: mk_side(),
            asks: mk_side(),
            top: TopOfBook::default(),
            init_mode_over: false,
            initialised: false,
            last_rpt_seq: -1,
            last_seq_num: -1,
            last_updated_bid: false,
            subscribers: Vec::new(),
            instr,
            cfg,
        })
    }

    //-----------------------------------------------------------------//
    // Meta-data                                                        //
    //-----------------------------------------------------------------//

    /// The instrument this book tracks.
    #[inline]
    pub fn instr(&self) -> &Instrument {
        &self.instr
    }

    /// Configured quantity kind of the levels.
    #[inline]
    pub fn qty_kind(&self) -> QtyKind {
        self.cfg.qty_kind
    }

    /// Whether level quantities are fractional.
    #[inline]
    pub fn with_frac(&self) -> bool {
        self.cfg.with_frac
    }

    /// Whether the order log (MBO tracking) is enabled.
    #[inline]
    pub fn with_orders_log(&self) -> bool {
        !self.orders.is_disabled()
    }

    /// Physical representation of the sides.
    #[inline]
    pub fn repr(&self) -> BookRepr {
        self.cfg.repr
    }

    /// Full-amount (non-sweepable) liquidity model?
    #[inline]
    pub fn is_full_amount(&self) -> bool {
        self.cfg.full_amount
    }

    //-----------------------------------------------------------------//
    // Top of the book                                                  //
    //-----------------------------------------------------------------//

    /// Best bid price (NaN when empty).
    #[inline]
    pub fn best_bid_px(&self) -> Price {
        self.top.bid
    }

    /// Best ask price (NaN when empty).
    #[inline]
    pub fn best_ask_px(&self) -> Price {
        self.top.ask
    }

    /// Aggregated quantity at the best bid (zero when empty).
    pub fn best_bid_qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        debug_assert!(is_valid_qty_rep::<K, R>(self.cfg.qty_kind, self.cfg.with_frac));
        self.bids
            .best_entry(true)
            .map(|e| e.qty(self.cfg.qty_kind, self.cfg.with_frac))
            .unwrap_or_default()
    }

    /// Aggregated quantity at the best ask (zero when empty).
    pub fn best_ask_qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        debug_assert!(is_valid_qty_rep::<K, R>(self.cfg.qty_kind, self.cfg.with_frac));
        self.asks
            .best_entry(false)
            .map(|e| e.qty(self.cfg.qty_kind, self.cfg.with_frac))
            .unwrap_or_default()
    }

    /// Number of orders at the best bid (0 without an order log).
    pub fn best_bid_n_orders(&self) -> u32 {
        self.bids.best_entry(true).map(|e| e.n_orders()).unwrap_or(0)
    }

    /// Number of orders at the best ask (0 without an order log).
    pub fn best_ask_n_orders(&self) -> u32 {
        self.asks.best_entry(false).map(|e| e.n_orders()).unwrap_or(0)
    }

    /// Copy of the best bid entry (default-empty when the side is empty).
    pub fn best_bid_entry(&self) -> BookEntry {
        self.bids.best_entry(true).copied().unwrap_or_default()
    }

    /// Copy of the best ask entry (default-empty when the side is empty).
    pub fn best_ask_entry(&self) -> BookEntry {
        self.asks.best_entry(false).copied().unwrap_or_default()
    }

    //-----------------------------------------------------------------//
    // Sequencing and readiness                                         //
    //-----------------------------------------------------------------//

    /// Last applied per-instrument report sequence (-1 = never).
    #[inline]
    pub fn last_update_rpt_seq(&self) -> SeqNum {
        self.last_rpt_seq
    }

    /// Last applied global sequence number (-1 = never).
    #[inline]
    pub fn last_update_seq_num(&self) -> SeqNum {
        self.last_seq_num
    }

    /// Which side the most recent update touched.
    #[inline]
    pub fn last_updated_side(&self) -> Side {
        if self.last_updated_bid { Side::Bid } else { Side::Ask }
    }

    /// Has the external caller declared dynamic initialisation complete?
    #[inline]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Declare dynamic initialisation complete. Only the owning connector
    /// knows when the snapshot/recovery phase is over, so this is never
    /// inferred internally.
    #[inline]
    pub fn set_initialised(&mut self) {
        self.initialised = true;
    }

    /// Fully ready for normal use: initialised and liquid on both sides.
    pub fn is_ready(&self) -> bool {
        self.initialised && !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Normal valid state: empty sides are fine, otherwise bid < ask.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.top.is_consistent()
    }

    //-----------------------------------------------------------------//
    // Clear / Invalidate                                               //
    //-----------------------------------------------------------------//

    /// Remove all quantities from all levels; the book structure stays
    /// intact. Sequence counters are gated (and advanced) exactly as for
    /// an update unless `init_mode` is set.
    pub fn clear(
        &mut self,
        init_mode: bool,
        rpt_seq: SeqNum,
        seq_num: SeqNum,
    ) -> Result<UpdateEffect, BookError> {
        if !init_mode {
            match self.check_seq_nums(false, rpt_seq, seq_num)? {
                super::update::SeqGate::Apply => {}
                super::update::SeqGate::Ignore => return Ok(UpdateEffect::None),
            }
        }
        let was_empty = self.bids.is_empty() && self.asks.is_empty();
        if was_empty {
            return Ok(UpdateEffect::None);
        }
        self.last_updated_bid = false;
        match &mut self.bids {
            SideLevels::Dense(d) => d.clear_levels(&mut self.orders),
            SideLevels::Sparse(s) => s.clear_levels(&mut self.orders),
        }
        match &mut self.asks {
            SideLevels::Dense(d) => d.clear_levels(&mut self.orders),
            SideLevels::Sparse(s) => s.clear_levels(&mut self.orders),
        }
        self.top = TopOfBook::default();
        // The L1 price, in particular, was just reset.
        Ok(UpdateEffect::L1Px)
    }

    /// Strong clear: additionally resets init/sequencing state and every
    /// order slot, as if the book had just been constructed. Subscriber
    /// registrations survive.
    pub fn invalidate(&mut self) {
        self.init_mode_over = false;
        self.initialised = false;
        let _ = self.clear(true, 0, 0);
        self.orders.reset_all();
        self.last_rpt_seq = -1;
        self.last_seq_num = -1;
    }

    //-----------------------------------------------------------------//
    // Correction                                                       //
    //-----------------------------------------------------------------//

    /// Restore `bid < ask` on a crossed book by discarding liquidity from
    /// the side whose last update is older. No effect on a consistent
    /// book. Returns the side(s) modified.
    pub fn correct_book(&mut self) -> UpdatedSides {
        let mut sides = UpdatedSides::empty();
        if self.bids.is_empty() || self.asks.is_empty() {
            debug_assert!(self.is_consistent());
            return sides;
        }
        let px_step = self.instr.px_step();
        if self.last_updated_bid {
            // The bid side is trusted; drop ask levels at or below it.
            let thresh = self.top.bid + px_step / 2.0;
            let fixed = match &mut self.asks {
                SideLevels::Dense(d) => {
                    Self::correct_dense(d, false, self.top.ask, px_step, thresh, &mut self.orders)
                }
                SideLevels::Sparse(s) => {
                    Self::correct_sparse(s, false, thresh, &mut self.orders)
                }
            };
            self.top.ask = fixed.unwrap_or_else(Price::empty);
            sides |= UpdatedSides::ASK;
        } else {
            let thresh = self.top.ask - px_step / 2.0;
            let fixed = match &mut self.bids {
                SideLevels::Dense(d) => {
                    Self::correct_dense(d, true, self.top.bid, px_step, thresh, &mut self.orders)
                }
                SideLevels::Sparse(s) => {
                    Self::correct_sparse(s, true, thresh, &mut self.orders)
                }
            };
            self.top.bid = fixed.unwrap_or_else(Price::empty);
            sides |= UpdatedSides::BID;
        }
        debug_assert!(self.is_consistent());
        sides
    }

    /// Walk the wrong dense side from its best level toward worse prices,
    /// wiping colliding levels; the first surviving level becomes the new
    /// best. `None` if the whole side got eliminated.
    fn correct_dense(
        side: &mut DenseSide,
        is_bid: bool,
        best_px: Price,
        px_step: f64,
        thresh: Price,
        orders: &mut OrderSlots,
    ) -> Option<Price> {
        let best = side.best;
        let worst = side.worst;
        let mut i = best;
        loop {
            if (is_bid && i < worst) || (!is_bid && i > worst) {
                break;
            }
            let entry = &mut side.entries[i as usize];
            if entry.is_empty() {
                i += if is_bid { -1 } else { 1 };
                continue;
            }
            let px_i = best_px + f64::from(i - best) * px_step;
            let collides = if is_bid { px_i > thresh } else { px_i < thresh };
            if collides {
                if !orders.is_disabled() {
                    orders.reset_chain(entry.first_order);
                }
                *entry = BookEntry::default();
                i += if is_bid { -1 } else { 1 };
            } else {
                side.best = i;
                return Some(px_i);
            }
        }
        // The whole side was eliminated; extremely unlikely in practice.
        warn!("correct_book: entire {} side discarded", if is_bid { "Bid" } else { "Ask" });
        side.reset_indices();
        None
    }

    fn correct_sparse(
        side: &mut SparseSide,
        is_bid: bool,
        thresh: Price,
        orders: &mut OrderSlots,
    ) -> Option<Price> {
        loop {
            let key = side.best_key(is_bid)?;
            let px = key.px();
            let collides = if is_bid { px > thresh } else { px < thresh };
            if !collides {
                return Some(px);
            }
            if let Some(entry) = side.map.remove(&key)
                && !orders.is_disabled()
            {
                orders.reset_chain(entry.first_order);
            }
        }
    }

    //-----------------------------------------------------------------//
    // Subscriptions                                                    //
    //-----------------------------------------------------------------//

    /// Attach a strategy to this book's update events. Re-subscribing
    /// amends the existing entry in place. The list stays sorted in
    /// ascending min-level order so the dispatcher can stop at the first
    /// subscriber whose threshold exceeds an event's effect.
    pub fn add_subscriber(
        &mut self,
        strategy: StrategyId,
        min_level: UpdateEffect,
    ) -> Result<(), BookError> {
        if let Some(si) = self.subscribers.iter_mut().find(|si| si.strategy == strategy) {
            si.min_level = min_level;
        } else {
            if self.subscribers.len() >= MAX_SUBSCRIBERS {
                return Err(BookError::TooManySubscribers {
                    limit: MAX_SUBSCRIBERS,
                });
            }
            self.subscribers.push(Subscription {
                strategy,
                min_level,
            });
        }
        self.subscribers
            .sort_by_key(|si| si.min_level.rank());
        Ok(())
    }

    /// Detach a strategy; returns whether it was subscribed at all.
    pub fn remove_subscriber(&mut self, strategy: StrategyId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|si| si.strategy != strategy);
        self.subscribers.len() != before
    }

    /// Detach every strategy (e.g. at connector shutdown); returns
    /// whether the list was non-empty.
    pub fn remove_all_subscribers(&mut self) -> bool {
        let any = !self.subscribers.is_empty();
        self.subscribers.clear();
        any
    }

    /// The current subscription list, ascending by min level.
    #[inline]
    pub fn subscribers(&self) -> &[Subscription] {
        &self.subscribers
    }

    /// Subscribers whose threshold admits `effect`. `Error` outranks
    /// every threshold and is therefore always reported.
    pub fn subscribers_for(&self, effect: UpdateEffect) -> impl Iterator<Item = StrategyId> + '_ {
        self.subscribers
            .iter()
            .take_while(move |si| si.min_level.rank() <= effect.rank())
            .map(|si| si.strategy)
    }

    //-----------------------------------------------------------------//
    // Order log                                                        //
    //-----------------------------------------------------------------//

    /// Read-only view of the slot for a numeric order id, if the order
    /// log is enabled and the id is known.
    pub fn order_info(&self, order_id: OrderId) -> Option<&super::entry::OrderSlot> {
        self.orders.lookup(order_id)
    }

    /// Link (or unlink) one of our own requests to a resting order's
    /// slot, so the order can later be recognised as ours. Returns false
    /// when the order is unknown.
    pub fn set_order_request(&mut self, order_id: OrderId, req: Option<OrderId>) -> bool {
        match self.orders.resolve(order_id) {
            Some(idx) => {
                self.orders.get_mut(idx).set_req(req);
                true
            }
            None => false,
        }
    }
}
