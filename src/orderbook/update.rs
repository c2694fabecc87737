//! The book update protocol: sequence gating, dense and sparse side
//! updates, order-log maintenance, and depth management.
//!
//! One call to [`OrderBook::update`] applies one discrete (side, action,
//! price, qty, sequence) event decoded by the owning connector and
//! returns how strong the observable change was, so the connector can
//! dispatch callbacks selectively.

use super::book::{DenseSide, OrderBook, SideLevels, SparseSide};
use super::entry::{BookEntry, OrderSlots, check_entry};
use super::error::BookError;
use crate::types::price::PxKey;
use crate::types::{
    Instrument, KindTag, OrderId, Price, Qty, QtyKind, QtyRepr, SeqNum, Side, is_valid_qty_rep,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

/// How strong an observable book change was. Each level includes all
/// weaker ones; subscribers register the weakest level they care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateEffect {
    /// Nothing observable changed.
    None,
    /// A level beyond L1 changed.
    L2,
    /// The L1 quantity changed, the L1 price did not.
    L1Qty,
    /// The L1 price changed (including sides appearing/vanishing).
    L1Px,
    /// A malformed update was detected. Outranks every subscriber
    /// threshold, so it is always reported.
    Error,
}

impl UpdateEffect {
    /// Explicit strength ordering (weakest 0 .. strongest 4). Kept as a
    /// named table so the variant declaration order is not load-bearing.
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            UpdateEffect::None => 0,
            UpdateEffect::L2 => 1,
            UpdateEffect::L1Qty => 2,
            UpdateEffect::L1Px => 3,
            UpdateEffect::Error => 4,
        }
    }

    /// True iff `self` is at least as strong as `other`.
    #[inline]
    pub fn at_least(self, other: UpdateEffect) -> bool {
        self.rank() >= other.rank()
    }
}

bitflags! {
    /// Which side(s) an operation modified.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct UpdatedSides: u8 {
        /// The bid side was modified.
        const BID = 1;
        /// The ask side was modified.
        const ASK = 2;
    }
}

/// Decoded update action. `Undefined` means the feed does not maintain
/// individual orders: the book then keeps notionally one order per level
/// and infers creation/removal from the quantity transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    /// A new order (MBO) or a new price level.
    New,
    /// A quantity change at an existing order/level.
    Change,
    /// Removal of an order/level.
    Delete,
    /// Action not maintained by the feed.
    Undefined,
}

/// Whether an update belongs to the bulk snapshot-load phase (sequence
/// numbers may repeat or interleave) or to normal incremental flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// Bulk snapshot load.
    Init,
    /// Normal incremental update.
    Incremental,
}

/// Outcome of the sequence-number gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SeqGate {
    /// Sequencing is fine, apply the update.
    Apply,
    /// Stale or duplicate: swallow the update silently.
    Ignore,
}

/// Copies of the book configuration a side update needs, so the borrow
/// of the side storage, the top-of-book price and the slot arena can all
/// be held at once.
#[derive(Clone, Copy)]
struct UpdateCx<'a> {
    instr: &'a Instrument,
    is_bid: bool,
    with_orders: bool,
    relaxed: bool,
    strict: bool,
    snapshots_only: bool,
    max_depth: u32,
    qt: QtyKind,
    with_frac: bool,
}

impl UpdateCx<'_> {
    #[inline]
    fn side_name(&self) -> &'static str {
        if self.is_bid { "Bid" } else { "Ask" }
    }
}

impl OrderBook {
    /// Apply one decoded update event.
    ///
    /// With the order log enabled, `qty` is the *delta* contributed by
    /// `order_id`; otherwise it is the absolute target quantity at
    /// `px`. Sequence numbers are gated per the book configuration:
    /// stale/duplicate updates in relaxed mode are swallowed
    /// (`UpdateEffect::None`), in strict mode they are
    /// [`BookError::SequenceInversion`].
    #[allow(clippy::too_many_arguments)]
    pub fn update<K: KindTag, R: QtyRepr>(
        &mut self,
        mode: UpdateMode,
        side: Side,
        action: UpdateAction,
        px: Price,
        qty: Qty<K, R>,
        rpt_seq: SeqNum,
        seq_num: SeqNum,
        order_id: Option<OrderId>,
    ) -> Result<UpdateEffect, BookError> {
        debug_assert!(is_valid_qty_rep::<K, R>(self.cfg.qty_kind, self.cfg.with_frac));
        if !px.is_finite() {
            return Err(BookError::InvalidArgument {
                message: format!("{}: non-finite update price", self.instr.symbol()),
            });
        }
        if self.cfg.snapshots_only && (mode == UpdateMode::Init || order_id.is_some()) {
            return Err(BookError::InvalidArgument {
                message: "snapshots-only book got an init-mode or order-level update".into(),
            });
        }
        let with_orders = self.with_orders_log();
        if order_id.is_some() != with_orders {
            return Err(BookError::InvalidArgument {
                message: "order id presence must match the order-log mode".into(),
            });
        }
        trace!(
            "update {} {} {:?} px={} qty={} rpt={} seq={}",
            self.instr.symbol(),
            side,
            action,
            px,
            qty,
            rpt_seq,
            seq_num
        );

        // The book counts as touched whether or not this update applies.
        self.last_updated_bid = side.is_bid();
        match self.check_seq_nums(mode == UpdateMode::Init, rpt_seq, seq_num)? {
            SeqGate::Apply => {}
            SeqGate::Ignore => return Ok(UpdateEffect::None),
        }

        if with_orders {
            // A zero delta leaves both the level qty and the order count
            // untouched.
            if qty.is_zero() {
                return Ok(UpdateEffect::None);
            }
            if (qty.is_neg() && action == UpdateAction::New)
                || (qty.is_pos() && action == UpdateAction::Delete)
            {
                return Err(BookError::InvalidArgument {
                    message: format!(
                        "{}: action {action:?} inconsistent with qty delta {qty}",
                        self.instr.symbol()
                    ),
                });
            }
        } else if qty.is_neg() || (qty.is_zero() != (action == UpdateAction::Delete)) {
            if self.cfg.strict {
                return Err(BookError::InvalidArgument {
                    message: format!(
                        "{}: action {action:?} inconsistent with target qty {qty}",
                        self.instr.symbol()
                    ),
                });
            }
            error!(
                "update {}: {side}: action {action:?} inconsistent with target qty {qty}",
                self.instr.symbol()
            );
            return Ok(UpdateEffect::Error);
        }

        let order_idx = match order_id {
            None => None,
            Some(id) => match self.orders.resolve(id) {
                Some(idx) => Some(idx),
                None => {
                    return Err(BookError::InvalidArgument {
                        message: format!(
                            "{}: no order slot available for id {id}",
                            self.instr.symbol()
                        ),
                    });
                }
            },
        };

        let cx = UpdateCx {
            instr: &*self.instr,
            is_bid: side.is_bid(),
            with_orders,
            relaxed: self.cfg.relaxed,
            strict: self.cfg.strict,
            snapshots_only: self.cfg.snapshots_only,
            max_depth: self.cfg.max_depth,
            qt: self.cfg.qty_kind,
            with_frac: self.cfg.with_frac,
        };
        let top_px = if side.is_bid() {
            &mut self.top.bid
        } else {
            &mut self.top.ask
        };
        let levels = if side.is_bid() {
            &mut self.bids
        } else {
            &mut self.asks
        };
        match levels {
            SideLevels::Dense(d) => {
                d.apply(cx, top_px, &mut self.orders, action, px, qty, order_idx)
            }
            SideLevels::Sparse(s) => {
                s.apply(cx, top_px, &mut self.orders, action, px, qty, order_idx)
            }
        }
    }

    /// Advance and validate the sequence counters. Counters always move
    /// forward to the max seen, even when the update itself is rejected,
    /// so a single bad message cannot wedge the stream.
    pub(crate) fn check_seq_nums(
        &mut self,
        init_mode: bool,
        rpt_seq: SeqNum,
        seq_num: SeqNum,
    ) -> Result<SeqGate, BookError> {
        if !init_mode && !self.init_mode_over {
            self.init_mode_over = true;
        } else if init_mode && self.init_mode_over {
            return Err(BookError::InitModeReentry);
        }

        let mut gate = SeqGate::Apply;
        if self.cfg.with_seq_nums {
            let old = self.last_seq_num;
            self.last_seq_num = self.last_seq_num.max(seq_num);
            // Global seq-nums are non-decreasing: one message can carry
            // several entries under the same number.
            if seq_num <= 0 || seq_num < old {
                if self.cfg.strict {
                    return Err(BookError::SequenceInversion {
                        counter: "seq_num",
                        got: seq_num,
                        last: old,
                    });
                }
                gate = SeqGate::Ignore;
            }
        }
        if self.cfg.with_rpt_seqs {
            let old = self.last_rpt_seq;
            self.last_rpt_seq = self.last_rpt_seq.max(rpt_seq);
            let bad = rpt_seq <= 0
                || rpt_seq < old
                || (!init_mode
                    && old > 0
                    && ((self.cfg.cont_rpt_seqs && rpt_seq != old + 1)
                        || (!self.cfg.cont_rpt_seqs && rpt_seq <= old)));
            if bad {
                if self.cfg.strict {
                    return Err(BookError::SequenceInversion {
                        counter: "rpt_seq",
                        got: rpt_seq,
                        last: old,
                    });
                }
                gate = SeqGate::Ignore;
            }
        }
        Ok(gate)
    }
}

/// How far (in steps) a price may sit from the step grid and still count
/// as on-grid. Representation error of decimal prices is ~1e-12 steps;
/// a genuinely off-step price misses by 0.1 steps or more.
const STEP_TOL: f64 = 1e-6;

/// Offset of `numer` in whole price steps. Outside relaxed mode the
/// division must land on an integer within [`STEP_TOL`].
fn px_step_multiple(
    instr: &Instrument,
    relaxed: bool,
    numer: f64,
) -> Result<i32, BookError> {
    let step = instr.px_step();
    let r = numer / step;
    let rn = r.round();
    if !rn.is_finite() {
        return Err(BookError::OffStepPrice { px: numer, px_step: step });
    }
    if !relaxed && (r - rn).abs() > STEP_TOL {
        return Err(BookError::OffStepPrice { px: numer, px_step: step });
    }
    Ok(rn as i32)
}

/// Clamp a would-be-negative level quantity to zero, with a warning.
/// Happens when a venue reports a larger removal than the book holds.
fn verify_qty<K: KindTag, R: QtyRepr>(
    cx: &UpdateCx<'_>,
    qty: Qty<K, R>,
    px: Price,
) -> Qty<K, R> {
    if qty.is_neg() {
        warn!(
            "update {}: {}: px={px}: new qty {qty} reset to 0",
            cx.instr.symbol(),
            cx.side_name()
        );
        Qty::zero()
    } else {
        qty
    }
}

/// Shared tail of the dense and sparse updates: maintain the order chain
/// (if any), install the new aggregated qty, and cross-check the entry.
#[allow(clippy::too_many_arguments)]
fn update_entry<K: KindTag, R: QtyRepr>(
    cx: &UpdateCx<'_>,
    action: UpdateAction,
    px: Price,
    new_qty: Qty<K, R>,
    delta: Qty<K, R>,
    order_idx: Option<u32>,
    obe: &mut BookEntry,
    slots: &mut OrderSlots,
    res: &mut UpdateEffect,
) {
    if let Some(idx) = order_idx {
        debug_assert!(check_entry::<K, R>(obe, slots, cx.qt, cx.with_frac, false));
        match action {
            UpdateAction::New => {
                slots.push_back(obe, idx);
                let slot = slots.get_mut(idx);
                slot.is_bid = cx.is_bid;
                slot.px = px;
                slot.qty = crate::types::RawQty::store(delta);
            }
            UpdateAction::Delete => {
                // A venue may send a delete for an order that does not
                // exist or rests at another level; never corrupt the
                // chain for it.
                let member = slots.get(idx).px == px && slots.unlink(obe, idx);
                if member {
                    *slots.get_mut(idx) = super::entry::OrderSlot::default();
                } else {
                    error!(
                        "update {}: {}: px={px}: delete for an order not at this level",
                        cx.instr.symbol(),
                        cx.side_name()
                    );
                    *res = UpdateEffect::Error;
                }
            }
            UpdateAction::Change => {
                let slot = slots.get_mut(idx);
                if slot.px == px {
                    let prev: Qty<K, R> = slot.qty.load(cx.qt, cx.with_frac);
                    slot.qty = crate::types::RawQty::store(prev + delta);
                } else {
                    error!(
                        "update {}: {}: px={px}: change for an order resting at {}",
                        cx.instr.symbol(),
                        cx.side_name(),
                        slot.px
                    );
                    *res = UpdateEffect::Error;
                }
            }
            UpdateAction::Undefined => {
                // Order actions not maintained: notionally one order per
                // populated level.
                obe.n_orders = if new_qty.is_zero() { 0 } else { 1 };
            }
        }
    }

    obe.aggr_qty = crate::types::RawQty::store(new_qty);

    if order_idx.is_some() {
        let zero_qty = obe.aggr_qty.is_zero_bits();
        let zero_orders = obe.n_orders == 0;
        if zero_qty != zero_orders {
            error!(
                "update {}: {}: px={px}: qty {new_qty} disagrees with {} orders",
                cx.instr.symbol(),
                cx.side_name(),
                obe.n_orders
            );
            if zero_qty {
                // Orders left behind at a zero level: dropping doubtful
                // liquidity beats reconstructing it.
                slots.reset_chain(obe.first_order);
                *obe = BookEntry::default();
            } else {
                // Qty without orders cannot be reconstructed either way.
                obe.aggr_qty = crate::types::RawQty::default();
            }
            *res = UpdateEffect::Error;
        }
        if cx.strict && !check_entry::<K, R>(obe, slots, cx.qt, cx.with_frac, true) {
            error!(
                "update {}: {}: px={px}: aggregated qty disagrees with the order chain",
                cx.instr.symbol(),
                cx.side_name()
            );
            *res = UpdateEffect::Error;
        }
    }
}

impl DenseSide {
    /// Dense-representation update: direct slot indexing by price-step
    /// offset from the current best.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply<K: KindTag, R: QtyRepr>(
        &mut self,
        cx: UpdateCx<'_>,
        best_px: &mut Price,
        orders: &mut OrderSlots,
        action: UpdateAction,
        px: Price,
        qty: Qty<K, R>,
        order_idx: Option<u32>,
    ) -> Result<UpdateEffect, BookError> {
        let nl = self.entries.len() as i32;
        let mut res = UpdateEffect::L2; // made more precise below
        let new_qty: Qty<K, R>;
        let prev_qty: Qty<K, R>;
        let s: i32;

        if self.best < 0 {
            // This side is empty yet.
            debug_assert!(!best_px.is_finite() && self.worst < 0);
            new_qty = verify_qty(&cx, qty, px);
            prev_qty = Qty::zero();
            if new_qty.is_pos() {
                px_step_multiple(cx.instr, cx.relaxed, px.value())?;
                // The initial price lands mid-array and becomes the best;
                // no relation to the other side is assumed or created.
                self.best = nl / 2;
                self.worst = self.best;
                *best_px = px;
                s = self.best;
                res = UpdateEffect::L1Px;
            } else {
                warn!(
                    "update {}: {}: delete on an empty side",
                    cx.instr.symbol(),
                    cx.side_name()
                );
                return Ok(UpdateEffect::None);
            }
        } else {
            s = self.best + px_step_multiple(cx.instr, cx.relaxed, px - *best_px)?;
            if s < 0 || s >= nl {
                // Beyond all allocated levels. Expected (and silent) in
                // snapshots-only feeds; suspicious otherwise.
                if cx.snapshots_only {
                    return Ok(UpdateEffect::None);
                }
                warn!(
                    "update {}: {}: px={px} best={} slot={s}: out of range",
                    cx.instr.symbol(),
                    cx.side_name(),
                    *best_px
                );
                return Ok(if cx.relaxed {
                    UpdateEffect::None
                } else {
                    UpdateEffect::Error
                });
            }
            prev_qty = if cx.with_orders {
                self.entries[s as usize].qty(cx.qt, cx.with_frac)
            } else {
                Qty::zero()
            };
            new_qty = verify_qty(&cx, prev_qty + qty, px);

            if (cx.is_bid && s > self.best) || (!cx.is_bid && s < self.best) {
                // Better than the current L1: a new best level, so the
                // previous qty there must have been zero.
                debug_assert!(prev_qty.is_zero());
                if new_qty.is_zero() {
                    warn!(
                        "update {}: {}: delete beyond L1 at px={px}",
                        cx.instr.symbol(),
                        cx.side_name()
                    );
                    return Ok(UpdateEffect::None);
                }
                self.best = s;
                *best_px = px;
                res = UpdateEffect::L1Px;
            } else if s == self.best {
                debug_assert!(!cx.with_orders || prev_qty.is_pos());
                if new_qty.is_zero() {
                    // The best level is being removed entirely; scan
                    // inward for the next populated one.
                    res = UpdateEffect::L1Px;
                    let px_step = cx.instr.px_step();
                    let mut found = false;
                    let mut i = s + if cx.is_bid { -1 } else { 1 };
                    while i >= 0 && i < nl {
                        if !self.entries[i as usize].is_empty() {
                            self.best = i;
                            *best_px += f64::from(i - s) * px_step;
                            found = true;
                            break;
                        }
                        i += if cx.is_bid { -1 } else { 1 };
                    }
                    if !found {
                        self.best = -1;
                        self.worst = -1;
                        *best_px = Price::empty();
                    }
                } else {
                    res = UpdateEffect::L1Qty;
                }
            } else {
                // Plain L2 update; only the worst index can move.
                if (cx.is_bid && s < self.worst) || (!cx.is_bid && s > self.worst) {
                    self.worst = s;
                }
            }
        }

        let was_empty = self.entries[s as usize].is_empty();
        update_entry(
            &cx,
            action,
            px,
            new_qty,
            qty,
            order_idx,
            &mut self.entries[s as usize],
            orders,
            &mut res,
        );

        // Depth accounting tracks populated-level transitions, once all
        // indices are settled.
        if !was_empty && self.entries[s as usize].is_empty() {
            self.decrement_depth(cx.is_bid, best_px)?;
        } else if was_empty && !self.entries[s as usize].is_empty() {
            self.increment_depth(cx.is_bid, cx.with_orders, cx.max_depth, best_px)?;
        }

        debug_assert!(
            (self.best == -1 && !best_px.is_finite() && self.worst == -1)
                || (self.best >= 0
                    && self.best < nl
                    && best_px.is_finite()
                    && !self.entries[self.best as usize].is_empty())
        );
        Ok(res)
    }

    /// A populated level appeared. For depth-capped aggregate books,
    /// exceeding the cap deletes the worst level again.
    fn increment_depth(
        &mut self,
        is_bid: bool,
        with_orders: bool,
        max_depth: u32,
        best_px: &mut Price,
    ) -> Result<(), BookError> {
        self.depth += 1;
        if max_depth == 0 || self.depth <= max_depth {
            return Ok(());
        }
        // Depth cap exceeded; incompatible with an order log (enforced
        // at construction).
        debug_assert!(!with_orders && self.depth == max_depth + 1);
        self.entries[self.worst as usize] = BookEntry::default();
        self.worst += if is_bid { 1 } else { -1 };
        self.depth -= 1;

        while (is_bid && self.worst <= self.best) || (!is_bid && self.worst >= self.best) {
            if !self.entries[self.worst as usize].is_empty() {
                break;
            }
            self.worst += if is_bid { 1 } else { -1 };
        }
        if (is_bid && self.worst > self.best) || (!is_bid && self.worst < self.best) {
            // The side cannot be empty right after an insertion; empty it
            // anyway and report the corruption.
            let side = if is_bid { Side::Bid } else { Side::Ask };
            self.reset_indices();
            *best_px = Price::empty();
            return Err(BookError::SideCorrupt {
                side,
                message: "side unexpectedly empty while trimming to max depth".into(),
            });
        }
        Ok(())
    }

    /// A populated level vanished.
    fn decrement_depth(&mut self, is_bid: bool, best_px: &mut Price) -> Result<(), BookError> {
        let side = if is_bid { Side::Bid } else { Side::Ask };
        if self.depth == 0 {
            return Err(BookError::DepthUnderflow { side });
        }
        self.depth -= 1;
        if self.depth == 0 && self.best != -1 {
            self.reset_indices();
            *best_px = Price::empty();
            return Err(BookError::SideCorrupt {
                side,
                message: "depth reached zero on a non-empty side".into(),
            });
        }
        Ok(())
    }
}

impl SparseSide {
    /// Sparse-representation update: levels are inserted on first
    /// non-zero quantity and erased when emptied.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply<K: KindTag, R: QtyRepr>(
        &mut self,
        cx: UpdateCx<'_>,
        best_px: &mut Price,
        orders: &mut OrderSlots,
        action: UpdateAction,
        px: Price,
        qty: Qty<K, R>,
        order_idx: Option<u32>,
    ) -> Result<UpdateEffect, BookError> {
        let key = PxKey::from_px(px);
        let mut res = UpdateEffect::L2;
        let new_qty: Qty<K, R>;

        if let Some(entry) = self.map.get(&key) {
            let prev: Qty<K, R> = entry.qty(cx.qt, cx.with_frac);
            new_qty = verify_qty(
                &cx,
                if cx.with_orders { prev + qty } else { qty },
                px,
            );
            if self.best_key(cx.is_bid) == Some(key) && new_qty != prev {
                res = UpdateEffect::L1Qty;
            }
        } else {
            new_qty = verify_qty(&cx, qty, px);
            if !new_qty.is_pos() {
                warn!(
                    "update {}: {}: delete for non-existent px={px}",
                    cx.instr.symbol(),
                    cx.side_name()
                );
                return Ok(UpdateEffect::None);
            }
            self.map.insert(key, BookEntry::default());
            if self.best_key(cx.is_bid) == Some(key) {
                res = UpdateEffect::L1Px;
            }
        }

        let was_best = self.best_key(cx.is_bid) == Some(key);
        let Some(entry) = self.map.get_mut(&key) else {
            return Ok(res);
        };
        update_entry(&cx, action, px, new_qty, qty, order_idx, entry, orders, &mut res);

        if entry.is_empty() {
            self.map.remove(&key);
            if was_best && res != UpdateEffect::Error {
                res = UpdateEffect::L1Px;
            }
        }

        // Re-derive the cached best price; cheap and always safe.
        *best_px = self
            .best_key(cx.is_bid)
            .map(PxKey::px)
            .unwrap_or_else(Price::empty);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::book::{BookConfig, BookRepr, OrderBook};
    use crate::types::{Contracts, Instrument};
    use std::sync::Arc;

    fn instr() -> Arc<Instrument> {
        Arc::new(Instrument::new("TEST", 1, 0.01, 1.0, 1.0).unwrap())
    }

    fn dense_book(cfg: BookConfig) -> OrderBook {
        OrderBook::new(instr(), cfg).unwrap()
    }

    fn cfg_no_rpt() -> BookConfig {
        BookConfig {
            total_levels: 101,
            with_rpt_seqs: false,
            ..BookConfig::default()
        }
    }

    fn upd(
        book: &mut OrderBook,
        side: Side,
        action: UpdateAction,
        px: f64,
        qty: i64,
        seq: SeqNum,
    ) -> Result<UpdateEffect, BookError> {
        book.update::<Contracts, i64>(
            UpdateMode::Incremental,
            side,
            action,
            Price::new(px),
            Qty::new(qty),
            seq,
            seq,
            None,
        )
    }

    #[test]
    fn test_first_updates_set_l1() {
        // Price step 0.01, dense 101 levels; the first touched price
        // becomes the array center.
        let mut book = dense_book(cfg_no_rpt());
        let e1 = upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        let e2 = upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 5, 1).unwrap();
        assert_eq!(e1, UpdateEffect::L1Px);
        assert_eq!(e2, UpdateEffect::L1Px);
        assert_eq!(book.best_bid_qty::<Contracts, i64>().raw(), 10);
        assert_eq!(book.best_ask_qty::<Contracts, i64>().raw(), 5);
        assert!(book.is_consistent());
    }

    #[test]
    fn test_effect_classification_dense() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 100.00, 10, 1).unwrap();
        // Deeper level: L2.
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.98, 7, 2).unwrap();
        assert_eq!(e, UpdateEffect::L2);
        // Qty change at L1: L1Qty.
        let e = upd(&mut book, Side::Bid, UpdateAction::Change, 100.00, 15, 3).unwrap();
        assert_eq!(e, UpdateEffect::L1Qty);
        // Better price: L1Px.
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 100.01, 3, 4).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert_eq!(book.best_bid_px(), Price::new(100.01));
    }

    #[test]
    fn test_delete_best_scans_inward() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 100.00, 10, 1).unwrap();
        upd(&mut book, Side::Bid, UpdateAction::New, 99.97, 4, 2).unwrap();
        let e = upd(&mut book, Side::Bid, UpdateAction::Delete, 100.00, 0, 3).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert_eq!(book.best_bid_px(), Price::new(99.97));
        assert_eq!(book.best_bid_qty::<Contracts, i64>().raw(), 4);

        // Removing the last level empties the side.
        let e = upd(&mut book, Side::Bid, UpdateAction::Delete, 99.97, 0, 4).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert!(!book.best_bid_px().is_finite());
    }

    #[test]
    fn test_delete_on_empty_side_is_noop() {
        let mut book = dense_book(cfg_no_rpt());
        let e = upd(&mut book, Side::Ask, UpdateAction::Delete, 100.00, 0, 1).unwrap();
        assert_eq!(e, UpdateEffect::None);
    }

    #[test]
    fn test_stale_seq_swallowed_then_strict_errors() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 100.00, 10, 5).unwrap();
        // Stale: silently ignored, book untouched.
        let e = upd(&mut book, Side::Bid, UpdateAction::Change, 100.00, 99, 4).unwrap();
        assert_eq!(e, UpdateEffect::None);
        assert_eq!(book.best_bid_qty::<Contracts, i64>().raw(), 10);
        // Counter still advanced to the max seen.
        assert_eq!(book.last_update_seq_num(), 5);

        let mut strict = dense_book(BookConfig {
            strict: true,
            ..cfg_no_rpt()
        });
        upd(&mut strict, Side::Bid, UpdateAction::New, 100.00, 10, 5).unwrap();
        let err = upd(&mut strict, Side::Bid, UpdateAction::Change, 100.00, 99, 4);
        assert!(matches!(err, Err(BookError::SequenceInversion { .. })));
    }

    #[test]
    fn test_rpt_seq_continuity() {
        let mut book = dense_book(BookConfig {
            total_levels: 101,
            cont_rpt_seqs: true,
            ..BookConfig::default()
        });
        let mut u = |px: f64, qty: i64, rpt: SeqNum, seq: SeqNum| {
            book.update::<Contracts, i64>(
                UpdateMode::Incremental,
                Side::Bid,
                UpdateAction::New,
                Price::new(px),
                Qty::new(qty),
                rpt,
                seq,
                None,
            )
            .unwrap()
        };
        assert_eq!(u(100.00, 10, 1, 1), UpdateEffect::L1Px);
        assert_eq!(u(100.01, 5, 2, 2), UpdateEffect::L1Px);
        // A gap in a continuous rpt-seq stream is swallowed.
        assert_eq!(u(100.02, 5, 4, 3), UpdateEffect::None);
    }

    #[test]
    fn test_init_mode_reentry_rejected() {
        let mut book = dense_book(cfg_no_rpt());
        let r = book.update::<Contracts, i64>(
            UpdateMode::Init,
            Side::Bid,
            UpdateAction::New,
            Price::new(100.0),
            Qty::new(1),
            1,
            1,
            None,
        );
        assert!(r.is_ok());
        upd(&mut book, Side::Bid, UpdateAction::Change, 100.00, 5, 2).unwrap();
        let r = book.update::<Contracts, i64>(
            UpdateMode::Init,
            Side::Bid,
            UpdateAction::New,
            Price::new(100.0),
            Qty::new(1),
            3,
            3,
            None,
        );
        assert!(matches!(r, Err(BookError::InitModeReentry)));
    }

    #[test]
    fn test_off_step_price_rejected_and_relaxed() {
        let mut book = dense_book(cfg_no_rpt());
        let r = upd(&mut book, Side::Bid, UpdateAction::New, 100.005, 10, 1);
        assert!(matches!(r, Err(BookError::OffStepPrice { .. })));

        let mut relaxed = dense_book(BookConfig {
            relaxed: true,
            ..cfg_no_rpt()
        });
        // Rounds to the nearest step instead.
        let e = upd(&mut relaxed, Side::Bid, UpdateAction::New, 100.005, 10, 1).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
    }

    #[test]
    fn test_out_of_range_dense() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 100.00, 10, 1).unwrap();
        // 101 levels centered at 100.00: +-0.50 reachable, +10.00 is not.
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 110.00, 5, 2).unwrap();
        assert_eq!(e, UpdateEffect::Error);

        let mut relaxed = dense_book(BookConfig {
            relaxed: true,
            ..cfg_no_rpt()
        });
        upd(&mut relaxed, Side::Bid, UpdateAction::New, 100.00, 10, 1).unwrap();
        let e = upd(&mut relaxed, Side::Bid, UpdateAction::New, 110.00, 5, 2).unwrap();
        assert_eq!(e, UpdateEffect::None);
    }

    #[test]
    fn test_aggregate_action_qty_mismatch() {
        let mut book = dense_book(cfg_no_rpt());
        // New with zero qty on an aggregated book is malformed.
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 100.00, 0, 1).unwrap();
        assert_eq!(e, UpdateEffect::Error);
    }

    #[test]
    fn test_max_depth_trims_worst() {
        let mut book = dense_book(BookConfig {
            max_depth: 2,
            ..cfg_no_rpt()
        });
        upd(&mut book, Side::Ask, UpdateAction::New, 100.00, 1, 1).unwrap();
        upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 2, 2).unwrap();
        // Third level exceeds the cap; the worst (highest ask) goes.
        upd(&mut book, Side::Ask, UpdateAction::New, 100.02, 3, 3).unwrap();
        let mut seen = Vec::new();
        book.traverse(Side::Ask, 0, |_, px, _| {
            seen.push(px);
            true
        });
        assert_eq!(seen, vec![Price::new(100.00), Price::new(100.01)]);
    }

    #[test]
    fn test_sparse_update_flow() {
        let mut book = OrderBook::new(
            instr(),
            BookConfig {
                repr: BookRepr::Sparse,
                with_rpt_seqs: false,
                ..BookConfig::default()
            },
        )
        .unwrap();
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.95, 4, 2).unwrap();
        assert_eq!(e, UpdateEffect::L2);
        let e = upd(&mut book, Side::Bid, UpdateAction::Change, 99.99, 12, 3).unwrap();
        assert_eq!(e, UpdateEffect::L1Qty);
        let e = upd(&mut book, Side::Bid, UpdateAction::Delete, 99.99, 0, 4).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert_eq!(book.best_bid_px(), Price::new(99.95));
        // Sparse prices need not sit on a step grid.
        let e = upd(&mut book, Side::Ask, UpdateAction::New, 100.007, 5, 5).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert_eq!(book.best_ask_px(), Price::new(100.007));
    }

    #[test]
    fn test_sparse_delete_nonexistent() {
        let mut book = OrderBook::new(
            instr(),
            BookConfig {
                repr: BookRepr::Sparse,
                with_rpt_seqs: false,
                ..BookConfig::default()
            },
        )
        .unwrap();
        let e = upd(&mut book, Side::Bid, UpdateAction::Delete, 99.99, 0, 1).unwrap();
        assert_eq!(e, UpdateEffect::None);
    }

    #[test]
    fn test_negative_qty_clamped() {
        let mut book = dense_book(BookConfig {
            max_orders: 64,
            ..cfg_no_rpt()
        });
        // Orders-log book: deltas per order.
        let mut u = |action, px: f64, dq: i64, seq: SeqNum, oid: u64| {
            book.update::<Contracts, i64>(
                UpdateMode::Incremental,
                Side::Bid,
                action,
                Price::new(px),
                Qty::new(dq),
                seq,
                seq,
                Some(oid),
            )
            .unwrap()
        };
        u(UpdateAction::New, 100.00, 10, 1, 1);
        // Removal larger than the level holds clamps to zero.
        let e = u(UpdateAction::Delete, 100.00, -15, 2, 1);
        assert_eq!(e, UpdateEffect::L1Px);
        assert!(!book.best_bid_px().is_finite());
    }

    fn mbo_upd(
        book: &mut OrderBook,
        action: UpdateAction,
        px: f64,
        dq: i64,
        seq: SeqNum,
        oid: u64,
    ) -> UpdateEffect {
        book.update::<Contracts, i64>(
            UpdateMode::Incremental,
            Side::Ask,
            action,
            Price::new(px),
            Qty::new(dq),
            seq,
            seq,
            Some(oid),
        )
        .unwrap()
    }

    #[test]
    fn test_orders_log_delta_semantics() {
        let mut book = dense_book(BookConfig {
            max_orders: 64,
            ..cfg_no_rpt()
        });
        let u = mbo_upd;
        u(&mut book, UpdateAction::New, 100.00, 10, 1, 1);
        u(&mut book, UpdateAction::New, 100.00, 20, 2, 2);
        assert_eq!(book.best_ask_qty::<Contracts, i64>().raw(), 30);
        assert_eq!(book.best_ask_n_orders(), 2);

        // Change shrinks order 2 by 5.
        u(&mut book, UpdateAction::Change, 100.00, -5, 3, 2);
        assert_eq!(book.best_ask_qty::<Contracts, i64>().raw(), 25);
        assert_eq!(book.best_ask_n_orders(), 2);

        // Delete order 1 entirely.
        u(&mut book, UpdateAction::Delete, 100.00, -10, 4, 1);
        assert_eq!(book.best_ask_qty::<Contracts, i64>().raw(), 15);
        assert_eq!(book.best_ask_n_orders(), 1);

        // Zero delta is a no-op.
        let e = u(&mut book, UpdateAction::Change, 100.00, 0, 5, 2);
        assert_eq!(e, UpdateEffect::None);
    }

    #[test]
    fn test_orders_log_aggregation_invariant() {
        let mut book = dense_book(BookConfig {
            max_orders: 64,
            ..cfg_no_rpt()
        });
        let ids = [1u64, 2, 3];
        let qtys = [5i64, 7, 11];
        for (i, (&id, &q)) in ids.iter().zip(&qtys).enumerate() {
            book.update::<Contracts, i64>(
                UpdateMode::Incremental,
                Side::Bid,
                UpdateAction::New,
                Price::new(100.00),
                Qty::new(q),
                (i + 1) as SeqNum,
                (i + 1) as SeqNum,
                Some(id),
            )
            .unwrap();
        }
        let entry = book.best_bid_entry();
        assert_eq!(entry.n_orders(), 3);
        assert_eq!(
            entry
                .qty::<Contracts, i64>(book.qty_kind(), book.with_frac())
                .raw(),
            23
        );
        // Individual slots are addressable by id.
        let slot = book.order_info(2).unwrap();
        assert_eq!(slot.qty::<Contracts, i64>(book.qty_kind(), book.with_frac()).raw(), 7);
        assert_eq!(slot.px(), Price::new(100.00));
    }

    #[test]
    fn test_delete_for_foreign_order_reports_error() {
        let mut book = dense_book(BookConfig {
            max_orders: 64,
            ..cfg_no_rpt()
        });
        book.update::<Contracts, i64>(
            UpdateMode::Incremental,
            Side::Bid,
            UpdateAction::New,
            Price::new(100.00),
            Qty::new(10),
            1,
            1,
            Some(1),
        )
        .unwrap();
        // Order 2 never existed at this level; the delta still lands on
        // the aggregate, but the chain stays intact and the effect is
        // Error.
        let e = book
            .update::<Contracts, i64>(
                UpdateMode::Incremental,
                Side::Bid,
                UpdateAction::Delete,
                Price::new(100.00),
                Qty::new(-3),
                2,
                2,
                Some(2),
            )
            .unwrap();
        assert_eq!(e, UpdateEffect::Error);
    }

    #[test]
    fn test_clear_and_invalidate_reset_state() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 5, 2).unwrap();

        let e = book.clear(false, 3, 3).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert!(!book.best_bid_px().is_finite());
        assert!(!book.best_ask_px().is_finite());
        // Clearing an already-empty book changes nothing.
        assert_eq!(book.clear(false, 4, 4).unwrap(), UpdateEffect::None);

        book.set_initialised();
        book.invalidate();
        assert!(!book.is_initialised());
        assert_eq!(book.last_update_seq_num(), -1);
        // A fresh update sequence replays cleanly after invalidation.
        let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        assert_eq!(e, UpdateEffect::L1Px);
        assert_eq!(book.best_bid_qty::<Contracts, i64>().raw(), 10);
    }

    #[test]
    fn test_correct_book_discards_stale_side() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Ask, UpdateAction::New, 100.00, 5, 1).unwrap();
        // The bid side updates later and crosses the ask.
        upd(&mut book, Side::Bid, UpdateAction::New, 100.02, 10, 2).unwrap();
        assert!(!book.is_consistent());

        // The ask is the stalest side: it gets corrected.
        let sides = book.correct_book();
        assert_eq!(sides, UpdatedSides::ASK);
        assert!(book.is_consistent());
        assert_eq!(book.best_bid_px(), Price::new(100.02));
        // The crossed ask level at 100.00 was discarded entirely here.
        assert!(!book.best_ask_px().is_finite());
    }

    #[test]
    fn test_correct_book_noop_when_consistent() {
        let mut book = dense_book(cfg_no_rpt());
        upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 5, 2).unwrap();
        assert_eq!(book.correct_book(), UpdatedSides::empty());
    }

    #[test]
    fn test_is_ready_needs_both_sides_and_flag() {
        let mut book = dense_book(cfg_no_rpt());
        assert!(!book.is_ready());
        upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1).unwrap();
        upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 5, 2).unwrap();
        assert!(!book.is_ready()); // not declared initialised yet
        book.set_initialised();
        assert!(book.is_ready());
    }
}
