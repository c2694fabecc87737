//! One application-level request (place/modify/cancel) within an
//! order's chain.

use super::error::OrderError;
use super::status::{RequestKind, RequestStatus};
use crate::types::{KindTag, OrderId, Price, Qty, QtyKind, QtyRepr, RawQty, SeqNum, Ts};

/// Lifecycle timestamps of one request. Market-data and creation times
/// are fixed at construction; the rest get stamped as the request moves
/// through the connector and the exchange.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqTimes {
    /// Exchange time of the market-data event that triggered this request.
    pub md_exch: Ts,
    /// When the triggering event reached the connector.
    pub md_conn: Ts,
    /// When the triggering event reached the strategy.
    pub md_strat: Ts,
    /// When the strategy created the request.
    pub created: Ts,
    /// When the connector sent it to the exchange.
    pub sent: Ts,
    /// Exchange-side confirmation time.
    pub conf_exch: Ts,
    /// When the confirmation reached the connector.
    pub conf_conn: Ts,
    /// Exchange-side fill/cancel/fail time.
    pub end_exch: Ts,
    /// When that end event reached the connector.
    pub end_conn: Ts,
}

/// A request record. Identity fields are fixed at construction; state
/// fields (status, leaves qty, stamps, exchange-assigned ids) mutate as
/// the exchange responds.
///
/// Chains are owned by [`ActiveOrder`] in chronological order; a request
/// is normally built through [`ActiveOrder::push_request`], which also
/// validates the chain-level rules.
///
/// [`ActiveOrder`]: crate::lifecycle::ActiveOrder
/// [`ActiveOrder::push_request`]: crate::lifecycle::ActiveOrder::push_request
#[derive(Clone, Debug)]
pub struct OrderRequest {
    pub(crate) id: OrderId,
    pub(crate) linked_id: OrderId,
    pub(crate) orig_id: OrderId,
    pub(crate) qt: QtyKind,
    pub(crate) with_frac: bool,
    pub(crate) kind: RequestKind,
    pub(crate) px: Price,
    pub(crate) is_aggr: bool,
    pub(crate) qty: RawQty,
    pub(crate) qty_show: RawQty,
    pub(crate) qty_min: RawQty,
    pub(crate) peg_side: bool,
    pub(crate) peg_offset: f64,

    pub(crate) seq_num: SeqNum,
    pub(crate) leaves_qty: RawQty,
    pub(crate) status: RequestStatus,
    pub(crate) throttle_until: Ts,
    pub(crate) will_fail: bool,
    pub(crate) prob_filled: bool,
    pub(crate) exch_ord_id: String,
    pub(crate) md_entry_id: String,
    pub(crate) times: ReqTimes,
}

impl OrderRequest {
    /// Build and validate a request record.
    ///
    /// Rules: the id is positive and strictly above `orig_id`;
    /// `orig_id == 0` exactly for placement-like kinds; cancel-like
    /// kinds carry the zero/sentinel quantity, everything else a
    /// positive one; for placement-like kinds the shown and minimum
    /// quantities are non-negative and bounded by the full quantity.
    #[allow(clippy::too_many_arguments)]
    pub fn new<K: KindTag, R: QtyRepr>(
        id: OrderId,
        orig_id: OrderId,
        kind: RequestKind,
        px: Price,
        is_aggr: bool,
        qty: Qty<K, R>,
        qty_show: Qty<K, R>,
        qty_min: Qty<K, R>,
        peg_side: bool,
        peg_offset: f64,
        ts_md_exch: Ts,
        ts_md_conn: Ts,
        ts_md_strat: Ts,
        ts_created: Ts,
    ) -> Result<Self, OrderError> {
        let is_new = kind.is_new_kind();
        let is_cxl = kind.is_cancel_kind();

        if id == 0 || id <= orig_id || (orig_id == 0) != is_new {
            return Err(OrderError::BadRequestId { id, orig_id });
        }
        if (!is_cxl && !qty.is_pos()) || (is_cxl && !qty.is_special0()) {
            return Err(OrderError::InvalidArgument {
                message: format!("request {id}: qty {qty} invalid for kind {kind}"),
            });
        }
        if is_new
            && (qty_show.is_neg() || qty_show > qty || qty_min.is_neg() || qty_min > qty)
        {
            return Err(OrderError::InvalidArgument {
                message: format!(
                    "request {id}: inconsistent qtys: qty={qty}, show={qty_show}, min={qty_min}"
                ),
            });
        }
        // Cancels are non-aggressive by definition.
        debug_assert!(!(is_cxl && is_aggr));

        Ok(OrderRequest {
            id,
            linked_id: 0,
            orig_id,
            qt: K::KIND,
            with_frac: R::IS_FRAC,
            kind,
            px,
            is_aggr,
            qty: RawQty::store(qty),
            qty_show: RawQty::store(qty_show),
            qty_min: RawQty::store(qty_min),
            peg_side,
            peg_offset,
            seq_num: 0,
            leaves_qty: RawQty::store(qty), // nothing filled yet
            status: RequestStatus::Indicated,
            throttle_until: Ts::EMPTY,
            will_fail: false,
            prob_filled: false,
            exch_ord_id: String::new(),
            md_entry_id: String::new(),
            times: ReqTimes {
                md_exch: ts_md_exch,
                md_conn: ts_md_conn,
                md_strat: ts_md_strat,
                created: ts_created,
                ..ReqTimes::default()
            },
        })
    }

    //-----------------------------------------------------------------//
    // Identity                                                         //
    //-----------------------------------------------------------------//

    /// Request id (the client order id in most protocols).
    #[inline]
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Target request id; 0 for placement-like kinds.
    #[inline]
    pub fn orig_id(&self) -> OrderId {
        self.orig_id
    }

    /// Reserved for multi-legged orders.
    #[inline]
    pub fn linked_id(&self) -> OrderId {
        self.linked_id
    }

    #[inline]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Limit price; NaN for cancels and market-style requests.
    #[inline]
    pub fn px(&self) -> Price {
        self.px
    }

    /// Was this request intended to trade aggressively?
    #[inline]
    pub fn is_aggressive(&self) -> bool {
        self.is_aggr
    }

    /// Peg to this side (`true`) or the opposite one.
    #[inline]
    pub fn peg_side(&self) -> bool {
        self.peg_side
    }

    /// Peg offset; NaN when unpegged.
    #[inline]
    pub fn peg_offset(&self) -> f64 {
        self.peg_offset
    }

    //-----------------------------------------------------------------//
    // Quantities (kind-checked readback)                               //
    //-----------------------------------------------------------------//

    /// Original quantity of this request (the cancel sentinel for
    /// cancel-like kinds).
    #[inline]
    pub fn qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        self.qty.load(self.qt, self.with_frac)
    }

    /// Shown (iceberg display) quantity; 0 when unused.
    #[inline]
    pub fn qty_show<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        self.qty_show.load(self.qt, self.with_frac)
    }

    /// Minimum execution quantity; 0 when unused.
    #[inline]
    pub fn qty_min<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        self.qty_min.load(self.qt, self.with_frac)
    }

    /// Quantity not yet filled.
    #[inline]
    pub fn leaves_qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        self.leaves_qty.load(self.qt, self.with_frac)
    }

    /// Update the unfilled quantity as fills arrive.
    pub fn set_leaves_qty<K: KindTag, R: QtyRepr>(&mut self, leaves: Qty<K, R>) {
        debug_assert!(!leaves.is_neg());
        self.leaves_qty = RawQty::store(leaves);
    }

    //-----------------------------------------------------------------//
    // State                                                            //
    //-----------------------------------------------------------------//

    #[inline]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Terminal (no further transitions possible)?
    #[inline]
    pub fn is_inactive(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advance the status.
    pub fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    /// Wire sequence number; 0 until the request is actually sent.
    #[inline]
    pub fn seq_num(&self) -> SeqNum {
        self.seq_num
    }

    /// Record the sequence number assigned at send time.
    pub fn assign_seq_num(&mut self, seq_num: SeqNum) {
        self.seq_num = seq_num;
    }

    /// Known to be doomed (e.g. a protocol-level nack is in flight) but
    /// not failed yet.
    #[inline]
    pub fn will_fail(&self) -> bool {
        self.will_fail
    }

    pub fn set_will_fail(&mut self, v: bool) {
        self.will_fail = v;
    }

    /// Probably filled, final report pending.
    #[inline]
    pub fn prob_filled(&self) -> bool {
        self.prob_filled
    }

    pub fn set_prob_filled(&mut self, v: bool) {
        self.prob_filled = v;
    }

    /// Held back by throttling until this time (empty when not held).
    #[inline]
    pub fn throttle_until(&self) -> Ts {
        self.throttle_until
    }

    pub fn set_throttle_until(&mut self, until: Ts) {
        self.throttle_until = until;
    }

    /// Exchange-assigned order id; empty until confirmed.
    #[inline]
    pub fn exch_ord_id(&self) -> &str {
        &self.exch_ord_id
    }

    pub fn set_exch_ord_id(&mut self, id: &str) {
        self.exch_ord_id = id.to_string();
    }

    /// Market-data entry id of the resting order; empty until known.
    #[inline]
    pub fn md_entry_id(&self) -> &str {
        &self.md_entry_id
    }

    pub fn set_md_entry_id(&mut self, id: &str) {
        self.md_entry_id = id.to_string();
    }

    //-----------------------------------------------------------------//
    // Timestamps                                                       //
    //-----------------------------------------------------------------//

    #[inline]
    pub fn times(&self) -> &ReqTimes {
        &self.times
    }

    /// Stamp the send time.
    pub fn stamp_sent(&mut self, ts: Ts) {
        self.times.sent = ts;
    }

    /// Stamp exchange and connector confirmation times.
    pub fn stamp_confirmed(&mut self, exch: Ts, conn: Ts) {
        self.times.conf_exch = exch;
        self.times.conf_conn = conn;
    }

    /// Stamp exchange and connector end-of-life times.
    pub fn stamp_ended(&mut self, exch: Ts, conn: Ts) {
        self.times.end_exch = exch;
        self.times.end_conn = conn;
    }

    /// Internal latency in microseconds: triggering event reaching the
    /// connector to the request leaving it. 0 when either stamp is
    /// missing.
    pub fn internal_latency(&self) -> i64 {
        if self.times.sent.is_empty() || self.times.md_conn.is_empty() {
            0
        } else {
            self.times.sent.micros_since(self.times.md_conn)
        }
    }
}
