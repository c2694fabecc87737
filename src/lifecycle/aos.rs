//! The per-order chain owner: one [`ActiveOrder`] groups every request
//! and every fill belonging to a single client order over its life.

use super::error::OrderError;
use super::req::OrderRequest;
use super::status::{OrderKind, RequestKind, RequestStatus, TimeInForce};
use super::trade::Trade;
use crate::types::{
    AnyKind, ConnectorId, Instrument, KindTag, OrderId, Qty, QtyKind, QtyRepr, RawQty, Side,
    StrategyId,
};
use std::sync::Arc;
use tracing::trace;

/// Equivalence class of requests for one client order.
///
/// The typical life is place, zero or more modifies, then a fill or a
/// cancel; each step appends an [`OrderRequest`] to the chronological
/// chain this struct owns. Orders are created once and never destroyed
/// individually — the owning connector reclaims whole arenas of them at
/// end of day, so nothing here ever unlinks.
///
/// The terminal-state queries walk the chain backward from the newest
/// request; a chain that contradicts itself surfaces as
/// [`OrderError::ChainCorrupt`] rather than a silent `false`, because
/// wrong fill accounting is worse than stopping.
#[derive(Debug)]
pub struct ActiveOrder {
    id: OrderId,
    instr: Arc<Instrument>,
    omc: ConnectorId,
    side: Side,
    order_kind: OrderKind,
    time_in_force: TimeInForce,
    expire_date: u32,
    qt: QtyKind,
    with_frac: bool,
    is_iceberg: bool,
    strategy: StrategyId,

    reqs: Vec<OrderRequest>,
    trades: Vec<Trade>,
    is_inactive: bool,
    cxl_pending: Option<OrderId>,
    n_fails: u32,
    cum_filled: RawQty,
}

impl ActiveOrder {
    /// Create the chain owner for a newly submitted order. `id` is the
    /// request id of the first placement.
    ///
    /// Market orders are immediate-or-cancel by definition: an explicit
    /// conflicting time-in-force is rejected, an undefined one is
    /// resolved to IOC.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        qt: QtyKind,
        with_frac: bool,
        strategy: StrategyId,
        id: OrderId,
        instr: Arc<Instrument>,
        omc: ConnectorId,
        side: Side,
        order_kind: OrderKind,
        is_iceberg: bool,
        time_in_force: TimeInForce,
        expire_date: u32,
    ) -> Result<Self, OrderError> {
        if id == 0 {
            return Err(OrderError::InvalidArgument {
                message: "order id must be positive".into(),
            });
        }
        let time_in_force = if order_kind == OrderKind::Market {
            match time_in_force {
                TimeInForce::ImmedOrCancel | TimeInForce::Undefined => TimeInForce::ImmedOrCancel,
                other => {
                    return Err(OrderError::InvalidArgument {
                        message: format!(
                            "time-in-force {other} is incompatible with a market order"
                        ),
                    });
                }
            }
        } else {
            time_in_force
        };
        Ok(ActiveOrder {
            id,
            instr,
            omc,
            side,
            order_kind,
            time_in_force,
            expire_date,
            qt,
            with_frac,
            is_iceberg,
            strategy,
            reqs: Vec::new(),
            trades: Vec::new(),
            is_inactive: false,
            cxl_pending: None,
            n_fails: 0,
            cum_filled: RawQty::default(),
        })
    }

    //-----------------------------------------------------------------//
    // Identity                                                         //
    //-----------------------------------------------------------------//

    #[inline]
    pub fn id(&self) -> OrderId {
        self.id
    }

    #[inline]
    pub fn instr(&self) -> &Instrument {
        &self.instr
    }

    /// The order-management connector owning this order.
    #[inline]
    pub fn omc(&self) -> ConnectorId {
        self.omc
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn order_kind(&self) -> OrderKind {
        self.order_kind
    }

    #[inline]
    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    /// Expiry date (YYYYMMDD) for good-till-date orders, else 0.
    #[inline]
    pub fn expire_date(&self) -> u32 {
        self.expire_date
    }

    #[inline]
    pub fn qty_kind(&self) -> QtyKind {
        self.qt
    }

    #[inline]
    pub fn with_frac(&self) -> bool {
        self.with_frac
    }

    /// Submitted as an iceberg: stays one for life, whatever the
    /// quantities later become.
    #[inline]
    pub fn is_iceberg(&self) -> bool {
        self.is_iceberg
    }

    #[inline]
    pub fn strategy(&self) -> StrategyId {
        self.strategy
    }

    //-----------------------------------------------------------------//
    // Chain management                                                 //
    //-----------------------------------------------------------------//

    /// Append a request to the chain.
    ///
    /// The first request must carry a positive quantity (an order cannot
    /// start with a cancel), request ids must strictly increase along
    /// the chain, and the request's quantity typing must match the
    /// order's.
    pub fn push_request(&mut self, req: OrderRequest) -> Result<&OrderRequest, OrderError> {
        if req.qt != self.qt || req.with_frac != self.with_frac {
            return Err(OrderError::InvalidArgument {
                message: format!(
                    "order {}: request {} qty typing ({}, frac={}) differs from the order's \
                     ({}, frac={})",
                    self.id, req.id, req.qt, req.with_frac, self.qt, self.with_frac
                ),
            });
        }
        match self.reqs.last() {
            None => {
                let pos = if self.with_frac {
                    req.qty.load::<AnyKind, f64>(self.qt, true).is_pos()
                } else {
                    req.qty.load::<AnyKind, i64>(self.qt, false).is_pos()
                };
                if !pos {
                    return Err(OrderError::InvalidArgument {
                        message: format!(
                            "order {}: first request must have a positive qty",
                            self.id
                        ),
                    });
                }
            }
            Some(last) => {
                if req.id <= last.id {
                    return Err(OrderError::BadRequestId {
                        id: req.id,
                        orig_id: last.id,
                    });
                }
            }
        }
        trace!("order {}: attach request {} {}", self.id, req.id, req.kind);
        self.reqs.push(req);
        let last = self.reqs.len() - 1;
        Ok(&self.reqs[last])
    }

    /// All requests, oldest first.
    #[inline]
    pub fn reqs(&self) -> &[OrderRequest] {
        &self.reqs
    }

    /// The most ancient request, if any.
    #[inline]
    pub fn first_req(&self) -> Option<&OrderRequest> {
        self.reqs.first()
    }

    /// The most recent request, if any.
    #[inline]
    pub fn last_req(&self) -> Option<&OrderRequest> {
        self.reqs.last()
    }

    /// The most recent request, mutable (for status/stamp updates).
    #[inline]
    pub fn last_req_mut(&mut self) -> Option<&mut OrderRequest> {
        self.reqs.last_mut()
    }

    /// Look up a request by id. Ids increase strictly along the chain.
    pub fn req(&self, req_id: OrderId) -> Option<&OrderRequest> {
        self.req_pos(req_id).map(|i| &self.reqs[i])
    }

    /// Mutable request lookup by id.
    pub fn req_mut(&mut self, req_id: OrderId) -> Option<&mut OrderRequest> {
        self.req_pos(req_id).map(move |i| &mut self.reqs[i])
    }

    #[inline]
    fn req_pos(&self, req_id: OrderId) -> Option<usize> {
        self.reqs.binary_search_by_key(&req_id, |r| r.id).ok()
    }

    /// Is the request with id `req_id` pending a modify? True iff it is
    /// still active and the next chained request is a modify (or the
    /// cancel leg of an emulated modify).
    pub fn is_mod_pending(&self, req_id: OrderId) -> bool {
        let Some(pos) = self.req_pos(req_id) else {
            return false;
        };
        let Some(next) = self.reqs.get(pos + 1) else {
            return false;
        };
        debug_assert!(next.kind != RequestKind::New);
        matches!(next.kind, RequestKind::Modify | RequestKind::ModLegCancel)
            && !self.reqs[pos].is_inactive()
    }

    /// Is the request with id `req_id` pending a plain cancel? (The
    /// cancel leg of an emulated modify counts as pending-modify, not
    /// pending-cancel.)
    pub fn is_cxl_pending(&self, req_id: OrderId) -> bool {
        let Some(pos) = self.req_pos(req_id) else {
            return false;
        };
        let Some(next) = self.reqs.get(pos + 1) else {
            return false;
        };
        debug_assert!(next.kind != RequestKind::New);
        let res = next.kind == RequestKind::Cancel && !self.reqs[pos].is_inactive();
        debug_assert!(!res || self.cxl_pending.is_some());
        res
    }

    //-----------------------------------------------------------------//
    // Whole-order state                                                //
    //-----------------------------------------------------------------//

    /// Has the order reached end of life (filled, cancelled or failed)?
    #[inline]
    pub fn is_inactive(&self) -> bool {
        self.is_inactive
    }

    /// Mark the order inactive. Clears any pending-cancel marker.
    pub fn mark_inactive(&mut self) {
        self.is_inactive = true;
        self.cxl_pending = None;
    }

    /// Id of the pending cancel request, if one is in flight.
    #[inline]
    pub fn cxl_pending(&self) -> Option<OrderId> {
        self.cxl_pending
    }

    /// Record that a cancel request is in flight.
    pub fn set_cxl_pending(&mut self, req_id: OrderId) {
        self.cxl_pending = Some(req_id);
    }

    /// Number of failed requests seen on this order.
    #[inline]
    pub fn n_fails(&self) -> u32 {
        self.n_fails
    }

    /// Count one more failed request.
    pub fn add_fail(&mut self) {
        self.n_fails += 1;
    }

    //-----------------------------------------------------------------//
    // Terminal-state queries (backward chain walks)                    //
    //-----------------------------------------------------------------//

    /// Did the order end completely filled?
    ///
    /// Walks the chain backward, skipping cancel-like requests (they
    /// cannot fill): the first `Filled` wins, the first `Cancelled`
    /// loses. A walk that exhausts without meeting either is only legal
    /// when the very first request failed.
    pub fn is_filled(&self) -> Result<bool, OrderError> {
        if !self.is_inactive {
            return Ok(false);
        }
        for req in self.reqs.iter().rev() {
            if req.kind.is_cancel_kind() {
                continue;
            }
            match req.status {
                RequestStatus::Filled => return Ok(true),
                RequestStatus::Cancelled => return Ok(false),
                _ => {}
            }
        }
        self.expect_first_failed("is_filled")?;
        Ok(false)
    }

    /// Did the order end cancelled?
    ///
    /// A confirmed cancel request decides immediately; otherwise a
    /// `Cancelled` placement/modify does (mass-cancel flows produce
    /// those without a confirmed cancel of their own), and a `Filled`
    /// one decides against.
    pub fn is_cancelled(&self) -> Result<bool, OrderError> {
        if !self.is_inactive {
            return Ok(false);
        }
        for req in self.reqs.iter().rev() {
            if req.kind == RequestKind::Cancel && req.status == RequestStatus::Confirmed {
                return Ok(true);
            }
            match req.status {
                RequestStatus::Cancelled => {
                    if !matches!(
                        req.kind,
                        RequestKind::New | RequestKind::Modify | RequestKind::ModLegNew
                    ) {
                        return Err(OrderError::ChainCorrupt {
                            order_id: self.id,
                            message: format!(
                                "request {} is Cancelled but its kind is {}",
                                req.id, req.kind
                            ),
                        });
                    }
                    return Ok(true);
                }
                RequestStatus::Filled => return Ok(false),
                _ => {}
            }
        }
        self.expect_first_failed("is_cancelled")?;
        Ok(false)
    }

    /// Did the order fail outright? Only the failure of the very first
    /// request can fail the whole order.
    pub fn has_failed(&self) -> bool {
        self.is_inactive
            && self
                .first_req()
                .is_some_and(|r| r.status == RequestStatus::Failed)
    }

    fn expect_first_failed(&self, who: &str) -> Result<(), OrderError> {
        let first_failed = self
            .first_req()
            .is_some_and(|r| r.status == RequestStatus::Failed);
        if !first_failed {
            return Err(OrderError::ChainCorrupt {
                order_id: self.id,
                message: format!("{who}: expected a Failed first request, found none"),
            });
        }
        Ok(())
    }

    //-----------------------------------------------------------------//
    // Quantities                                                       //
    //-----------------------------------------------------------------//

    /// Unfilled quantity of the order: the leaves of the most recent
    /// non-cancel request (which may still be an indication). An order
    /// with no non-cancel request at all was never placed properly.
    pub fn leaves_qty<K: KindTag, R: QtyRepr>(&self) -> Result<Qty<K, R>, OrderError> {
        for req in self.reqs.iter().rev() {
            debug_assert!(req.qt == self.qt && req.with_frac == self.with_frac);
            if !req.kind.is_cancel_kind() {
                let leaves: Qty<K, R> = req.leaves_qty();
                debug_assert!(!leaves.is_neg() && req.qty::<K, R>() >= leaves);
                return Ok(leaves);
            }
        }
        Err(OrderError::ChainCorrupt {
            order_id: self.id,
            message: "leaves_qty: no non-cancel requests found".into(),
        })
    }

    /// Cumulative filled quantity, equal to the sum of the attached
    /// trades' quantities.
    pub fn cum_filled_qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        let res: Qty<K, R> = self.cum_filled.load(self.qt, self.with_frac);
        debug_assert!(!res.is_neg());
        res
    }

    //-----------------------------------------------------------------//
    // Trades                                                           //
    //-----------------------------------------------------------------//

    /// Attach one of our fills and accrue its quantity into the
    /// cumulative filled total.
    pub fn attach_trade(&mut self, trade: Trade) -> Result<(), OrderError> {
        if !trade.is_our_trade() {
            return Err(OrderError::InvalidArgument {
                message: format!(
                    "order {}: trade {} carries no originating request",
                    self.id, trade.id
                ),
            });
        }
        if trade.instr.sec_id() != self.instr.sec_id() {
            return Err(OrderError::InvalidArgument {
                message: format!(
                    "order {}: trade {} is for another instrument",
                    self.id, trade.id
                ),
            });
        }
        if trade.qt != self.qt || trade.with_frac != self.with_frac {
            return Err(OrderError::InvalidArgument {
                message: format!(
                    "order {}: trade {} qty typing differs from the order's",
                    self.id, trade.id
                ),
            });
        }
        if self.with_frac {
            let sum = self.cum_filled.load::<AnyKind, f64>(self.qt, true)
                + trade.qty.load::<AnyKind, f64>(self.qt, true);
            self.cum_filled = RawQty::store(sum);
        } else {
            let sum = self.cum_filled.load::<AnyKind, i64>(self.qt, false)
                + trade.qty.load::<AnyKind, i64>(self.qt, false);
            self.cum_filled = RawQty::store(sum);
        }
        self.trades.push(trade);
        Ok(())
    }

    /// All attached fills, oldest first.
    #[inline]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// The most recent fill, if any.
    #[inline]
    pub fn last_trade(&self) -> Option<&Trade> {
        self.trades.last()
    }
}
