//! Trade records, shared between market-data prints and our own fills.

use super::error::OrderError;
use crate::types::{
    ConnectorId, Instrument, KindTag, OrderId, Price, Qty, QtyKind, QtyRepr, RawQty, Side, Ts,
};
use std::sync::Arc;

/// One trade. Used both for third-party trades observed on a feed
/// (`mdc` set, `our_req` unset) and for our own executions (`our_req`
/// set to the request that produced the fill). Plain value type: cheap
/// to clone, freely copyable between owners.
///
/// The traded quantity and the fee may use different kinds (e.g. whole
/// contracts traded, fractional quote-currency fee); the fee is always
/// stored fractional.
#[derive(Clone, Debug)]
pub struct Trade {
    pub(crate) id: OrderId,
    pub(crate) mdc: Option<ConnectorId>,
    pub(crate) instr: Arc<Instrument>,
    pub(crate) our_req: Option<OrderId>,
    pub(crate) account_id: u32,
    pub(crate) exec_id: String,
    pub(crate) px: Price,
    pub(crate) qt: QtyKind,
    pub(crate) qf: QtyKind,
    pub(crate) with_frac: bool,
    pub(crate) qty: RawQty,
    pub(crate) fee: RawQty,
    pub(crate) aggressor: Option<Side>,
    pub(crate) acc_side: Option<Side>,
    pub(crate) exch_ts: Ts,
    pub(crate) recv_ts: Ts,
}

impl Trade {
    /// Build and validate a trade record.
    ///
    /// The exchange timestamp may be unknown (empty), the receive
    /// timestamp never; price must be finite and quantity positive.
    #[allow(clippy::too_many_arguments)]
    pub fn new<K: KindTag, R: QtyRepr, KF: KindTag>(
        id: OrderId,
        mdc: Option<ConnectorId>,
        instr: Arc<Instrument>,
        our_req: Option<OrderId>,
        account_id: u32,
        exec_id: &str,
        px: Price,
        qty: Qty<K, R>,
        fee: Qty<KF, f64>,
        aggressor: Option<Side>,
        acc_side: Option<Side>,
        exch_ts: Ts,
        recv_ts: Ts,
    ) -> Result<Self, OrderError> {
        if recv_ts.is_empty() {
            return Err(OrderError::InvalidArgument {
                message: format!("trade {id}: empty receive timestamp"),
            });
        }
        if !px.is_finite() {
            return Err(OrderError::InvalidArgument {
                message: format!("trade {id}: non-finite price"),
            });
        }
        if !qty.is_pos() {
            return Err(OrderError::InvalidArgument {
                message: format!("trade {id}: non-positive qty {qty}"),
            });
        }
        // Third-party trades come from an MDC; our own carry a request.
        debug_assert!(our_req.is_some() || mdc.is_some());

        Ok(Trade {
            id,
            mdc,
            instr,
            our_req,
            account_id,
            exec_id: exec_id.to_string(),
            px,
            qt: K::KIND,
            qf: KF::KIND,
            with_frac: R::IS_FRAC,
            qty: RawQty::store(qty),
            fee: RawQty::store(fee),
            aggressor,
            acc_side,
            exch_ts,
            recv_ts,
        })
    }

    #[inline]
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Market-data connector the trade was observed on, if any.
    #[inline]
    pub fn mdc(&self) -> Option<ConnectorId> {
        self.mdc
    }

    #[inline]
    pub fn instr(&self) -> &Instrument {
        &self.instr
    }

    /// The request this fill belongs to — present exactly when the
    /// trade is our own.
    #[inline]
    pub fn our_req(&self) -> Option<OrderId> {
        self.our_req
    }

    /// Is this our own execution (as opposed to a market print)?
    #[inline]
    pub fn is_our_trade(&self) -> bool {
        self.our_req.is_some()
    }

    /// Account the trade is attributed to.
    #[inline]
    pub fn account_id(&self) -> u32 {
        self.account_id
    }

    /// Exchange-assigned execution id.
    #[inline]
    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }

    /// Trade price.
    #[inline]
    pub fn px(&self) -> Price {
        self.px
    }

    /// Traded quantity (kind-checked readback).
    #[inline]
    pub fn qty<K: KindTag, R: QtyRepr>(&self) -> Qty<K, R> {
        self.qty.load(self.qt, self.with_frac)
    }

    /// Commission/fee; always fractional, possibly of a different kind
    /// than the traded quantity.
    #[inline]
    pub fn fee<KF: KindTag>(&self) -> Qty<KF, f64> {
        self.fee.load(self.qf, true)
    }

    /// Aggressing side of the print, when the venue discloses it.
    #[inline]
    pub fn aggressor(&self) -> Option<Side> {
        self.aggressor
    }

    /// Trade side for the attributed account.
    #[inline]
    pub fn acc_side(&self) -> Option<Side> {
        self.acc_side
    }

    /// Exchange trade time (may be empty).
    #[inline]
    pub fn exch_ts(&self) -> Ts {
        self.exch_ts
    }

    /// When the trade report was received.
    #[inline]
    pub fn recv_ts(&self) -> Ts {
        self.recv_ts
    }
}
