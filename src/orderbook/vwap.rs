//! Traversal and liquidity-weighted price computation: multi-band VWAP
//! with exclusions and manipulation discounting, one-band VWAP, deepest
//! price, and the mid price derived from the two sides.

use super::book::{OrderBook, SideLevels};
use super::entry::BookEntry;
use super::error::BookError;
use crate::types::price::PxKey;
use crate::types::{KindTag, Price, Qty, QtyRepr, arith_mid, convert, is_valid_qty_rep};
use tracing::info;

/// Maximum number of VWAP bands per request.
pub const MAX_BANDS: usize = 10;

/// Input/output block for [`OrderBook::vwap`].
///
/// Band sizes are sequential (not cumulative), from L1 into the depth,
/// and use whole (`i64`) representation to keep the strategy-facing API
/// simple; the kind tag still applies, so lots and base-currency demand
/// cannot be mixed up. Full-amount books accept exactly one band.
#[derive(Clone, Copy, Debug)]
pub struct VwapParams<K: KindTag> {
    /// Sequential band sizes; a non-positive size ends the list.
    pub band_sizes: [Qty<K, i64>; MAX_BANDS],

    /// Total size of known market-style orders currently in flight.
    /// They will eat the liquidity from L1 before we get there, so this
    /// size is added to the demand of band 0. May be negative when
    /// in-flight limit orders are known to be adding liquidity instead.
    pub excl_mkt_ords_sz: Qty<K, i64>,

    /// Price of one known resting limit order to cut out of the
    /// calculation (normally our own). NaN when unused.
    pub excl_limit_ord_px: Price,
    /// Size of that resting order (0 when unused).
    pub excl_limit_ord_sz: Qty<K, i64>,

    /// Reduction coefficient in [0, 1] applied to single-order price
    /// levels, which may be spoofing. 1 counts them in full, 0 ignores
    /// them entirely.
    pub manip_red_coeff: f64,
    /// Apply the reduction at L1 only.
    pub manip_only_l1: bool,

    /// OUTPUT: worst price touched per band; NaN where liquidity ran out.
    pub wrst_pxs: [Price; MAX_BANDS],
    /// OUTPUT: volume-weighted average price per band; NaN likewise.
    pub vwaps: [Price; MAX_BANDS],
}

impl<K: KindTag> Default for VwapParams<K> {
    fn default() -> Self {
        VwapParams {
            band_sizes: [Qty::zero(); MAX_BANDS],
            excl_mkt_ords_sz: Qty::zero(),
            excl_limit_ord_px: Price::empty(),
            excl_limit_ord_sz: Qty::zero(),
            manip_red_coeff: 1.0, // single orders are normal ones
            manip_only_l1: false,
            wrst_pxs: [Price::empty(); MAX_BANDS],
            vwaps: [Price::empty(); MAX_BANDS],
        }
    }
}

enum XPxMode {
    Vwap1,
    Deepest,
}

impl OrderBook {
    /// Populated levels of one side, best first, as `(price, entry)`.
    /// Shared by traversal, VWAP and snapshotting.
    pub(crate) fn level_iter(
        &self,
        side: crate::types::Side,
    ) -> Box<dyn Iterator<Item = (Price, &BookEntry)> + '_> {
        let is_bid = side.is_bid();
        let levels = if is_bid { &self.bids } else { &self.asks };
        match levels {
            SideLevels::Dense(d) => {
                if d.best < 0 {
                    return Box::new(std::iter::empty());
                }
                let best = d.best;
                let best_px = if is_bid { self.top.bid } else { self.top.ask };
                let px_step = self.instr.px_step();
                let lo = d.best.min(d.worst);
                let hi = d.best.max(d.worst);
                let idx: Box<dyn Iterator<Item = i32>> = if is_bid {
                    Box::new((lo..=hi).rev())
                } else {
                    Box::new(lo..=hi)
                };
                Box::new(idx.filter_map(move |i| {
                    let entry = &d.entries[i as usize];
                    (!entry.is_empty())
                        .then(|| (best_px + f64::from(i - best) * px_step, entry))
                }))
            }
            SideLevels::Sparse(s) => {
                let iter: Box<dyn Iterator<Item = (&PxKey, &BookEntry)>> = if is_bid {
                    Box::new(s.map.iter().rev())
                } else {
                    Box::new(s.map.iter())
                };
                Box::new(iter.map(|(k, e)| (k.px(), e)))
            }
        }
    }

    /// Visit up to `depth` populated levels of `side`, best first
    /// (`depth == 0` means unlimited). The visitor gets the level index
    /// (empty levels not counted), the price and the entry, and returns
    /// whether to continue.
    pub fn traverse<F>(&self, side: crate::types::Side, depth: usize, mut visitor: F)
    where
        F: FnMut(usize, Price, &BookEntry) -> bool,
    {
        let depth = if depth == 0 { usize::MAX } else { depth };
        for (d, (px, entry)) in self.level_iter(side).take(depth).enumerate() {
            if !visitor(d, px, entry) {
                return;
            }
        }
    }

    /// Multi-band VWAP along one side. See [`VwapParams`] for the
    /// exclusion and discounting semantics; results land in the params
    /// block, NaN marking bands the liquidity could not satisfy.
    ///
    /// Band results must move monotonically away from the top of the
    /// book; a violation means the level data is corrupt and is raised
    /// as [`BookError::NonMonotonicVwap`].
    pub fn vwap<OK, OR, AK>(
        &self,
        side: crate::types::Side,
        params: &mut VwapParams<AK>,
    ) -> Result<(), BookError>
    where
        OK: KindTag,
        OR: QtyRepr,
        AK: KindTag,
    {
        debug_assert!(is_valid_qty_rep::<OK, OR>(self.cfg.qty_kind, self.cfg.with_frac));
        if !(0.0..=1.0).contains(&params.manip_red_coeff) {
            return Err(BookError::BadVwapParams {
                message: format!("manip_red_coeff {} outside [0, 1]", params.manip_red_coeff),
            });
        }
        if self.cfg.full_amount && params.band_sizes[1].is_pos() {
            return Err(BookError::BadVwapParams {
                message: "full-amount books take exactly one band".into(),
            });
        }

        params.vwaps = [Price::empty(); MAX_BANDS];
        params.wrst_pxs = [Price::empty(); MAX_BANDS];

        let is_bid = side.is_bid();
        let full_amount = self.cfg.full_amount;
        let mut levels = self.level_iter(side);

        let mut n = 0usize;
        let mut rem: Qty<AK, f64> = Qty::new(params.band_sizes[0].to_f64());
        if !rem.is_pos() {
            return Ok(());
        }
        // Active aggressive orders will consume L1 liquidity first, so
        // their size is extra demand on band 0.
        rem += Qty::new(params.excl_mkt_ords_sz.to_f64());
        if !rem.is_pos() {
            // In-flight liquidity already covers the band: price it at L1.
            if let Some((px, _)) = levels.next() {
                params.vwaps[0] = px;
                params.wrst_pxs[0] = px;
            }
            return Ok(());
        }

        let mut at_l1 = true;
        loop {
            let Some((px, entry)) = levels.next() else {
                // Liquidity ran out with the current band unfilled.
                params.vwaps[n] = Price::empty();
                params.wrst_pxs[n] = Price::empty();
                return Ok(());
            };
            let ob_qty: Qty<OK, OR> = entry.qty(self.cfg.qty_kind, self.cfg.with_frac);
            let mut qty: Qty<AK, f64> =
                convert(ob_qty, &self.instr, px).map_err(|e| BookError::BadVwapParams {
                    message: e.to_string(),
                })?;
            let n_ords = entry.n_orders();

            if full_amount {
                // Non-sweepable: the whole band must fit at one level.
                if qty >= rem {
                    params.wrst_pxs[0] = px;
                    params.vwaps[0] = px;
                    return Ok(());
                }
                at_l1 = false;
                continue;
            }

            // A single resting order may be a manipulator; our own known
            // order is cut out instead and never counts as one.
            let mut manip = n_ords == 1;
            if px == params.excl_limit_ord_px {
                qty -= Qty::new(params.excl_limit_ord_sz.to_f64());
                if qty.is_neg() {
                    qty = Qty::zero();
                }
                manip = false;
            }
            if manip && (at_l1 || !params.manip_only_l1) {
                qty = qty.scale(params.manip_red_coeff);
            }
            at_l1 = false;

            while qty.is_pos() {
                let delta = rem.min(qty);
                rem -= delta;
                qty -= delta;

                let incr = delta.to_f64() * px.value();
                params.vwaps[n] = if !params.vwaps[n].is_finite() {
                    Price::new(incr)
                } else {
                    params.vwaps[n] + incr
                };

                if !rem.is_zero() {
                    break; // level consumed, demand remains
                }
                // This band is done: the accumulated notional becomes
                // the average, the current level the worst price.
                params.vwaps[n] = params.vwaps[n] / params.band_sizes[n].to_f64();
                params.wrst_pxs[n] = px;

                if n >= 1 {
                    let worse_vwap = if is_bid {
                        params.vwaps[n] > params.vwaps[n - 1]
                    } else {
                        params.vwaps[n] < params.vwaps[n - 1]
                    };
                    let worse_wrst = if is_bid {
                        params.wrst_pxs[n] > params.wrst_pxs[n - 1]
                    } else {
                        params.wrst_pxs[n] < params.wrst_pxs[n - 1]
                    };
                    if worse_vwap || worse_wrst {
                        return Err(BookError::NonMonotonicVwap { band: n });
                    }
                }
                if n == MAX_BANDS - 1 {
                    return Ok(());
                }
                n += 1;
                rem = Qty::new(params.band_sizes[n].to_f64());
                if !rem.is_pos() {
                    return Ok(());
                }
                // Any qty left at this level feeds the next band before
                // moving deeper.
            }
        }
    }

    /// One-band VWAP of `cum_vol` along `side`. NaN when the side cannot
    /// satisfy the volume.
    pub fn vwap1<OK, OR, AK, AR>(
        &self,
        side: crate::types::Side,
        cum_vol: Qty<AK, AR>,
    ) -> Result<Price, BookError>
    where
        OK: KindTag,
        OR: QtyRepr,
        AK: KindTag,
        AR: QtyRepr,
    {
        self.x_px::<OK, OR, AK, AR>(XPxMode::Vwap1, side, cum_vol)
    }

    /// The deepest (furthest from the top) price touched when consuming
    /// `cum_vol` along `side`. NaN when liquidity is insufficient.
    pub fn deepest_px<OK, OR, AK, AR>(
        &self,
        side: crate::types::Side,
        cum_vol: Qty<AK, AR>,
    ) -> Result<Price, BookError>
    where
        OK: KindTag,
        OR: QtyRepr,
        AK: KindTag,
        AR: QtyRepr,
    {
        self.x_px::<OK, OR, AK, AR>(XPxMode::Deepest, side, cum_vol)
    }

    fn x_px<OK, OR, AK, AR>(
        &self,
        mode: XPxMode,
        side: crate::types::Side,
        cum_vol: Qty<AK, AR>,
    ) -> Result<Price, BookError>
    where
        OK: KindTag,
        OR: QtyRepr,
        AK: KindTag,
        AR: QtyRepr,
    {
        // A zero volume would divide the weighting below.
        if !cum_vol.is_pos() {
            return Err(BookError::BadVwapParams {
                message: "cumulative volume must be positive".into(),
            });
        }
        let total = cum_vol.to_f64();
        let mut rem = total;
        let mut cum_px = 0.0f64;
        for (px, entry) in self.level_iter(side) {
            let ob_qty: Qty<OK, OR> = entry.qty(self.cfg.qty_kind, self.cfg.with_frac);
            let lqa: Qty<AK, f64> =
                convert(ob_qty, &self.instr, px).map_err(|e| BookError::BadVwapParams {
                    message: e.to_string(),
                })?;
            let vol = rem.min(lqa.to_f64());
            match mode {
                XPxMode::Vwap1 => cum_px += px.value() * (vol / total),
                XPxMode::Deepest => cum_px = px.value(),
            }
            rem -= vol;
            if rem <= 0.0 {
                break;
            }
        }
        if rem > 0.0 || !cum_px.is_finite() {
            return Ok(Price::empty());
        }
        Ok(Price::new(cum_px))
    }

    /// Mid price at cumulative volume `cum_vol`: the arithmetic mid of
    /// the two one-band VWAPs. NaN when either side lacks the volume.
    pub fn mid_px<K, R>(&self, cum_vol: Qty<K, R>) -> Result<Price, BookError>
    where
        K: KindTag,
        R: QtyRepr,
    {
        let bid = self.vwap1::<K, R, K, R>(crate::types::Side::Bid, cum_vol)?;
        let ask = self.vwap1::<K, R, K, R>(crate::types::Side::Ask, cum_vol)?;
        Ok(arith_mid(bid, ask))
    }

    /// Log both sides to the given depth at `info` level. Debugging
    /// only; makes no attempt at being cheap.
    pub fn log_levels<K, R>(&self, depth: usize) -> Result<(), BookError>
    where
        K: KindTag,
        R: QtyRepr,
    {
        if depth == 0 || depth > 50 {
            return Err(BookError::InvalidArgument {
                message: format!("log depth {depth} outside 1..=50"),
            });
        }
        let mut out = format!(
            "{}: SeqNum={}, RptSeq={}",
            self.instr.symbol(),
            self.last_seq_num,
            self.last_rpt_seq
        );
        for side in [crate::types::Side::Bid, crate::types::Side::Ask] {
            out.push_str(if side.is_bid() { "\nBIDS: " } else { "\nASKS: " });
            let mut first = true;
            self.traverse(side, depth, |level, px, entry| {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                let qty: Qty<K, R> = entry.qty(self.cfg.qty_kind, self.cfg.with_frac);
                out.push_str(&format!("{}:{}:{}", level + 1, px, qty));
                true
            });
        }
        info!("{out}");
        Ok(())
    }
}
