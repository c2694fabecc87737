//! Property tests for the book invariants.

use bookcore_rs::prelude::*;
use bookcore_rs::types::Qty;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn instr() -> Arc<Instrument> {
    Arc::new(Instrument::new("PROP", 7, 0.01, 1.0, 1.0).unwrap())
}

fn dense_cfg() -> BookConfig {
    BookConfig {
        total_levels: 201,
        with_rpt_seqs: false,
        ..BookConfig::default()
    }
}

/// One aggregated update: side, step offset from 100.00, target qty.
fn arb_agg_update() -> impl Strategy<Value = (Side, i32, i64)> {
    (any::<bool>(), -20i32..=20, 0i64..=50).prop_map(|(bid, k, qty)| {
        (if bid { Side::Bid } else { Side::Ask }, k, qty)
    })
}

fn apply_agg(book: &mut OrderBook, side: Side, k: i32, qty: i64, seq: SeqNum) -> UpdateEffect {
    let px = Price::new(100.00 + f64::from(k) * 0.01).round_to_step(0.01);
    let action = if qty == 0 {
        UpdateAction::Delete
    } else {
        UpdateAction::New
    };
    book.update::<Contracts, i64>(
        UpdateMode::Incremental,
        side,
        action,
        px,
        Qty::new(qty),
        seq,
        seq,
        None,
    )
    .unwrap()
}

proptest! {
    /// After every valid update the book is consistent, or becomes
    /// consistent after one correction pass.
    #[test]
    fn prop_best_price_invariant(updates in proptest::collection::vec(arb_agg_update(), 1..120)) {
        let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();
        for (i, &(side, k, qty)) in updates.iter().enumerate() {
            apply_agg(&mut book, side, k, qty, (i + 1) as SeqNum);
            if !book.is_consistent() {
                book.correct_book();
            }
            prop_assert!(book.is_consistent());
        }
    }

    /// With the order log enabled, every level's aggregated qty equals
    /// the sum of its resting orders. Bids and asks are kept apart so
    /// no correction pass interferes.
    #[test]
    fn prop_aggregation_invariant(
        ops in proptest::collection::vec((any::<bool>(), 1u64..=40, 1i64..=30), 1..100)
    ) {
        let mut book = OrderBook::new(
            instr(),
            BookConfig { max_orders: 256, ..dense_cfg() },
        )
        .unwrap();
        // Model: order id -> (side, px-offset, remaining qty).
        let mut model: HashMap<u64, (Side, i32, i64)> = HashMap::new();
        let mut seq: SeqNum = 0;

        for (bid, id_seed, qty) in ops {
            seq += 1;
            let side = if bid { Side::Bid } else { Side::Ask };
            let id = id_seed + if bid { 0 } else { 1000 };
            match model.get(&id).copied() {
                None => {
                    // Bids rest strictly below 100, asks at or above.
                    let k = (id_seed as i32 % 10) + 1;
                    let k = if bid { -k } else { k };
                    let px = Price::new(100.00 + f64::from(k) * 0.01).round_to_step(0.01);
                    book.update::<Contracts, i64>(
                        UpdateMode::Incremental, side, UpdateAction::New,
                        px, Qty::new(qty), seq, seq, Some(id),
                    ).unwrap();
                    model.insert(id, (side, k, qty));
                }
                Some((mside, k, rem)) => {
                    // Remove the order entirely.
                    let px = Price::new(100.00 + f64::from(k) * 0.01).round_to_step(0.01);
                    book.update::<Contracts, i64>(
                        UpdateMode::Incremental, mside, UpdateAction::Delete,
                        px, Qty::new(-rem), seq, seq, Some(id),
                    ).unwrap();
                    model.remove(&id);
                }
            }
        }

        // Compare every populated level against the model.
        for side in [Side::Bid, Side::Ask] {
            let mut levels: HashMap<i64, (i64, u32)> = HashMap::new();
            book.traverse(side, 0, |_, px, entry| {
                let key = (px.value() * 100.0).round() as i64;
                let qty = entry
                    .qty::<Contracts, i64>(book.qty_kind(), book.with_frac())
                    .raw();
                levels.insert(key, (qty, entry.n_orders()));
                true
            });
            let mut expect: HashMap<i64, (i64, u32)> = HashMap::new();
            for &(mside, k, rem) in model.values() {
                if mside == side {
                    let key = 10000 + i64::from(k);
                    let e = expect.entry(key).or_insert((0, 0));
                    e.0 += rem;
                    e.1 += 1;
                }
            }
            prop_assert_eq!(levels, expect);
        }
    }

    /// VWAP bands move monotonically away from the top of the book on
    /// any consistent ladder (the engine raises on violation, so a
    /// clean return is the property).
    #[test]
    fn prop_vwap_band_monotonicity(
        qtys in proptest::collection::vec(1i64..=40, 3..20),
        bands in proptest::collection::vec(1i64..=60, 1..=4)
    ) {
        let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();
        for (i, &q) in qtys.iter().enumerate() {
            let px = Price::new(100.00 + i as f64 * 0.01).round_to_step(0.01);
            book.update::<Contracts, i64>(
                UpdateMode::Incremental, Side::Ask, UpdateAction::New,
                px, Qty::new(q), (i + 1) as SeqNum, (i + 1) as SeqNum, None,
            ).unwrap();
        }
        let mut p = VwapParams::<Contracts>::default();
        for (i, &b) in bands.iter().enumerate() {
            p.band_sizes[i] = Qty::new(b);
        }
        book.vwap::<Contracts, i64, Contracts>(Side::Ask, &mut p).unwrap();
        for i in 1..bands.len() {
            if p.vwaps[i].is_finite() && p.vwaps[i - 1].is_finite() {
                prop_assert!(p.vwaps[i] >= p.vwaps[i - 1]);
                prop_assert!(p.wrst_pxs[i] >= p.wrst_pxs[i - 1]);
            }
        }
    }

    /// Invalidate followed by a replay reproduces the exact state a
    /// fresh book reaches with the same updates.
    #[test]
    fn prop_invalidate_replay_idempotent(
        updates in proptest::collection::vec(arb_agg_update(), 1..80)
    ) {
        let run = |book: &mut OrderBook| {
            for (i, &(side, k, qty)) in updates.iter().enumerate() {
                apply_agg(book, side, k, qty, (i + 1) as SeqNum);
            }
        };
        let mut replayed = OrderBook::new(instr(), dense_cfg()).unwrap();
        run(&mut replayed);
        replayed.invalidate();
        run(&mut replayed);

        let mut fresh = OrderBook::new(instr(), dense_cfg()).unwrap();
        run(&mut fresh);

        let a = replayed.snapshot::<Contracts, i64>(0);
        let b = fresh.snapshot::<Contracts, i64>(0);
        prop_assert_eq!(a.bids, b.bids);
        prop_assert_eq!(a.asks, b.asks);
    }
}
