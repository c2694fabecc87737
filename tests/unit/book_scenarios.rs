//! End-to-end book scenarios across the public API.

use bookcore_rs::prelude::*;
use bookcore_rs::types::Qty;
use std::sync::Arc;

fn instr() -> Arc<Instrument> {
    Arc::new(Instrument::new("EUR-USD", 42, 0.01, 1.0, 1.0).unwrap())
}

fn dense_cfg() -> BookConfig {
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
) -> UpdateEffect {
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
    .unwrap()
}

#[test]
fn test_two_sided_book_scenario() {
    // Price step 0.01, dense array of 101 levels; the center is fixed by
    // the first update on each side.
    let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();

    let e1 = upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1);
    let e2 = upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 5, 1);
    assert_eq!(e1, UpdateEffect::L1Px);
    assert_eq!(e2, UpdateEffect::L1Px);
    assert_eq!(book.best_bid_qty::<Contracts, i64>().raw(), 10);
    assert_eq!(book.best_ask_qty::<Contracts, i64>().raw(), 5);
    assert!(book.is_consistent());
}

#[test]
fn test_selective_callback_dispatch() {
    let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();
    book.add_subscriber(StrategyId(1), UpdateEffect::L1Px).unwrap();
    book.add_subscriber(StrategyId(2), UpdateEffect::L2).unwrap();

    let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1);
    // First touch moves L1: everyone hears about it.
    let notified: Vec<_> = book.subscribers_for(e).collect();
    assert_eq!(notified.len(), 2);

    let e = upd(&mut book, Side::Bid, UpdateAction::New, 99.95, 3, 2);
    assert_eq!(e, UpdateEffect::L2);
    let notified: Vec<_> = book.subscribers_for(e).collect();
    assert_eq!(notified, vec![StrategyId(2)]);
}

#[test]
fn test_clear_invalidate_reproduces_state() {
    let script: &[(Side, UpdateAction, f64, i64)] = &[
        (Side::Bid, UpdateAction::New, 99.99, 10),
        (Side::Bid, UpdateAction::New, 99.98, 20),
        (Side::Ask, UpdateAction::New, 100.01, 5),
        (Side::Bid, UpdateAction::Change, 99.99, 15),
        (Side::Ask, UpdateAction::New, 100.03, 7),
    ];
    let run = |book: &mut OrderBook| {
        for (i, &(side, action, px, qty)) in script.iter().enumerate() {
            upd(book, side, action, px, qty, (i + 1) as SeqNum);
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
    assert_eq!(a.bids, b.bids);
    assert_eq!(a.asks, b.asks);
    assert_eq!(a.last_seq_num, b.last_seq_num);
}

#[test]
fn test_snapshot_feeds_reporting() {
    let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();
    upd(&mut book, Side::Bid, UpdateAction::New, 99.99, 10, 1);
    upd(&mut book, Side::Ask, UpdateAction::New, 100.02, 4, 2);

    let snap = book.snapshot::<Contracts, i64>(0);
    let json = snap.to_json().unwrap();
    assert!(json.contains("EUR-USD"));
    assert_eq!(snap.bids[0].qty, 10.0);
    assert_eq!(snap.asks[0].qty, 4.0);
}

#[test]
fn test_mbo_book_links_own_orders() {
    let mut book = OrderBook::new(
        instr(),
        BookConfig {
            max_orders: 128,
            ..dense_cfg()
        },
    )
    .unwrap();
    book.update::<Contracts, i64>(
        UpdateMode::Incremental,
        Side::Bid,
        UpdateAction::New,
        Price::new(99.99),
        Qty::new(10),
        1,
        1,
        Some(501),
    )
    .unwrap();

    // The connector recognises order 501 as ours and links the request.
    assert!(book.set_order_request(501, Some(7)));
    let slot = book.order_info(501).unwrap();
    assert_eq!(slot.req(), Some(7));
    assert_eq!(slot.px(), Price::new(99.99));
    assert!(slot.is_bid());
}

#[test]
fn test_sparse_and_dense_agree() {
    let script: &[(Side, UpdateAction, f64, i64)] = &[
        (Side::Bid, UpdateAction::New, 99.99, 10),
        (Side::Ask, UpdateAction::New, 100.01, 5),
        (Side::Bid, UpdateAction::New, 99.97, 20),
        (Side::Bid, UpdateAction::Delete, 99.99, 0),
    ];
    let mut dense = OrderBook::new(instr(), dense_cfg()).unwrap();
    let mut sparse = OrderBook::new(
        instr(),
        BookConfig {
            repr: BookRepr::Sparse,
            ..dense_cfg()
        },
    )
    .unwrap();
    for (i, &(side, action, px, qty)) in script.iter().enumerate() {
        upd(&mut dense, side, action, px, qty, (i + 1) as SeqNum);
        upd(&mut sparse, side, action, px, qty, (i + 1) as SeqNum);
    }
    let a = dense.snapshot::<Contracts, i64>(0);
    let b = sparse.snapshot::<Contracts, i64>(0);
    assert_eq!(a.bids, b.bids);
    assert_eq!(a.asks, b.asks);
}

#[test]
fn test_vwap_over_public_api() {
    let mut book = OrderBook::new(instr(), dense_cfg()).unwrap();
    upd(&mut book, Side::Ask, UpdateAction::New, 100.00, 10, 1);
    upd(&mut book, Side::Ask, UpdateAction::New, 100.01, 20, 2);

    let mut p = VwapParams::<Contracts>::default();
    p.band_sizes[0] = Qty::new(15);
    book.vwap::<Contracts, i64, Contracts>(Side::Ask, &mut p).unwrap();
    let expect = (10.0 * 100.00 + 5.0 * 100.01) / 15.0;
    assert!((p.vwaps[0].value() - expect).abs() < 1e-9);
    assert_eq!(p.wrst_pxs[0], Price::new(100.01));
}
