//! End-to-end order lifecycle scenarios.

use bookcore_rs::prelude::*;
use bookcore_rs::types::Qty;
use std::sync::Arc;

fn instr() -> Arc<Instrument> {
    Arc::new(Instrument::new("EUR-USD", 42, 0.01, 1.0, 1.0).unwrap())
}

fn limit_order(id: OrderId) -> ActiveOrder {
    ActiveOrder::new(
        QtyKind::Contracts,
        false,
        StrategyId(1),
        id,
        instr(),
        ConnectorId(3),
        Side::Bid,
        OrderKind::Limit,
        false,
        TimeInForce::GoodTillCancel,
        0,
    )
    .unwrap()
}

fn request(
    id: OrderId,
    orig: OrderId,
    kind: RequestKind,
    qty: i64,
    show: i64,
    min: i64,
) -> Result<OrderRequest, OrderError> {
    OrderRequest::new::<Contracts, i64>(
        id,
        orig,
        kind,
        Price::new(99.99),
        false,
        Qty::new(qty),
        Qty::new(show),
        Qty::new(min),
        false,
        f64::NAN,
        Ts::from_nanos(1),
        Ts::from_nanos(2),
        Ts::from_nanos(3),
        Ts::from_nanos(4),
    )
}

#[test]
fn test_iceberg_show_qty_bounds() {
    // qty=100 with qty_show=20 is a legal iceberg placement...
    assert!(request(1, 0, RequestKind::New, 100, 20, 0).is_ok());
    // ...but a shown qty above the full qty fails construction.
    assert!(matches!(
        request(1, 0, RequestKind::New, 100, 120, 0),
        Err(OrderError::InvalidArgument { .. })
    ));
}

#[test]
fn test_trade_requires_receive_timestamp() {
    let r = Trade::new::<Contracts, i64, QtyB>(
        1,
        Some(ConnectorId(9)),
        instr(),
        None,
        1,
        "E-1",
        Price::new(99.99),
        Qty::new(5),
        Qty::new(0.01),
        None,
        None,
        Ts::from_nanos(7),
        Ts::EMPTY,
    );
    assert!(matches!(r, Err(OrderError::InvalidArgument { .. })));
}

#[test]
fn test_place_modify_fill_lifecycle() {
    let mut order = limit_order(100);
    order
        .push_request(request(100, 0, RequestKind::New, 50, 0, 0).unwrap())
        .unwrap();

    // The connector sends it and the exchange confirms.
    {
        let req = order.req_mut(100).unwrap();
        req.assign_seq_num(9001);
        req.stamp_sent(Ts::from_nanos(10));
        req.set_status(RequestStatus::Confirmed);
        req.stamp_confirmed(Ts::from_nanos(11), Ts::from_nanos(12));
        req.set_exch_ord_id("X-1");
    }
    assert_eq!(order.leaves_qty::<Contracts, i64>().unwrap().raw(), 50);

    // Modify up to 80.
    order
        .push_request(request(101, 100, RequestKind::Modify, 80, 0, 0).unwrap())
        .unwrap();
    assert!(order.is_mod_pending(100));
    order.req_mut(100).unwrap().set_status(RequestStatus::Replaced);
    order.req_mut(101).unwrap().set_status(RequestStatus::Confirmed);

    // Two partial fills, then done.
    for (tid, qty, left) in [(1u64, 30i64, 50i64), (2, 50, 0)] {
        let trade = Trade::new::<Contracts, i64, QtyB>(
            tid,
            None,
            instr(),
            Some(101),
            1,
            &format!("E-{tid}"),
            Price::new(99.99),
            Qty::new(qty),
            Qty::new(0.02),
            Some(Side::Ask),
            Some(Side::Bid),
            Ts::from_nanos(20),
            Ts::from_nanos(21),
        )
        .unwrap();
        order.attach_trade(trade).unwrap();
        order
            .req_mut(101)
            .unwrap()
            .set_leaves_qty(Qty::<Contracts, i64>::new(left));
    }
    order.req_mut(101).unwrap().set_status(RequestStatus::Filled);
    order.mark_inactive();

    assert!(order.is_filled().unwrap());
    assert!(!order.is_cancelled().unwrap());
    assert!(!order.has_failed());
    assert_eq!(order.cum_filled_qty::<Contracts, i64>().raw(), 80);
    assert_eq!(order.leaves_qty::<Contracts, i64>().unwrap().raw(), 0);
    assert_eq!(order.trades().len(), 2);
}

#[test]
fn test_cancel_lifecycle() {
    let mut order = limit_order(200);
    order
        .push_request(request(200, 0, RequestKind::New, 50, 0, 0).unwrap())
        .unwrap();
    order.req_mut(200).unwrap().set_status(RequestStatus::Confirmed);

    order.set_cxl_pending(201);
    order
        .push_request(request(201, 200, RequestKind::Cancel, 0, 0, 0).unwrap())
        .unwrap();
    assert!(order.is_cxl_pending(200));

    order.req_mut(200).unwrap().set_status(RequestStatus::Cancelled);
    order.req_mut(201).unwrap().set_status(RequestStatus::Confirmed);
    order.mark_inactive();

    assert!(order.is_cancelled().unwrap());
    assert!(!order.is_filled().unwrap());
    assert!(!order.has_failed());
    assert_eq!(order.cxl_pending(), None);
}

#[test]
fn test_reject_lifecycle() {
    let mut order = limit_order(300);
    order
        .push_request(request(300, 0, RequestKind::New, 50, 0, 0).unwrap())
        .unwrap();
    order.req_mut(300).unwrap().set_status(RequestStatus::Failed);
    order.add_fail();
    order.mark_inactive();

    assert!(order.has_failed());
    assert!(!order.is_filled().unwrap());
    assert!(!order.is_cancelled().unwrap());
    assert_eq!(order.n_fails(), 1);
}

#[test]
fn test_emulated_modify_legs() {
    let mut order = limit_order(400);
    order
        .push_request(request(400, 0, RequestKind::New, 50, 0, 0).unwrap())
        .unwrap();
    order.req_mut(400).unwrap().set_status(RequestStatus::Confirmed);

    // Cancel-new tandem emulating a modify.
    order
        .push_request(request(401, 400, RequestKind::ModLegCancel, 0, 0, 0).unwrap())
        .unwrap();
    // The cancel leg makes the original pending-modify, not
    // pending-cancel.
    assert!(order.is_mod_pending(400));
    assert!(!order.is_cxl_pending(400));

    order
        .push_request(request(402, 0, RequestKind::ModLegNew, 70, 0, 0).unwrap())
        .unwrap();
    order.req_mut(400).unwrap().set_status(RequestStatus::Cancelled);
    order.req_mut(401).unwrap().set_status(RequestStatus::Confirmed);
    order.req_mut(402).unwrap().set_status(RequestStatus::Filled);
    order.mark_inactive();

    // The fill on the new leg wins over the cancelled old leg.
    assert!(order.is_filled().unwrap());
    assert!(!order.is_cancelled().unwrap());
}
