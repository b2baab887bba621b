//! End-to-end tests running orders through the simulated deployment.
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use insta::assert_snapshot;
use serde_json::{Value, json};
use tcc_common::kind::TIMEOUT;
use tcc_common::{TransactionContext, TransactionStatus};
use tcc_interceptor::{Compensable, Error, InterceptorConfig};
use tcc_test::{
    InventoryService, Network, Order, OrderService, OrderState, Reservation, ReservationState,
};
use tcc_transaction::{StoreError, TransactionError, TransactionRepository};
use tracing_subscriber::EnvFilter;

struct Deployment {
    network: Arc<Network>,
    inventory: Arc<InventoryService>,
    orders: Arc<OrderService>,
}

fn deploy(stock: u32, credit_limit: u32) -> Deployment {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let network = Network::new();
    let inventory = InventoryService::new(&network, [("apple", stock)]).unwrap();
    let orders = OrderService::new(&network, credit_limit, InterceptorConfig::default()).unwrap();
    Deployment {
        network,
        inventory,
        orders,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached in time");
}

fn assert_settled(d: &Deployment) {
    assert!(d.orders.repository().is_empty());
    assert!(d.inventory.repository().is_empty());
}

#[test]
fn test_order_confirmed() {
    let d = deploy(10, 1_000);
    d.orders
        .place_order(&Order::new("order-1", "apple", 3, 10), Compensable::new())
        .unwrap();

    assert_snapshot!(d.network.take_calls(), @r"
    inventory.reserve TRYING mandatory
    order.confirm_order CONFIRMING
    inventory.reserve CONFIRMING
    inventory.confirm_reserve CONFIRMING
    ");
    assert_eq!(d.inventory.available("apple"), 7);
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Confirmed));
    let reservations = d.inventory.reservations();
    assert_eq!(reservations.len(), 1);
    assert_eq!(
        reservations[0].1,
        Reservation {
            sku: "apple".to_owned(),
            quantity: 3,
            state: ReservationState::Confirmed,
        }
    );
    assert_eq!(reservations[0].0.branch(), 2);
    assert_settled(&d);
}

#[test]
fn test_out_of_stock_cancels_order() {
    let d = deploy(10, 1_000);
    let error = d
        .orders
        .place_order(&Order::new("order-1", "apple", 20, 1), Compensable::new())
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "business: reserving stock for order order-1 failed"
    );
    assert_eq!(
        error.as_business().unwrap().root_cause().unwrap().message(),
        "apple is out of stock: 20 requested, 10 available"
    );
    assert_snapshot!(d.network.take_calls(), @r"
    inventory.reserve TRYING mandatory
    order.cancel_order CANCELLING
    inventory.reserve CANCELLING
    inventory.cancel_reserve CANCELLING
    ");
    assert_eq!(d.inventory.available("apple"), 10);
    assert!(d.inventory.reservations().is_empty());
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Cancelled));
    assert_settled(&d);
}

#[test]
fn test_declined_payment_releases_stock() {
    let d = deploy(10, 50);
    let error = d
        .orders
        .place_order(&Order::new("order-1", "apple", 3, 100), Compensable::new())
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "business: payment of 300 for order order-1 declined"
    );
    assert_snapshot!(d.network.take_calls(), @r"
    inventory.reserve TRYING mandatory
    order.cancel_order CANCELLING
    inventory.reserve CANCELLING
    inventory.cancel_reserve CANCELLING
    ");
    assert_eq!(d.inventory.available("apple"), 10);
    assert_eq!(
        d.inventory.reservations()[0].1.state,
        ReservationState::Cancelled
    );
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Cancelled));
    assert_settled(&d);
}

#[test]
fn test_overflowing_amount_is_declined() {
    let d = deploy(100_000, u32::MAX);
    let error = d
        .orders
        .place_order(
            &Order::new("order-1", "apple", 100_000, 100_000),
            Compensable::new(),
        )
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "business: payment for order order-1 declined: amount overflows"
    );
    assert_snapshot!(d.network.take_calls(), @r"
    inventory.reserve TRYING mandatory
    order.cancel_order CANCELLING
    inventory.reserve CANCELLING
    inventory.cancel_reserve CANCELLING
    ");
    assert_eq!(d.inventory.available("apple"), 100_000);
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Cancelled));
    assert_settled(&d);
}

#[test]
fn test_redelivered_phases_are_ignored() {
    let d = deploy(10, 1_000);
    d.orders
        .place_order(&Order::new("order-1", "apple", 3, 10), Compensable::new())
        .unwrap();
    d.network.take_calls();

    let (xid, _) = d.inventory.reservations()[0].clone();
    let args = json!({ "sku": "apple", "quantity": 3 });
    for status in [TransactionStatus::Confirming, TransactionStatus::Cancelling] {
        let response = d
            .network
            .call(
                "inventory",
                "reserve",
                Some(TransactionContext::new(xid, status)),
                args.clone(),
            )
            .unwrap();
        assert_eq!(response, Value::Null);
    }

    assert_snapshot!(d.network.take_calls(), @r"
    inventory.reserve CONFIRMING
    inventory.reserve CANCELLING
    ");
    assert_eq!(d.inventory.available("apple"), 7);
    assert_eq!(
        d.inventory.reservations()[0].1.state,
        ReservationState::Confirmed
    );
    assert_settled(&d);
}

#[test]
fn test_reserve_without_context_is_rejected() {
    let d = deploy(10, 1_000);
    let error = d
        .network
        .call(
            "inventory",
            "reserve",
            None,
            json!({ "sku": "apple", "quantity": 1 }),
        )
        .unwrap_err();
    assert_snapshot!(
        error.to_string(),
        @"business: no active compensable transaction while propagation is mandatory for method reserve"
    );
    assert_eq!(d.inventory.available("apple"), 10);
    assert_settled(&d);
}

#[test]
fn test_timeout_delays_cancel() {
    let d = deploy(10, 1_000);
    let order = Order::new("order-1", "apple", 3, 10);
    let compensable = Compensable::new().with_delay_cancel_exception(&TIMEOUT);
    d.network.lose_next_response("inventory", "reserve");

    let error = d
        .orders
        .place_order(&order, compensable.clone())
        .unwrap_err();
    assert_eq!(
        error.as_business().unwrap().root_cause().unwrap().kind(),
        &TIMEOUT
    );
    assert_snapshot!(d.network.take_calls(), @"inventory.reserve TRYING mandatory");

    // Both sides stay in the Try phase until the outcome is resolved.
    assert_eq!(d.inventory.available("apple"), 7);
    assert_eq!(
        d.inventory.reservations()[0].1.state,
        ReservationState::Reserved
    );
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Pending));
    let pending = d.orders.repository().transactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status(), TransactionStatus::Trying);
    assert_eq!(pending[0].participants().len(), 2);
    assert_eq!(d.inventory.repository().len(), 1);

    // A retry of the same order collides with the pending transaction.
    let error = d.orders.place_order(&order, compensable).unwrap_err();
    assert!(matches!(
        error,
        Error::Transaction(TransactionError::Store(StoreError::Duplicate(_)))
    ));
    assert_eq!(d.network.take_calls(), "");

    for participant in pending[0].participants() {
        participant.cancel(&*d.network).unwrap();
    }
    d.orders.repository().delete(&pending[0].xid()).unwrap();
    assert_snapshot!(d.network.take_calls(), @r"
    order.cancel_order CANCELLING
    inventory.reserve CANCELLING
    inventory.cancel_reserve CANCELLING
    ");
    assert_eq!(d.inventory.available("apple"), 10);
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Cancelled));
    assert_settled(&d);
}

#[test]
fn test_async_confirm() {
    let d = deploy(10, 1_000);
    d.orders
        .place_order(
            &Order::new("order-1", "apple", 4, 10),
            Compensable::new().with_async_confirm(true),
        )
        .unwrap();

    wait_until(|| d.orders.repository().is_empty());
    assert_eq!(d.orders.order_state("order-1"), Some(OrderState::Confirmed));
    assert_eq!(
        d.inventory.reservations()[0].1.state,
        ReservationState::Confirmed
    );
    assert_eq!(d.inventory.available("apple"), 6);
    assert_settled(&d);
}

#[test]
fn test_concurrent_orders() {
    let d = deploy(10, 1_000);
    let placed = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let orders = &d.orders;
                s.spawn(move || {
                    orders
                        .place_order(
                            &Order::new(format!("order-{i}"), "apple", 2, 1),
                            Compensable::new(),
                        )
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|placed| *placed)
            .count()
    });

    assert_eq!(placed, 5);
    assert_eq!(d.inventory.available("apple"), 0);
    let confirmed = (0..8)
        .filter(|i| d.orders.order_state(&format!("order-{i}")) == Some(OrderState::Confirmed))
        .count();
    assert_eq!(confirmed, 5);
    assert!(
        d.inventory
            .reservations()
            .iter()
            .all(|(_, reservation)| reservation.state == ReservationState::Confirmed)
    );
    assert_settled(&d);
}
