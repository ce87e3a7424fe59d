//! Integration tests: OrderService commands → ProjectionProcessor → views.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Money, ProductId, ShippingAddress, UserId};
use domain::{
    AssignAgent, CancelOrder, ConfirmVerification, IssueVerificationCode, MarkDelivered,
    OneTimeCode, OrderLine, OrderService, OrderStatus, OtpPurpose, PlaceOrder, ReleaseAssignment,
};
use event_store::InMemoryEventStore;
use projections::{AgentWorkloadView, CustomerOrdersView, ProjectionProcessor};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 14, 16, 0, 0).unwrap()
}

fn setup() -> (
    OrderService<InMemoryEventStore>,
    ProjectionProcessor<InMemoryEventStore>,
    CustomerOrdersView,
    AgentWorkloadView,
) {
    let store = InMemoryEventStore::new();
    let service = OrderService::new(store.clone());

    let customers = CustomerOrdersView::new();
    let agents = AgentWorkloadView::new();

    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(customers.clone()));
    processor.register(Box::new(agents.clone()));

    (service, processor, customers, agents)
}

fn place_cmd(customer: UserId) -> PlaceOrder {
    PlaceOrder::new(
        customer,
        "farah@example.com",
        vec![OrderLine::new(
            ProductId::new(),
            "Copper Bottle",
            Money::from_cents(64_900),
            2,
        )],
        ShippingAddress {
            name: "Farah".into(),
            phone: "9811122233".into(),
            pincode: "110001".into(),
            city_village: "Delhi".into(),
            landmark: None,
        },
    )
}

async fn place_and_verify(
    service: &OrderService<InMemoryEventStore>,
    customer: UserId,
    at: DateTime<Utc>,
) -> common::AggregateId {
    let cmd = place_cmd(customer);
    let order_id = cmd.order_id;
    service.place_order(cmd, at).await.unwrap();

    let code = OneTimeCode::issue(OtpPurpose::OrderVerification, 6, 10, at).unwrap();
    let candidate = code.code.clone();
    service
        .issue_verification_code(IssueVerificationCode { order_id, code }, at)
        .await
        .unwrap();
    service
        .confirm_verification(ConfirmVerification::new(order_id, candidate), at)
        .await
        .unwrap();
    order_id
}

#[tokio::test]
async fn lifecycle_reaches_both_views() {
    let (service, processor, customers, agents) = setup();
    let customer = UserId::new();
    let agent = UserId::new();

    let order_id = place_and_verify(&service, customer, t0()).await;
    service
        .assign_agent(AssignAgent::new(order_id, agent, "agent@example.com"), t0())
        .await
        .unwrap();

    processor.run_catch_up().await.unwrap();

    let listing = customers.orders_for_customer(customer, t0()).await;
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].summary.status, OrderStatus::OutForDelivery);
    assert_eq!(listing[0].summary.total_amount, Money::from_cents(129_800));
    assert_eq!(agents.dashboard(agent).await.active, 1);

    service
        .mark_delivered(MarkDelivered { order_id, agent_id: agent }, t0())
        .await
        .unwrap();
    processor.run_catch_up().await.unwrap();

    let dashboard = agents.dashboard(agent).await;
    assert_eq!(dashboard.total_assigned, 1);
    assert_eq!(dashboard.active, 0);
    assert_eq!(dashboard.delivered, 1);
    assert_eq!(
        customers.get_order(order_id).await.unwrap().status,
        OrderStatus::Delivered
    );
}

#[tokio::test]
async fn listing_orders_and_cancellation_flag() {
    let (service, processor, customers, _) = setup();
    let customer = UserId::new();

    let first = place_cmd(customer);
    let first_id = first.order_id;
    service.place_order(first, t0()).await.unwrap();

    let second = place_cmd(customer);
    let second_id = second.order_id;
    service
        .place_order(second, t0() + Duration::minutes(30))
        .await
        .unwrap();

    let third = place_cmd(customer);
    let third_id = third.order_id;
    service
        .place_order(third, t0() + Duration::minutes(40))
        .await
        .unwrap();
    service
        .cancel_order(
            CancelOrder::by_customer(third_id, customer),
            t0() + Duration::minutes(45),
        )
        .await
        .unwrap();

    processor.run_catch_up().await.unwrap();

    let now = t0() + Duration::minutes(75);
    let listing = customers.orders_for_customer(customer, now).await;
    let rows: Vec<_> = listing
        .iter()
        .map(|l| (l.summary.order_id, l.is_cancellable))
        .collect();
    assert_eq!(
        rows,
        [(third_id, false), (second_id, true), (first_id, false)]
    );
}

#[tokio::test]
async fn unassignment_clears_agent_workload() {
    let (service, processor, customers, agents) = setup();
    let customer = UserId::new();
    let agent = UserId::new();

    let mut orders = Vec::new();
    for _ in 0..3 {
        let order_id = place_and_verify(&service, customer, t0()).await;
        service
            .assign_agent(AssignAgent::new(order_id, agent, "agent@example.com"), t0())
            .await
            .unwrap();
        orders.push(order_id);
    }
    processor.run_catch_up().await.unwrap();
    assert_eq!(agents.dashboard(agent).await.active, 3);

    for order_id in &orders[..2] {
        service
            .release_assignment(
                ReleaseAssignment {
                    order_id: *order_id,
                    agent_id: agent,
                },
                t0(),
            )
            .await
            .unwrap();
    }
    processor.run_catch_up().await.unwrap();

    let dashboard = agents.dashboard(agent).await;
    assert_eq!(dashboard.total_assigned, 1);
    assert_eq!(dashboard.active_orders, vec![orders[2]]);
    let summary = customers.get_order(orders[0]).await.unwrap();
    assert_eq!(summary.status, OrderStatus::OrderReceived);
    assert!(summary.assigned_agent_email.is_none());
}

#[tokio::test]
async fn rebuild_produces_same_state() {
    let (service, processor, customers, agents) = setup();
    let customer = UserId::new();
    let agent = UserId::new();

    let order_id = place_and_verify(&service, customer, t0()).await;
    service
        .assign_agent(AssignAgent::new(order_id, agent, "agent@example.com"), t0())
        .await
        .unwrap();
    processor.run_catch_up().await.unwrap();

    let before = customers.orders_for_customer(customer, t0()).await;
    let dashboard_before = agents.dashboard(agent).await;

    processor.rebuild_all().await.unwrap();

    assert_eq!(customers.orders_for_customer(customer, t0()).await, before);
    assert_eq!(agents.dashboard(agent).await, dashboard_before);
}
