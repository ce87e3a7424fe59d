//! Integration tests for the Order aggregate.
//!
//! These tests go through the journal: events are persisted, reloaded and
//! replayed, and concurrent writers race on the same stream.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Money, ProductId, ShippingAddress, UserId};
use domain::{
    Aggregate, AssignAgent, CancelOrder, ConfirmVerification, DomainError, DomainEvent,
    HandBack, IssueVerificationCode, OneTimeCode, Order, OrderError, OrderEvent, OrderLine,
    OrderService, OrderStatus, OtpPurpose, PlaceOrder, ReleaseAssignment,
};
use event_store::{EventStore, InMemoryEventStore, Version};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap()
}

fn create_service() -> OrderService<InMemoryEventStore> {
    OrderService::new(InMemoryEventStore::new())
}

fn address(city: &str) -> ShippingAddress {
    ShippingAddress {
        name: "Kiran".into(),
        phone: "9123456789".into(),
        pincode: "700001".into(),
        city_village: city.into(),
        landmark: None,
    }
}

fn place_cmd(customer: UserId) -> PlaceOrder {
    PlaceOrder::new(
        customer,
        "kiran@example.com",
        vec![
            OrderLine::new(ProductId::new(), "Terracotta Vase", Money::from_cents(89_900), 1),
            OrderLine::new(ProductId::new(), "Wall Hanging", Money::from_cents(24_950), 3),
        ],
        address("Kolkata"),
    )
}

async fn verified_order(service: &OrderService<InMemoryEventStore>) -> Order {
    let cmd = place_cmd(UserId::new());
    let order_id = cmd.order_id;
    service.place_order(cmd, t0()).await.unwrap();

    let code = OneTimeCode::issue(OtpPurpose::OrderVerification, 6, 10, t0()).unwrap();
    let candidate = code.code.clone();
    service
        .issue_verification_code(IssueVerificationCode { order_id, code }, t0())
        .await
        .unwrap();
    service
        .confirm_verification(ConfirmVerification::new(order_id, candidate), t0())
        .await
        .unwrap()
        .aggregate
}

mod replay {
    use super::*;

    #[tokio::test]
    async fn aggregate_reconstruction_from_events() {
        let service = create_service();
        let order = verified_order(&service).await;
        let order_id = order.id().unwrap();

        let envelopes = service
            .store()
            .get_events_for_aggregate(order_id)
            .await
            .unwrap();
        let types: Vec<_> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            ["OrderPlaced", "VerificationCodeIssued", "OrderVerified"]
        );

        let mut replayed = Order::default();
        for envelope in &envelopes {
            let event: OrderEvent = envelope.decode().unwrap();
            replayed.apply(event);
            replayed.set_version(envelope.version);
        }

        assert_eq!(replayed.status(), OrderStatus::OrderReceived);
        assert_eq!(replayed.version(), Version::new(3));
        assert_eq!(replayed.total_amount(), order.total_amount());
    }

    #[tokio::test]
    async fn placement_snapshot_survives_later_transitions() {
        let service = create_service();
        let order = verified_order(&service).await;
        let order_id = order.id().unwrap();
        let total = order.total_amount();
        let lines = order.lines().to_vec();

        let agent = UserId::new();
        service
            .assign_agent(AssignAgent::new(order_id, agent, "agent@example.com"), t0())
            .await
            .unwrap();
        service
            .release_assignment(ReleaseAssignment { order_id, agent_id: agent }, t0())
            .await
            .unwrap();

        let reloaded = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(reloaded.total_amount(), total);
        assert_eq!(reloaded.total_amount(), Money::from_cents(89_900 + 3 * 24_950));
        assert_eq!(reloaded.lines(), lines.as_slice());
        assert_eq!(reloaded.shipping_address(), &address("Kolkata"));
        assert_eq!(reloaded.cancellation_deadline(), Some(t0() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn stored_event_type_matches_payload() {
        let service = create_service();
        let cmd = place_cmd(UserId::new());
        let order_id = cmd.order_id;
        let result = service.place_order(cmd, t0()).await.unwrap();

        let envelopes = service
            .store()
            .get_events_for_aggregate(order_id)
            .await
            .unwrap();
        assert_eq!(envelopes[0].event_type, result.events[0].event_type());
        assert_eq!(envelopes[0].payload["type"], "OrderPlaced");
        assert_eq!(envelopes[0].aggregate_type, "Order");
    }
}

mod cancellation_window {
    use super::*;

    #[tokio::test]
    async fn cancel_at_59_minutes_succeeds() {
        let service = create_service();
        let customer = UserId::new();
        let cmd = place_cmd(customer);
        let order_id = cmd.order_id;
        service.place_order(cmd, t0()).await.unwrap();

        let result = service
            .cancel_order(
                CancelOrder::by_customer(order_id, customer),
                t0() + Duration::minutes(59),
            )
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Cancelled);
        assert_eq!(
            result.aggregate.cancellation_reason(),
            Some("Cancelled by customer")
        );
    }

    #[tokio::test]
    async fn cancel_at_61_minutes_fails() {
        let service = create_service();
        let customer = UserId::new();
        let cmd = place_cmd(customer);
        let order_id = cmd.order_id;
        service.place_order(cmd, t0()).await.unwrap();

        let result = service
            .cancel_order(
                CancelOrder::by_customer(order_id, customer),
                t0() + Duration::minutes(61),
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotCancellable {
                status: OrderStatus::Pending,
                ..
            }))
        ));

        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn custom_window_is_respected() {
        let service = create_service();
        let customer = UserId::new();
        let cmd = place_cmd(customer).with_cancellation_window(5);
        let order_id = cmd.order_id;
        service.place_order(cmd, t0()).await.unwrap();

        let result = service
            .cancel_order(
                CancelOrder::by_customer(order_id, customer),
                t0() + Duration::minutes(6),
            )
            .await;
        assert!(result.is_err());
    }
}

mod assignment {
    use super::*;

    #[tokio::test]
    async fn hand_back_returns_order_to_queue() {
        let service = create_service();
        let order = verified_order(&service).await;
        let order_id = order.id().unwrap();
        let agent = UserId::new();

        service
            .assign_agent(AssignAgent::new(order_id, agent, "agent@example.com"), t0())
            .await
            .unwrap();
        let result = service
            .hand_back(HandBack { order_id, agent_id: agent }, t0())
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::OrderReceived);
        assert!(result.aggregate.assignment().is_none());

        let other = UserId::new();
        let reassigned = service
            .assign_agent(AssignAgent::new(order_id, other, "other@example.com"), t0())
            .await
            .unwrap();
        assert_eq!(reassigned.aggregate.assigned_agent(), Some(other));
    }

    #[tokio::test]
    async fn release_for_other_agent_appends_nothing() {
        let service = create_service();
        let order = verified_order(&service).await;
        let order_id = order.id().unwrap();
        service
            .assign_agent(
                AssignAgent::new(order_id, UserId::new(), "agent@example.com"),
                t0(),
            )
            .await
            .unwrap();

        let result = service
            .release_assignment(
                ReleaseAssignment {
                    order_id,
                    agent_id: UserId::new(),
                },
                t0(),
            )
            .await
            .unwrap();
        assert!(result.events.is_empty());
        assert_eq!(result.aggregate.status(), OrderStatus::OutForDelivery);
    }
}
