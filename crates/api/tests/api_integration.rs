//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, Role, ShippingAddress, SystemClock, UserId};
use document_store::{Account, AccountDirectory, InMemoryDocumentStore, InventoryLedger, Product};
use event_store::InMemoryEventStore;
use fulfillment::{EngineSettings, RecordingNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    docs: InMemoryDocumentStore,
    notifier: RecordingNotifier,
    customer: UserId,
    customer_email: &'static str,
    admin: UserId,
    agent: UserId,
    lamp: ProductId,
}

impl TestApp {
    async fn new() -> Self {
        let docs = InMemoryDocumentStore::new();
        let notifier = RecordingNotifier::new();

        let customer = Account::new("Asha", "asha@example.com", Role::Customer).with_address(
            ShippingAddress {
                name: "Asha".into(),
                phone: "9876543210".into(),
                pincode: "560001".into(),
                city_village: "Bengaluru".into(),
                landmark: None,
            },
        );
        let admin = Account::new("Ops", "ops@example.com", Role::Admin);
        let agent = Account::new("Kiran", "kiran@example.com", Role::DeliveryAgent);
        let lamp = Product::new("Brass lamp", Money::from_cents(89_900), 4);

        let ids = (customer.id, admin.id, agent.id, lamp.id);
        docs.upsert_account(customer).await.unwrap();
        docs.upsert_account(admin).await.unwrap();
        docs.upsert_account(agent).await.unwrap();
        docs.upsert_product(lamp).await.unwrap();

        let state = api::create_state(
            InMemoryEventStore::new(),
            docs.clone(),
            Arc::new(notifier.clone()),
            Arc::new(SystemClock),
            EngineSettings::default(),
        );
        let app = api::create_app(state, get_metrics_handle());

        Self {
            app,
            docs,
            notifier,
            customer: ids.0,
            customer_email: "asha@example.com",
            admin: ids.1,
            agent: ids.2,
            lamp: ids.3,
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        caller: Option<(UserId, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = caller {
            builder = builder
                .header("x-user-id", user_id.to_string())
                .header("x-user-role", role);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn as_customer(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some((self.customer, "customer")), body)
            .await
    }

    async fn as_admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some((self.admin, "admin")), body).await
    }

    async fn as_agent(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some((self.agent, "delivery_agent")), body)
            .await
    }

    /// Adds two lamps to the cart and checks out, returning the order id.
    async fn place_order(&self) -> String {
        let (status, _) = self
            .as_customer(
                "POST",
                "/cart/items",
                Some(json!({ "product_id": self.lamp.to_string(), "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, order) = self.as_customer("POST", "/orders", None).await;
        assert_eq!(status, StatusCode::CREATED);
        order["id"].as_str().unwrap().to_string()
    }

    /// Issues a code and reads it back from the verification message.
    async fn issue_code(&self, order_id: &str) -> String {
        let (status, _) = self
            .as_admin("POST", &format!("/orders/{order_id}/verification-code"), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let sent = self.notifier.sent_to(self.customer_email).await;
        let message = sent.last().unwrap();
        message
            .text
            .split("following code: ")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap()
            .trim()
            .to_string()
    }

    async fn stock(&self) -> u32 {
        self.docs.product(self.lamp).await.unwrap().unwrap().stock
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, json) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_cart_then_checkout() {
    let app = TestApp::new().await;

    let (status, cart) = app
        .as_customer(
            "POST",
            "/cart/items",
            Some(json!({ "product_id": app.lamp.to_string(), "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal"], 3 * 89_900);

    let (status, order) = app.as_customer("POST", "/orders", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["total_amount"], 3 * 89_900);
    assert_eq!(order["is_cancellable"], true);
    assert_eq!(app.stock().await, 1);

    let (_, cart) = app.as_customer("GET", "/cart", None).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 0);

    let placed = app.notifier.sent_to(app.customer_email).await;
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].subject, "Your Order Has Been Placed!");
}

#[tokio::test]
async fn test_checkout_beyond_stock_is_conflict() {
    let app = TestApp::new().await;
    app.as_customer(
        "POST",
        "/cart/items",
        Some(json!({ "product_id": app.lamp.to_string(), "quantity": 4 })),
    )
    .await;
    app.docs.set_stock(app.lamp, 1).await.unwrap();

    let (status, body) = app.as_customer("POST", "/orders", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));
    assert_eq!(app.stock().await, 1);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.call("POST", "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));

    let (status, _) = app
        .call("POST", "/orders", Some((app.customer, "wizard")), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;

    let (status, _) = app
        .as_customer("POST", &format!("/orders/{order_id}/verification-code"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.as_admin("POST", "/orders", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    assert_eq!(app.stock().await, 2);

    let (status, order) = app
        .as_customer("POST", &format!("/orders/{order_id}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Cancelled");
    assert_eq!(app.stock().await, 4);

    let (status, _) = app
        .as_customer("POST", &format!("/orders/{order_id}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_cancel_restocks_and_records_reason() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    let uri = format!("/orders/{order_id}/admin-cancel");
    let body = json!({ "reason": "Address incorrect/incomplete" });

    let (status, _) = app.as_customer("POST", &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .as_admin("POST", &uri, Some(json!({ "reason": " " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = app.as_admin("POST", &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Cancelled");
    assert_eq!(
        order["cancellation_reason"],
        "Admin Cancelled: Address incorrect/incomplete"
    );
    assert_eq!(app.stock().await, 4);

    let sent = app.notifier.sent_to(app.customer_email).await;
    assert!(
        sent.last()
            .unwrap()
            .html
            .contains("cancelled by administration")
    );

    let (status, _) = app.as_admin("POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.stock().await, 4);
}

#[tokio::test]
async fn test_my_orders_listing() {
    let app = TestApp::new().await;
    let first = app.place_order().await;
    let second = app.place_order().await;

    let (status, orders) = app.as_customer("GET", "/orders/mine", None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    let ids: Vec<&str> = orders
        .iter()
        .map(|o| o["order_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&first.as_str()));
    assert!(ids.contains(&second.as_str()));
    assert!(orders.iter().all(|o| o["is_cancellable"] == true));
}

#[tokio::test]
async fn test_verification_wrong_code_then_right_code() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    let code = app.issue_code(&order_id).await;

    let (status, _) = app
        .as_admin(
            "POST",
            &format!("/orders/{order_id}/verify"),
            Some(json!({ "code": "not-the-code" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, order) = app
        .as_admin(
            "POST",
            &format!("/orders/{order_id}/verify"),
            Some(json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "OrderReceived");
    assert_eq!(order["is_cancellable"], false);
}

#[tokio::test]
async fn test_failed_code_delivery_is_bad_gateway() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    app.notifier.set_fail(true);

    let (status, body) = app
        .as_admin("POST", &format!("/orders/{order_id}/verification-code"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains(app.customer_email));
}

#[tokio::test]
async fn test_assign_pending_order_is_conflict() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;

    let (status, _) = app
        .as_admin(
            "POST",
            &format!("/orders/{order_id}/assign"),
            Some(json!({ "agent_id": app.agent.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_assign_deliver_and_dashboard() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    let code = app.issue_code(&order_id).await;
    app.as_admin(
        "POST",
        &format!("/orders/{order_id}/verify"),
        Some(json!({ "code": code })),
    )
    .await;

    let (status, order) = app
        .as_admin(
            "POST",
            &format!("/orders/{order_id}/assign"),
            Some(json!({ "agent_id": app.agent.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "OutForDelivery");
    assert_eq!(order["assigned_agent_email"], "kiran@example.com");

    let (status, dashboard) = app.as_agent("GET", "/agents/me/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["total_assigned"], 1);
    assert_eq!(dashboard["active"], 1);

    let (status, seen) = app
        .as_agent("GET", &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["id"], order_id.as_str());

    let (status, order) = app
        .as_agent("POST", &format!("/orders/{order_id}/deliver"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Delivered");

    let (_, dashboard) = app.as_agent("GET", "/agents/me/dashboard", None).await;
    assert_eq!(dashboard["active"], 0);
    assert_eq!(dashboard["delivered"], 1);
}

#[tokio::test]
async fn test_unassign_agent_moves_orders_back() {
    let app = TestApp::new().await;
    let order_id = app.place_order().await;
    let code = app.issue_code(&order_id).await;
    app.as_admin(
        "POST",
        &format!("/orders/{order_id}/verify"),
        Some(json!({ "code": code })),
    )
    .await;
    app.as_admin(
        "POST",
        &format!("/orders/{order_id}/assign"),
        Some(json!({ "agent_id": app.agent.to_string() })),
    )
    .await;

    let (status, body) = app
        .as_admin("POST", &format!("/agents/{}/unassign", app.agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moved"], 1);
    assert_eq!(body["failed"], 0);

    let (_, order) = app
        .as_admin("GET", &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(order["status"], "OrderReceived");
    assert_eq!(order["assigned_agent_id"], Value::Null);
}

#[tokio::test]
async fn test_unknown_and_foreign_orders_are_not_found() {
    let app = TestApp::new().await;
    let unknown = common::AggregateId::new();
    let (status, _) = app
        .as_admin("GET", &format!("/orders/{unknown}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let order_id = app.place_order().await;
    let (status, _) = app
        .call(
            "GET",
            &format!("/orders/{order_id}"),
            Some((UserId::new(), "customer")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .as_agent("GET", &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_order_id_is_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app.as_admin("GET", "/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid order id"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;
    app.place_order().await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
