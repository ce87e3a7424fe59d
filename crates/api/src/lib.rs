//! HTTP surface of the storefront order engine.
//!
//! Cart, checkout, verification, assignment and delivery endpoints over the
//! fulfillment engine, with structured logging (tracing) and Prometheus
//! metrics.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Clock;
use document_store::DocumentStore;
use event_store::EventStore;
use fulfillment::{EngineSettings, Notifier, OrderLifecycleEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{AgentWorkloadView, CustomerOrdersView, Projection, ProjectionProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, D>(state: Arc<AppState<S, D>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::view::<S, D>))
        .route("/cart/items", post(routes::cart::add_item::<S, D>))
        .route(
            "/cart/items/{product_id}",
            axum::routing::put(routes::cart::update_item::<S, D>)
                .delete(routes::cart::remove_item::<S, D>),
        )
        .route("/orders", post(routes::orders::place::<S, D>))
        .route("/orders/mine", get(routes::orders::mine::<S, D>))
        .route("/orders/{id}", get(routes::orders::get::<S, D>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, D>))
        .route(
            "/orders/{id}/admin-cancel",
            post(routes::orders::admin_cancel::<S, D>),
        )
        .route(
            "/orders/{id}/verification-code",
            post(routes::orders::request_code::<S, D>),
        )
        .route("/orders/{id}/verify", post(routes::orders::verify::<S, D>))
        .route("/orders/{id}/assign", post(routes::orders::assign::<S, D>))
        .route(
            "/orders/{id}/hand-back",
            post(routes::orders::hand_back::<S, D>),
        )
        .route("/orders/{id}/deliver", post(routes::orders::deliver::<S, D>))
        .route(
            "/agents/me/dashboard",
            get(routes::agents::dashboard::<S, D>),
        )
        .route(
            "/agents/{id}/unassign",
            post(routes::agents::unassign::<S, D>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the engine, router, cart service and read models over one journal
/// and one document store.
pub fn create_state<S, D>(
    event_store: S,
    documents: D,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
) -> Arc<AppState<S, D>>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    let engine =
        OrderLifecycleEngine::new(event_store.clone(), documents, notifier, clock, settings);
    let router = engine.router();
    let carts = engine.carts();

    let customer_orders = CustomerOrdersView::new();
    let agent_workload = AgentWorkloadView::new();

    let mut processor = ProjectionProcessor::new(event_store);
    processor.register(Box::new(customer_orders.clone()) as Box<dyn Projection>);
    processor.register(Box::new(agent_workload.clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        engine,
        router,
        carts,
        customer_orders,
        agent_workload,
        projection_processor: Arc::new(processor),
    })
}
