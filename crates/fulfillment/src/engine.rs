//! Order lifecycle orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, Clock, ShippingAddress, UserId};
use document_store::{CartLine, DocumentStore, Product, StockLine};
use domain::{
    AdminCancelOrder, CancelOrder, ConfirmVerification, IssueVerificationCode, MarkDelivered,
    OneTimeCode, Order, OrderLine, OrderService, OtpPurpose, PlaceOrder,
};
use event_store::EventStore;

use crate::cart::CartService;
use crate::error::{FulfillmentError, Result};
use crate::messages;
use crate::notifier::{Notifier, deliver};
use crate::router::AssignmentRouter;
use crate::settings::EngineSettings;
use crate::view::OrderView;

/// Drives an order from checkout to a terminal state.
///
/// Stock lives in the document store and is reserved before an order is
/// committed to the journal; every later transition is a version-checked
/// append on the order stream.
pub struct OrderLifecycleEngine<S: EventStore, D: DocumentStore> {
    orders: Arc<OrderService<S>>,
    documents: D,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl<S, D> OrderLifecycleEngine<S, D>
where
    S: EventStore + 'static,
    D: DocumentStore,
{
    pub fn new(
        store: S,
        documents: D,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(store)),
            documents,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn store(&self) -> &S {
        self.orders.store()
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Assignment operations over the same journal and documents.
    pub fn router(&self) -> AssignmentRouter<S, D> {
        AssignmentRouter::new(
            Arc::clone(&self.orders),
            self.documents.clone(),
            Arc::clone(&self.notifier),
            Arc::clone(&self.clock),
        )
    }

    pub fn carts(&self) -> CartService<D> {
        CartService::new(self.documents.clone())
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<OrderView> {
        let order = self.load(order_id).await?;
        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Like [`get_order`](Self::get_order) but only for the order's owner.
    pub async fn get_order_for_customer(
        &self,
        order_id: AggregateId,
        customer_id: UserId,
    ) -> Result<OrderView> {
        let order = self.load(order_id).await?;
        if order.customer_id() != Some(customer_id) {
            return Err(FulfillmentError::not_found("order", order_id));
        }
        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Turns the caller's cart into a `Pending` order.
    ///
    /// The cart is claimed first, so two checkouts racing on the same cart
    /// produce one order. All lines are then reserved in one all-or-nothing
    /// step. If the order cannot be committed afterwards the reservation is
    /// handed back and the cart restored.
    #[tracing::instrument(skip(self), fields(order_id))]
    pub async fn place_order(&self, user_id: UserId) -> Result<OrderView> {
        let started = Instant::now();
        let result = self.checkout(user_id).await;
        if let Err(e) = &result {
            metrics::counter!("checkout_rejected_total", "reason" => e.kind()).increment(1);
        }
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn checkout(&self, user_id: UserId) -> Result<OrderView> {
        let account = self
            .documents
            .account(user_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("account", user_id))?;
        let address = account
            .deliverable_address()
            .cloned()
            .ok_or_else(|| FulfillmentError::Validation("shipping address is incomplete".into()))?;

        let cart = self.documents.take_cart(user_id).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::Validation("cart is empty".into()));
        }

        let (order_id, order) = match self
            .commit_cart(user_id, &account.email, address, &cart)
            .await
        {
            Ok(placed) => placed,
            Err(e) => {
                if let Err(restore_err) = self.documents.restore_cart(user_id, &cart).await {
                    tracing::error!(%user_id, error = %restore_err, "checkout failed and cart not restored");
                }
                return Err(e);
            }
        };

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(%order_id, total = %order.total_amount(), "order placed");

        deliver(
            self.notifier.as_ref(),
            order.customer_email(),
            &messages::order_placed(order_id, &order),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Reserves stock for a claimed cart and commits the order.
    async fn commit_cart(
        &self,
        user_id: UserId,
        email: &str,
        address: ShippingAddress,
        cart: &[CartLine],
    ) -> Result<(AggregateId, Order)> {
        if let Some(line) = cart.iter().find(|l| l.quantity == 0) {
            return Err(FulfillmentError::Validation(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }

        let ids: Vec<_> = cart.iter().map(|l| l.product_id).collect();
        let products: HashMap<_, Product> = self
            .documents
            .products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(cart.len());
        let mut reservation = Vec::with_capacity(cart.len());
        for item in cart {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| FulfillmentError::not_found("product", item.product_id))?;
            lines.push(
                OrderLine::new(product.id, &product.name, product.price, item.quantity)
                    .with_image(product.image_url.clone()),
            );
            reservation.push(StockLine::new(product.id, item.quantity));
        }

        self.documents.reserve_all(&reservation).await?;

        let cmd = PlaceOrder::new(user_id, email, lines, address)
            .with_cancellation_window(self.settings.cancellation_window_minutes);
        let order_id = cmd.order_id;
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        match self.orders.place_order(cmd, self.clock.now()).await {
            Ok(placed) => Ok((order_id, placed.aggregate)),
            Err(e) => {
                tracing::error!(%order_id, error = %e, "order not committed, releasing reservation");
                if let Err(release_err) = self.documents.release_all(&reservation).await {
                    tracing::error!(%order_id, error = %release_err, "failed to release reservation");
                }
                Err(FulfillmentError::from_domain(order_id, e))
            }
        }
    }

    /// Customer cancellation inside the window. The cancel is committed
    /// first; stock goes back only after that succeeded.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: AggregateId, user_id: UserId) -> Result<OrderView> {
        let cancelled = self
            .orders
            .cancel_order(CancelOrder::by_customer(order_id, user_id), self.clock.now())
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let order = cancelled.aggregate;

        self.restock(order_id, &order).await;
        metrics::counter!("orders_cancelled_total", "by" => "customer").increment(1);
        metrics::counter!("order_transitions_total", "to" => "cancelled").increment(1);
        tracing::info!(%order_id, "order cancelled");

        deliver(
            self.notifier.as_ref(),
            order.customer_email(),
            &messages::order_cancelled(order_id, &order),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Admin cancellation of any `Pending` order, with no time window. The
    /// stored reason is `"Admin Cancelled: <reason>"`.
    #[tracing::instrument(skip(self))]
    pub async fn admin_cancel(
        &self,
        order_id: AggregateId,
        admin_id: UserId,
        reason: &str,
    ) -> Result<OrderView> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FulfillmentError::Validation(
                "a cancellation reason is required".into(),
            ));
        }

        let cmd = AdminCancelOrder::new(order_id, admin_id, reason);
        let cancelled = self
            .orders
            .admin_cancel_order(cmd, self.clock.now())
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let order = cancelled.aggregate;

        self.restock(order_id, &order).await;
        metrics::counter!("orders_cancelled_total", "by" => "admin").increment(1);
        metrics::counter!("order_transitions_total", "to" => "cancelled").increment(1);
        tracing::info!(%order_id, %admin_id, reason, "order cancelled by admin");

        deliver(
            self.notifier.as_ref(),
            order.customer_email(),
            &messages::order_cancelled_by_admin(order_id, reason),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Puts a cancelled order's lines back on the shelf. A ledger failure
    /// is logged and counted; the committed cancel stands.
    async fn restock(&self, order_id: AggregateId, order: &Order) {
        let lines: Vec<_> = order
            .lines()
            .iter()
            .map(|l| StockLine::new(l.product_id, l.quantity))
            .collect();
        if let Err(e) = self.documents.release_all(&lines).await {
            metrics::counter!("cancellation_restock_failures_total").increment(1);
            tracing::error!(%order_id, error = %e, "order cancelled but stock not released");
        }
    }

    /// Issues a fresh code and sends it to the customer. When the message
    /// cannot be delivered the code is revoked again.
    #[tracing::instrument(skip(self))]
    pub async fn request_verification_code(&self, order_id: AggregateId) -> Result<OrderView> {
        let now = self.clock.now();
        let code = OneTimeCode::issue(
            OtpPurpose::OrderVerification,
            self.settings.verification_code_length,
            self.settings.verification_code_ttl_minutes,
            now,
        )
        .map_err(|e| FulfillmentError::Validation(e.to_string()))?;
        let message = messages::verification_code(
            order_id,
            &code.code,
            self.settings.verification_code_ttl_minutes,
        );

        let issued = self
            .orders
            .issue_verification_code(IssueVerificationCode { order_id, code }, now)
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let email = issued.aggregate.customer_email().to_string();

        if !deliver(self.notifier.as_ref(), &email, &message).await {
            self.orders
                .revoke_verification_code(order_id, self.clock.now())
                .await
                .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
            return Err(FulfillmentError::NotificationFailed(email));
        }

        tracing::info!(%order_id, "verification code sent");
        Ok(OrderView::from_order(order_id, &issued.aggregate, self.clock.now()))
    }

    #[tracing::instrument(skip(self, code))]
    pub async fn confirm_verification(&self, order_id: AggregateId, code: &str) -> Result<OrderView> {
        let verified = self
            .orders
            .confirm_verification(ConfirmVerification::new(order_id, code), self.clock.now())
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let order = verified.aggregate;

        metrics::counter!("order_transitions_total", "to" => "order_received").increment(1);
        tracing::info!(%order_id, "order verified");

        deliver(
            self.notifier.as_ref(),
            order.customer_email(),
            &messages::status_updated(order_id, &order),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: AggregateId, agent_id: UserId) -> Result<OrderView> {
        let delivered = self
            .orders
            .mark_delivered(MarkDelivered { order_id, agent_id }, self.clock.now())
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let order = delivered.aggregate;

        metrics::counter!("order_transitions_total", "to" => "delivered").increment(1);
        tracing::info!(%order_id, %agent_id, "order delivered");

        deliver(
            self.notifier.as_ref(),
            order.customer_email(),
            &messages::order_delivered(order_id, &order),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    async fn load(&self, order_id: AggregateId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?
            .ok_or_else(|| FulfillmentError::not_found("order", order_id))
    }
}
