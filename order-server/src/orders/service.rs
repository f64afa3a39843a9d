//! Order Service — 订单聚合根
//!
//! 下单、取消、支付回调、以及调度器驱动的两类到期转换都在这里。
//! 所有状态变更走 `OrderRepository::transition` 的条件更新；
//! 下单失败时显式补偿（释放已预留库存、恢复已消费折扣码），
//! 对外保持 all-or-nothing 语义。

use std::sync::Arc;

use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use uuid::Uuid;

use crate::db::models::{
    DiscountEffect, DiscountType, Order, OrderCreate, OrderLine, OrderStatus, PaymentMethod,
    order::ORDER_TABLE, product::PRODUCT_TABLE,
};
use crate::db::repository::{
    DiscountRepository, OrderRepository, ProductRepository, parse_record_id,
};
use crate::orders::error::{DiscountRejection, OrderError};
use crate::orders::scheduler::SchedulerHandle;
use crate::orders::shipment::ShipmentService;
use crate::payment::{PaymentGateway, PaymentRedirect};
use crate::utils::time;

/// Checkout input, one per order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub lines: Vec<NewOrderLine>,
}

/// Checkout input, one per line
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub product_discount_code: Option<String>,
    pub shipping_discount_code: Option<String>,
}

/// A successfully placed order
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// Present for digital orders when the gateway produced a redirect
    pub payment_redirect: Option<PaymentRedirect>,
}

/// Order service (Clone-cheap: shares db handle and collaborators)
#[derive(Clone)]
pub struct OrderService {
    db: Surreal<Db>,
    scheduler: SchedulerHandle,
    shipments: ShipmentService,
    gateway: Arc<dyn PaymentGateway>,
    /// Shipping price as a fraction of the product price
    delivery_vat_rate: Decimal,
}

impl OrderService {
    pub fn new(
        db: Surreal<Db>,
        scheduler: SchedulerHandle,
        shipments: ShipmentService,
        gateway: Arc<dyn PaymentGateway>,
        delivery_vat_rate: Decimal,
    ) -> Self {
        Self {
            db,
            scheduler,
            shipments,
            gateway,
            delivery_vat_rate,
        }
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    /// Place an order.
    ///
    /// Lines are processed in input order: product lookup, stock check,
    /// pricing, discount consumption, stock reservation. Any line failure
    /// aborts the whole order; stock and discount codes claimed by earlier
    /// lines are compensated before the error is returned.
    pub async fn create_order(&self, req: NewOrder) -> Result<PlacedOrder, OrderError> {
        let products = ProductRepository::new(self.db.clone());
        let discounts = DiscountRepository::new(self.db.clone());

        // Compensation ledger for claims made before a failure
        let mut reserved: Vec<(surrealdb::RecordId, u32)> = Vec::new();
        let mut consumed: Vec<String> = Vec::new();

        let mut items: Vec<OrderLine> = Vec::with_capacity(req.lines.len());
        let mut total_price = Decimal::ZERO;

        for line in &req.lines {
            match self
                .build_line(line, &products, &discounts, &mut consumed)
                .await
            {
                Ok(built) => {
                    reserved.push((built.product.clone(), line.quantity));
                    total_price += built.price + built.shipping_price;
                    items.push(built);
                }
                Err(e) => {
                    self.compensate(&products, &discounts, &reserved, &consumed)
                        .await;
                    return Err(e);
                }
            }
        }

        let order_status = match req.payment_method {
            PaymentMethod::Cash => OrderStatus::Pending,
            PaymentMethod::Digital => OrderStatus::WaitingForPayment,
        };

        let orders = OrderRepository::new(self.db.clone());
        let order = match orders
            .create(OrderCreate {
                customer_id: req.customer_id,
                items,
                order_status,
                payment_method: req.payment_method,
                shipping_address: req.shipping_address,
                total_price,
                created_at: time::now_millis(),
            })
            .await
        {
            Ok(order) => order,
            Err(e) => {
                self.compensate(&products, &discounts, &reserved, &consumed)
                    .await;
                return Err(e.into());
            }
        };

        let order_key = order.id.to_string();
        if let Err(e) = self.scheduler.schedule(&order_key, req.payment_method) {
            // An order without its timer would sit in a non-terminal state
            // forever; undo the placement and surface an internal error.
            tracing::error!(order_id = %order_key, error = %e, "Failed to arm order timer");
            let _ = orders
                .transition(
                    &order.id,
                    &[OrderStatus::Pending, OrderStatus::WaitingForPayment],
                    OrderStatus::Cancelled,
                )
                .await;
            self.compensate(&products, &discounts, &reserved, &consumed)
                .await;
            return Err(e.into());
        }

        // Digital orders get a redirect URL from the gateway. A gateway
        // failure does not void the order: the customer can retry payment and
        // the countdown timer cleans up if they never do.
        let payment_redirect = match req.payment_method {
            PaymentMethod::Cash => None,
            PaymentMethod::Digital => match self
                .gateway
                .create_redirect(&order_key, order.total_price)
                .await
            {
                Ok(redirect) => Some(redirect),
                Err(e) => {
                    tracing::warn!(order_id = %order_key, error = %e, "Payment redirect unavailable");
                    None
                }
            },
        };

        tracing::info!(
            order_id = %order_key,
            status = ?order.order_status,
            lines = order.items.len(),
            total = %order.total_price,
            "Order placed"
        );
        Ok(PlacedOrder {
            order,
            payment_redirect,
        })
    }

    /// Validate, price and reserve one line.
    ///
    /// Discount codes consumed here are pushed onto `consumed` immediately so
    /// a failure later in the same line still compensates them.
    async fn build_line(
        &self,
        line: &NewOrderLine,
        products: &ProductRepository,
        discounts: &DiscountRepository,
        consumed: &mut Vec<String>,
    ) -> Result<OrderLine, OrderError> {
        let product_id = parse_record_id(PRODUCT_TABLE, &line.product_id)
            .map_err(|_| OrderError::NotFound(format!("Product {}", line.product_id)))?;
        let product = products
            .find_by_id(&product_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Product {}", line.product_id)))?;

        // Early check so the error names the product before any discount code
        // is spent; the authoritative check is the conditional reserve below.
        if product.stock < i64::from(line.quantity) {
            return Err(OrderError::InsufficientStock {
                product: product.name,
            });
        }

        let mut price = product.price * Decimal::from(line.quantity);
        let mut shipping_price = price * self.delivery_vat_rate;

        if let Some(code) = &line.product_discount_code {
            let effect = self
                .validate_and_consume(code, DiscountType::ProductDiscount, discounts)
                .await?;
            consumed.push(code.clone());
            price = effect.apply(price);
        }

        if let Some(code) = &line.shipping_discount_code {
            let effect = self
                .validate_and_consume(code, DiscountType::ShippingDiscount, discounts)
                .await?;
            consumed.push(code.clone());
            shipping_price = effect.apply(shipping_price);
        }

        if !products.reserve(&product_id, line.quantity).await? {
            // Lost a concurrent reservation race since the early check
            return Err(OrderError::InsufficientStock {
                product: product.name,
            });
        }

        Ok(OrderLine {
            line_id: Uuid::new_v4().to_string(),
            product: product_id,
            quantity: line.quantity,
            price,
            shipping_price,
            product_discount_code: line.product_discount_code.clone(),
            shipping_discount_code: line.shipping_discount_code.clone(),
        })
    }

    /// Validate a discount code and atomically mark it used.
    ///
    /// Validation and consumption are fused: the final conditional update is
    /// what decides a concurrent race, the earlier checks only produce
    /// precise rejection reasons.
    async fn validate_and_consume(
        &self,
        code: &str,
        expected_type: DiscountType,
        discounts: &DiscountRepository,
    ) -> Result<DiscountEffect, OrderError> {
        let rejected = |reason| OrderError::DiscountInvalid {
            code: code.to_string(),
            reason,
        };

        let issued = discounts
            .find_by_code(code)
            .await?
            .ok_or_else(|| rejected(DiscountRejection::NotFound))?;
        let cast = discounts
            .find_cast(&issued.cast)
            .await?
            .ok_or_else(|| rejected(DiscountRejection::NotFound))?;

        if cast.discount_type != expected_type {
            return Err(rejected(DiscountRejection::WrongType));
        }
        if issued.is_used {
            return Err(rejected(DiscountRejection::AlreadyUsed));
        }
        if time::now_millis() > cast.expiry_date {
            return Err(rejected(DiscountRejection::Expired));
        }

        if !discounts.consume(code).await? {
            return Err(rejected(DiscountRejection::AlreadyUsed));
        }

        Ok(DiscountEffect {
            method: cast.method,
            quantity: cast.discount_quantity,
        })
    }

    /// Undo claims of a failed checkout. Errors here are logged, not
    /// propagated: the original line error is what the caller must see.
    async fn compensate(
        &self,
        products: &ProductRepository,
        discounts: &DiscountRepository,
        reserved: &[(surrealdb::RecordId, u32)],
        consumed: &[String],
    ) {
        for (product_id, quantity) in reserved {
            if let Err(e) = products.release(product_id, *quantity).await {
                tracing::error!(product_id = %product_id, error = %e, "Compensation failed to release stock");
            }
        }
        for code in consumed {
            if let Err(e) = discounts.restore(code).await {
                tracing::error!(code = %code, error = %e, "Compensation failed to restore discount code");
            }
        }
    }

    // ========================================================================
    // Customer cancel
    // ========================================================================

    /// Cancel an order on behalf of its owner.
    ///
    /// Ownership is part of the lookup filter: a foreign order reads as
    /// NotFound. Cancelling an already-cancelled order is an idempotent
    /// no-op; a confirmed order can no longer be cancelled.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        customer_id: &str,
    ) -> Result<Order, OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        let orders = OrderRepository::new(self.db.clone());

        let existing = orders
            .find_for_customer(&oid, customer_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))?;

        match existing.order_status {
            OrderStatus::Cancelled => {
                // Timer may still linger if a previous cancel crashed mid-way
                self.scheduler.cancel(&existing.id.to_string())?;
                Ok(existing)
            }
            OrderStatus::Confirmed => Err(OrderError::InvalidState(order_id.to_string())),
            OrderStatus::Pending | OrderStatus::WaitingForPayment => {
                match orders
                    .transition(
                        &oid,
                        &[OrderStatus::Pending, OrderStatus::WaitingForPayment],
                        OrderStatus::Cancelled,
                    )
                    .await?
                {
                    Some(order) => {
                        self.release_lines(&order).await;
                        self.scheduler.cancel(&order.id.to_string())?;
                        tracing::info!(order_id = %order.id, "Order cancelled by customer");
                        Ok(order)
                    }
                    // Lost the race against a timer transition; re-read to
                    // answer idempotently
                    None => match orders.find_by_id(&oid).await? {
                        Some(order) if order.order_status == OrderStatus::Cancelled => Ok(order),
                        Some(_) => Err(OrderError::InvalidState(order_id.to_string())),
                        None => Err(OrderError::NotFound(format!("Order {}", order_id))),
                    },
                }
            }
        }
    }

    // ========================================================================
    // Payment callback
    // ========================================================================

    /// Mark a digital order paid (invoked by the payment-callback glue).
    ///
    /// WAITING_FOR_PAYMENT -> CONFIRMED, countdown disarmed, shipments fanned
    /// out. Any other state returns `None` so duplicate or stale callbacks
    /// stay idempotent.
    pub async fn mark_paid(&self, order_id: &str) -> Result<Option<Order>, OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        let orders = OrderRepository::new(self.db.clone());

        match orders
            .transition(&oid, &[OrderStatus::WaitingForPayment], OrderStatus::Confirmed)
            .await?
        {
            Some(order) => {
                self.scheduler.cancel(&order.id.to_string())?;
                if let Err(e) = self.shipments.create_for_order(&order).await {
                    // Additive step; confirmed state stands, fan-out can be
                    // re-run through the shipment service
                    tracing::error!(order_id = %order.id, error = %e, "Shipment fan-out failed after payment");
                }
                tracing::info!(order_id = %order.id, "Order confirmed by payment callback");
                Ok(Some(order))
            }
            None => {
                tracing::debug!(order_id = %order_id, "Payment callback for order not awaiting payment, ignored");
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Timer-driven transitions (called by the confirmation scheduler)
    // ========================================================================

    /// Cash confirmation timer fired: PENDING -> CONFIRMED + shipments.
    ///
    /// An order no longer in PENDING (cancelled meanwhile) makes this a
    /// no-op; the stale timer is still disposed by the caller.
    pub async fn confirm_due_order(&self, order_id: &str) -> Result<(), OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        let orders = OrderRepository::new(self.db.clone());

        match orders
            .transition(&oid, &[OrderStatus::Pending], OrderStatus::Confirmed)
            .await?
        {
            Some(order) => {
                tracing::info!(order_id = %order.id, "Order auto-confirmed");
                if let Err(e) = self.shipments.create_for_order(&order).await {
                    tracing::error!(order_id = %order.id, error = %e, "Shipment fan-out failed after auto-confirm");
                }
                Ok(())
            }
            None => {
                tracing::debug!(order_id = %order_id, "Stale confirmation timer, skipped");
                Ok(())
            }
        }
    }

    /// Digital countdown fired: WAITING_FOR_PAYMENT -> CANCELLED.
    ///
    /// Stock reserved at checkout is released here, so a timed-out order
    /// frees its inventory the same way a customer cancel does.
    pub async fn expire_unpaid_order(&self, order_id: &str) -> Result<(), OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        let orders = OrderRepository::new(self.db.clone());

        match orders
            .transition(&oid, &[OrderStatus::WaitingForPayment], OrderStatus::Cancelled)
            .await?
        {
            Some(order) => {
                self.release_lines(&order).await;
                tracing::info!(order_id = %order.id, "Unpaid digital order cancelled");
                Ok(())
            }
            None => {
                tracing::debug!(order_id = %order_id, "Stale countdown timer, skipped");
                Ok(())
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch one of the customer's orders
    pub async fn get_order(&self, order_id: &str, customer_id: &str) -> Result<Order, OrderError> {
        let oid = parse_record_id(ORDER_TABLE, order_id)
            .map_err(|_| OrderError::NotFound(format!("Order {}", order_id)))?;
        OrderRepository::new(self.db.clone())
            .find_for_customer(&oid, customer_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))
    }

    /// List the customer's orders, newest first
    pub async fn list_orders(&self, customer_id: &str) -> Result<Vec<Order>, OrderError> {
        Ok(OrderRepository::new(self.db.clone())
            .list_for_customer(customer_id)
            .await?)
    }

    /// Release the stock of every line of a cancelled order
    async fn release_lines(&self, order: &Order) {
        let products = ProductRepository::new(self.db.clone());
        for line in &order.items {
            if let Err(e) = products.release(&line.product, line.quantity).await {
                tracing::error!(
                    order_id = %order.id,
                    product_id = %line.product,
                    error = %e,
                    "Failed to release stock on cancellation"
                );
            }
        }
    }
}
