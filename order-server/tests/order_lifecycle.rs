//! 订单生命周期集成测试
//!
//! 使用嵌入式数据库和 redb 定时器存储跑完整闭环：
//! 下单 → 定时器 → 确认 / 取消 → shipment 扇出。

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio_util::sync::CancellationToken;

use order_server::db::init_db;
use order_server::db::models::{
    DiscountCode, DiscountCodeCastCreate, DiscountCodeCreate, DiscountMethod, DiscountType,
    OrderStatus, PaymentMethod, Product, ProductCreate,
};
use order_server::db::repository::{DiscountRepository, ProductRepository, ShipmentRepository};
use order_server::orders::{
    ConfirmationScheduler, DiscountRejection, NewOrder, NewOrderLine, OrderError, OrderService,
    SchedulerHandle, ShipmentService, TimerNamespace, TimerPolicy, TimerStore,
};
use order_server::payment::{PaymentError, PaymentGateway, PaymentRedirect};

const CUSTOMER: &str = "customer-1";

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Gateway stub that always hands back a redirect
struct StubGateway;

#[async_trait::async_trait]
impl PaymentGateway for StubGateway {
    async fn create_redirect(
        &self,
        order_id: &str,
        _amount: Decimal,
    ) -> Result<PaymentRedirect, PaymentError> {
        Ok(PaymentRedirect {
            redirect_url: format!("https://pay.test/{}", order_id),
            transaction_id: "txn-test".to_string(),
        })
    }
}

struct TestEnv {
    // Keeps the on-disk database alive for the test's duration
    _work_dir: tempfile::TempDir,
    db: Surreal<Db>,
    timers: Arc<TimerStore>,
    orders: OrderService,
}

impl TestEnv {
    async fn new(policy: TimerPolicy) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let db = init_db(&work_dir.path().join("database")).await.unwrap();
        let timers = Arc::new(TimerStore::open(work_dir.path().join("timers.redb")).unwrap());

        let scheduler = SchedulerHandle::new(timers.clone(), policy);
        let shipments = ShipmentService::new(db.clone(), 4);
        let orders = OrderService::new(
            db.clone(),
            scheduler,
            shipments,
            Arc::new(StubGateway),
            dec("0.05"),
        );

        Self {
            _work_dir: work_dir,
            db,
            timers,
            orders,
        }
    }

    /// Policy where no timer comes due on its own
    async fn idle() -> Self {
        Self::new(TimerPolicy {
            cash_confirm_timeout_secs: 3_600,
            digital_payment_timeout_secs: 3_600,
            ttl_margin_secs: 600,
        })
        .await
    }

    /// Policy where every timer is due as soon as it is armed
    async fn immediate() -> Self {
        Self::new(TimerPolicy {
            cash_confirm_timeout_secs: 0,
            digital_payment_timeout_secs: 0,
            ttl_margin_secs: 600,
        })
        .await
    }

    async fn seed_product(&self, name: &str, price: &str, stock: i64) -> Product {
        ProductRepository::new(self.db.clone())
            .create(ProductCreate {
                store_id: "store-1".to_string(),
                name: name.to_string(),
                price: dec(price),
                stock,
                category: "test".to_string(),
            })
            .await
            .unwrap()
    }

    async fn seed_discount(
        &self,
        code: &str,
        discount_type: DiscountType,
        method: DiscountMethod,
        quantity: &str,
        expiry_date: i64,
    ) -> DiscountCode {
        let repo = DiscountRepository::new(self.db.clone());
        let cast = repo
            .create_cast(DiscountCodeCastCreate {
                code: format!("cast-{}", code),
                discount_type,
                method,
                discount_quantity: dec(quantity),
                expiry_date,
                quantity: 100,
            })
            .await
            .unwrap();
        repo.create_code(DiscountCodeCreate {
            cast: cast.id,
            code: code.to_string(),
            is_used: false,
        })
        .await
        .unwrap()
    }

    async fn stock_of(&self, product: &Product) -> i64 {
        ProductRepository::new(self.db.clone())
            .find_by_id(&product.id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn code_is_used(&self, code: &str) -> bool {
        DiscountRepository::new(self.db.clone())
            .find_by_code(code)
            .await
            .unwrap()
            .unwrap()
            .is_used
    }

    /// One scheduler pass, same code path the background task runs
    async fn reconcile(&self) {
        ConfirmationScheduler::new(
            self.timers.clone(),
            self.orders.clone(),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .reconcile()
        .await;
    }
}

fn plain_line(product: &Product, quantity: u32) -> NewOrderLine {
    NewOrderLine {
        product_id: product.id.to_string(),
        quantity,
        product_discount_code: None,
        shipping_discount_code: None,
    }
}

fn order_of(lines: Vec<NewOrderLine>, method: PaymentMethod) -> NewOrder {
    NewOrder {
        customer_id: CUSTOMER.to_string(),
        payment_method: method,
        shipping_address: "123 Test Street".to_string(),
        lines,
    }
}

fn far_future() -> i64 {
    order_server::utils::now_millis() + 86_400_000
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn cash_checkout_reserves_stock_and_arms_confirmation_timer() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Keyboard", "100", 5).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 2)], PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(placed.order.order_status, OrderStatus::Pending);
    assert!(placed.payment_redirect.is_none());
    // 2 * 100 plus 5% shipping
    assert_eq!(placed.order.total_price, dec("210.00"));
    assert_eq!(env.stock_of(&product).await, 3);

    let order_id = placed.order.id.to_string();
    let entry = env
        .timers
        .get(TimerNamespace::OrderConfirmation, &order_id)
        .unwrap()
        .expect("confirmation timer must be armed");
    assert!(entry.due_at > order_server::utils::now_millis());
    assert!(entry.expires_at > entry.due_at);
}

#[tokio::test]
async fn digital_checkout_waits_for_payment_with_countdown_and_redirect() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Mouse", "50", 3).await;

    let placed = env
        .orders
        .create_order(order_of(
            vec![plain_line(&product, 1)],
            PaymentMethod::Digital,
        ))
        .await
        .unwrap();

    assert_eq!(placed.order.order_status, OrderStatus::WaitingForPayment);
    let redirect = placed.payment_redirect.expect("stub gateway always answers");
    assert!(redirect.redirect_url.starts_with("https://pay.test/"));

    let order_id = placed.order.id.to_string();
    assert!(
        env.timers
            .get(TimerNamespace::DigitalOrderCountdown, &order_id)
            .unwrap()
            .is_some()
    );
    assert!(
        env.timers
            .get(TimerNamespace::OrderConfirmation, &order_id)
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn insufficient_stock_rejects_the_order() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Monitor", "300", 1).await;

    let err = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 2)], PaymentMethod::Cash))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InsufficientStock { .. }));
    assert_eq!(env.stock_of(&product).await, 1);
    assert!(env.orders.list_orders(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_line_compensates_earlier_claims() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Desk", "200", 4).await;
    env.seed_discount(
        "SAVE20",
        DiscountType::ProductDiscount,
        DiscountMethod::Percentage,
        "0.2",
        far_future(),
    )
    .await;

    let good_line = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 2,
        product_discount_code: Some("SAVE20".to_string()),
        shipping_discount_code: None,
    };
    let bad_line = NewOrderLine {
        product_id: "product:missing".to_string(),
        quantity: 1,
        product_discount_code: None,
        shipping_discount_code: None,
    };

    let err = env
        .orders
        .create_order(order_of(vec![good_line, bad_line], PaymentMethod::Cash))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::NotFound(_)));
    // Stock and discount code claimed by the first line are rolled back
    assert_eq!(env.stock_of(&product).await, 4);
    assert!(!env.code_is_used("SAVE20").await);
    assert!(env.orders.list_orders(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn discounts_apply_per_line_and_are_single_use() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Chair", "100", 10).await;
    env.seed_discount(
        "SAVE10",
        DiscountType::ProductDiscount,
        DiscountMethod::Percentage,
        "0.1",
        far_future(),
    )
    .await;
    env.seed_discount(
        "SHIP3",
        DiscountType::ShippingDiscount,
        DiscountMethod::FixedAmount,
        "3",
        far_future(),
    )
    .await;

    let line = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("SAVE10".to_string()),
        shipping_discount_code: Some("SHIP3".to_string()),
    };
    let placed = env
        .orders
        .create_order(order_of(vec![line], PaymentMethod::Cash))
        .await
        .unwrap();

    // price: 100 - 10% = 90, shipping: 5 - 3 = 2
    assert_eq!(placed.order.items[0].price, dec("90.0"));
    assert_eq!(placed.order.items[0].shipping_price, dec("2.00"));
    assert_eq!(placed.order.total_price, dec("92.00"));
    assert!(env.code_is_used("SAVE10").await);
    assert!(env.code_is_used("SHIP3").await);

    // The consumed code no longer validates for a second order
    let reuse = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("SAVE10".to_string()),
        shipping_discount_code: None,
    };
    let err = env
        .orders
        .create_order(order_of(vec![reuse], PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::DiscountInvalid {
            reason: DiscountRejection::AlreadyUsed,
            ..
        }
    ));
}

#[tokio::test]
async fn discount_rejections_name_the_reason() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Lamp", "40", 10).await;
    env.seed_discount(
        "EXPIRED",
        DiscountType::ProductDiscount,
        DiscountMethod::Percentage,
        "0.5",
        order_server::utils::now_millis() - 1_000,
    )
    .await;
    env.seed_discount(
        "SHIPONLY",
        DiscountType::ShippingDiscount,
        DiscountMethod::FixedAmount,
        "1",
        far_future(),
    )
    .await;

    let expired = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("EXPIRED".to_string()),
        shipping_discount_code: None,
    };
    let err = env
        .orders
        .create_order(order_of(vec![expired], PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::DiscountInvalid {
            reason: DiscountRejection::Expired,
            ..
        }
    ));

    // A shipping code in the product slot is a type mismatch
    let wrong_slot = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("SHIPONLY".to_string()),
        shipping_discount_code: None,
    };
    let err = env
        .orders
        .create_order(order_of(vec![wrong_slot], PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::DiscountInvalid {
            reason: DiscountRejection::WrongType,
            ..
        }
    ));

    let unknown = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("NO-SUCH-CODE".to_string()),
        shipping_discount_code: None,
    };
    let err = env
        .orders
        .create_order(order_of(vec![unknown], PaymentMethod::Cash))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::DiscountInvalid {
            reason: DiscountRejection::NotFound,
            ..
        }
    ));

    // None of the rejections touched stock
    assert_eq!(env.stock_of(&product).await, 10);
}

#[tokio::test]
async fn oversized_fixed_discount_goes_negative() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Sticker", "10", 5).await;
    env.seed_discount(
        "BIG50",
        DiscountType::ProductDiscount,
        DiscountMethod::FixedAmount,
        "50",
        far_future(),
    )
    .await;

    let line = NewOrderLine {
        product_id: product.id.to_string(),
        quantity: 1,
        product_discount_code: Some("BIG50".to_string()),
        shipping_discount_code: None,
    };
    let placed = env
        .orders
        .create_order(order_of(vec![line], PaymentMethod::Cash))
        .await
        .unwrap();

    // Pricing is not clamped at zero
    assert_eq!(placed.order.items[0].price, dec("-40"));
    assert_eq!(placed.order.total_price, dec("-39.50"));
}

#[tokio::test]
async fn concurrent_checkouts_spend_a_code_at_most_once() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Charger", "30", 50).await;
    env.seed_discount(
        "ONCE",
        DiscountType::ProductDiscount,
        DiscountMethod::Percentage,
        "0.5",
        far_future(),
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orders = env.orders.clone();
        let line = NewOrderLine {
            product_id: product.id.to_string(),
            quantity: 1,
            product_discount_code: Some("ONCE".to_string()),
            shipping_discount_code: None,
        };
        handles.push(tokio::spawn(async move {
            orders
                .create_order(order_of(vec![line], PaymentMethod::Cash))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(placed) => {
                winners += 1;
                assert_eq!(placed.order.items[0].price, dec("15.0"));
            }
            Err(err) => assert!(matches!(
                err,
                OrderError::DiscountInvalid {
                    reason: DiscountRejection::AlreadyUsed,
                    ..
                }
            )),
        }
    }

    // The conditional update lets exactly one claimant through
    assert_eq!(winners, 1);
    assert!(env.code_is_used("ONCE").await);
    // Losing attempts failed before reserving, so only the winner holds stock
    assert_eq!(env.stock_of(&product).await, 49);
}

// =============================================================================
// Cancel
// =============================================================================

#[tokio::test]
async fn cancel_releases_stock_and_disarms_the_timer() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Webcam", "80", 6).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 3)], PaymentMethod::Cash))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();
    assert_eq!(env.stock_of(&product).await, 3);

    let cancelled = env.orders.cancel_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    assert_eq!(env.stock_of(&product).await, 6);
    assert!(
        env.timers
            .get(TimerNamespace::OrderConfirmation, &order_id)
            .unwrap()
            .is_none()
    );

    // Cancelling again is an idempotent no-op
    let again = env.orders.cancel_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(again.order_status, OrderStatus::Cancelled);
    assert_eq!(env.stock_of(&product).await, 6);
}

#[tokio::test]
async fn cancel_rejects_foreign_and_confirmed_orders() {
    let env = TestEnv::immediate().await;
    let product = env.seed_product("Headset", "60", 5).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();

    // Another customer sees NotFound, not a hint that the order exists
    let err = env
        .orders
        .cancel_order(&order_id, "someone-else")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));

    // Drive the confirmation timer, then cancellation is no longer possible
    env.reconcile().await;
    let err = env.orders.cancel_order(&order_id, CUSTOMER).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidState(_)));
}

// =============================================================================
// Payment callback
// =============================================================================

#[tokio::test]
async fn mark_paid_confirms_fans_out_and_stays_idempotent() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Tablet", "400", 2).await;

    let placed = env
        .orders
        .create_order(order_of(
            vec![plain_line(&product, 1), plain_line(&product, 1)],
            PaymentMethod::Digital,
        ))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();

    let confirmed = env
        .orders
        .mark_paid(&order_id)
        .await
        .unwrap()
        .expect("first callback applies");
    assert_eq!(confirmed.order_status, OrderStatus::Confirmed);

    // One shipment per order line
    let shipments = ShipmentRepository::new(env.db.clone())
        .list_for_order(&confirmed.id)
        .await
        .unwrap();
    assert_eq!(shipments.len(), 2);
    let line_ids: Vec<&str> = confirmed.items.iter().map(|l| l.line_id.as_str()).collect();
    for shipment in &shipments {
        assert!(line_ids.contains(&shipment.order_item_id.as_str()));
    }

    // Countdown is disarmed, a duplicate callback changes nothing
    assert!(
        env.timers
            .get(TimerNamespace::DigitalOrderCountdown, &order_id)
            .unwrap()
            .is_none()
    );
    assert!(env.orders.mark_paid(&order_id).await.unwrap().is_none());
    let shipments_after = ShipmentRepository::new(env.db.clone())
        .list_for_order(&confirmed.id)
        .await
        .unwrap();
    assert_eq!(shipments_after.len(), 2);
}

#[tokio::test]
async fn mark_paid_on_cash_order_is_ignored() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Cable", "5", 10).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash))
        .await
        .unwrap();

    // Cash orders are never WAITING_FOR_PAYMENT
    let applied = env
        .orders
        .mark_paid(&placed.order.id.to_string())
        .await
        .unwrap();
    assert!(applied.is_none());
}

// =============================================================================
// Scheduler-driven transitions
// =============================================================================

#[tokio::test]
async fn due_confirmation_timer_confirms_cash_order() {
    let env = TestEnv::immediate().await;
    let product = env.seed_product("Printer", "150", 3).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();

    env.reconcile().await;

    let order = env.orders.get_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    // Stock stays consumed, shipments are fanned out, timer is disposed
    assert_eq!(env.stock_of(&product).await, 2);
    let shipments = ShipmentRepository::new(env.db.clone())
        .list_for_order(&order.id)
        .await
        .unwrap();
    assert_eq!(shipments.len(), 1);
    // Estimated delivery is the configured 4-day offset from fan-out time
    let expected_delivery = order_server::utils::now_millis() + 4 * 86_400_000;
    assert!((shipments[0].estimated_delivery - expected_delivery).abs() < 5_000);
    assert!(
        env.timers
            .get(TimerNamespace::OrderConfirmation, &order_id)
            .unwrap()
            .is_none()
    );

    // A second pass finds nothing to do
    env.reconcile().await;
    let order = env.orders.get_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn due_countdown_timer_cancels_unpaid_digital_order() {
    let env = TestEnv::immediate().await;
    let product = env.seed_product("Speaker", "90", 4).await;

    let placed = env
        .orders
        .create_order(order_of(
            vec![plain_line(&product, 2)],
            PaymentMethod::Digital,
        ))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();
    assert_eq!(env.stock_of(&product).await, 2);

    env.reconcile().await;

    let order = env.orders.get_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Cancelled);
    // Timed-out orders hand their reserved stock back
    assert_eq!(env.stock_of(&product).await, 4);
    assert!(
        env.timers
            .get(TimerNamespace::DigitalOrderCountdown, &order_id)
            .unwrap()
            .is_none()
    );
    // No shipments for a cancelled order
    let shipments = ShipmentRepository::new(env.db.clone())
        .list_for_order(&order.id)
        .await
        .unwrap();
    assert!(shipments.is_empty());
}

#[tokio::test]
async fn stale_timer_for_cancelled_order_is_disposed_without_effect() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Router", "120", 3).await;

    let placed = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash))
        .await
        .unwrap();
    let order_id = placed.order.id.to_string();
    env.orders.cancel_order(&order_id, CUSTOMER).await.unwrap();

    // Simulate a crash that left the timer behind after the cancel
    let now = order_server::utils::now_millis();
    env.timers
        .arm(
            TimerNamespace::OrderConfirmation,
            &order_id,
            now - 1_000,
            now + 600_000,
        )
        .unwrap();

    env.reconcile().await;

    // The terminal state stands and the stray entry is gone
    let order = env.orders.get_order(&order_id, CUSTOMER).await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Cancelled);
    assert!(
        env.timers
            .get(TimerNamespace::OrderConfirmation, &order_id)
            .unwrap()
            .is_none()
    );
    assert_eq!(env.stock_of(&product).await, 3);
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn order_listing_is_scoped_to_the_customer_and_newest_first() {
    let env = TestEnv::idle().await;
    let product = env.seed_product("Pen", "2", 100).await;

    let first = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = env
        .orders
        .create_order(order_of(vec![plain_line(&product, 2)], PaymentMethod::Cash))
        .await
        .unwrap();

    let mut foreign = order_of(vec![plain_line(&product, 1)], PaymentMethod::Cash);
    foreign.customer_id = "customer-2".to_string();
    env.orders.create_order(foreign).await.unwrap();

    let listed = env.orders.list_orders(CUSTOMER).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.order.id);
    assert_eq!(listed[1].id, first.order.id);

    // Detail lookup enforces the same ownership scope
    let err = env
        .orders
        .get_order(&first.order.id.to_string(), "customer-2")
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}
