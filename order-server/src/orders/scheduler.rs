//! 确认调度器
//!
//! 固定间隔的 reconcile 轮询循环：扫描到期定时器，驱动订单状态转换。
//! 启动时的第一个 tick 即补扫（进程停机期间到期的定时器在此被捡起）。
//!
//! 单条目失败只记日志并留到下一个 tick 重试，绝不中断整轮 reconcile；
//! 反复失败的条目最终被 TTL 清理。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::models::PaymentMethod;
use crate::orders::error::OrderError;
use crate::orders::service::OrderService;
use crate::orders::timer_store::{TimerEntry, TimerNamespace, TimerStore, TimerStoreResult};
use crate::utils::time;

/// Timeout policy for the two timer namespaces
#[derive(Debug, Clone)]
pub struct TimerPolicy {
    /// Cash orders: window before auto-confirmation (production: 24h)
    pub cash_confirm_timeout_secs: u64,
    /// Digital orders: payment countdown (production: 15min)
    pub digital_payment_timeout_secs: u64,
    /// TTL margin past the due time before an entry self-cleans
    pub ttl_margin_secs: u64,
}

/// Arm/disarm facade handed to the order service
///
/// The scheduler owns scheduling and cancellation of timers; the service only
/// ever talks to this handle.
#[derive(Clone)]
pub struct SchedulerHandle {
    timers: Arc<TimerStore>,
    policy: TimerPolicy,
}

impl SchedulerHandle {
    pub fn new(timers: Arc<TimerStore>, policy: TimerPolicy) -> Self {
        Self { timers, policy }
    }

    /// Arm the timer matching the order's payment method.
    ///
    /// `due_at = now + timeout(method)`; the entry's TTL extends a margin
    /// past the due time so it never vanishes exactly at the deadline.
    pub fn schedule(&self, order_id: &str, method: PaymentMethod) -> TimerStoreResult<()> {
        let (namespace, timeout_secs) = match method {
            PaymentMethod::Cash => (
                TimerNamespace::OrderConfirmation,
                self.policy.cash_confirm_timeout_secs,
            ),
            PaymentMethod::Digital => (
                TimerNamespace::DigitalOrderCountdown,
                self.policy.digital_payment_timeout_secs,
            ),
        };
        let due_at = time::millis_after_secs(timeout_secs);
        let expires_at = due_at + (self.policy.ttl_margin_secs as i64) * 1000;
        self.timers.arm(namespace, order_id, due_at, expires_at)
    }

    /// Drop any active timer of the order (both namespaces). Idempotent.
    pub fn cancel(&self, order_id: &str) -> TimerStoreResult<()> {
        self.timers.disarm(order_id)
    }
}

/// 确认调度器
///
/// 注册为 Periodic 后台任务，在 `start_background_tasks()` 中启动。
pub struct ConfirmationScheduler {
    timers: Arc<TimerStore>,
    orders: OrderService,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ConfirmationScheduler {
    pub fn new(
        timers: Arc<TimerStore>,
        orders: OrderService,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            timers,
            orders,
            interval,
            shutdown,
        }
    }

    /// 主循环：第一个 tick 立即触发（启动补扫），之后按固定间隔
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Confirmation scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconcile().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Confirmation scheduler received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("Confirmation scheduler stopped");
    }

    /// One reconciliation pass: act on every due entry, dispose acted-on
    /// entries, purge TTL-expired strays.
    pub async fn reconcile(&self) {
        let now = time::now_millis();

        let due = match self.timers.due_entries(now) {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan due timers");
                return;
            }
        };

        if !due.is_empty() {
            tracing::debug!(count = due.len(), "Processing due timers");
        }

        for entry in due {
            if self.shutdown.is_cancelled() {
                tracing::info!("Reconcile interrupted by shutdown");
                return;
            }

            match self.process_entry(&entry).await {
                Ok(()) => {
                    if let Err(e) = self.timers.dispose(&entry) {
                        tracing::error!(
                            order_id = %entry.order_id,
                            namespace = %entry.namespace,
                            error = %e,
                            "Failed to dispose acted-on timer"
                        );
                    }
                }
                Err(e) => {
                    // Retried next tick; TTL purge is the backstop
                    tracing::error!(
                        order_id = %entry.order_id,
                        namespace = %entry.namespace,
                        error = %e,
                        "Failed to process due timer, will retry"
                    );
                }
            }
        }

        match self.timers.purge_expired(now) {
            Ok(0) => {}
            Ok(n) => tracing::warn!(count = n, "Purged expired timer entries"),
            Err(e) => tracing::error!(error = %e, "Failed to purge expired timers"),
        }
    }

    async fn process_entry(&self, entry: &TimerEntry) -> Result<(), OrderError> {
        match entry.namespace {
            TimerNamespace::OrderConfirmation => {
                self.orders.confirm_due_order(&entry.order_id).await
            }
            TimerNamespace::DigitalOrderCountdown => {
                self.orders.expire_unpaid_order(&entry.order_id).await
            }
        }
    }
}
