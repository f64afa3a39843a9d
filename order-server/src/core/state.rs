//! 服务器状态
//!
//! ServerState 是订单服务的组合根：所有客户端（数据库、定时器存储、
//! 支付网关、JWT 验证）在这里显式构造并注入，不使用全局单例。

use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::auth::JwtService;
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::orders::{
    ConfirmationScheduler, OrderService, SchedulerHandle, ShipmentService, TimerStore,
};
use crate::payment::{DisabledPaymentGateway, HttpPaymentGateway, PaymentGateway};

/// 服务器状态 - 持有所有服务的共享引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | 嵌入式数据库 (SurrealDB) |
/// | timers | 持久化定时器存储 (redb) |
/// | orders | 订单服务 |
/// | shipments | shipment 扇出服务 |
/// | jwt_service | JWT 验证服务 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub timers: Arc<TimerStore>,
    pub orders: OrderService,
    pub shipments: ShipmentService,
    pub jwt_service: Arc<JwtService>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：工作目录 → 数据库 → 定时器存储 → 支付网关 → 各服务
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        config.ensure_work_dir_structure()?;

        let db = crate::db::init_db(&config.database_path()).await?;
        let timers = Arc::new(TimerStore::open(config.timer_store_path())?);

        let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
            Some(url) => Arc::new(HttpPaymentGateway::new(url.clone())),
            None => {
                tracing::warn!("PAYMENT_GATEWAY_URL not set, payment redirects disabled");
                Arc::new(DisabledPaymentGateway)
            }
        };

        let scheduler_handle = SchedulerHandle::new(timers.clone(), config.timer_policy());
        let shipments = ShipmentService::new(db.clone(), config.shipment_delivery_offset_days);
        let orders = OrderService::new(
            db.clone(),
            scheduler_handle,
            shipments.clone(),
            gateway,
            config.delivery_vat_rate,
        );

        Ok(Self {
            config: config.clone(),
            db,
            timers,
            orders,
            shipments,
            jwt_service: Arc::new(JwtService::new(&config.jwt_secret)),
        })
    }

    /// 启动后台任务（目前只有确认调度器）
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let scheduler = ConfirmationScheduler::new(
            self.timers.clone(),
            self.orders.clone(),
            Duration::from_secs(self.config.reconcile_interval_secs),
            tasks.shutdown_token(),
        );
        tasks.spawn("confirmation_scheduler", TaskKind::Periodic, scheduler.run());

        tasks.log_summary();
        tasks
    }
}
