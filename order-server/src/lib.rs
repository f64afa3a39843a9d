//! Order Server - 市场订单生命周期服务
//!
//! # 架构概述
//!
//! 本模块是订单服务的主入口，提供以下核心功能：
//!
//! - **订单核心** (`orders`): 下单、取消、支付确认和两类到期转换
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储（商品、折扣码、订单、shipment）
//! - **定时器存储** (`orders::timer_store`): redb 持久化延迟确认定时器
//! - **认证** (`auth`): JWT 验证（签发在认证服务侧）
//! - **支付** (`payment`): 支付网关协作方
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── auth/          # JWT 验证、请求提取器
//! ├── orders/        # 订单聚合、调度器、定时器存储、扇出
//! ├── payment/       # 支付网关客户端
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 错误、日志、时间工具
//! └── db/            # 数据库层（模型 + 仓储）
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod orders;
pub mod payment;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{
    ConfirmationScheduler, OrderError, OrderService, SchedulerHandle, TimerNamespace, TimerPolicy,
    TimerStore,
};
pub use payment::{PaymentGateway, PaymentRedirect};
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("WORK_DIR")
        .map(|dir| format!("{}/logs", dir))
        .ok();

    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
   ____           __
  / __ \_________/ /__  _____
 / / / / ___/ __  / _ \/ ___/
/ /_/ / /  / /_/ /  __/ /
\____/_/   \__,_/\___/_/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
