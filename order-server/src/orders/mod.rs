//! 订单核心
//!
//! # 模块结构
//!
//! - [`service`] - 订单聚合根（下单 / 取消 / 支付回调 / 到期转换）
//! - [`shipment`] - 确认后的 shipment 扇出
//! - [`timer_store`] - redb 持久化定时器存储
//! - [`scheduler`] - 固定间隔 reconcile 轮询调度器
//! - [`error`] - 核心错误分类

pub mod error;
pub mod scheduler;
pub mod service;
pub mod shipment;
pub mod timer_store;

pub use error::{DiscountRejection, OrderError};
pub use scheduler::{ConfirmationScheduler, SchedulerHandle, TimerPolicy};
pub use service::{NewOrder, NewOrderLine, OrderService, PlacedOrder};
pub use shipment::ShipmentService;
pub use timer_store::{TimerEntry, TimerNamespace, TimerStore};
