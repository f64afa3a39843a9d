//! Order core error taxonomy
//!
//! 核心操作一律返回结构化错误，API 层在边界处转换成 [`AppError`]。
//! 调度器对单条目错误只记日志不传播。

use crate::db::repository::RepoError;
use crate::orders::timer_store::TimerStoreError;
use crate::payment::PaymentError;
use crate::utils::AppError;
use thiserror::Error;

/// Why a discount code was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRejection {
    NotFound,
    WrongType,
    AlreadyUsed,
    Expired,
}

impl std::fmt::Display for DiscountRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountRejection::NotFound => write!(f, "not found"),
            DiscountRejection::WrongType => write!(f, "wrong type"),
            DiscountRejection::AlreadyUsed => write!(f, "already used"),
            DiscountRejection::Expired => write!(f, "expired"),
        }
    }
}

/// Order core errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient stock for product {product}")]
    InsufficientStock { product: String },

    #[error("Discount code {code} rejected: {reason}")]
    DiscountInvalid {
        code: String,
        reason: DiscountRejection,
    },

    #[error("Order {0} cannot be changed in its current state")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => OrderError::NotFound(msg),
            RepoError::Validation(msg) => OrderError::NotFound(msg),
            RepoError::Database(msg) => OrderError::Internal(msg),
        }
    }
}

impl From<TimerStoreError> for OrderError {
    fn from(err: TimerStoreError) -> Self {
        OrderError::Internal(format!("Timer store: {}", err))
    }
}

impl From<PaymentError> for OrderError {
    fn from(err: PaymentError) -> Self {
        OrderError::Internal(format!("Payment gateway: {}", err))
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(msg) => AppError::NotFound(msg),
            OrderError::InsufficientStock { product } => {
                AppError::InsufficientStock(format!("Insufficient stock for product {}", product))
            }
            OrderError::DiscountInvalid { code, reason } => {
                AppError::DiscountInvalid(format!("Discount code {} rejected: {}", code, reason))
            }
            OrderError::InvalidState(msg) => AppError::BusinessRule(format!(
                "Order {} cannot be changed in its current state",
                msg
            )),
            OrderError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
