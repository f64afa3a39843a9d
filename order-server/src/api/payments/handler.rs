//! Payment Callback Handler
//!
//! 支付网关回调的落点。验签在网关适配服务侧完成，这里只消费结果：
//! 成功 → markPaid，失败 → 保持 WAITING_FOR_PAYMENT，倒计时兜底。

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::OrderStatus;
use crate::utils::{AppError, AppResult};

/// Gateway callback payload
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentCallbackRequest {
    #[validate(length(min = 1, message = "order_id must not be empty"))]
    pub order_id: String,
    /// Whether the provider reports the payment as settled
    pub success: bool,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentCallbackResponse {
    /// Whether this callback changed the order's state
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
}

/// POST /api/payments/callback - 处理网关支付结果
///
/// Duplicate and stale callbacks are acknowledged with `applied: false`
/// so the gateway stops retrying.
pub async fn callback(
    State(state): State<ServerState>,
    Json(payload): Json<PaymentCallbackRequest>,
) -> AppResult<Json<PaymentCallbackResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    if !payload.success {
        tracing::info!(
            order_id = %payload.order_id,
            transaction_id = ?payload.transaction_id,
            "Payment failed at gateway, order left awaiting payment"
        );
        return Ok(Json(PaymentCallbackResponse {
            applied: false,
            order_status: None,
        }));
    }

    match state.orders.mark_paid(&payload.order_id).await? {
        Some(order) => Ok(Json(PaymentCallbackResponse {
            applied: true,
            order_status: Some(order.order_status),
        })),
        None => Ok(Json(PaymentCallbackResponse {
            applied: false,
            order_status: None,
        })),
    }
}
