//! Order API 模块
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/orders | GET | 当前用户的订单列表 | JWT |
//! | /api/orders | POST | 下单 | JWT |
//! | /api/orders/{id} | GET | 订单详情 (含 shipments) | JWT |
//! | /api/orders/{id}/cancel | POST | 取消订单 | JWT |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", order_routes())
}

fn order_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/cancel", post(handler::cancel))
}
