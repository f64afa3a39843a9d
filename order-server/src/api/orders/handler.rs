//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderLine, OrderStatus, PaymentMethod, Shipment, ShipmentStatus};
use crate::db::repository::ShipmentRepository;
use crate::orders::{NewOrder, NewOrderLine};
use crate::payment::PaymentRedirect;
use crate::utils::{AppError, AppResult};

// =============================================================================
// Request DTOs
// =============================================================================

/// POST /api/orders payload
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "shipping_address must not be empty"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "order must contain at least one item"), nested)]
    pub items: Vec<CreateOrderItem>,
}

// Serialize is required: the list-length rule reports the offending value
// as a validation param
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderItem {
    #[validate(length(min = 1, message = "product_id must not be empty"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
    pub product_discount_code: Option<String>,
    pub shipping_discount_code: Option<String>,
}

// =============================================================================
// Response DTOs
// =============================================================================

/// Order line as returned to clients (record links flattened to strings)
#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub line_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price: Decimal,
    pub shipping_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_discount_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_discount_code: Option<String>,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            line_id: line.line_id,
            product_id: line.product.to_string(),
            quantity: line.quantity,
            price: line.price,
            shipping_price: line.shipping_price,
            product_discount_code: line.product_discount_code,
            shipping_discount_code: line.shipping_discount_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub total_price: Decimal,
    pub created_at: i64,
    pub items: Vec<OrderLineResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id,
            order_status: order.order_status,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            total_price: order.total_price,
            created_at: order.created_at,
            items: order.items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Checkout response: the order plus an optional payment redirect
#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_redirect: Option<PaymentRedirect>,
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub id: String,
    pub order_item_id: String,
    pub status: ShipmentStatus,
    pub estimated_delivery: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_personnel: Option<String>,
    pub created_at: i64,
}

impl From<Shipment> for ShipmentResponse {
    fn from(shipment: Shipment) -> Self {
        Self {
            id: shipment.id.to_string(),
            order_item_id: shipment.order_item_id,
            status: shipment.status,
            estimated_delivery: shipment.estimated_delivery,
            delivery_company: shipment.delivery_company,
            delivery_personnel: shipment.delivery_personnel,
            created_at: shipment.created_at,
        }
    }
}

/// Order detail: the order plus its fanned-out shipments
#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub shipments: Vec<ShipmentResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/orders - 下单
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<PlaceOrderResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let placed = state
        .orders
        .create_order(NewOrder {
            customer_id: user.id,
            payment_method: payload.payment_method,
            shipping_address: payload.shipping_address,
            lines: payload
                .items
                .into_iter()
                .map(|item| NewOrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    product_discount_code: item.product_discount_code,
                    shipping_discount_code: item.shipping_discount_code,
                })
                .collect(),
        })
        .await?;

    Ok(Json(PlaceOrderResponse {
        order: placed.order.into(),
        payment_redirect: placed.payment_redirect,
    }))
}

/// GET /api/orders - 当前用户的订单列表 (新单在前)
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OrderResponse>>> {
    let orders = state.orders.list_orders(&user.id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /api/orders/:id - 订单详情 (含 shipments)
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<OrderDetailResponse>> {
    let order = state.orders.get_order(&id, &user.id).await?;

    let shipments = ShipmentRepository::new(state.db.clone())
        .list_for_order(&order.id)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

    Ok(Json(OrderDetailResponse {
        order: order.into(),
        shipments: shipments.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/orders/:id/cancel - 取消订单
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<OrderResponse>> {
    let order = state.orders.cancel_order(&id, &user.id).await?;
    Ok(Json(order.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, quantity: u32) -> CreateOrderItem {
        CreateOrderItem {
            product_id: product_id.to_string(),
            quantity,
            product_discount_code: None,
            shipping_discount_code: None,
        }
    }

    fn request(items: Vec<CreateOrderItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            payment_method: PaymentMethod::Cash,
            shipping_address: "123 Test Street".to_string(),
            items,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request(vec![item("product:p1", 2)]).validate().is_ok());
    }

    #[test]
    fn test_empty_item_list_rejected() {
        assert!(request(vec![]).validate().is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(request(vec![item("product:p1", 0)]).validate().is_err());
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(request(vec![item("", 1)]).validate().is_err());

        let mut req = request(vec![item("product:p1", 1)]);
        req.shipping_address = String::new();
        assert!(req.validate().is_err());
    }
}
