//! Database Models

// Catalog
pub mod product;

// Discounts
pub mod discount;

// Orders
pub mod order;

// Shipments
pub mod shipment;

// Re-exports
pub use discount::{
    DiscountCode, DiscountCodeCast, DiscountCodeCastCreate, DiscountCodeCreate, DiscountEffect,
    DiscountMethod, DiscountType,
};
pub use order::{Order, OrderCreate, OrderLine, OrderStatus, PaymentMethod};
pub use product::{Product, ProductCreate};
pub use shipment::{Shipment, ShipmentCreate, ShipmentStatus};
