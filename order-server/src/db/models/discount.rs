//! Discount Code Models
//!
//! 折扣码分两层：
//! - [`DiscountCodeCast`] - 模板定义（类型、计算方式、过期时间）
//! - [`DiscountCode`] - 发放的实例（唯一 code，单次使用）
//!
//! 实例的消费必须走 `DiscountRepository::consume` 的条件更新，
//! 保证同一 code 至多被一个订单行消费。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

pub const DISCOUNT_CAST_TABLE: &str = "discount_code_cast";
pub const DISCOUNT_CODE_TABLE: &str = "discount_code";

/// Discount kind: applies to the product price or the shipping price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    ProductDiscount,
    ShippingDiscount,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::ProductDiscount => write!(f, "product discount"),
            DiscountType::ShippingDiscount => write!(f, "shipping discount"),
        }
    }
}

/// How the discount quantity is applied to a base price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountMethod {
    /// `discount_quantity` is a 0-1 fraction of the base price
    Percentage,
    /// `discount_quantity` is an absolute amount
    FixedAmount,
}

/// Discount template definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCodeCast {
    pub id: RecordId,
    /// Template code (unique)
    pub code: String,
    pub discount_type: DiscountType,
    pub method: DiscountMethod,
    pub discount_quantity: Decimal,
    /// Unix millis
    pub expiry_date: i64,
    /// Remaining issuable count
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCodeCastCreate {
    pub code: String,
    pub discount_type: DiscountType,
    pub method: DiscountMethod,
    pub discount_quantity: Decimal,
    pub expiry_date: i64,
    pub quantity: i64,
}

/// An issued discount code instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: RecordId,
    /// Record link to the cast this code was issued from
    pub cast: RecordId,
    /// Unique code string handed to the customer
    pub code: String,
    pub is_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCodeCreate {
    pub cast: RecordId,
    pub code: String,
    pub is_used: bool,
}

/// The effect a consumed code has on a base price
#[derive(Debug, Clone, Copy)]
pub struct DiscountEffect {
    pub method: DiscountMethod,
    pub quantity: Decimal,
}

impl DiscountEffect {
    /// Apply the discount to a base price.
    ///
    /// The result is intentionally not clamped to zero: a fixed-amount code
    /// larger than the base price yields a negative price, matching the
    /// documented pricing rule.
    pub fn apply(&self, base: Decimal) -> Decimal {
        match self.method {
            DiscountMethod::Percentage => base - self.quantity * base,
            DiscountMethod::FixedAmount => base - self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_percentage_discount() {
        let effect = DiscountEffect {
            method: DiscountMethod::Percentage,
            quantity: dec("0.2"),
        };
        assert_eq!(effect.apply(dec("100")), dec("80.0"));
    }

    #[test]
    fn test_fixed_amount_discount() {
        let effect = DiscountEffect {
            method: DiscountMethod::FixedAmount,
            quantity: dec("15"),
        };
        assert_eq!(effect.apply(dec("100")), dec("85"));
    }

    #[test]
    fn test_fixed_amount_is_not_clamped() {
        let effect = DiscountEffect {
            method: DiscountMethod::FixedAmount,
            quantity: dec("150"),
        };
        assert_eq!(effect.apply(dec("100")), dec("-50"));
    }
}
