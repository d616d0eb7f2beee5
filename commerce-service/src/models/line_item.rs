//! Line item model for commerce-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Discount type for a line item or a document-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    None,
    Fixed,
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::None => "none",
            DiscountType::Fixed => "fixed",
            DiscountType::Percentage => "percentage",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "none" => Some(DiscountType::None),
            "fixed" => Some(DiscountType::Fixed),
            "percentage" => Some(DiscountType::Percentage),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line item on a document. Price, name, and weight are snapshots taken
/// from the product at attach time; catalog changes do not flow back.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub unit_weight: Option<Decimal>,
    pub total_weight: Option<Decimal>,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

impl LineItem {
    /// Get parsed discount type.
    pub fn parsed_discount_type(&self) -> Option<DiscountType> {
        DiscountType::from_string(&self.discount_type)
    }
}

/// Input for attaching a line item to a document.
#[derive(Debug, Clone)]
pub struct AttachLineItem {
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Overrides the catalog price snapshot when set.
    pub unit_price: Option<Decimal>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

/// Input for updating a line item.
#[derive(Debug, Clone, Default)]
pub struct UpdateLineItem {
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
}
