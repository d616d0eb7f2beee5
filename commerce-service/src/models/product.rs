//! Product catalog model for commerce-service.
//!
//! The catalog is a read-mostly input to the engine: line items snapshot
//! product price, name, and weight at attach time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub weight: Option<Decimal>,
    pub tax_rate_id: Option<Uuid>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub weight: Option<Decimal>,
    pub tax_rate_id: Option<Uuid>,
}
