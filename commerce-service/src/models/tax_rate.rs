//! Tax rate model for commerce-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tax rate configuration. `rate` is a percentage, e.g. 8.25 for 8.25%.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxRate {
    pub tax_rate_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub rate: Decimal,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a tax rate.
#[derive(Debug, Clone)]
pub struct CreateTaxRate {
    pub tenant_id: Uuid,
    pub name: String,
    pub rate: Decimal,
}
