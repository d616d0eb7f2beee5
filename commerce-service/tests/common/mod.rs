//! Common test utilities for commerce-service integration tests.

#![allow(dead_code)]

use chrono::Utc;
use commerce_service::domain::{pricing, weight};
use commerce_service::models::{
    DiscountType, Document, DocumentKind, DocumentStatus, LineItem, TaxRate,
};
use rust_decimal::Decimal;
use std::sync::Once;
use uuid::Uuid;

pub const TEST_TENANT_ID: Uuid = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
pub const TEST_ACCOUNT_ID: Uuid = Uuid::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,commerce_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Helper to build a document of the given kind and status with empty totals.
pub fn document(kind: DocumentKind, status: DocumentStatus) -> Document {
    init_tracing();

    let now = Utc::now();
    Document {
        document_id: Uuid::new_v4(),
        tenant_id: TEST_TENANT_ID,
        kind: kind.as_str().to_string(),
        number: format!("{}-000001", kind.number_prefix()),
        status: status.as_str().to_string(),
        assignee_id: None,
        account_id: TEST_ACCOUNT_ID,
        billing_contact_id: None,
        shipping_contact_id: None,
        predecessor_id: None,
        currency: "USD".to_string(),
        issue_date: None,
        due_date: None,
        delivery_date: None,
        return_date: None,
        discount_type: DiscountType::None.as_str().to_string(),
        discount_value: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        subtotal: Decimal::ZERO,
        tax_rate_id: None,
        tax_amount: Decimal::ZERO,
        shipping_amount: Decimal::ZERO,
        total_amount: Decimal::ZERO,
        amount_paid: Decimal::ZERO,
        amount_due: Decimal::ZERO,
        tracking_number: None,
        carrier: None,
        total_weight: None,
        notes: None,
        metadata: None,
        created_utc: now,
        updated_utc: now,
    }
}

/// Helper to build a line item with amounts derived the same way attachment
/// derives them.
pub fn line(
    quantity: i32,
    unit_price: Decimal,
    discount_type: DiscountType,
    discount_value: Decimal,
) -> LineItem {
    init_tracing();

    let amounts = pricing::line_amounts(quantity, unit_price, discount_type, discount_value)
        .expect("invalid line item inputs");

    LineItem {
        line_item_id: Uuid::new_v4(),
        document_id: Uuid::new_v4(),
        tenant_id: TEST_TENANT_ID,
        product_id: Uuid::new_v4(),
        description: "Test product".to_string(),
        quantity,
        unit_price,
        discount_type: discount_type.as_str().to_string(),
        discount_value,
        discount_amount: amounts.discount_amount,
        total_price: amounts.total_price,
        unit_weight: None,
        total_weight: None,
        sort_order: 0,
        created_utc: Utc::now(),
    }
}

/// Helper to build an undiscounted line item carrying a unit weight snapshot.
pub fn weighted_line(quantity: i32, unit_price: Decimal, unit_weight: Decimal) -> LineItem {
    let mut item = line(quantity, unit_price, DiscountType::None, Decimal::ZERO);
    item.unit_weight = Some(unit_weight);
    item.total_weight = weight::line_total_weight(quantity, Some(unit_weight));
    item
}

/// Helper to build an active tax rate.
pub fn tax_rate(rate: Decimal) -> TaxRate {
    TaxRate {
        tax_rate_id: Uuid::new_v4(),
        tenant_id: TEST_TENANT_ID,
        name: "Standard Rate".to_string(),
        rate,
        active: true,
        created_utc: Utc::now(),
    }
}
