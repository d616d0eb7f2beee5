//! Document conversion integration tests for commerce-service.
//! Tests for predecessor gating, header carriage, and line snapshotting.

mod common;

use commerce_service::domain::{convert, totals};
use commerce_service::models::{
    DiscountType, DocumentKind as Kind, DocumentStatus as Status,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use uuid::Uuid;

#[test]
fn accepted_quote_converts_to_draft_sales_order() {
    let mut quote = common::document(Kind::Quote, Status::Accepted);
    quote.discount_type = DiscountType::Fixed.as_str().to_string();
    quote.discount_value = dec!(25);
    quote.shipping_amount = dec!(9.99);
    quote.notes = Some("Rush order".to_string());

    let plan = convert::plan_successor(&quote, Kind::SalesOrder).unwrap();

    assert_eq!(plan.kind, Kind::SalesOrder);
    assert_eq!(plan.status, Status::Draft);
    assert_eq!(plan.predecessor_id, quote.document_id);
    assert_eq!(plan.account_id, quote.account_id);
    assert_eq!(plan.currency, "USD");
    assert_eq!(plan.discount_type, "fixed");
    assert_eq!(plan.discount_value, dec!(25));
    assert_eq!(plan.shipping_amount, dec!(9.99));
    assert_eq!(plan.notes.as_deref(), Some("Rush order"));
}

#[test]
fn unaccepted_quote_cannot_convert() {
    for status in [Status::Draft, Status::Sent, Status::Rejected] {
        let quote = common::document(Kind::Quote, status);
        let result = convert::plan_successor(&quote, Kind::SalesOrder);
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    }
}

#[test]
fn unrelated_kind_pairs_are_refused() {
    let quote = common::document(Kind::Quote, Status::Accepted);
    assert!(matches!(
        convert::plan_successor(&quote, Kind::Invoice),
        Err(AppError::Validation(_))
    ));

    let invoice = common::document(Kind::Invoice, Status::Sent);
    assert!(matches!(
        convert::plan_successor(&invoice, Kind::SalesOrder),
        Err(AppError::Validation(_))
    ));

    let delivery = common::document(Kind::DeliveryOrder, Status::Delivered);
    assert!(matches!(
        convert::plan_successor(&delivery, Kind::ReturnOrder),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn sales_order_invoices_from_confirmation_onward() {
    for status in [
        Status::Confirmed,
        Status::Processing,
        Status::Shipped,
        Status::Delivered,
    ] {
        assert!(convert::check_conversion(Kind::SalesOrder, status, Kind::Invoice).is_ok());
    }
    assert!(matches!(
        convert::check_conversion(Kind::SalesOrder, Status::Draft, Kind::Invoice),
        Err(AppError::InvalidTransition(_))
    ));
}

#[test]
fn returns_require_shipped_goods() {
    for status in [Status::Shipped, Status::Delivered] {
        assert!(convert::check_conversion(Kind::SalesOrder, status, Kind::ReturnOrder).is_ok());
    }
    assert!(matches!(
        convert::check_conversion(Kind::SalesOrder, Status::Confirmed, Kind::ReturnOrder),
        Err(AppError::InvalidTransition(_))
    ));
}

#[test]
fn confirmed_purchase_order_converts_to_pending_receipt() {
    let order = common::document(Kind::PurchaseOrder, Status::Confirmed);

    let plan = convert::plan_successor(&order, Kind::ReceiptOrder).unwrap();

    assert_eq!(plan.kind, Kind::ReceiptOrder);
    assert_eq!(plan.status, Status::Pending);
    assert_eq!(plan.predecessor_id, order.document_id);
}

#[test]
fn snapshot_lines_get_fresh_identity() {
    let source_line = common::line(3, dec!(100.00), DiscountType::Percentage, dec!(10));
    let successor_id = Uuid::new_v4();

    let snapshot = convert::snapshot_line(&source_line, successor_id);

    assert_ne!(snapshot.line_item_id, source_line.line_item_id);
    assert_eq!(snapshot.document_id, successor_id);
    assert_eq!(snapshot.product_id, source_line.product_id);
    assert_eq!(snapshot.quantity, 3);
    assert_eq!(snapshot.discount_amount, dec!(30.00));
    assert_eq!(snapshot.total_price, dec!(270.00));
    assert_eq!(snapshot.sort_order, source_line.sort_order);

    // The source keeps its own identity and amounts.
    assert_eq!(source_line.total_price, dec!(270.00));
    assert_ne!(source_line.document_id, successor_id);
}

#[test]
fn quote_to_sales_order_preserves_priced_ledger() {
    let quote = common::document(Kind::Quote, Status::Accepted);
    let quote_line = common::line(2, dec!(100.00), DiscountType::Percentage, dec!(10));
    assert_eq!(quote_line.total_price, dec!(180.00));

    let plan = convert::plan_successor(&quote, Kind::SalesOrder).unwrap();
    let order_line = convert::snapshot_line(&quote_line, Uuid::new_v4());

    assert_eq!(plan.status, Status::Draft);
    assert_eq!(order_line.quantity, 2);
    assert_eq!(order_line.unit_price, dec!(100.00));
    assert_eq!(order_line.discount_amount, dec!(20.00));
    assert_eq!(order_line.total_price, dec!(180.00));

    let plan_discount = DiscountType::from_string(&plan.discount_type).unwrap();
    let order_totals = totals::calculate(
        &[order_line],
        plan_discount,
        plan.discount_value,
        None,
        plan.shipping_amount,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(order_totals.subtotal, dec!(180.00));
    assert_eq!(order_totals.total_amount, dec!(180.00));
    assert_eq!(order_totals.amount_due, dec!(180.00));
}
