//! Document conversion: chaining a successor document off a predecessor.
//!
//! The successor is an independent snapshot. Later edits to either side
//! must not leak across, so line items are copied row by row with fresh
//! identifiers.

use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Document, DocumentKind, DocumentStatus, LineItem};
use crate::models::{DocumentKind as Kind, DocumentStatus as Status};

/// Source statuses from which `source -> target` conversion is allowed,
/// or `None` when the pair itself is illegal.
pub fn conversion_source_statuses(
    source: DocumentKind,
    target: DocumentKind,
) -> Option<&'static [DocumentStatus]> {
    match (source, target) {
        (Kind::Quote, Kind::SalesOrder) => Some(&[Status::Accepted]),
        (Kind::SalesOrder, Kind::Invoice) => Some(&[
            Status::Confirmed,
            Status::Processing,
            Status::Shipped,
            Status::Delivered,
        ]),
        (Kind::SalesOrder, Kind::ReturnOrder) => Some(&[Status::Shipped, Status::Delivered]),
        (Kind::PurchaseOrder, Kind::ReceiptOrder) => Some(&[Status::Confirmed]),
        _ => None,
    }
}

/// Validate that a conversion is legal for the source's kind and status.
pub fn check_conversion(
    source_kind: DocumentKind,
    source_status: DocumentStatus,
    target_kind: DocumentKind,
) -> Result<(), AppError> {
    let allowed = conversion_source_statuses(source_kind, target_kind).ok_or_else(|| {
        AppError::Validation(anyhow::anyhow!(
            "Cannot convert a {} into a {}",
            source_kind,
            target_kind
        ))
    })?;

    if !allowed.contains(&source_status) {
        return Err(AppError::InvalidTransition(anyhow::anyhow!(
            "Cannot convert {} in status '{}' to {}",
            source_kind,
            source_status,
            target_kind
        )));
    }

    Ok(())
}

/// Header fields carried from a predecessor onto its successor.
#[derive(Debug, Clone)]
pub struct SuccessorPlan {
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub predecessor_id: Uuid,
    pub account_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub billing_contact_id: Option<Uuid>,
    pub shipping_contact_id: Option<Uuid>,
    pub currency: String,
    pub discount_type: String,
    pub discount_value: rust_decimal::Decimal,
    pub tax_rate_id: Option<Uuid>,
    pub shipping_amount: rust_decimal::Decimal,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Build the successor header for a conversion. Parties, billing terms,
/// and commercial inputs carry over; dates and numbering start fresh.
pub fn plan_successor(
    source: &Document,
    target_kind: DocumentKind,
) -> Result<SuccessorPlan, AppError> {
    let source_kind = source.parsed_kind().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Document {} has unknown kind '{}'",
            source.document_id,
            source.kind
        ))
    })?;
    let source_status = source.parsed_status().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Document {} has unknown status '{}'",
            source.document_id,
            source.status
        ))
    })?;

    check_conversion(source_kind, source_status, target_kind)?;

    Ok(SuccessorPlan {
        kind: target_kind,
        status: target_kind.initial_status(),
        predecessor_id: source.document_id,
        account_id: source.account_id,
        assignee_id: source.assignee_id,
        billing_contact_id: source.billing_contact_id,
        shipping_contact_id: source.shipping_contact_id,
        currency: source.currency.clone(),
        discount_type: source.discount_type.clone(),
        discount_value: source.discount_value,
        tax_rate_id: source.tax_rate_id,
        shipping_amount: source.shipping_amount,
        notes: source.notes.clone(),
        metadata: source.metadata.clone(),
    })
}

/// Copy a line item onto a successor document with a fresh identity.
pub fn snapshot_line(line: &LineItem, successor_document_id: Uuid) -> LineItem {
    LineItem {
        line_item_id: Uuid::new_v4(),
        document_id: successor_document_id,
        ..line.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn source_document(kind: DocumentKind, status: DocumentStatus) -> Document {
        let now = Utc::now();
        Document {
            document_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
            number: "QUO-000001".to_string(),
            status: status.as_str().to_string(),
            assignee_id: None,
            account_id: Uuid::new_v4(),
            billing_contact_id: Some(Uuid::new_v4()),
            shipping_contact_id: None,
            predecessor_id: None,
            currency: "USD".to_string(),
            issue_date: None,
            due_date: None,
            delivery_date: None,
            return_date: None,
            discount_type: "none".to_string(),
            discount_value: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            subtotal: dec!(180.00),
            tax_rate_id: None,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            total_amount: dec!(180.00),
            amount_paid: Decimal::ZERO,
            amount_due: dec!(180.00),
            tracking_number: None,
            carrier: None,
            total_weight: None,
            notes: None,
            metadata: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn test_accepted_quote_converts_to_draft_sales_order() {
        let quote = source_document(Kind::Quote, Status::Accepted);
        let plan = plan_successor(&quote, Kind::SalesOrder).unwrap();
        assert_eq!(plan.kind, Kind::SalesOrder);
        assert_eq!(plan.status, Status::Draft);
        assert_eq!(plan.predecessor_id, quote.document_id);
        assert_eq!(plan.account_id, quote.account_id);
        assert_eq!(plan.billing_contact_id, quote.billing_contact_id);
    }

    #[test]
    fn test_sent_quote_cannot_convert() {
        let quote = source_document(Kind::Quote, Status::Sent);
        let err = plan_successor(&quote, Kind::SalesOrder).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_illegal_pair_rejected() {
        let quote = source_document(Kind::Quote, Status::Accepted);
        let err = plan_successor(&quote, Kind::Invoice).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_receipt_successor_starts_pending() {
        let po = source_document(Kind::PurchaseOrder, Status::Confirmed);
        let plan = plan_successor(&po, Kind::ReceiptOrder).unwrap();
        assert_eq!(plan.status, Status::Pending);
    }

    #[test]
    fn test_snapshot_line_gets_fresh_identity() {
        let successor_id = Uuid::new_v4();
        let line = LineItem {
            line_item_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            description: "Widget".to_string(),
            quantity: 3,
            unit_price: dec!(100.00),
            discount_type: "percentage".to_string(),
            discount_value: dec!(10),
            discount_amount: dec!(30.00),
            total_price: dec!(270.00),
            unit_weight: None,
            total_weight: None,
            sort_order: 0,
            created_utc: Utc::now(),
        };

        let copy = snapshot_line(&line, successor_id);
        assert_ne!(copy.line_item_id, line.line_item_id);
        assert_eq!(copy.document_id, successor_id);
        assert_eq!(copy.quantity, 3);
        assert_eq!(copy.total_price, dec!(270.00));
        assert_eq!(copy.sort_order, line.sort_order);
    }
}
