//! Document model for commerce-service.
//!
//! A single record type backs all seven document kinds; kind-specific
//! behavior (status vocabulary, transitions, chaining) lives in the
//! domain layer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::line_item::DiscountType;

/// Document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quote,
    SalesOrder,
    PurchaseOrder,
    Invoice,
    DeliveryOrder,
    ReturnOrder,
    ReceiptOrder,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Invoice => "invoice",
            DocumentKind::DeliveryOrder => "delivery_order",
            DocumentKind::ReturnOrder => "return_order",
            DocumentKind::ReceiptOrder => "receipt_order",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "quote" => Some(DocumentKind::Quote),
            "sales_order" => Some(DocumentKind::SalesOrder),
            "purchase_order" => Some(DocumentKind::PurchaseOrder),
            "invoice" => Some(DocumentKind::Invoice),
            "delivery_order" => Some(DocumentKind::DeliveryOrder),
            "return_order" => Some(DocumentKind::ReturnOrder),
            "receipt_order" => Some(DocumentKind::ReceiptOrder),
            _ => None,
        }
    }

    /// Prefix used for human-readable document numbers, e.g. `INV-000042`.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "QUO",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Invoice => "INV",
            DocumentKind::DeliveryOrder => "DEL",
            DocumentKind::ReturnOrder => "RET",
            DocumentKind::ReceiptOrder => "RCV",
        }
    }

    /// Status a freshly created document of this kind starts in.
    pub fn initial_status(&self) -> DocumentStatus {
        match self {
            DocumentKind::Quote
            | DocumentKind::SalesOrder
            | DocumentKind::PurchaseOrder
            | DocumentKind::Invoice => DocumentStatus::Draft,
            DocumentKind::DeliveryOrder
            | DocumentKind::ReturnOrder
            | DocumentKind::ReceiptOrder => DocumentStatus::Pending,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Document status. The full vocabulary across all kinds; which values a
/// given document may hold is governed by its kind's transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Pending,
    InTransit,
    Approved,
    Received,
    Processed,
    Partial,
    Completed,
    Paid,
    PartiallyPaid,
    Overdue,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Confirmed => "confirmed",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Shipped => "shipped",
            DocumentStatus::Delivered => "delivered",
            DocumentStatus::Pending => "pending",
            DocumentStatus::InTransit => "in_transit",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Received => "received",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Partial => "partial",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Paid => "paid",
            DocumentStatus::PartiallyPaid => "partially_paid",
            DocumentStatus::Overdue => "overdue",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DocumentStatus::Draft),
            "sent" => Some(DocumentStatus::Sent),
            "accepted" => Some(DocumentStatus::Accepted),
            "rejected" => Some(DocumentStatus::Rejected),
            "expired" => Some(DocumentStatus::Expired),
            "confirmed" => Some(DocumentStatus::Confirmed),
            "processing" => Some(DocumentStatus::Processing),
            "shipped" => Some(DocumentStatus::Shipped),
            "delivered" => Some(DocumentStatus::Delivered),
            "pending" => Some(DocumentStatus::Pending),
            "in_transit" => Some(DocumentStatus::InTransit),
            "approved" => Some(DocumentStatus::Approved),
            "received" => Some(DocumentStatus::Received),
            "processed" => Some(DocumentStatus::Processed),
            "partial" => Some(DocumentStatus::Partial),
            "completed" => Some(DocumentStatus::Completed),
            "paid" => Some(DocumentStatus::Paid),
            "partially_paid" => Some(DocumentStatus::PartiallyPaid),
            "overdue" => Some(DocumentStatus::Overdue),
            "cancelled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commerce document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: String,
    pub number: String,
    pub status: String,
    pub assignee_id: Option<Uuid>,
    pub account_id: Uuid,
    pub billing_contact_id: Option<Uuid>,
    pub shipping_contact_id: Option<Uuid>,
    pub predecessor_id: Option<Uuid>,
    pub currency: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub return_date: Option<NaiveDate>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub subtotal: Decimal,
    pub tax_rate_id: Option<Uuid>,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub total_weight: Option<Decimal>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Document {
    /// Get parsed document kind.
    pub fn parsed_kind(&self) -> Option<DocumentKind> {
        DocumentKind::from_string(&self.kind)
    }

    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<DocumentStatus> {
        DocumentStatus::from_string(&self.status)
    }

    /// Get parsed document-level discount type.
    pub fn parsed_discount_type(&self) -> Option<DiscountType> {
        DiscountType::from_string(&self.discount_type)
    }

    /// Status as seen by readers: a sent invoice past its due date reads as
    /// overdue without waiting for the sweep to persist it.
    pub fn effective_status(&self, today: NaiveDate) -> Option<DocumentStatus> {
        let status = self.parsed_status()?;
        if self.parsed_kind() == Some(DocumentKind::Invoice)
            && status == DocumentStatus::Sent
            && self.due_date.is_some_and(|due| due < today)
        {
            return Some(DocumentStatus::Overdue);
        }
        Some(status)
    }
}

/// Filter parameters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub account_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a document.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub tenant_id: Uuid,
    pub kind: DocumentKind,
    pub account_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub billing_contact_id: Option<Uuid>,
    pub shipping_contact_id: Option<Uuid>,
    pub currency: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub return_date: Option<NaiveDate>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub tax_rate_id: Option<Uuid>,
    pub shipping_amount: Decimal,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Input for updating a document header (while its status allows it).
#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub assignee_id: Option<Uuid>,
    pub billing_contact_id: Option<Uuid>,
    pub shipping_contact_id: Option<Uuid>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub return_date: Option<NaiveDate>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub tax_rate_id: Option<Uuid>,
    pub shipping_amount: Option<Decimal>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Input for a status transition request.
#[derive(Debug, Clone)]
pub struct TransitionDocument {
    pub status: DocumentStatus,
    /// Required when an invoice moves to `paid` or `partially_paid`.
    pub payment_amount: Option<Decimal>,
}
