//! Status policy per document kind: legal transitions, terminal states,
//! ledger freezing, and invoice payment rules.

use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::models::{DocumentKind, DocumentStatus};
use crate::models::{DocumentKind as Kind, DocumentStatus as Status};

/// Whether `(from, to)` is a legal edge for the kind's transition table.
pub fn can_transition(kind: DocumentKind, from: DocumentStatus, to: DocumentStatus) -> bool {
    match kind {
        Kind::Quote => matches!(
            (from, to),
            (Status::Draft, Status::Sent)
                | (Status::Sent, Status::Accepted)
                | (Status::Sent, Status::Rejected)
                | (Status::Sent, Status::Expired)
        ),
        Kind::SalesOrder => matches!(
            (from, to),
            (Status::Draft, Status::Confirmed)
                | (Status::Confirmed, Status::Processing)
                | (Status::Processing, Status::Shipped)
                | (Status::Shipped, Status::Delivered)
        ),
        Kind::PurchaseOrder => matches!(
            (from, to),
            (Status::Draft, Status::Sent)
                | (Status::Sent, Status::Confirmed)
                | (Status::Confirmed, Status::Received)
                | (Status::Draft, Status::Cancelled)
                | (Status::Sent, Status::Cancelled)
                | (Status::Confirmed, Status::Cancelled)
        ),
        Kind::Invoice => matches!(
            (from, to),
            (Status::Draft, Status::Sent)
                | (Status::Sent, Status::Paid)
                | (Status::Sent, Status::PartiallyPaid)
                | (Status::Sent, Status::Cancelled)
                | (Status::PartiallyPaid, Status::PartiallyPaid)
                | (Status::PartiallyPaid, Status::Paid)
                | (Status::PartiallyPaid, Status::Cancelled)
                | (Status::Overdue, Status::Paid)
                | (Status::Overdue, Status::PartiallyPaid)
                | (Status::Overdue, Status::Cancelled)
        ),
        Kind::DeliveryOrder => matches!(
            (from, to),
            (Status::Pending, Status::InTransit)
                | (Status::InTransit, Status::Delivered)
                | (Status::InTransit, Status::Cancelled)
        ),
        Kind::ReturnOrder => matches!(
            (from, to),
            (Status::Pending, Status::Approved)
                | (Status::Approved, Status::Shipped)
                | (Status::Shipped, Status::Received)
                | (Status::Received, Status::Processed)
                | (Status::Pending, Status::Cancelled)
                | (Status::Approved, Status::Cancelled)
                | (Status::Shipped, Status::Cancelled)
                | (Status::Received, Status::Cancelled)
        ),
        Kind::ReceiptOrder => matches!(
            (from, to),
            (Status::Pending, Status::Received)
                | (Status::Pending, Status::Partial)
                | (Status::Received, Status::Completed)
                | (Status::Partial, Status::Completed)
                | (Status::Pending, Status::Cancelled)
                | (Status::Received, Status::Cancelled)
                | (Status::Partial, Status::Cancelled)
        ),
    }
}

/// Whether the status ends the kind's lifecycle.
pub fn is_terminal(kind: DocumentKind, status: DocumentStatus) -> bool {
    match kind {
        Kind::Quote => matches!(
            status,
            Status::Accepted | Status::Rejected | Status::Expired
        ),
        Kind::SalesOrder => matches!(status, Status::Delivered),
        Kind::PurchaseOrder => matches!(status, Status::Received | Status::Cancelled),
        Kind::Invoice => matches!(status, Status::Paid | Status::Cancelled),
        Kind::DeliveryOrder => matches!(status, Status::Delivered | Status::Cancelled),
        Kind::ReturnOrder => matches!(status, Status::Processed | Status::Cancelled),
        Kind::ReceiptOrder => matches!(status, Status::Completed | Status::Cancelled),
    }
}

/// Whether line items may be attached, updated, or detached while the
/// document sits in this status. Everything outside these sets is frozen.
pub fn is_ledger_open(kind: DocumentKind, status: DocumentStatus) -> bool {
    match kind {
        Kind::Quote => matches!(status, Status::Draft | Status::Sent),
        Kind::SalesOrder => matches!(
            status,
            Status::Draft | Status::Confirmed | Status::Processing
        ),
        Kind::PurchaseOrder => matches!(status, Status::Draft | Status::Sent),
        Kind::Invoice => matches!(status, Status::Draft),
        Kind::DeliveryOrder => matches!(status, Status::Pending),
        Kind::ReturnOrder => matches!(status, Status::Pending | Status::Approved),
        Kind::ReceiptOrder => matches!(status, Status::Pending),
    }
}

/// Whether entering `to` requires the document to carry at least one line
/// item. Return and receipt orders are status-only and exempt.
pub fn requires_line_items(kind: DocumentKind, to: DocumentStatus) -> bool {
    matches!(
        (kind, to),
        (Kind::Quote, Status::Sent)
            | (Kind::SalesOrder, Status::Confirmed)
            | (Kind::PurchaseOrder, Status::Sent)
            | (Kind::Invoice, Status::Sent)
            | (Kind::DeliveryOrder, Status::InTransit)
    )
}

/// Validate a requested transition edge.
///
/// `overdue` is never accepted as a requested target; the engine derives it
/// from due dates instead.
pub fn check_transition(
    kind: DocumentKind,
    from: DocumentStatus,
    to: DocumentStatus,
) -> Result<(), AppError> {
    if to == Status::Overdue {
        return Err(AppError::InvalidTransition(anyhow::anyhow!(
            "Status 'overdue' is derived from due dates and cannot be requested"
        )));
    }
    if !can_transition(kind, from, to) {
        return Err(AppError::InvalidTransition(anyhow::anyhow!(
            "Cannot transition {} from '{}' to '{}'",
            kind,
            from,
            to
        )));
    }
    Ok(())
}

/// Apply a payment against an invoice balance for a transition into
/// `paid` or `partially_paid`. Returns the new (amount_paid, amount_due).
pub fn apply_invoice_payment(
    total_amount: Decimal,
    amount_paid: Decimal,
    target: DocumentStatus,
    payment_amount: Option<Decimal>,
) -> Result<(Decimal, Decimal), AppError> {
    let payment = payment_amount.ok_or_else(|| {
        AppError::Validation(anyhow::anyhow!(
            "A payment amount is required to mark an invoice '{}'",
            target
        ))
    })?;

    if payment <= Decimal::ZERO {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let amount_due = (total_amount - amount_paid).max(Decimal::ZERO);
    if payment > amount_due {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Payment amount {} exceeds amount due {}",
            payment,
            amount_due
        )));
    }

    let new_paid = amount_paid + payment;
    let new_due = (total_amount - new_paid).max(Decimal::ZERO);

    match target {
        Status::Paid if new_due != Decimal::ZERO => Err(AppError::Validation(anyhow::anyhow!(
            "Payment leaves {} due; invoice cannot be marked 'paid'",
            new_due
        ))),
        Status::PartiallyPaid if new_due == Decimal::ZERO => {
            Err(AppError::Validation(anyhow::anyhow!(
                "Payment settles the invoice in full; use 'paid' instead"
            )))
        }
        _ => Ok((new_paid, new_due)),
    }
}
