//! Document totals: subtotal, document discount, tax, shipping, grand total.

use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::domain::pricing;
use crate::models::{DiscountType, LineItem, TaxRate};

/// Derived monetary fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_due: Decimal,
}

/// Recompute a document's derived totals from its line items and its own
/// discount, tax, shipping, and payment inputs.
///
/// Pure and idempotent: the same inputs always produce the same totals, so
/// repeated recalculation cannot drift through rounding.
pub fn calculate(
    lines: &[LineItem],
    discount_type: DiscountType,
    discount_value: Decimal,
    tax_rate: Option<&TaxRate>,
    shipping_amount: Decimal,
    amount_paid: Decimal,
) -> Result<DocumentTotals, AppError> {
    let subtotal: Decimal = lines.iter().map(|line| line.total_price).sum();

    let discount = pricing::discount_amount(subtotal, discount_type, discount_value)?;
    let taxable = (subtotal - discount).max(Decimal::ZERO);

    let tax_amount = match tax_rate {
        Some(rate) => pricing::round_money(taxable * rate.rate / Decimal::from(100)),
        None => Decimal::ZERO,
    };

    let total_amount =
        (subtotal - discount + tax_amount + shipping_amount).max(Decimal::ZERO);
    let amount_due = (total_amount - amount_paid).max(Decimal::ZERO);

    Ok(DocumentTotals {
        subtotal,
        discount_amount: discount,
        tax_amount,
        total_amount,
        amount_due,
    })
}
