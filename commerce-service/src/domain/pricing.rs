//! Line-level money math: discount rules and derived line amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

use crate::models::DiscountType;

/// Round a monetary value to currency scale (2 decimal places).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the discount against a gross amount.
///
/// `percentage` takes `discount_value` percent of the gross, rounded to
/// currency scale. `fixed` is clamped so it never exceeds the gross.
/// Overflowing discounts are clamped downstream, never an error.
pub fn discount_amount(
    gross: Decimal,
    discount_type: DiscountType,
    discount_value: Decimal,
) -> Result<Decimal, AppError> {
    if discount_value < Decimal::ZERO {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Discount value must not be negative"
        )));
    }

    let amount = match discount_type {
        DiscountType::None => Decimal::ZERO,
        DiscountType::Percentage => round_money(gross * discount_value / Decimal::from(100)),
        DiscountType::Fixed => round_money(discount_value).min(gross),
    };

    Ok(amount)
}

/// Derived monetary fields of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub gross: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

/// Compute the derived fields for a line item.
pub fn line_amounts(
    quantity: i32,
    unit_price: Decimal,
    discount_type: DiscountType,
    discount_value: Decimal,
) -> Result<LineAmounts, AppError> {
    if quantity <= 0 {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Quantity must be positive"
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Unit price must not be negative"
        )));
    }

    let gross = Decimal::from(quantity) * unit_price;
    let discount = discount_amount(gross, discount_type, discount_value)?;
    let total_price = (gross - discount).max(Decimal::ZERO);

    Ok(LineAmounts {
        gross,
        discount_amount: discount,
        total_price,
    })
}
