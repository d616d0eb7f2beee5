//! Line item pricing integration tests for commerce-service.
//! Tests for per-line discount math and input validation.

mod common;

use commerce_service::domain::pricing;
use commerce_service::models::DiscountType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;

#[test]
fn percentage_discount_prices_the_line() {
    let item = common::line(2, dec!(100.00), DiscountType::Percentage, dec!(10));

    assert_eq!(item.discount_amount, dec!(20.00));
    assert_eq!(item.total_price, dec!(180.00));
}

#[test]
fn fixed_discount_applies_once_per_line() {
    // Fixed discounts come off the line gross, not off each unit.
    let item = common::line(3, dec!(50.00), DiscountType::Fixed, dec!(20));

    assert_eq!(item.discount_amount, dec!(20.00));
    assert_eq!(item.total_price, dec!(130.00));
}

#[test]
fn fixed_discount_cannot_exceed_line_gross() {
    let item = common::line(1, dec!(10.00), DiscountType::Fixed, dec!(50));

    assert_eq!(item.discount_amount, dec!(10.00));
    assert_eq!(item.total_price, Decimal::ZERO);
}

#[test]
fn half_cent_discounts_round_away_from_zero() {
    let item = common::line(1, dec!(12.50), DiscountType::Percentage, dec!(5));

    assert_eq!(item.discount_amount, dec!(0.63));
    assert_eq!(item.total_price, dec!(11.87));
}

#[test]
fn zero_or_negative_quantity_is_rejected() {
    for quantity in [0, -2] {
        let result = pricing::line_amounts(
            quantity,
            dec!(10.00),
            DiscountType::None,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

#[test]
fn negative_unit_price_is_rejected() {
    let result = pricing::line_amounts(1, dec!(-10.00), DiscountType::None, Decimal::ZERO);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn negative_discount_value_is_rejected() {
    let result = pricing::line_amounts(1, dec!(10.00), DiscountType::Percentage, dec!(-5));
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn discount_type_round_trips_through_storage() {
    for discount_type in [
        DiscountType::None,
        DiscountType::Fixed,
        DiscountType::Percentage,
    ] {
        assert_eq!(
            DiscountType::from_string(discount_type.as_str()),
            Some(discount_type)
        );
    }
    assert_eq!(DiscountType::from_string("bogus"), None);
}
