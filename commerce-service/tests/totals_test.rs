//! Document totals integration tests for commerce-service.
//! Tests for subtotal, document discount, tax, shipping, and balance math.

mod common;

use common::{line, tax_rate};
use commerce_service::domain::totals;
use commerce_service::models::DiscountType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;

#[test]
fn subtotal_sums_line_totals() {
    let lines = vec![
        line(3, dec!(19.99), DiscountType::None, Decimal::ZERO),
        line(2, dec!(5.50), DiscountType::Fixed, dec!(1)),
        line(2, dec!(100.00), DiscountType::Percentage, dec!(10)),
    ];

    let totals = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        None,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(totals.subtotal, dec!(249.97));
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.tax_amount, Decimal::ZERO);
    assert_eq!(totals.total_amount, dec!(249.97));
}

#[test]
fn document_discount_applies_before_tax() {
    let lines = vec![line(2, dec!(100.00), DiscountType::None, Decimal::ZERO)];
    let rate = tax_rate(dec!(10));

    let totals = totals::calculate(
        &lines,
        DiscountType::Fixed,
        dec!(50),
        Some(&rate),
        dec!(5),
        Decimal::ZERO,
    )
    .unwrap();

    // Tax is charged on 150, not 200, and shipping lands after tax.
    assert_eq!(totals.subtotal, dec!(200.00));
    assert_eq!(totals.discount_amount, dec!(50.00));
    assert_eq!(totals.tax_amount, dec!(15.00));
    assert_eq!(totals.total_amount, dec!(170.00));
    assert_eq!(totals.amount_due, dec!(170.00));
}

#[test]
fn percentage_document_discount_rounds_midpoint_away_from_zero() {
    let lines = vec![line(1, dec!(101.25), DiscountType::None, Decimal::ZERO)];

    let totals = totals::calculate(
        &lines,
        DiscountType::Percentage,
        dec!(50),
        None,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(totals.discount_amount, dec!(50.63));
    assert_eq!(totals.total_amount, dec!(50.62));
}

#[test]
fn fixed_document_discount_clamps_to_subtotal() {
    let lines = vec![line(1, dec!(100.00), DiscountType::None, Decimal::ZERO)];
    let rate = tax_rate(dec!(8.25));

    let totals = totals::calculate(
        &lines,
        DiscountType::Fixed,
        dec!(300),
        Some(&rate),
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(totals.discount_amount, dec!(100.00));
    assert_eq!(totals.tax_amount, Decimal::ZERO);
    assert_eq!(totals.total_amount, Decimal::ZERO);
}

#[test]
fn shipping_is_added_after_tax() {
    let lines = vec![line(1, dec!(100.00), DiscountType::None, Decimal::ZERO)];
    let rate = tax_rate(dec!(8.25));

    let totals = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        Some(&rate),
        dec!(10),
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(totals.tax_amount, dec!(8.25));
    assert_eq!(totals.total_amount, dec!(118.25));
}

#[test]
fn amount_due_reflects_recorded_payments() {
    let lines = vec![line(1, dec!(100.00), DiscountType::None, Decimal::ZERO)];
    let rate = tax_rate(dec!(8.25));

    let totals = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        Some(&rate),
        dec!(10),
        dec!(50),
    )
    .unwrap();

    assert_eq!(totals.total_amount, dec!(118.25));
    assert_eq!(totals.amount_due, dec!(68.25));
}

#[test]
fn amount_due_never_goes_negative() {
    let lines = vec![line(1, dec!(100.00), DiscountType::None, Decimal::ZERO)];

    let totals = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        None,
        Decimal::ZERO,
        dec!(500),
    )
    .unwrap();

    assert_eq!(totals.amount_due, Decimal::ZERO);
}

#[test]
fn empty_ledger_yields_zero_goods_totals() {
    let rate = tax_rate(dec!(8.25));

    let totals = totals::calculate(
        &[],
        DiscountType::Percentage,
        dec!(10),
        Some(&rate),
        dec!(5),
        Decimal::ZERO,
    )
    .unwrap();

    // Nothing to discount or tax; only shipping survives into the total.
    assert_eq!(totals.subtotal, Decimal::ZERO);
    assert_eq!(totals.discount_amount, Decimal::ZERO);
    assert_eq!(totals.tax_amount, Decimal::ZERO);
    assert_eq!(totals.total_amount, dec!(5));
}

#[test]
fn recalculation_is_idempotent() {
    let lines = vec![
        line(2, dec!(100.00), DiscountType::Percentage, dec!(10)),
        line(3, dec!(19.99), DiscountType::None, Decimal::ZERO),
    ];
    let rate = tax_rate(dec!(10));

    let first = totals::calculate(
        &lines,
        DiscountType::Fixed,
        dec!(25),
        Some(&rate),
        dec!(7.50),
        dec!(40),
    )
    .unwrap();
    let second = totals::calculate(
        &lines,
        DiscountType::Fixed,
        dec!(25),
        Some(&rate),
        dec!(7.50),
        dec!(40),
    )
    .unwrap();

    assert_eq!(first, second);
}

#[test]
fn negative_document_discount_is_rejected() {
    let lines = vec![line(1, dec!(100.00), DiscountType::None, Decimal::ZERO)];

    let result = totals::calculate(
        &lines,
        DiscountType::Fixed,
        dec!(-5),
        None,
        Decimal::ZERO,
        Decimal::ZERO,
    );

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn discounted_quote_line_flows_into_subtotal() {
    let lines = vec![line(2, dec!(100.00), DiscountType::Percentage, dec!(10))];

    assert_eq!(lines[0].discount_amount, dec!(20.00));
    assert_eq!(lines[0].total_price, dec!(180.00));

    let totals = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        None,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(totals.subtotal, dec!(180.00));
    assert_eq!(totals.total_amount, dec!(180.00));
}
