//! Shipment weight integration tests for commerce-service.
//! Tests for delivery order weight aggregation from line item snapshots.

mod common;

use commerce_service::domain::{totals, weight};
use commerce_service::models::DiscountType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn shipment_weight_sums_line_weights() {
    let lines = vec![
        common::weighted_line(2, dec!(10.00), dec!(1.5)),
        common::weighted_line(3, dec!(10.00), dec!(2.0)),
    ];

    assert_eq!(lines[0].total_weight, Some(dec!(3.0)));
    assert_eq!(lines[1].total_weight, Some(dec!(6.0)));
    assert_eq!(weight::document_total_weight(&lines), dec!(9.0));
}

#[test]
fn lines_without_weight_snapshot_count_as_zero() {
    let lines = vec![
        common::weighted_line(2, dec!(10.00), dec!(1.5)),
        common::line(5, dec!(10.00), DiscountType::None, Decimal::ZERO),
    ];

    assert_eq!(lines[1].total_weight, None);
    assert_eq!(weight::document_total_weight(&lines), dec!(3.0));
}

#[test]
fn empty_delivery_order_weighs_nothing() {
    assert_eq!(weight::document_total_weight(&[]), Decimal::ZERO);
}

#[test]
fn line_weight_rounds_to_grams() {
    let item = common::weighted_line(7, dec!(10.00), dec!(0.1234));

    assert_eq!(item.total_weight, Some(dec!(0.864)));
    assert_eq!(weight::document_total_weight(&[item]), dec!(0.864));
}

#[test]
fn weight_is_independent_of_monetary_value() {
    // A delivery order can be a pure shipping record with zero value.
    let lines = vec![common::weighted_line(2, Decimal::ZERO, dec!(1.5))];

    let money = totals::calculate(
        &lines,
        DiscountType::None,
        Decimal::ZERO,
        None,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .unwrap();

    assert_eq!(money.subtotal, Decimal::ZERO);
    assert_eq!(money.total_amount, Decimal::ZERO);
    assert_eq!(weight::document_total_weight(&lines), dec!(3.0));
}
