//! Shipment weight aggregation for delivery orders.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::LineItem;

/// Round a weight to 3 decimal places.
pub fn round_weight(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

/// Weight of one line: quantity x unit weight. `None` when the product
/// carried no weight at attach time.
pub fn line_total_weight(quantity: i32, unit_weight: Option<Decimal>) -> Option<Decimal> {
    unit_weight.map(|w| round_weight(Decimal::from(quantity) * w))
}

/// Total shipment weight over a document's line items. Lines without a
/// unit weight contribute zero.
pub fn document_total_weight(lines: &[LineItem]) -> Decimal {
    let total = lines
        .iter()
        .filter_map(|line| {
            line.unit_weight
                .map(|w| Decimal::from(line.quantity) * w)
        })
        .sum();
    round_weight(total)
}
