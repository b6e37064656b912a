//! Weighted-average (moving average) costing
//!
//! Every inflow recomputes the unit cost of a stock balance as the
//! quantity-weighted mean of what was on hand and what arrived. Outflows
//! never touch the cost.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Decimal places kept for quantities, costs and prices
pub const COST_SCALE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
    #[error("Cost arithmetic overflowed")]
    Overflow,

    #[error("Quantity must not be negative")]
    NegativeQuantity,

    #[error("Unit cost must not be negative")]
    NegativeCost,
}

/// Round to the ledger scale, half away from zero
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// New average cost after receiving `incoming_qty` units at `incoming_cost`.
///
/// A balance that has never received stock has no cost; it is treated as zero.
/// When the combined quantity is zero the incoming cost is returned as is.
pub fn weighted_average(
    on_hand_qty: Decimal,
    on_hand_cost: Option<Decimal>,
    incoming_qty: Decimal,
    incoming_cost: Decimal,
) -> Result<Decimal, CostError> {
    if on_hand_qty < Decimal::ZERO || incoming_qty < Decimal::ZERO {
        return Err(CostError::NegativeQuantity);
    }
    if incoming_cost < Decimal::ZERO || on_hand_cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(CostError::NegativeCost);
    }

    let total_qty = on_hand_qty
        .checked_add(incoming_qty)
        .ok_or(CostError::Overflow)?;
    if total_qty.is_zero() {
        return Ok(incoming_cost);
    }

    let on_hand_value = on_hand_qty
        .checked_mul(on_hand_cost.unwrap_or(Decimal::ZERO))
        .ok_or(CostError::Overflow)?;
    let incoming_value = incoming_qty
        .checked_mul(incoming_cost)
        .ok_or(CostError::Overflow)?;
    let total_value = on_hand_value
        .checked_add(incoming_value)
        .ok_or(CostError::Overflow)?;

    let average = total_value
        .checked_div(total_qty)
        .ok_or(CostError::Overflow)?;
    Ok(round_cost(average))
}

/// Value of `quantity` units at `unit_cost`, at ledger scale
pub fn extended_value(quantity: Decimal, unit_cost: Decimal) -> Result<Decimal, CostError> {
    quantity
        .checked_mul(unit_cost)
        .map(round_cost)
        .ok_or(CostError::Overflow)
}
