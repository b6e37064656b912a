//! Validation utilities for ledger inputs

use std::borrow::Cow;
use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::ValidationError;

use crate::costing::COST_SCALE;

// ============================================================================
// Amount Validations
// ============================================================================

/// Quantities moved through the ledger must be strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    validate_scale(quantity)
}

/// Costs and prices may be zero (donations, samples) but never negative
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    validate_scale(amount)
}

/// Stored amounts keep four decimal places
pub fn validate_scale(value: Decimal) -> Result<(), &'static str> {
    if value.normalize().scale() > COST_SCALE {
        return Err("At most 4 decimal places are allowed");
    }
    Ok(())
}

// ============================================================================
// Document Validations
// ============================================================================

/// A product may appear on at most one line of a document
pub fn validate_unique_products<I>(product_ids: I) -> Result<(), &'static str>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    for id in product_ids {
        if !seen.insert(id) {
            return Err("A product may appear only once per document");
        }
    }
    Ok(())
}

/// Discount must stay within the sale subtotal
pub fn validate_discount(discount: Decimal, subtotal: Decimal) -> Result<(), &'static str> {
    if discount < Decimal::ZERO {
        return Err("Discount cannot be negative");
    }
    if discount > subtotal {
        return Err("Discount cannot exceed the subtotal");
    }
    Ok(())
}

// ============================================================================
// validator hooks
// ============================================================================

fn to_validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// `#[validate(custom = "positive_quantity")]`
pub fn positive_quantity(value: &Decimal) -> Result<(), ValidationError> {
    validate_quantity(*value).map_err(|message| to_validation_error("quantity", message))
}

/// `#[validate(custom = "non_negative_amount")]`
pub fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    validate_amount(*value).map_err(|message| to_validation_error("amount", message))
}
