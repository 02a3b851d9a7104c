//! # Validation Module
//!
//! Request validation for the back-office operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum extractors)                                       │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, before any transaction opens                    │
//! │  ├── Empty orders                                                      │
//! │  └── Quantities, prices, discounts, payments                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (current_stock >= 0), CHECK (return_quantity <= quantity)   │
//! │  ├── UNIQUE (invoice_number), UNIQUE stock key                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::requests::{
    AdjustLoyaltyRequest, AdjustStockRequest, CreatePositionRequest, CreateReturnRequest,
    CreateSaleRequest, StockTakeRequest, TransferStockRequest,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text notes and reasons.
pub const MAX_NOTE_LEN: usize = 500;

/// Largest quantity a single line, return, transfer or count may carry.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Largest price, discount, refund or payment accepted, in whole units.
///
/// With [`MAX_QUANTITY`] this keeps every line product far inside
/// `Decimal`'s range.
pub const MAX_AMOUNT: i64 = 1_000_000_000;

// =============================================================================
// Field Validators
// =============================================================================

/// Quantities on lines, returns and transfers must be at least 1.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    if qty > MAX_QUANTITY {
        return Err(ValidationError::too_large(field, MAX_QUANTITY));
    }
    Ok(())
}

/// Stock levels may be zero but never negative.
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::must_not_be_negative(field));
    }
    if qty > MAX_QUANTITY {
        return Err(ValidationError::too_large(field, MAX_QUANTITY));
    }
    Ok(())
}

/// Prices, discounts and payment amounts: zero up to [`MAX_AMOUNT`].
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::must_not_be_negative(field));
    }
    if amount > Money::from_major(MAX_AMOUNT) {
        return Err(ValidationError::too_large(field, MAX_AMOUNT));
    }
    Ok(())
}

/// Optional free text, bounded by [`MAX_NOTE_LEN`].
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(text) if text.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

/// Required free text: non-blank and bounded.
pub fn validate_required_text(field: &str, text: &str) -> ValidationResult<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    validate_note(field, Some(text))
}

// =============================================================================
// Request Validators
// =============================================================================

/// Checks a sale before pricing.
///
/// ## Rules
/// - at least one item and one payment (`EmptyOrder`)
/// - every quantity in `1..=MAX_QUANTITY`
/// - unit prices, line discounts, order discount, payments in `0..=MAX_AMOUNT`
/// - a line discount never exceeds its unit price
///
/// The order discount is checked against the sub-total after pricing.
///
/// ## Example
/// ```rust
/// use retail_core::requests::CreateSaleRequest;
/// use retail_core::validation::validate_sale_request;
/// use retail_core::{CoreError, Money};
///
/// let empty = CreateSaleRequest {
///     store_id: 1,
///     terminal_id: 1,
///     customer_id: None,
///     user_id: 1,
///     items: vec![],
///     payments: vec![],
///     discount_amount: Money::zero(),
///     notes: None,
/// };
/// assert!(matches!(validate_sale_request(&empty), Err(CoreError::EmptyOrder(_))));
/// ```
pub fn validate_sale_request(request: &CreateSaleRequest) -> CoreResult<()> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyOrder("items"));
    }
    if request.payments.is_empty() {
        return Err(CoreError::EmptyOrder("payments"));
    }

    for item in &request.items {
        validate_quantity("quantity", item.quantity)?;
        validate_amount("unit_price", item.unit_price)?;
        validate_amount("discount_per_item", item.discount_per_item)?;
        if item.discount_per_item > item.unit_price {
            return Err(ValidationError::not_allowed(
                "discount_per_item",
                format!(
                    "discount {} exceeds unit price {} for product {}",
                    item.discount_per_item, item.unit_price, item.product_id
                ),
            )
            .into());
        }
    }
    for payment in &request.payments {
        validate_amount("payment amount", payment.amount)?;
    }
    validate_amount("discount_amount", request.discount_amount)?;
    validate_note("notes", request.notes.as_deref())?;

    Ok(())
}

/// Checks a return before touching the sale.
pub fn validate_return_request(request: &CreateReturnRequest) -> CoreResult<()> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyOrder("return items"));
    }

    for item in &request.items {
        validate_quantity("quantity_returned", item.quantity_returned)?;
        validate_amount("refund_per_item", item.refund_per_item)?;
    }
    validate_note("reason", request.reason.as_deref())?;
    validate_note("notes", request.notes.as_deref())?;

    Ok(())
}

/// A manual points change is non-zero and within [`MAX_QUANTITY`] either way.
pub fn validate_loyalty_adjustment(request: &AdjustLoyaltyRequest) -> ValidationResult<()> {
    if request.points_change == 0 {
        return Err(ValidationError::not_allowed("points_change", "must not be zero"));
    }
    if request.points_change.unsigned_abs() > MAX_QUANTITY as u64 {
        return Err(ValidationError::too_large("points_change", MAX_QUANTITY));
    }
    validate_note("description", request.description.as_deref())
}

pub fn validate_position_request(request: &CreatePositionRequest) -> ValidationResult<()> {
    validate_stock_level("initial_stock", request.initial_stock)
}

pub fn validate_adjust_request(request: &AdjustStockRequest) -> ValidationResult<()> {
    validate_stock_level("new_quantity", request.new_quantity)?;
    validate_required_text("reason", &request.reason)
}

pub fn validate_stock_take_request(request: &StockTakeRequest) -> ValidationResult<()> {
    validate_stock_level("counted_quantity", request.counted_quantity)?;
    validate_note("notes", request.notes.as_deref())
}

/// Transfer checks that do not need the source row.
///
/// Same-store transfers are rejected once the source store is known.
pub fn validate_transfer_request(request: &TransferStockRequest) -> ValidationResult<()> {
    validate_quantity("quantity", request.quantity)?;
    validate_note("notes", request.notes.as_deref())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::{PaymentRequest, ReturnItemRequest, SaleLineRequest};
    use rust_decimal_macros::dec;

    fn sale(items: Vec<SaleLineRequest>, payments: Vec<PaymentRequest>) -> CreateSaleRequest {
        CreateSaleRequest {
            store_id: 1,
            terminal_id: 1,
            customer_id: None,
            user_id: 1,
            items,
            payments,
            discount_amount: Money::zero(),
            notes: None,
        }
    }

    fn item(quantity: i64, price: Money) -> SaleLineRequest {
        SaleLineRequest {
            product_id: 1,
            variant_id: None,
            quantity,
            unit_price: price,
            discount_per_item: Money::zero(),
        }
    }

    fn cash(amount: Money) -> PaymentRequest {
        PaymentRequest {
            payment_method_id: 1,
            amount,
            transaction_reference: None,
        }
    }

    #[test]
    fn test_sale_without_payments_is_empty_order() {
        let request = sale(vec![item(1, Money::from_major(5))], vec![]);
        assert!(matches!(
            validate_sale_request(&request),
            Err(CoreError::EmptyOrder("payments"))
        ));
    }

    #[test]
    fn test_sale_rejects_bad_lines() {
        let zero_qty = sale(vec![item(0, Money::from_major(5))], vec![cash(Money::from_major(5))]);
        assert!(matches!(
            validate_sale_request(&zero_qty),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        let negative_price = sale(
            vec![item(1, Money::new(dec!(-1)))],
            vec![cash(Money::from_major(5))],
        );
        assert!(validate_sale_request(&negative_price).is_err());

        let free_item = sale(vec![item(1, Money::zero())], vec![cash(Money::zero())]);
        assert!(validate_sale_request(&free_item).is_ok());
    }

    #[test]
    fn test_line_discount_above_price_rejected() {
        let mut line = item(1, Money::from_major(100));
        line.discount_per_item = Money::from_major(150);
        let request = sale(vec![line], vec![cash(Money::from_major(10))]);
        assert!(matches!(
            validate_sale_request(&request),
            Err(CoreError::Validation(ValidationError::NotAllowed { .. }))
        ));

        let mut full = item(1, Money::from_major(100));
        full.discount_per_item = Money::from_major(100);
        let request = sale(vec![full], vec![cash(Money::zero())]);
        assert!(validate_sale_request(&request).is_ok());
    }

    #[test]
    fn test_oversized_quantities_and_amounts_rejected() {
        let huge_qty = sale(
            vec![item(i64::MAX, Money::from_major(10_000_000_000))],
            vec![cash(Money::from_major(1))],
        );
        assert!(matches!(
            validate_sale_request(&huge_qty),
            Err(CoreError::Validation(ValidationError::TooLarge { .. }))
        ));

        let huge_price = sale(
            vec![item(1, Money::from_major(MAX_AMOUNT + 1))],
            vec![cash(Money::from_major(1))],
        );
        assert!(matches!(
            validate_sale_request(&huge_price),
            Err(CoreError::Validation(ValidationError::TooLarge { .. }))
        ));

        let at_limits = sale(
            vec![item(MAX_QUANTITY, Money::from_major(MAX_AMOUNT))],
            vec![cash(Money::from_major(MAX_AMOUNT))],
        );
        assert!(validate_sale_request(&at_limits).is_ok());

        let huge_return = CreateReturnRequest {
            sale_id: 1,
            returned_by_user_id: 1,
            items: vec![ReturnItemRequest {
                sale_item_id: 1,
                quantity_returned: i64::MAX,
                refund_per_item: Money::from_major(10_000_000_000),
            }],
            reason: None,
            refund_method_id: None,
            notes: None,
        };
        assert!(validate_return_request(&huge_return).is_err());

        assert!(validate_stock_level("new_quantity", MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_return_rules() {
        let empty = CreateReturnRequest {
            sale_id: 1,
            returned_by_user_id: 1,
            items: vec![],
            reason: None,
            refund_method_id: None,
            notes: None,
        };
        assert!(matches!(
            validate_return_request(&empty),
            Err(CoreError::EmptyOrder(_))
        ));

        let negative = CreateReturnRequest {
            items: vec![ReturnItemRequest {
                sale_item_id: 1,
                quantity_returned: -1,
                refund_per_item: Money::from_major(1),
            }],
            ..empty
        };
        assert!(validate_return_request(&negative).is_err());
    }

    #[test]
    fn test_loyalty_adjustment_bounds() {
        let request = |points_change| AdjustLoyaltyRequest {
            points_change,
            sale_id: None,
            description: None,
        };
        assert!(validate_loyalty_adjustment(&request(0)).is_err());
        assert!(validate_loyalty_adjustment(&request(-5)).is_ok());
        assert!(validate_loyalty_adjustment(&request(i64::MIN)).is_err());
        assert!(validate_loyalty_adjustment(&request(MAX_QUANTITY)).is_ok());
    }

    #[test]
    fn test_stock_levels_and_notes() {
        assert!(validate_stock_level("new_quantity", 0).is_ok());
        assert!(validate_stock_level("new_quantity", -1).is_err());
        assert!(validate_required_text("reason", "  ").is_err());
        assert!(validate_note("notes", Some(&"x".repeat(MAX_NOTE_LEN + 1))).is_err());
        assert!(validate_note("notes", None).is_ok());
    }
}
