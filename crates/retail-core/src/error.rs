//! # Error Types
//!
//! Domain-specific error types for retail-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  retail-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  retail-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries the identifiers needed to act on it (sale id, sale
//! item id, requested vs available quantities) so the boundary layer never
//! has to parse messages.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the ledgers and engines.
///
/// Raising any of these inside a sale, void, return or transfer aborts the
/// surrounding database transaction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line references a product the catalog does not know.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Requested consumption or transfer exceeds what is on hand.
    ///
    /// ## When This Occurs
    /// - Selling more than the store holds (no backorders)
    /// - Transferring more than the source position holds
    ///
    /// ## User Workflow
    /// ```text
    /// POST /api/sales (qty: 5)
    ///      │
    ///      ▼
    /// Guarded decrement: current_stock=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale rolled back, 409 returned
    /// ```
    #[error("Insufficient stock for product {product_id} at store {store_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        store_id: i64,
        available: i64,
        requested: i64,
    },

    /// Return quantity exceeds what is still returnable on a sale line.
    #[error("Cannot return {requested} of sale item {sale_item_id}: only {available} returnable")]
    OverReturn {
        sale_item_id: i64,
        available: i64,
        requested: i64,
    },

    /// Void requested on a sale that is already void.
    #[error("Sale {0} is already voided")]
    AlreadyVoided(i64),

    /// Return requested against a voided sale.
    #[error("Sale {0} is voided and cannot accept returns")]
    SaleVoided(i64),

    /// A sale with no items or payments, or a return with no items.
    #[error("{0} must contain at least one entry")]
    EmptyOrder(&'static str),

    /// A return line references a sale item that belongs to another sale.
    #[error("Sale item {sale_item_id} does not belong to sale {sale_id}")]
    ItemNotInSale { sale_id: i64, sale_item_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any database work starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or more.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value above the largest accepted.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: String },

    /// Invalid format (e.g. a malformed date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields that must differ are equal, or similar cross-field rules.
    #[error("{field}: {reason}")]
    NotAllowed { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required { field: field.into() }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive { field: field.into() }
    }

    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative { field: field.into() }
    }

    pub fn too_large(field: impl Into<String>, max: impl ToString) -> Self {
        ValidationError::TooLarge {
            field: field.into(),
            max: max.to_string(),
        }
    }

    pub fn not_allowed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: 7,
            store_id: 1,
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 7 at store 1: available 3, requested 5"
        );

        let err = CoreError::OverReturn {
            sale_item_id: 12,
            available: 1,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cannot return 2 of sale item 12: only 1 returnable"
        );

        assert_eq!(
            CoreError::EmptyOrder("payments").to_string(),
            "payments must contain at least one entry"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("reason").to_string(),
            "reason is required"
        );
        assert_eq!(
            ValidationError::must_be_positive("quantity").to_string(),
            "quantity must be positive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("items").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
