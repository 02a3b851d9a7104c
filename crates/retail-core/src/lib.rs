//! # retail-core: Pure Business Logic for the Retail Back Office
//!
//! This crate holds every rule of the sales / inventory / returns core as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Retail Back Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    POST /api/sales, POST /api/returns, /api/inventory/...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    retail-db (Database Layer)                   │   │
//! │  │   Stock Ledger, Loyalty Ledger, Sale & Return engines           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls into                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ retail-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Sale     │  │   Money   │  │ LineInput │  │   rules   │  │   │
//! │  │   │  Return   │  │  TaxRate  │  │  status   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and enums (Sale, StockPosition, PaymentStatus, ...)
//! - [`requests`] - Typed operation inputs and list filters
//! - [`money`] - Fixed-point `Money` (no floating point!)
//! - [`pricing`] - Pricing & tax calculator, payment status rules
//! - [`loyalty`] - Loyalty point earn / reversal math
//! - [`numbering`] - Invoice number formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation
//!
//! ## Example Usage
//!
//! ```rust
//! use retail_core::pricing::{price_order, LineInput};
//! use retail_core::{Money, TaxRate};
//! use rust_decimal::Decimal;
//!
//! let order = price_order(
//!     &[LineInput {
//!         product_id: 1,
//!         variant_id: None,
//!         quantity: 2,
//!         unit_price: Money::from_major(100),
//!         discount_per_item: Money::zero(),
//!         tax_rate: TaxRate::from_percent(Decimal::from(10)),
//!     }],
//!     Money::zero(),
//! );
//!
//! assert_eq!(order.totals().grand_total.to_string(), "220.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod loyalty;
pub mod money;
pub mod numbering;
pub mod pricing;
pub mod requests;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
