//! # Pricing & Tax Calculator
//!
//! Turns line requests plus resolved tax rates into priced lines and order
//! totals, and derives payment status from totals.
//!
//! ## Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per line                                                               │
//! │    item_subtotal  = quantity × unit_price                               │
//! │    item_discount  = discount_per_item × quantity                        │
//! │    taxable_amount = item_subtotal − item_discount                       │
//! │    item_tax       = taxable_amount × tax_rate / 100                     │
//! │    line_total     = taxable_amount + item_tax                           │
//! │    tax_per_item   = item_tax / quantity        (0 when quantity is 0)   │
//! │                                                                         │
//! │  Per order                                                              │
//! │    sub_total   = Σ item_subtotal                                        │
//! │    tax_amount  = Σ item_tax                                             │
//! │    grand_total = (sub_total − discount_amount) + tax_amount             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above is exact decimal arithmetic. [`PricedOrder::totals`]
//! rounds the three components to cents and derives the grand total from
//! the rounded parts, so the stored identity holds to the cent.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{PaymentStatus, TaxRate};

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// One line to price, with its tax rate already resolved.
///
/// The rate is 0 when the product has no tax category or the category is
/// inactive; that lookup lives in retail-db.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInput {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_per_item: Money,
    pub tax_rate: TaxRate,
}

/// A priced line, unrounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_per_item: Money,
    pub item_subtotal: Money,
    pub item_discount: Money,
    pub taxable_amount: Money,
    pub item_tax: Money,
    pub line_total: Money,
    pub tax_per_item: Money,
}

/// All lines of an order, priced, with exact totals.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub grand_total: Money,
}

/// Order totals rounded to cents, ready to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub grand_total: Money,
}

// =============================================================================
// Calculator
// =============================================================================

/// Prices a single line.
///
/// ## Example
/// ```rust
/// use retail_core::money::Money;
/// use retail_core::pricing::{price_line, LineInput};
/// use retail_core::types::TaxRate;
/// use rust_decimal::Decimal;
///
/// let line = price_line(&LineInput {
///     product_id: 1,
///     variant_id: None,
///     quantity: 2,
///     unit_price: Money::from_major(100),
///     discount_per_item: Money::zero(),
///     tax_rate: TaxRate::from_percent(Decimal::from(10)),
/// });
/// assert_eq!(line.item_tax, Money::from_major(20));
/// assert_eq!(line.line_total, Money::from_major(220));
/// assert_eq!(line.tax_per_item, Money::from_major(10));
/// ```
pub fn price_line(input: &LineInput) -> PricedLine {
    let item_subtotal = input.unit_price.multiply_quantity(input.quantity);
    let item_discount = input.discount_per_item.multiply_quantity(input.quantity);
    let taxable_amount = item_subtotal - item_discount;
    let item_tax = taxable_amount.calculate_tax(input.tax_rate);

    PricedLine {
        product_id: input.product_id,
        variant_id: input.variant_id,
        quantity: input.quantity,
        unit_price: input.unit_price,
        discount_per_item: input.discount_per_item,
        item_subtotal,
        item_discount,
        taxable_amount,
        item_tax,
        line_total: taxable_amount + item_tax,
        tax_per_item: item_tax.divide_quantity(input.quantity),
    }
}

/// Prices a whole order.
///
/// `discount_amount` is the order-level discount. Line discounts reduce the
/// taxable base of their line but are not part of `sub_total`.
pub fn price_order(lines: &[LineInput], discount_amount: Money) -> PricedOrder {
    let lines: Vec<PricedLine> = lines.iter().map(price_line).collect();
    let sub_total: Money = lines.iter().map(|l| l.item_subtotal).sum();
    let tax_amount: Money = lines.iter().map(|l| l.item_tax).sum();

    PricedOrder {
        sub_total,
        discount_amount,
        tax_amount,
        grand_total: (sub_total - discount_amount) + tax_amount,
        lines,
    }
}

impl PricedOrder {
    /// Rounds the order to cents.
    ///
    /// `grand_total` is recomputed from the rounded components.
    pub fn totals(&self) -> OrderTotals {
        let sub_total = self.sub_total.rounded();
        let discount_amount = self.discount_amount.rounded();
        let tax_amount = self.tax_amount.rounded();
        OrderTotals {
            sub_total,
            discount_amount,
            tax_amount,
            grand_total: (sub_total - discount_amount) + tax_amount,
        }
    }
}

// =============================================================================
// Payment Status Rules
// =============================================================================

/// Status of a freshly created sale.
///
/// ```text
/// total_paid ≥ grand_total  → PAID
/// total_paid > 0            → PARTIAL
/// otherwise                 → VOID
/// ```
pub fn initial_payment_status(total_paid: Money, grand_total: Money) -> PaymentStatus {
    if total_paid >= grand_total {
        PaymentStatus::Paid
    } else if total_paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Void
    }
}

/// Change handed back: `max(0, amount_paid − grand_total)`.
pub fn change_due(amount_paid: Money, grand_total: Money) -> Money {
    (amount_paid - grand_total).max(Money::zero())
}

/// Status of a sale after returns totalling `total_returned`.
///
/// ```text
/// total_returned ≥ grand_total                       → REFUNDED
/// total_returned > 0, grand − returned ≤ amount_paid → PAID
/// total_returned > 0, otherwise                      → PARTIAL
/// total_returned = 0                                 → unchanged
/// ```
pub fn status_after_returns(
    current: PaymentStatus,
    grand_total: Money,
    amount_paid: Money,
    total_returned: Money,
) -> PaymentStatus {
    if total_returned >= grand_total {
        PaymentStatus::Refunded
    } else if total_returned.is_positive() {
        let remaining = grand_total - total_returned;
        if remaining <= amount_paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        }
    } else {
        current
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
