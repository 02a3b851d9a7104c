//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ StockPosition   │   │      Sale       │   │ ReturnTransaction│      │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  invoice_number │   │  sale_id (FK)   │       │
//! │  │  variant_id?    │   │  grand_total    │   │  refund_amount  │       │
//! │  │  store_id       │   │  payment_status │   │  ReturnItem[]   │       │
//! │  │  current_stock  │   │  SaleItem[]     │   └─────────────────┘       │
//! │  └────────┬────────┘   │  Payment[]      │                             │
//! │           │            └─────────────────┘   ┌─────────────────┐       │
//! │  ┌────────▼────────┐                         │ LoyaltyHistory  │       │
//! │  │ StockMovement   │   append-only logs ───► │  points_change  │       │
//! │  │  movement_type  │                         └─────────────────┘       │
//! │  │  quantity (±)   │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity is keyed by a database-assigned `i64`. Business identifiers
//! (invoice number, product code) are display data only.
//!
//! ## Detail Types
//! `*Detail`, `*Summary` and `*Level` types wrap an entity with the display
//! fields resolved from collaborator tables (names, codes). They flatten the
//! entity so the JSON shape is one flat object.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate as a percentage (`10` means 10%).
///
/// Tax categories store their rate the same way, so no conversion happens
/// between the catalog and the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(#[ts(type = "string")] Decimal);

impl TaxRate {
    #[inline]
    pub const fn from_percent(percent: Decimal) -> Self {
        TaxRate(percent)
    }

    #[inline]
    pub const fn percent(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Derived classification of how much of a sale has been paid or refunded.
///
/// ## State Machine
/// ```text
///            create_sale
///                │
///     ┌──────────┼──────────┐
///     ▼          ▼          ▼
///   PAID ◄──► PARTIAL      VOID ◄── void_sale (from PAID / PARTIAL / REFUNDED)
///     │          │
///     └────┬─────┘
///          ▼  returns cover grand_total
///      REFUNDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Paid in full (or returns left the paid amount covering the remainder).
    Paid,
    /// Something was paid, but less than the total.
    Partial,
    /// Returns cover the whole grand total.
    Refunded,
    /// Cancelled, or created with nothing paid.
    Void,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Void => "VOID",
        }
    }

    /// Statuses offered by the returnable-sales lookup. REFUNDED sales can
    /// still take a return for any units not yet returned.
    pub const fn accepts_returns(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Partial)
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// Why a stock quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Sale,
    Return,
    Purchase,
    Adjustment,
    TransferOut,
    TransferIn,
    Waste,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "SALE",
            MovementType::Return => "RETURN",
            MovementType::Purchase => "PURCHASE",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::Waste => "WASTE",
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// On-hand quantity for one (product, variant, store) key.
///
/// `variant_id = None` is its own key: it never collides with any variant
/// of the same product at the same store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockPosition {
    pub inventory_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub store_id: i64,
    pub current_stock: i64,
    #[ts(as = "Option<String>")]
    pub last_reorder_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub last_stock_take_date: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A stock position with catalog display fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryLevel {
    #[serde(flatten)]
    pub position: StockPosition,
    pub product_name: String,
    pub product_code: String,
    pub store_name: String,
    pub reorder_level: i64,
    pub max_stock_level: Option<i64>,
}

/// Immutable audit record of one quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub movement_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub store_id: i64,
    pub movement_type: MovementType,
    /// Signed: negative for stock leaving the position.
    pub quantity: i64,
    /// Sale id for SALE / RETURN movements.
    pub reference_id: Option<i64>,
    pub user_id: i64,
    #[ts(as = "String")]
    pub movement_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Both sides of a completed transfer, after the move.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockTransfer {
    pub source: StockPosition,
    pub destination: StockPosition,
    pub quantity: i64,
}

/// Store-wide inventory health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    pub total_positions: i64,
    pub total_stock: i64,
    /// In stock but at or below the product's reorder level.
    pub low_stock_items: i64,
    pub out_of_stock_items: i64,
    /// Above the product's max stock level, where one is set.
    pub over_stock_items: i64,
}

// =============================================================================
// Sales
// =============================================================================

/// A persisted sale.
///
/// ## Invariants
/// - `grand_total == sub_total - discount_amount + tax_amount`
/// - `change_given == max(0, amount_paid - grand_total)`
/// - only `payment_status`, `notes` and `updated_at` change after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub sale_id: i64,
    pub invoice_number: String,
    pub store_id: i64,
    pub terminal_id: i64,
    pub customer_id: Option<i64>,
    pub user_id: i64,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub grand_total: Money,
    pub amount_paid: Money,
    pub change_given: Money,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub sale_item_id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_per_item: Money,
    pub tax_per_item: Money,
    pub line_total: Money,
    /// Units already returned; `0 <= return_quantity <= quantity`.
    pub return_quantity: i64,
}

impl SaleItem {
    /// Units that can still be returned.
    #[inline]
    pub fn returnable_quantity(&self) -> i64 {
        self.quantity - self.return_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub payment_id: i64,
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub amount: Money,
    pub transaction_reference: Option<String>,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
}

/// A configured tender type (cash, credit card, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMethod {
    pub payment_method_id: i64,
    pub method_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemDetail {
    #[serde(flatten)]
    pub item: SaleItem,
    pub product_name: String,
    pub product_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: Payment,
    pub method_name: String,
}

/// A sale with everything a receipt or detail screen needs.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub store_name: String,
    pub cashier_name: String,
    pub customer_name: Option<String>,
    pub items: Vec<SaleItemDetail>,
    pub payments: Vec<PaymentDetail>,
}

/// A row of the sales list.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleSummary {
    #[serde(flatten)]
    pub sale: Sale,
    pub store_name: String,
    pub cashier_name: String,
    pub customer_name: Option<String>,
    pub item_count: i64,
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnTransaction {
    pub return_id: i64,
    pub sale_id: i64,
    #[ts(as = "String")]
    pub return_date: DateTime<Utc>,
    pub returned_by_user_id: i64,
    pub reason: Option<String>,
    pub refund_amount: Money,
    pub refund_method_id: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnItem {
    pub return_item_id: i64,
    pub return_id: i64,
    pub sale_item_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity_returned: i64,
    pub refund_per_item: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnItemDetail {
    #[serde(flatten)]
    pub item: ReturnItem,
    pub product_name: String,
    pub product_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnDetail {
    #[serde(flatten)]
    pub return_transaction: ReturnTransaction,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub refund_method_name: Option<String>,
    pub returned_by_name: String,
    pub items: Vec<ReturnItemDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnSummary {
    #[serde(flatten)]
    pub return_transaction: ReturnTransaction,
    pub invoice_number: String,
    pub customer_name: Option<String>,
    pub item_count: i64,
}

/// A sale line that still has units to give back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnableLine {
    pub sale_item_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub product_name: String,
    pub product_code: String,
    pub quantity: i64,
    pub return_quantity: i64,
    pub returnable_quantity: i64,
    pub unit_price: Money,
    pub discount_per_item: Money,
    pub tax_per_item: Money,
}

/// A PAID or PARTIAL sale with at least one returnable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnableSale {
    pub sale_id: i64,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub store_id: i64,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub grand_total: Money,
    pub payment_status: PaymentStatus,
    pub items: Vec<ReturnableLine>,
}

// =============================================================================
// Catalog & Directory (read-only collaborators)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub product_id: i64,
    pub product_code: String,
    pub product_name: String,
    pub barcode: Option<String>,
    pub tax_category_id: Option<i64>,
    pub retail_price: Money,
    pub reorder_level: i64,
    pub max_stock_level: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductVariant {
    pub variant_id: i64,
    pub product_id: i64,
    pub variant_name: String,
    pub barcode: Option<String>,
    /// `None` means the parent product's price applies.
    pub retail_price: Option<Money>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxCategory {
    pub tax_category_id: i64,
    pub category_name: String,
    pub tax_rate: TaxRate,
    pub is_active: bool,
}

impl TaxCategory {
    /// Rate to charge: inactive categories charge nothing.
    pub fn effective_rate(&self) -> TaxRate {
        if self.is_active {
            self.tax_rate
        } else {
            TaxRate::zero()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PosTerminal {
    pub terminal_id: i64,
    pub store_id: i64,
    pub terminal_name: String,
    pub is_active: bool,
}

// =============================================================================
// Customers & Loyalty
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub customer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// Never negative.
    pub total_loyalty_points: i64,
    #[ts(as = "Option<String>")]
    pub last_purchase_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyHistoryEntry {
    pub history_id: i64,
    pub customer_id: i64,
    pub sale_id: Option<i64>,
    /// Signed change actually applied to the balance.
    pub points_change: i64,
    pub description: String,
    #[ts(as = "String")]
    pub change_date: DateTime<Utc>,
}

/// Balance vs. ledger comparison for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyReconciliation {
    pub customer_id: i64,
    pub balance: i64,
    pub history_total: i64,
    pub in_balance: bool,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesStats {
    pub total_sales: Money,
    pub sales_count: i64,
    pub average_sale: Money,
    pub total_tax: Money,
    pub total_discount: Money,
}

/// Takings for one calendar day (UTC), split by tender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySalesReport {
    #[ts(as = "String")]
    pub report_date: NaiveDate,
    pub total_sales: Money,
    pub sales_count: i64,
    pub cash_sales: Money,
    pub card_sales: Money,
    pub other_sales: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnedProduct {
    pub product_name: String,
    pub product_code: String,
    pub total_returned: i64,
    pub return_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnsStats {
    pub total_returns: Money,
    pub returns_count: i64,
    pub average_return: Money,
    pub most_returned_products: Vec<ReturnedProduct>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Refunded).unwrap(),
            "\"REFUNDED\""
        );
        let parsed: PaymentStatus = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Partial);
        assert_eq!(PaymentStatus::Void.as_str(), "VOID");
    }

    #[test]
    fn test_only_paid_and_partial_accept_returns() {
        assert!(PaymentStatus::Paid.accepts_returns());
        assert!(PaymentStatus::Partial.accepts_returns());
        assert!(!PaymentStatus::Refunded.accepts_returns());
        assert!(!PaymentStatus::Void.accepts_returns());
    }

    #[test]
    fn test_movement_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MovementType::TransferOut).unwrap(),
            "\"TRANSFER_OUT\""
        );
        assert_eq!(MovementType::TransferIn.as_str(), "TRANSFER_IN");
    }

    #[test]
    fn test_returnable_quantity() {
        let item = SaleItem {
            sale_item_id: 1,
            sale_id: 1,
            product_id: 1,
            variant_id: None,
            quantity: 2,
            unit_price: Money::from_major(100),
            discount_per_item: Money::zero(),
            tax_per_item: Money::from_major(10),
            line_total: Money::from_major(220),
            return_quantity: 1,
        };
        assert_eq!(item.returnable_quantity(), 1);
    }

    #[test]
    fn test_inactive_tax_category_charges_nothing() {
        let mut category = TaxCategory {
            tax_category_id: 1,
            category_name: "Standard".to_string(),
            tax_rate: TaxRate::from_percent(Decimal::from(10)),
            is_active: true,
        };
        assert_eq!(category.effective_rate().percent(), Decimal::from(10));

        category.is_active = false;
        assert!(category.effective_rate().is_zero());
    }
}
