//! # Row Mapping
//!
//! `FromRow` shapes for every query, and their conversion into the
//! retail-core domain types.
//!
//! ## Why a Separate Layer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite row                      Domain type                           │
//! │  ──────────                      ───────────                           │
//! │  grand_total TEXT '220.00'  ──►  Money(Decimal)   parse, may fail      │
//! │  tax_rate    TEXT '10'      ──►  TaxRate(Decimal) parse, may fail      │
//! │  payment_status TEXT 'PAID' ──►  PaymentStatus    sqlx::Type           │
//! │  sale_date   TEXT (RFC3339) ──►  DateTime<Utc>    sqlx chrono          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money columns come back as `String` and are parsed here, so a corrupt
//! value surfaces as [`DbError::Decode`] naming the column instead of a
//! silent zero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

use retail_core::{
    Customer, LoyaltyHistoryEntry, Money, MovementType, Payment, PaymentMethod, PaymentStatus,
    PosTerminal, Product, ProductVariant, ReturnItem, ReturnTransaction, ReturnableLine, Sale,
    SaleItem, StockMovement, StockPosition, TaxCategory, TaxRate,
};

use crate::error::{DbError, DbResult};

// =============================================================================
// Parsing Helpers
// =============================================================================

/// Parses a stored money column.
pub(crate) fn parse_money(column: &str, raw: &str) -> DbResult<Money> {
    Money::from_str(raw).map_err(|e| DbError::Decode {
        column: column.to_string(),
        reason: format!("'{}': {}", raw, e),
    })
}

pub(crate) fn parse_optional_money(column: &str, raw: Option<&str>) -> DbResult<Option<Money>> {
    raw.map(|value| parse_money(column, value)).transpose()
}

fn parse_rate(column: &str, raw: &str) -> DbResult<TaxRate> {
    Decimal::from_str(raw.trim())
        .map(TaxRate::from_percent)
        .map_err(|e| DbError::Decode {
            column: column.to_string(),
            reason: format!("'{}': {}", raw, e),
        })
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PositionRow {
    pub inventory_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub store_id: i64,
    pub current_stock: i64,
    pub last_reorder_date: Option<DateTime<Utc>>,
    pub last_stock_take_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<PositionRow> for StockPosition {
    fn from(row: PositionRow) -> Self {
        StockPosition {
            inventory_id: row.inventory_id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            store_id: row.store_id,
            current_stock: row.current_stock,
            last_reorder_date: row.last_reorder_date,
            last_stock_take_date: row.last_stock_take_date,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LevelRow {
    #[sqlx(flatten)]
    pub position: PositionRow,
    pub product_name: String,
    pub product_code: String,
    pub store_name: String,
    pub reorder_level: i64,
    pub max_stock_level: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct MovementRow {
    pub movement_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub store_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reference_id: Option<i64>,
    pub user_id: i64,
    pub movement_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            movement_id: row.movement_id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            store_id: row.store_id,
            movement_type: row.movement_type,
            quantity: row.quantity,
            reference_id: row.reference_id,
            user_id: row.user_id,
            movement_date: row.movement_date,
            notes: row.notes,
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SaleRow {
    pub sale_id: i64,
    pub invoice_number: String,
    pub store_id: i64,
    pub terminal_id: i64,
    pub customer_id: Option<i64>,
    pub user_id: i64,
    pub sale_date: DateTime<Utc>,
    pub sub_total: String,
    pub discount_amount: String,
    pub tax_amount: String,
    pub grand_total: String,
    pub amount_paid: String,
    pub change_given: String,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleRow {
    pub fn into_domain(self) -> DbResult<Sale> {
        Ok(Sale {
            sub_total: parse_money("sales.sub_total", &self.sub_total)?,
            discount_amount: parse_money("sales.discount_amount", &self.discount_amount)?,
            tax_amount: parse_money("sales.tax_amount", &self.tax_amount)?,
            grand_total: parse_money("sales.grand_total", &self.grand_total)?,
            amount_paid: parse_money("sales.amount_paid", &self.amount_paid)?,
            change_given: parse_money("sales.change_given", &self.change_given)?,
            sale_id: self.sale_id,
            invoice_number: self.invoice_number,
            store_id: self.store_id,
            terminal_id: self.terminal_id,
            customer_id: self.customer_id,
            user_id: self.user_id,
            sale_date: self.sale_date,
            payment_status: self.payment_status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A sale joined with its store, cashier and customer names.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SaleHeaderRow {
    #[sqlx(flatten)]
    pub sale: SaleRow,
    pub store_name: String,
    pub cashier_name: String,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SaleSummaryRow {
    #[sqlx(flatten)]
    pub sale: SaleRow,
    pub store_name: String,
    pub cashier_name: String,
    pub customer_name: Option<String>,
    pub item_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SaleItemRow {
    pub sale_item_id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: String,
    pub discount_per_item: String,
    pub tax_per_item: String,
    pub line_total: String,
    pub return_quantity: i64,
}

impl SaleItemRow {
    pub fn into_domain(self) -> DbResult<SaleItem> {
        Ok(SaleItem {
            unit_price: parse_money("sale_items.unit_price", &self.unit_price)?,
            discount_per_item: parse_money("sale_items.discount_per_item", &self.discount_per_item)?,
            tax_per_item: parse_money("sale_items.tax_per_item", &self.tax_per_item)?,
            line_total: parse_money("sale_items.line_total", &self.line_total)?,
            sale_item_id: self.sale_item_id,
            sale_id: self.sale_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            return_quantity: self.return_quantity,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SaleItemDetailRow {
    #[sqlx(flatten)]
    pub item: SaleItemRow,
    pub product_name: String,
    pub product_code: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PaymentRow {
    pub payment_id: i64,
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub amount: String,
    pub transaction_reference: Option<String>,
    pub payment_date: DateTime<Utc>,
}

impl PaymentRow {
    pub fn into_domain(self) -> DbResult<Payment> {
        Ok(Payment {
            amount: parse_money("payments.amount", &self.amount)?,
            payment_id: self.payment_id,
            sale_id: self.sale_id,
            payment_method_id: self.payment_method_id,
            transaction_reference: self.transaction_reference,
            payment_date: self.payment_date,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PaymentDetailRow {
    #[sqlx(flatten)]
    pub payment: PaymentRow,
    pub method_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PaymentMethodRow {
    pub payment_method_id: i64,
    pub method_name: String,
    pub is_active: bool,
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            payment_method_id: row.payment_method_id,
            method_name: row.method_name,
            is_active: row.is_active,
        }
    }
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnRow {
    pub return_id: i64,
    pub sale_id: i64,
    pub return_date: DateTime<Utc>,
    pub returned_by_user_id: i64,
    pub reason: Option<String>,
    pub refund_amount: String,
    pub refund_method_id: Option<i64>,
    pub notes: Option<String>,
}

impl ReturnRow {
    pub fn into_domain(self) -> DbResult<ReturnTransaction> {
        Ok(ReturnTransaction {
            refund_amount: parse_money("returns.refund_amount", &self.refund_amount)?,
            return_id: self.return_id,
            sale_id: self.sale_id,
            return_date: self.return_date,
            returned_by_user_id: self.returned_by_user_id,
            reason: self.reason,
            refund_method_id: self.refund_method_id,
            notes: self.notes,
        })
    }
}

/// A return joined with the sale and name lookups a receipt shows.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnHeaderRow {
    #[sqlx(flatten)]
    pub return_row: ReturnRow,
    pub invoice_number: String,
    pub sale_date: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub refund_method_name: Option<String>,
    pub returned_by_name: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnSummaryRow {
    #[sqlx(flatten)]
    pub return_row: ReturnRow,
    pub invoice_number: String,
    pub customer_name: Option<String>,
    pub item_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnItemRow {
    pub return_item_id: i64,
    pub return_id: i64,
    pub sale_item_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity_returned: i64,
    pub refund_per_item: String,
}

impl ReturnItemRow {
    pub fn into_domain(self) -> DbResult<ReturnItem> {
        Ok(ReturnItem {
            refund_per_item: parse_money("return_items.refund_per_item", &self.refund_per_item)?,
            return_item_id: self.return_item_id,
            return_id: self.return_id,
            sale_item_id: self.sale_item_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity_returned: self.quantity_returned,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnItemDetailRow {
    #[sqlx(flatten)]
    pub item: ReturnItemRow,
    pub product_name: String,
    pub product_code: String,
}

/// Header of a sale that still has returnable lines.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnableSaleRow {
    pub sale_id: i64,
    pub invoice_number: String,
    pub sale_date: DateTime<Utc>,
    pub store_id: i64,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub grand_total: String,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReturnableLineRow {
    pub sale_id: i64,
    pub sale_item_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub product_name: String,
    pub product_code: String,
    pub quantity: i64,
    pub return_quantity: i64,
    pub unit_price: String,
    pub discount_per_item: String,
    pub tax_per_item: String,
}

impl ReturnableLineRow {
    pub fn into_domain(self) -> DbResult<ReturnableLine> {
        Ok(ReturnableLine {
            unit_price: parse_money("sale_items.unit_price", &self.unit_price)?,
            discount_per_item: parse_money("sale_items.discount_per_item", &self.discount_per_item)?,
            tax_per_item: parse_money("sale_items.tax_per_item", &self.tax_per_item)?,
            returnable_quantity: self.quantity - self.return_quantity,
            sale_item_id: self.sale_item_id,
            product_id: self.product_id,
            variant_id: self.variant_id,
            product_name: self.product_name,
            product_code: self.product_code,
            quantity: self.quantity,
            return_quantity: self.return_quantity,
        })
    }
}

// =============================================================================
// Catalog & Directory
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ProductRow {
    pub product_id: i64,
    pub product_code: String,
    pub product_name: String,
    pub barcode: Option<String>,
    pub tax_category_id: Option<i64>,
    pub retail_price: String,
    pub reorder_level: i64,
    pub max_stock_level: Option<i64>,
    pub is_active: bool,
}

impl ProductRow {
    pub fn into_domain(self) -> DbResult<Product> {
        Ok(Product {
            retail_price: parse_money("products.retail_price", &self.retail_price)?,
            product_id: self.product_id,
            product_code: self.product_code,
            product_name: self.product_name,
            barcode: self.barcode,
            tax_category_id: self.tax_category_id,
            reorder_level: self.reorder_level,
            max_stock_level: self.max_stock_level,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct VariantRow {
    pub variant_id: i64,
    pub product_id: i64,
    pub variant_name: String,
    pub barcode: Option<String>,
    pub retail_price: Option<String>,
    pub is_active: bool,
}

impl VariantRow {
    pub fn into_domain(self) -> DbResult<ProductVariant> {
        Ok(ProductVariant {
            retail_price: parse_optional_money(
                "product_variants.retail_price",
                self.retail_price.as_deref(),
            )?,
            variant_id: self.variant_id,
            product_id: self.product_id,
            variant_name: self.variant_name,
            barcode: self.barcode,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TaxCategoryRow {
    pub tax_category_id: i64,
    pub category_name: String,
    pub tax_rate: String,
    pub is_active: bool,
}

impl TaxCategoryRow {
    pub fn into_domain(self) -> DbResult<TaxCategory> {
        Ok(TaxCategory {
            tax_rate: parse_rate("tax_categories.tax_rate", &self.tax_rate)?,
            tax_category_id: self.tax_category_id,
            category_name: self.category_name,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TerminalRow {
    pub terminal_id: i64,
    pub store_id: i64,
    pub terminal_name: String,
    pub is_active: bool,
}

impl From<TerminalRow> for PosTerminal {
    fn from(row: TerminalRow) -> Self {
        PosTerminal {
            terminal_id: row.terminal_id,
            store_id: row.store_id,
            terminal_name: row.terminal_name,
            is_active: row.is_active,
        }
    }
}

// =============================================================================
// Customers & Loyalty
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CustomerRow {
    pub customer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub total_loyalty_points: i64,
    pub last_purchase_date: Option<DateTime<Utc>>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            customer_id: row.customer_id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            email: row.email,
            total_loyalty_points: row.total_loyalty_points,
            last_purchase_date: row.last_purchase_date,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LoyaltyHistoryRow {
    pub history_id: i64,
    pub customer_id: i64,
    pub sale_id: Option<i64>,
    pub points_change: i64,
    pub description: String,
    pub change_date: DateTime<Utc>,
}

impl From<LoyaltyHistoryRow> for LoyaltyHistoryEntry {
    fn from(row: LoyaltyHistoryRow) -> Self {
        LoyaltyHistoryEntry {
            history_id: row.history_id,
            customer_id: row.customer_id,
            sale_id: row.sale_id,
            points_change: row.points_change,
            description: row.description,
            change_date: row.change_date,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_money_accepts_stored_text() {
        assert_eq!(parse_money("x", "220.00").unwrap(), Money::new(dec!(220)));
        assert_eq!(parse_money("x", " 0.5 ").unwrap(), Money::new(dec!(0.5)));
    }

    #[test]
    fn test_parse_money_names_the_column() {
        let err = parse_money("sales.grand_total", "12,50").unwrap_err();
        match err {
            DbError::Decode { column, .. } => assert_eq!(column, "sales.grand_total"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_optional_money() {
        assert_eq!(parse_optional_money("x", None).unwrap(), None);
        assert_eq!(
            parse_optional_money("x", Some("3.10")).unwrap(),
            Some(Money::new(dec!(3.1)))
        );
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(
            parse_rate("tax_categories.tax_rate", "8.25").unwrap().percent(),
            dec!(8.25)
        );
        assert!(parse_rate("tax_categories.tax_rate", "ten").is_err());
    }
}
