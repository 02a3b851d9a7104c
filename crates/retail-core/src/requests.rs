//! # Request Types
//!
//! Typed inputs for every back-office operation, plus list filters.
//!
//! These are what the HTTP layer deserializes and what retail-db accepts.
//! Money fields accept either JSON strings (`"10.50"`) or numbers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{MovementType, PaymentStatus};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Default number of movements returned by a movement listing.
pub const DEFAULT_MOVEMENT_LIMIT: i64 = 50;

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_per_item: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRequest {
    pub payment_method_id: i64,
    pub amount: Money,
    #[serde(default)]
    pub transaction_reference: Option<String>,
}

/// Everything needed to ring up a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSaleRequest {
    pub store_id: i64,
    pub terminal_id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// Cashier.
    pub user_id: i64,
    pub items: Vec<SaleLineRequest>,
    pub payments: Vec<PaymentRequest>,
    /// Order-level discount, applied after line discounts.
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoidSaleRequest {
    pub user_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFilter {
    pub store_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub user_id: Option<i64>,
    pub payment_status: Option<PaymentStatus>,
    #[ts(as = "Option<String>")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
    /// Substring of the invoice number.
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnItemRequest {
    pub sale_item_id: i64,
    pub quantity_returned: i64,
    pub refund_per_item: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateReturnRequest {
    pub sale_id: i64,
    pub returned_by_user_id: i64,
    pub items: Vec<ReturnItemRequest>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub refund_method_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnFilter {
    pub store_id: Option<i64>,
    pub sale_id: Option<i64>,
    #[ts(as = "Option<String>")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
    /// Substring of the original invoice number.
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Query for sales that still have returnable lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnableQuery {
    /// Matches invoice number, customer first/last name or phone.
    pub search: Option<String>,
    pub store_id: Option<i64>,
    pub limit: Option<i64>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Registers a new stock position.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreatePositionRequest {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub store_id: i64,
    #[serde(default)]
    pub initial_stock: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdjustStockRequest {
    pub inventory_id: i64,
    pub new_quantity: i64,
    pub reason: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockTakeRequest {
    pub inventory_id: i64,
    pub counted_quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferStockRequest {
    /// Source position.
    pub inventory_id: i64,
    pub destination_store_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryFilter {
    pub store_id: Option<i64>,
    pub product_id: Option<i64>,
    /// Only positions in stock but at or below their reorder level.
    #[serde(default)]
    pub low_stock_only: bool,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementFilter {
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub store_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    pub limit: Option<i64>,
}

// =============================================================================
// Loyalty
// =============================================================================

/// Manual change to a customer's points: positive adds, negative takes back.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdjustLoyaltyRequest {
    pub points_change: i64,
    #[serde(default)]
    pub sale_id: Option<i64>,
    /// Defaults to "Manual adjustment".
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatsFilter {
    pub store_id: Option<i64>,
    #[ts(as = "Option<String>")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyReportQuery {
    #[ts(as = "String")]
    pub report_date: NaiveDate,
    pub store_id: Option<i64>,
}

/// Clamps a caller-supplied page to sane bounds.
///
/// ## Example
/// ```rust
/// use retail_core::requests::page_bounds;
///
/// assert_eq!(page_bounds(None, None, 100), (0, 100));
/// assert_eq!(page_bounds(Some(-5), Some(5000), 100), (0, 1000));
/// ```
pub fn page_bounds(skip: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(default_limit).clamp(1, 1000);
    (skip, limit)
}
