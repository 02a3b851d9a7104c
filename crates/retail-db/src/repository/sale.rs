//! # Sale Transaction Engine
//!
//! Creates and voids sales. Each operation is one database transaction;
//! the stock and loyalty ledgers run inside it on the same connection.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       create_sale (one transaction)                     │
//! │                                                                         │
//! │  1. validate request            EmptyOrder / ValidationError           │
//! │  2. next invoice number         first write: takes the write lock      │
//! │  3. terminal, products, tax     ProductNotFound / terminal's store     │
//! │  4. resolve customer            NotFound                               │
//! │  5. price order                 discount > sub_total: ValidationError  │
//! │  6. insert sale, items, payments                                       │
//! │  7. consume_for_sale per line   InsufficientStock → ROLLBACK all       │
//! │  8. earn loyalty points         floor(grand_total / 100)               │
//! │  9. COMMIT                                                              │
//! │                                                                         │
//! │                        void_sale (one transaction)                      │
//! │                                                                         │
//! │  claim sale row ─► VOID? AlreadyVoided                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  status = VOID, notes = "VOIDED: {reason}\n{notes}"                    │
//! │  restore_for_return(full quantity) per line                            │
//! │  reverse floor(grand_total / 100) points (clamped at 0)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Voiding restores each line's full sold quantity, including units that
//! were already returned.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use retail_core::loyalty::points_for;
use retail_core::pricing::{change_due, initial_payment_status, price_order, LineInput};
use retail_core::requests::{page_bounds, CreateSaleRequest, SaleFilter, VoidSaleRequest, DEFAULT_PAGE_SIZE};
use retail_core::validation::{validate_required_text, validate_sale_request};
use retail_core::{
    CoreError, Money, PaymentDetail, PaymentMethod, PaymentStatus, Sale, SaleDetail, SaleItem,
    SaleItemDetail, SaleSummary, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::{catalog, invoice, loyalty, stock};
use crate::rows::{
    PaymentDetailRow, SaleHeaderRow, SaleItemDetailRow, SaleItemRow, SaleRow, SaleSummaryRow,
};

// =============================================================================
// Shared Row Access
// =============================================================================

/// Locks a sale row by bumping `updated_at`, returning the sale as it was.
pub(crate) async fn claim_sale(
    conn: &mut SqliteConnection,
    sale_id: i64,
    at: DateTime<Utc>,
) -> DbResult<Sale> {
    sqlx::query_as::<_, SaleRow>(
        "UPDATE sales SET updated_at = ?2 WHERE sale_id = ?1 RETURNING *",
    )
    .bind(sale_id)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Sale", sale_id))?
    .into_domain()
}

pub(crate) async fn sale_items(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<SaleItem>> {
    sqlx::query_as::<_, SaleItemRow>(
        r#"
        SELECT sale_item_id, sale_id, product_id, variant_id, quantity, unit_price,
               discount_per_item, tax_per_item, line_total, return_quantity
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY sale_item_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(SaleItemRow::into_domain)
    .collect()
}

async fn set_status(
    conn: &mut SqliteConnection,
    sale_id: i64,
    status: PaymentStatus,
    notes: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE sales SET payment_status = ?2, notes = ?3, updated_at = ?4 WHERE sale_id = ?1")
        .bind(sale_id)
        .bind(status)
        .bind(notes)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn update_payment_status(
    conn: &mut SqliteConnection,
    sale: &Sale,
    status: PaymentStatus,
    at: DateTime<Utc>,
) -> DbResult<()> {
    set_status(conn, sale.sale_id, status, sale.notes.as_deref(), at).await
}

/// A sale with store, cashier, customer, product and tender names.
pub(crate) async fn load_sale_detail(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<SaleDetail> {
    let header = sqlx::query_as::<_, SaleHeaderRow>(
        r#"
        SELECT s.*,
               st.store_name,
               u.first_name || ' ' || u.last_name AS cashier_name,
               c.first_name || ' ' || c.last_name AS customer_name
        FROM sales s
        JOIN stores st ON st.store_id = s.store_id
        JOIN users u ON u.user_id = s.user_id
        LEFT JOIN customers c ON c.customer_id = s.customer_id
        WHERE s.sale_id = ?1
        "#,
    )
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

    let items = sqlx::query_as::<_, SaleItemDetailRow>(
        r#"
        SELECT si.sale_item_id, si.sale_id, si.product_id, si.variant_id, si.quantity,
               si.unit_price, si.discount_per_item, si.tax_per_item, si.line_total,
               si.return_quantity, p.product_name, p.product_code
        FROM sale_items si
        JOIN products p ON p.product_id = si.product_id
        WHERE si.sale_id = ?1
        ORDER BY si.sale_item_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| {
        Ok(SaleItemDetail {
            item: row.item.into_domain()?,
            product_name: row.product_name,
            product_code: row.product_code,
        })
    })
    .collect::<DbResult<Vec<_>>>()?;

    let payments = sqlx::query_as::<_, PaymentDetailRow>(
        r#"
        SELECT pay.payment_id, pay.sale_id, pay.payment_method_id, pay.amount,
               pay.transaction_reference, pay.payment_date, pm.method_name
        FROM payments pay
        JOIN payment_methods pm ON pm.payment_method_id = pay.payment_method_id
        WHERE pay.sale_id = ?1
        ORDER BY pay.payment_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| {
        Ok(PaymentDetail {
            payment: row.payment.into_domain()?,
            method_name: row.method_name,
        })
    })
    .collect::<DbResult<Vec<_>>>()?;

    Ok(SaleDetail {
        sale: header.sale.into_domain()?,
        store_name: header.store_name,
        cashier_name: header.cashier_name,
        customer_name: header.customer_name,
        items,
        payments,
    })
}

fn void_notes(reason: &str, previous: Option<&str>) -> String {
    match previous {
        Some(notes) if !notes.is_empty() => format!("VOIDED: {}\n{}", reason, notes),
        _ => format!("VOIDED: {}", reason),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the sale transaction engine.
///
/// ## Usage
/// ```rust,ignore
/// let sale = db.sales().create_sale(&request).await?;
/// println!("{} -> {}", sale.sale.invoice_number, sale.sale.grand_total);
///
/// db.sales().void_sale(sale.sale.sale_id, &VoidSaleRequest {
///     user_id: 1,
///     reason: "Customer changed mind".into(),
/// }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    invoice_prefix: String,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, invoice_prefix: impl Into<String>) -> Self {
        SaleRepository {
            pool,
            invoice_prefix: invoice_prefix.into(),
        }
    }

    /// Rings up a sale: prices it, records it, takes the stock and awards
    /// loyalty points, all or nothing.
    pub async fn create_sale(&self, request: &CreateSaleRequest) -> DbResult<SaleDetail> {
        validate_sale_request(request)?;
        debug!(
            store_id = request.store_id,
            lines = request.items.len(),
            payments = request.payments.len(),
            customer_id = ?request.customer_id,
            "Creating sale"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let invoice_number = invoice::next_invoice_number(&mut tx, &self.invoice_prefix, now).await?;

        let terminal = catalog::terminal(&mut tx, request.terminal_id).await?;
        if terminal.store_id != request.store_id {
            return Err(ValidationError::not_allowed(
                "terminal_id",
                format!("terminal {} belongs to store {}", terminal.terminal_id, terminal.store_id),
            )
            .into());
        }

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = catalog::resolve_product(&mut tx, item.product_id).await?;
            if let Some(variant_id) = item.variant_id {
                let variant = catalog::resolve_variant(&mut tx, variant_id).await?;
                if variant.product_id != product.product_id {
                    return Err(ValidationError::not_allowed(
                        "variant_id",
                        format!("variant {} does not belong to product {}", variant_id, product.product_id),
                    )
                    .into());
                }
            }
            let tax_rate = catalog::tax_rate_for(&mut tx, &product).await?;

            lines.push(LineInput {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                discount_per_item: item.discount_per_item,
                tax_rate,
            });
        }

        if let Some(customer_id) = request.customer_id {
            catalog::get_customer(&mut tx, customer_id).await?;
        }

        let order = price_order(&lines, request.discount_amount);
        if request.discount_amount > order.sub_total {
            warn!(
                discount_amount = %request.discount_amount,
                sub_total = %order.sub_total,
                "Sale rejected: order discount exceeds sub-total"
            );
            return Err(ValidationError::not_allowed(
                "discount_amount",
                format!(
                    "discount {} exceeds sub-total {}",
                    request.discount_amount, order.sub_total
                ),
            )
            .into());
        }
        let totals = order.totals();
        let amount_paid: Money = request.payments.iter().map(|p| p.amount.rounded()).sum();
        let status = initial_payment_status(amount_paid, totals.grand_total);
        let change_given = change_due(amount_paid, totals.grand_total);

        let sale_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sales (
                invoice_number, store_id, terminal_id, customer_id, user_id, sale_date,
                sub_total, discount_amount, tax_amount, grand_total, amount_paid, change_given,
                payment_status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?6, ?6)
            RETURNING sale_id
            "#,
        )
        .bind(&invoice_number)
        .bind(request.store_id)
        .bind(request.terminal_id)
        .bind(request.customer_id)
        .bind(request.user_id)
        .bind(now)
        .bind(totals.sub_total.to_string())
        .bind(totals.discount_amount.to_string())
        .bind(totals.tax_amount.to_string())
        .bind(totals.grand_total.to_string())
        .bind(amount_paid.to_string())
        .bind(change_given.to_string())
        .bind(status)
        .bind(request.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, product_id, variant_id, quantity, unit_price,
                    discount_per_item, tax_per_item, line_total, return_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
                "#,
            )
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(line.quantity)
            .bind(line.unit_price.to_string())
            .bind(line.discount_per_item.to_string())
            .bind(line.tax_per_item.to_string())
            .bind(line.line_total.to_string())
            .execute(&mut *tx)
            .await?;
        }

        for payment in &request.payments {
            sqlx::query(
                r#"
                INSERT INTO payments (sale_id, payment_method_id, amount, transaction_reference, payment_date)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(sale_id)
            .bind(payment.payment_method_id)
            .bind(payment.amount.to_string())
            .bind(payment.transaction_reference.as_deref())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for line in &order.lines {
            stock::consume_for_sale(
                &mut tx,
                line.product_id,
                line.variant_id,
                request.store_id,
                line.quantity,
                sale_id,
                request.user_id,
            )
            .await?;
        }

        if let Some(customer_id) = request.customer_id {
            let points = points_for(totals.grand_total);
            if points > 0 {
                loyalty::earn(
                    &mut tx,
                    customer_id,
                    points,
                    Some(sale_id),
                    &format!("Points earned from purchase {}", invoice_number),
                )
                .await?;
            }
            loyalty::touch_last_purchase(&mut tx, customer_id, now).await?;
        }

        let detail = load_sale_detail(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(
            sale_id,
            invoice_number = %invoice_number,
            grand_total = %totals.grand_total,
            status = status.as_str(),
            "Sale created"
        );
        Ok(detail)
    }

    /// Voids a sale: restores every line's full quantity and takes back the
    /// points the sale earned.
    pub async fn void_sale(&self, sale_id: i64, request: &VoidSaleRequest) -> DbResult<SaleDetail> {
        validate_required_text("reason", &request.reason)?;
        debug!(sale_id, user_id = request.user_id, "Voiding sale");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sale = claim_sale(&mut tx, sale_id, now).await?;
        if sale.payment_status == PaymentStatus::Void {
            warn!(sale_id, "Void rejected: already voided");
            return Err(CoreError::AlreadyVoided(sale_id).into());
        }

        let notes = void_notes(request.reason.trim(), sale.notes.as_deref());
        set_status(&mut tx, sale_id, PaymentStatus::Void, Some(&notes), now).await?;

        for item in sale_items(&mut tx, sale_id).await? {
            stock::restore_for_return(
                &mut tx,
                item.product_id,
                item.variant_id,
                sale.store_id,
                item.quantity,
                sale_id,
                request.user_id,
            )
            .await?;
        }

        if let Some(customer_id) = sale.customer_id {
            let points = points_for(sale.grand_total);
            if points > 0 {
                loyalty::reverse(
                    &mut tx,
                    customer_id,
                    points,
                    Some(sale_id),
                    &format!("Points reversed due to void of {}", sale.invoice_number),
                )
                .await?;
            }
        }

        let detail = load_sale_detail(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(sale_id, invoice_number = %sale.invoice_number, "Sale voided");
        Ok(detail)
    }

    pub async fn get_sale(&self, sale_id: i64) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        load_sale_detail(&mut conn, sale_id).await
    }

    /// Sales matching a filter, newest first.
    pub async fn list_sales(&self, filter: &SaleFilter) -> DbResult<Vec<SaleSummary>> {
        let (skip, limit) = page_bounds(filter.skip, filter.limit, DEFAULT_PAGE_SIZE);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, SaleSummaryRow>(
            r#"
            SELECT s.*,
                   st.store_name,
                   u.first_name || ' ' || u.last_name AS cashier_name,
                   c.first_name || ' ' || c.last_name AS customer_name,
                   (SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.sale_id) AS item_count
            FROM sales s
            JOIN stores st ON st.store_id = s.store_id
            JOIN users u ON u.user_id = s.user_id
            LEFT JOIN customers c ON c.customer_id = s.customer_id
            WHERE (?1 IS NULL OR s.store_id = ?1)
              AND (?2 IS NULL OR s.customer_id = ?2)
              AND (?3 IS NULL OR s.user_id = ?3)
              AND (?4 IS NULL OR s.payment_status = ?4)
              AND (?5 IS NULL OR s.sale_date >= ?5)
              AND (?6 IS NULL OR s.sale_date <= ?6)
              AND (?7 IS NULL OR s.invoice_number LIKE '%' || ?7 || '%')
            ORDER BY s.sale_date DESC, s.sale_id DESC
            LIMIT ?8 OFFSET ?9
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.customer_id)
        .bind(filter.user_id)
        .bind(filter.payment_status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(search)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SaleSummary {
                    sale: row.sale.into_domain()?,
                    store_name: row.store_name,
                    cashier_name: row.cashier_name,
                    customer_name: row.customer_name,
                    item_count: row.item_count,
                })
            })
            .collect()
    }

    pub async fn list_payment_methods(&self) -> DbResult<Vec<PaymentMethod>> {
        let mut conn = self.pool.acquire().await?;
        catalog::payment_methods(&mut conn).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
