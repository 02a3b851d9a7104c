//! # Return Engine
//!
//! Partial or full returns against an existing sale, and the lookup of
//! sales that can still take returns.
//!
//! ## Return Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     create_return (one transaction)                     │
//! │                                                                         │
//! │  claim sale row ───► missing? NotFound    VOID? SaleVoided             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  group request lines by sale_item_id                                   │
//! │       │  not on this sale?            ItemNotInSale                    │
//! │       │  qty > quantity - returned?   OverReturn                       │
//! │       ▼                                                                 │
//! │  INSERT returns, return_items                                          │
//! │  sale_items.return_quantity += qty     (guarded: ≤ quantity)           │
//! │  restore_for_return per line           (RETURN movement, +qty)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  status from Σ refund_amount over all returns of the sale             │
//! │  reverse floor(refund_amount / 100) points (clamped at 0)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Returnable Sales
//! [`ReturnRepository::returnable_sales`] is a lazy stream. Pages are fetched
//! as the consumer pulls, keyed on `sale_id < cursor`; dropping the stream
//! stops the fetching and calling the method again starts over.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::stream::{self, Stream, TryStreamExt};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use retail_core::loyalty::points_for;
use retail_core::pricing::status_after_returns;
use retail_core::requests::{
    page_bounds, CreateReturnRequest, ReturnFilter, ReturnItemRequest, ReturnableQuery,
    DEFAULT_PAGE_SIZE,
};
use retail_core::validation::validate_return_request;
use retail_core::{
    CoreError, Money, PaymentStatus, ReturnDetail, ReturnItemDetail, ReturnSummary,
    ReturnableLine, ReturnableSale, SaleItem,
};

use crate::error::{DbError, DbResult};
use crate::repository::sale::{claim_sale, sale_items, update_payment_status};
use crate::repository::{loyalty, stock};
use crate::rows::{
    parse_money, ReturnHeaderRow, ReturnItemDetailRow, ReturnSummaryRow, ReturnableLineRow,
    ReturnableSaleRow,
};

/// Sales fetched per page by the returnable-sales stream.
const RETURNABLE_PAGE_SIZE: i64 = 25;

/// Sales yielded by the returnable-sales stream when no limit is given.
const DEFAULT_RETURNABLE_LIMIT: i64 = 20;

// =============================================================================
// Helpers
// =============================================================================

/// Request lines grouped by sale item, in first-seen order.
fn group_quantities(request: &CreateReturnRequest) -> Vec<(i64, i64)> {
    let mut grouped: Vec<(i64, i64)> = Vec::new();
    for item in &request.items {
        match grouped.iter_mut().find(|(id, _)| *id == item.sale_item_id) {
            Some((_, total)) => *total += item.quantity_returned,
            None => grouped.push((item.sale_item_id, item.quantity_returned)),
        }
    }
    grouped
}

async fn total_refunded(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Money> {
    let amounts = sqlx::query_scalar::<_, String>("SELECT refund_amount FROM returns WHERE sale_id = ?1")
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    amounts
        .iter()
        .map(|raw| parse_money("returns.refund_amount", raw))
        .sum()
}

async fn mark_returned(
    conn: &mut SqliteConnection,
    item: &SaleItem,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sale_items
        SET return_quantity = return_quantity + ?1
        WHERE sale_item_id = ?2 AND return_quantity + ?1 <= quantity
        "#,
    )
    .bind(quantity)
    .bind(item.sale_item_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::OverReturn {
            sale_item_id: item.sale_item_id,
            available: item.returnable_quantity(),
            requested: quantity,
        }
        .into());
    }
    Ok(())
}

/// A return with invoice, customer, tender, user and product names.
pub(crate) async fn load_return_detail(
    conn: &mut SqliteConnection,
    return_id: i64,
) -> DbResult<ReturnDetail> {
    let header = sqlx::query_as::<_, ReturnHeaderRow>(
        r#"
        SELECT r.*,
               s.invoice_number,
               s.sale_date,
               c.first_name || ' ' || c.last_name AS customer_name,
               pm.method_name AS refund_method_name,
               u.first_name || ' ' || u.last_name AS returned_by_name
        FROM returns r
        JOIN sales s ON s.sale_id = r.sale_id
        JOIN users u ON u.user_id = r.returned_by_user_id
        LEFT JOIN customers c ON c.customer_id = s.customer_id
        LEFT JOIN payment_methods pm ON pm.payment_method_id = r.refund_method_id
        WHERE r.return_id = ?1
        "#,
    )
    .bind(return_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Return", return_id))?;

    let items = sqlx::query_as::<_, ReturnItemDetailRow>(
        r#"
        SELECT ri.return_item_id, ri.return_id, ri.sale_item_id, ri.product_id, ri.variant_id,
               ri.quantity_returned, ri.refund_per_item, p.product_name, p.product_code
        FROM return_items ri
        JOIN products p ON p.product_id = ri.product_id
        WHERE ri.return_id = ?1
        ORDER BY ri.return_item_id
        "#,
    )
    .bind(return_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| {
        Ok(ReturnItemDetail {
            item: row.item.into_domain()?,
            product_name: row.product_name,
            product_code: row.product_code,
        })
    })
    .collect::<DbResult<Vec<_>>>()?;

    Ok(ReturnDetail {
        return_transaction: header.return_row.into_domain()?,
        invoice_number: header.invoice_number,
        sale_date: header.sale_date,
        customer_name: header.customer_name,
        refund_method_name: header.refund_method_name,
        returned_by_name: header.returned_by_name,
        items,
    })
}

/// Lowercased `%term%` pattern, or `None` for a blank search.
fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

/// One page of returnable sales, newest first, older than `before`.
async fn fetch_returnable_page(
    conn: &mut SqliteConnection,
    pattern: Option<&str>,
    store_id: Option<i64>,
    before: Option<i64>,
    page_size: i64,
) -> DbResult<Vec<ReturnableSale>> {
    let headers = sqlx::query_as::<_, ReturnableSaleRow>(
        r#"
        SELECT s.sale_id, s.invoice_number, s.sale_date, s.store_id, s.customer_id,
               c.first_name || ' ' || c.last_name AS customer_name,
               s.grand_total, s.payment_status
        FROM sales s
        LEFT JOIN customers c ON c.customer_id = s.customer_id
        WHERE s.payment_status IN ('PAID', 'PARTIAL')
          AND EXISTS (
              SELECT 1 FROM sale_items si
              WHERE si.sale_id = s.sale_id AND si.quantity > si.return_quantity
          )
          AND (?1 IS NULL OR s.store_id = ?1)
          AND (?2 IS NULL OR s.sale_id < ?2)
          AND (?3 IS NULL
               OR LOWER(s.invoice_number) LIKE ?3
               OR LOWER(c.first_name) LIKE ?3
               OR LOWER(c.last_name) LIKE ?3
               OR LOWER(c.phone_number) LIKE ?3)
        ORDER BY s.sale_id DESC
        LIMIT ?4
        "#,
    )
    .bind(store_id)
    .bind(before)
    .bind(pattern)
    .bind(page_size)
    .fetch_all(&mut *conn)
    .await?;

    let (Some(newest), Some(oldest)) = (headers.first(), headers.last()) else {
        return Ok(Vec::new());
    };

    // One query for the whole page's lines; rows of sales outside the page
    // are dropped below.
    let lines = sqlx::query_as::<_, ReturnableLineRow>(
        r#"
        SELECT si.sale_id, si.sale_item_id, si.product_id, si.variant_id,
               p.product_name, p.product_code, si.quantity, si.return_quantity,
               si.unit_price, si.discount_per_item, si.tax_per_item
        FROM sale_items si
        JOIN products p ON p.product_id = si.product_id
        WHERE si.sale_id BETWEEN ?1 AND ?2
          AND si.quantity > si.return_quantity
        ORDER BY si.sale_item_id
        "#,
    )
    .bind(oldest.sale_id)
    .bind(newest.sale_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_sale: BTreeMap<i64, Vec<ReturnableLine>> = BTreeMap::new();
    for row in lines {
        let sale_id = row.sale_id;
        by_sale.entry(sale_id).or_default().push(row.into_domain()?);
    }

    headers
        .into_iter()
        .map(|header| {
            Ok(ReturnableSale {
                items: by_sale.remove(&header.sale_id).unwrap_or_default(),
                grand_total: parse_money("sales.grand_total", &header.grand_total)?,
                sale_id: header.sale_id,
                invoice_number: header.invoice_number,
                sale_date: header.sale_date,
                store_id: header.store_id,
                customer_id: header.customer_id,
                customer_name: header.customer_name,
                payment_status: header.payment_status,
            })
        })
        .collect()
}

/// Where the returnable-sales stream resumes.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    before: Option<i64>,
    remaining: i64,
}

async fn next_page(
    pool: SqlitePool,
    pattern: Option<String>,
    store_id: Option<i64>,
    cursor: Cursor,
) -> DbResult<Option<(Vec<ReturnableSale>, Cursor)>> {
    if cursor.remaining <= 0 {
        return Ok(None);
    }

    let page_size = cursor.remaining.min(RETURNABLE_PAGE_SIZE);
    let mut conn = pool.acquire().await?;
    let page = fetch_returnable_page(&mut conn, pattern.as_deref(), store_id, cursor.before, page_size).await?;

    let Some(last) = page.last() else {
        return Ok(None);
    };
    let fetched = page.len() as i64;
    let next = Cursor {
        before: Some(last.sale_id),
        remaining: if fetched < page_size { 0 } else { cursor.remaining - fetched },
    };
    debug!(fetched, before = ?cursor.before, "Returnable sales page");

    Ok(Some((page, next)))
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Records a return: puts the goods back, refunds, recomputes the sale's
    /// status and takes back the matching loyalty points.
    pub async fn create_return(&self, request: &CreateReturnRequest) -> DbResult<ReturnDetail> {
        validate_return_request(request)?;
        debug!(
            sale_id = request.sale_id,
            lines = request.items.len(),
            user_id = request.returned_by_user_id,
            "Creating return"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sale = claim_sale(&mut tx, request.sale_id, now).await?;
        if sale.payment_status == PaymentStatus::Void {
            warn!(sale_id = sale.sale_id, "Return rejected: sale is voided");
            return Err(CoreError::SaleVoided(sale.sale_id).into());
        }

        let items = sale_items(&mut tx, sale.sale_id).await?;
        let grouped = group_quantities(request);

        let mut targets = Vec::with_capacity(grouped.len());
        for (sale_item_id, quantity) in grouped {
            let item = items
                .iter()
                .find(|i| i.sale_item_id == sale_item_id)
                .ok_or(CoreError::ItemNotInSale {
                    sale_id: sale.sale_id,
                    sale_item_id,
                })?;

            if quantity > item.returnable_quantity() {
                warn!(
                    sale_item_id,
                    available = item.returnable_quantity(),
                    requested = quantity,
                    "Return rejected: over-return"
                );
                return Err(CoreError::OverReturn {
                    sale_item_id,
                    available: item.returnable_quantity(),
                    requested: quantity,
                }
                .into());
            }
            targets.push((item, quantity));
        }

        // Per-item refunds are stored in cents, so the header is summed from
        // the same rounded values.
        let lines: Vec<(&ReturnItemRequest, Money)> = request
            .items
            .iter()
            .map(|i| (i, i.refund_per_item.rounded()))
            .collect();
        let refund_amount: Money = lines
            .iter()
            .map(|(i, per_item)| per_item.multiply_quantity(i.quantity_returned))
            .sum::<Money>()
            .rounded();

        let return_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO returns (
                sale_id, return_date, returned_by_user_id, reason, refund_amount,
                refund_method_id, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING return_id
            "#,
        )
        .bind(sale.sale_id)
        .bind(now)
        .bind(request.returned_by_user_id)
        .bind(request.reason.as_deref())
        .bind(refund_amount.to_string())
        .bind(request.refund_method_id)
        .bind(request.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        for (line, refund_per_item) in &lines {
            // Existence was checked while grouping.
            let Some(item) = items.iter().find(|i| i.sale_item_id == line.sale_item_id) else {
                continue;
            };

            sqlx::query(
                r#"
                INSERT INTO return_items (
                    return_id, sale_item_id, product_id, variant_id, quantity_returned, refund_per_item
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(return_id)
            .bind(item.sale_item_id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(line.quantity_returned)
            .bind(refund_per_item.to_string())
            .execute(&mut *tx)
            .await?;
        }

        for (item, quantity) in &targets {
            mark_returned(&mut tx, item, *quantity).await?;
            stock::restore_for_return(
                &mut tx,
                item.product_id,
                item.variant_id,
                sale.store_id,
                *quantity,
                sale.sale_id,
                request.returned_by_user_id,
            )
            .await?;
        }

        let returned = total_refunded(&mut tx, sale.sale_id).await?;
        let status = status_after_returns(sale.payment_status, sale.grand_total, sale.amount_paid, returned);
        if status != sale.payment_status {
            update_payment_status(&mut tx, &sale, status, now).await?;
        }

        if let Some(customer_id) = sale.customer_id {
            let points = points_for(refund_amount);
            if points > 0 {
                loyalty::reverse(
                    &mut tx,
                    customer_id,
                    points,
                    Some(sale.sale_id),
                    &format!("Points reversed due to return on {}", sale.invoice_number),
                )
                .await?;
            }
        }

        let detail = load_return_detail(&mut tx, return_id).await?;
        tx.commit().await?;

        info!(
            return_id,
            sale_id = sale.sale_id,
            refund_amount = %refund_amount,
            status = status.as_str(),
            "Return created"
        );
        Ok(detail)
    }

    pub async fn get_return(&self, return_id: i64) -> DbResult<ReturnDetail> {
        let mut conn = self.pool.acquire().await?;
        load_return_detail(&mut conn, return_id).await
    }

    /// Returns matching a filter, newest first.
    pub async fn list_returns(&self, filter: &ReturnFilter) -> DbResult<Vec<ReturnSummary>> {
        let (skip, limit) = page_bounds(filter.skip, filter.limit, DEFAULT_PAGE_SIZE);
        let pattern = like_pattern(filter.search.as_deref());

        let rows = sqlx::query_as::<_, ReturnSummaryRow>(
            r#"
            SELECT r.*,
                   s.invoice_number,
                   c.first_name || ' ' || c.last_name AS customer_name,
                   (SELECT COUNT(*) FROM return_items ri WHERE ri.return_id = r.return_id) AS item_count
            FROM returns r
            JOIN sales s ON s.sale_id = r.sale_id
            LEFT JOIN customers c ON c.customer_id = s.customer_id
            WHERE (?1 IS NULL OR s.store_id = ?1)
              AND (?2 IS NULL OR r.sale_id = ?2)
              AND (?3 IS NULL OR r.return_date >= ?3)
              AND (?4 IS NULL OR r.return_date <= ?4)
              AND (?5 IS NULL OR LOWER(s.invoice_number) LIKE ?5)
            ORDER BY r.return_date DESC, r.return_id DESC
            LIMIT ?6 OFFSET ?7
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.sale_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(pattern)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ReturnSummary {
                    return_transaction: row.return_row.into_domain()?,
                    invoice_number: row.invoice_number,
                    customer_name: row.customer_name,
                    item_count: row.item_count,
                })
            })
            .collect()
    }

    /// Sales that can still take a return, newest first, fetched a page at a
    /// time as the stream is polled.
    ///
    /// ```rust,ignore
    /// let mut sales = std::pin::pin!(db.returns().returnable_sales(&query));
    /// while let Some(sale) = sales.try_next().await? {
    ///     println!("{} ({} lines)", sale.invoice_number, sale.items.len());
    /// }
    /// ```
    pub fn returnable_sales(
        &self,
        query: &ReturnableQuery,
    ) -> impl Stream<Item = DbResult<ReturnableSale>> + Send + 'static {
        let pool = self.pool.clone();
        let pattern = like_pattern(query.search.as_deref());
        let store_id = query.store_id;
        let (_, limit) = page_bounds(None, query.limit, DEFAULT_RETURNABLE_LIMIT);

        let start = Cursor {
            before: None,
            remaining: limit,
        };

        stream::try_unfold(start, move |cursor| {
            next_page(pool.clone(), pattern.clone(), store_id, cursor)
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, DbError>)))
        .try_flatten()
    }

    /// Collects [`Self::returnable_sales`] into a list.
    pub async fn list_returnable_sales(&self, query: &ReturnableQuery) -> DbResult<Vec<ReturnableSale>> {
        self.returnable_sales(query).try_collect().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
