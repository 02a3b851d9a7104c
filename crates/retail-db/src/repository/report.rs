//! Sales and returns reporting.
//!
//! Money columns are TEXT, so every total is summed as `Decimal` in Rust
//! rather than with SQL aggregates. Voided sales are excluded everywhere.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use retail_core::requests::{DailyReportQuery, StatsFilter};
use retail_core::{DailySalesReport, Money, ReturnedProduct, ReturnsStats, SalesStats};

use crate::error::{DbError, DbResult};
use crate::rows::parse_money;

/// Number of products listed in the most-returned ranking.
const TOP_RETURNED_PRODUCTS: i64 = 10;

/// How a tender counts in the daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tender {
    Cash,
    Card,
    Other,
}

impl Tender {
    fn classify(method_name: &str) -> Tender {
        match method_name.trim().to_lowercase().as_str() {
            "cash" => Tender::Cash,
            "credit card" | "debit card" => Tender::Card,
            _ => Tender::Other,
        }
    }
}

fn average(total: Money, count: i64) -> Money {
    total.divide_quantity(count).rounded()
}

/// `[00:00, next 00:00)` of a UTC calendar day.
fn day_bounds(date: NaiveDate) -> DbResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| DbError::Internal(format!("date out of range: {}", date)))?
        .and_time(NaiveTime::MIN)
        .and_utc();
    Ok((start, end))
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Totals over non-void sales.
    pub async fn sales_stats(&self, filter: &StatsFilter) -> DbResult<SalesStats> {
        debug!(store_id = ?filter.store_id, "Computing sales stats");

        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT grand_total, tax_amount, discount_amount
            FROM sales
            WHERE payment_status != 'VOID'
              AND (?1 IS NULL OR store_id = ?1)
              AND (?2 IS NULL OR sale_date >= ?2)
              AND (?3 IS NULL OR sale_date <= ?3)
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = SalesStats::default();
        for (grand_total, tax, discount) in &rows {
            stats.total_sales += parse_money("sales.grand_total", grand_total)?;
            stats.total_tax += parse_money("sales.tax_amount", tax)?;
            stats.total_discount += parse_money("sales.discount_amount", discount)?;
        }
        stats.sales_count = rows.len() as i64;
        stats.average_sale = average(stats.total_sales, stats.sales_count);

        Ok(stats)
    }

    /// One UTC calendar day of takings, split by tender.
    pub async fn daily_report(&self, query: &DailyReportQuery) -> DbResult<DailySalesReport> {
        debug!(report_date = %query.report_date, store_id = ?query.store_id, "Building daily report");
        let (start, end) = day_bounds(query.report_date)?;

        let totals = sqlx::query_scalar::<_, String>(
            r#"
            SELECT grand_total
            FROM sales
            WHERE payment_status != 'VOID'
              AND sale_date >= ?1 AND sale_date < ?2
              AND (?3 IS NULL OR store_id = ?3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(query.store_id)
        .fetch_all(&self.pool)
        .await?;

        let tenders = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT pm.method_name, pay.amount
            FROM payments pay
            JOIN sales s ON s.sale_id = pay.sale_id
            JOIN payment_methods pm ON pm.payment_method_id = pay.payment_method_id
            WHERE s.payment_status != 'VOID'
              AND s.sale_date >= ?1 AND s.sale_date < ?2
              AND (?3 IS NULL OR s.store_id = ?3)
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(query.store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut report = DailySalesReport {
            report_date: query.report_date,
            total_sales: Money::zero(),
            sales_count: totals.len() as i64,
            cash_sales: Money::zero(),
            card_sales: Money::zero(),
            other_sales: Money::zero(),
        };

        for raw in &totals {
            report.total_sales += parse_money("sales.grand_total", raw)?;
        }
        for (method_name, raw) in &tenders {
            let amount = parse_money("payments.amount", raw)?;
            match Tender::classify(method_name) {
                Tender::Cash => report.cash_sales += amount,
                Tender::Card => report.card_sales += amount,
                Tender::Other => report.other_sales += amount,
            }
        }

        Ok(report)
    }

    /// Refund totals and the most returned products.
    pub async fn returns_stats(&self, filter: &StatsFilter) -> DbResult<ReturnsStats> {
        debug!(store_id = ?filter.store_id, "Computing returns stats");

        let refunds = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.refund_amount
            FROM returns r
            JOIN sales s ON s.sale_id = r.sale_id
            WHERE (?1 IS NULL OR s.store_id = ?1)
              AND (?2 IS NULL OR r.return_date >= ?2)
              AND (?3 IS NULL OR r.return_date <= ?3)
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await?;

        let products = sqlx::query_as::<_, (String, String, i64, i64)>(
            r#"
            SELECT p.product_name,
                   p.product_code,
                   SUM(ri.quantity_returned) AS total_returned,
                   COUNT(DISTINCT ri.return_id) AS return_count
            FROM return_items ri
            JOIN returns r ON r.return_id = ri.return_id
            JOIN sales s ON s.sale_id = r.sale_id
            JOIN products p ON p.product_id = ri.product_id
            WHERE (?1 IS NULL OR s.store_id = ?1)
              AND (?2 IS NULL OR r.return_date >= ?2)
              AND (?3 IS NULL OR r.return_date <= ?3)
            GROUP BY p.product_id, p.product_name, p.product_code
            ORDER BY total_returned DESC, p.product_name
            LIMIT ?4
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(TOP_RETURNED_PRODUCTS)
        .fetch_all(&self.pool)
        .await?;

        let mut total_returns = Money::zero();
        for raw in &refunds {
            total_returns += parse_money("returns.refund_amount", raw)?;
        }
        let returns_count = refunds.len() as i64;

        Ok(ReturnsStats {
            total_returns,
            returns_count,
            average_return: average(total_returns, returns_count),
            most_returned_products: products
                .into_iter()
                .map(|(product_name, product_code, total_returned, return_count)| ReturnedProduct {
                    product_name,
                    product_code,
                    total_returned,
                    return_count,
                })
                .collect(),
        })
    }
}
