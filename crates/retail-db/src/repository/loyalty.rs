//! # Loyalty Ledger
//!
//! Customer point balances and their append-only history.
//!
//! ```text
//! customers.total_loyalty_points  ==  Σ loyalty_points_history.points_change
//! ```
//!
//! The identity holds because a reversal that would take the balance below
//! zero is clamped, and the history row records the clamped change rather
//! than the requested one. [`LoyaltyRepository::reconcile`] checks it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use retail_core::loyalty::reversal_delta;
use retail_core::requests::{page_bounds, AdjustLoyaltyRequest, DEFAULT_PAGE_SIZE};
use retail_core::validation::validate_loyalty_adjustment;
use retail_core::{Customer, LoyaltyHistoryEntry, LoyaltyReconciliation, ValidationError};

use crate::error::{DbError, DbResult};
use crate::repository::catalog;
use crate::rows::LoyaltyHistoryRow;

const MANUAL_ADJUSTMENT: &str = "Manual adjustment";

async fn append_history(
    conn: &mut SqliteConnection,
    customer_id: i64,
    sale_id: Option<i64>,
    points_change: i64,
    description: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO loyalty_points_history (customer_id, sale_id, points_change, description, change_date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(customer_id)
    .bind(sale_id)
    .bind(points_change)
    .bind(description)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Adds `points` to a customer's balance. Returns the new balance.
pub async fn earn(
    conn: &mut SqliteConnection,
    customer_id: i64,
    points: i64,
    sale_id: Option<i64>,
    description: &str,
) -> DbResult<i64> {
    if points <= 0 {
        return Err(ValidationError::must_be_positive("points").into());
    }
    let now = Utc::now();

    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE customers
        SET total_loyalty_points = total_loyalty_points + ?1
        WHERE customer_id = ?2
        RETURNING total_loyalty_points
        "#,
    )
    .bind(points)
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

    append_history(conn, customer_id, sale_id, points, description, now).await?;

    debug!(customer_id, points, balance, "Loyalty points earned");
    Ok(balance)
}

/// Takes up to `points` back from a customer. Returns the new balance.
///
/// The balance stops at zero. When nothing can be taken, no history row is
/// written.
pub async fn reverse(
    conn: &mut SqliteConnection,
    customer_id: i64,
    points: i64,
    sale_id: Option<i64>,
    description: &str,
) -> DbResult<i64> {
    let now = Utc::now();

    // Self-assignment locks the row and hands back the current balance.
    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE customers
        SET total_loyalty_points = total_loyalty_points
        WHERE customer_id = ?1
        RETURNING total_loyalty_points
        "#,
    )
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

    let delta = reversal_delta(balance, points);
    if delta == 0 {
        debug!(customer_id, points, balance, "Nothing to reverse");
        return Ok(balance);
    }

    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE customers
        SET total_loyalty_points = total_loyalty_points + ?1
        WHERE customer_id = ?2
        RETURNING total_loyalty_points
        "#,
    )
    .bind(delta)
    .bind(customer_id)
    .fetch_one(&mut *conn)
    .await?;

    append_history(conn, customer_id, sale_id, delta, description, now).await?;

    debug!(customer_id, requested = points, applied = delta, balance, "Loyalty points reversed");
    Ok(balance)
}

/// Stamps the customer's most recent purchase.
pub async fn touch_last_purchase(
    conn: &mut SqliteConnection,
    customer_id: i64,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE customers SET last_purchase_date = ?1 WHERE customer_id = ?2")
        .bind(at)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", customer_id));
    }
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Loyalty ledger outside a sale: history, reconciliation and manual
/// adjustments.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Applies a manual points change in its own transaction and returns the
    /// customer with the new balance.
    ///
    /// A negative change is clamped at zero like any other reversal.
    pub async fn adjust(&self, customer_id: i64, request: &AdjustLoyaltyRequest) -> DbResult<Customer> {
        validate_loyalty_adjustment(request)?;
        debug!(customer_id, points_change = request.points_change, "Adjusting loyalty points");

        let description = request
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(MANUAL_ADJUSTMENT);

        let mut tx = self.pool.begin().await?;
        let balance = if request.points_change > 0 {
            earn(&mut tx, customer_id, request.points_change, request.sale_id, description).await?
        } else {
            reverse(&mut tx, customer_id, -request.points_change, request.sale_id, description).await?
        };
        let customer = catalog::get_customer(&mut tx, customer_id).await?;
        tx.commit().await?;

        info!(customer_id, points_change = request.points_change, balance, "Loyalty points adjusted");
        Ok(customer)
    }

    /// History for one customer, newest first.
    pub async fn history(
        &self,
        customer_id: i64,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> DbResult<Vec<LoyaltyHistoryEntry>> {
        let (skip, limit) = page_bounds(skip, limit, DEFAULT_PAGE_SIZE);
        let mut conn = self.pool.acquire().await?;
        catalog::get_customer(&mut conn, customer_id).await?;

        let rows = sqlx::query_as::<_, LoyaltyHistoryRow>(
            r#"
            SELECT history_id, customer_id, sale_id, points_change, description, change_date
            FROM loyalty_points_history
            WHERE customer_id = ?1
            ORDER BY change_date DESC, history_id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(LoyaltyHistoryEntry::from).collect())
    }

    /// Compares the stored balance with the sum of the history.
    pub async fn reconcile(&self, customer_id: i64) -> DbResult<LoyaltyReconciliation> {
        let mut conn = self.pool.acquire().await?;
        let customer = catalog::get_customer(&mut conn, customer_id).await?;

        let history_total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(points_change), 0) FROM loyalty_points_history WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;

        let in_balance = history_total == customer.total_loyalty_points;
        if !in_balance {
            warn!(
                customer_id,
                balance = customer.total_loyalty_points,
                history_total,
                "Loyalty balance out of step with history"
            );
        }

        Ok(LoyaltyReconciliation {
            customer_id,
            balance: customer.total_loyalty_points,
            history_total,
            in_balance,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{loyalty_balance, seed, test_db};

    #[tokio::test]
    async fn test_earn_then_reverse_is_symmetric() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(earn(&mut conn, fx.customer, 5, None, "Welcome bonus").await.unwrap(), 5);
        assert_eq!(reverse(&mut conn, fx.customer, 5, None, "Bonus withdrawn").await.unwrap(), 0);
        drop(conn);

        let history = db.loyalty().history(fx.customer, None, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().map(|h| h.points_change).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_reverse_clamps_and_records_applied_change() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        earn(&mut conn, fx.customer, 1, None, "Earned").await.unwrap();
        assert_eq!(reverse(&mut conn, fx.customer, 2, None, "Reversed").await.unwrap(), 0);
        // Nothing left to take: no history row.
        assert_eq!(reverse(&mut conn, fx.customer, 2, None, "Reversed").await.unwrap(), 0);
        drop(conn);

        let history = db.loyalty().history(fx.customer, None, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].points_change, -1);

        let check = db.loyalty().reconcile(fx.customer).await.unwrap();
        assert!(check.in_balance);
        assert_eq!(check.balance, 0);
        assert_eq!(loyalty_balance(&db, fx.customer).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let db = test_db().await;
        seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(matches!(
            earn(&mut conn, 999, 1, None, "x").await,
            Err(DbError::NotFound { .. })
        ));
        drop(conn);
        assert!(matches!(
            db.loyalty().reconcile(999).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_manual_adjustment() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let adjust = |points_change: i64, description: Option<&str>| AdjustLoyaltyRequest {
            points_change,
            sale_id: None,
            description: description.map(str::to_string),
        };

        let customer = db
            .loyalty()
            .adjust(fx.customer, &adjust(10, Some("Birthday bonus")))
            .await
            .unwrap();
        assert_eq!(customer.total_loyalty_points, 10);

        let customer = db.loyalty().adjust(fx.customer, &adjust(-4, None)).await.unwrap();
        assert_eq!(customer.total_loyalty_points, 6);

        // Taking more than the balance stops at zero.
        let customer = db.loyalty().adjust(fx.customer, &adjust(-50, None)).await.unwrap();
        assert_eq!(customer.total_loyalty_points, 0);

        let history = db.loyalty().history(fx.customer, None, None).await.unwrap();
        assert_eq!(
            history.iter().map(|h| h.points_change).collect::<Vec<_>>(),
            vec![-6, -4, 10]
        );
        assert_eq!(history[1].description, "Manual adjustment");
        assert_eq!(history[2].description, "Birthday bonus");
        assert!(db.loyalty().reconcile(fx.customer).await.unwrap().in_balance);

        assert!(matches!(
            db.loyalty().adjust(fx.customer, &adjust(0, None)).await,
            Err(DbError::Core(_))
        ));
        assert!(matches!(
            db.loyalty().adjust(999, &adjust(5, None)).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconcile_detects_drift() {
        let db = test_db().await;
        let fx = seed(&db).await;

        sqlx::query("UPDATE customers SET total_loyalty_points = 7 WHERE customer_id = ?1")
            .bind(fx.customer)
            .execute(db.pool())
            .await
            .unwrap();

        let check = db.loyalty().reconcile(fx.customer).await.unwrap();
        assert!(!check.in_balance);
        assert_eq!(check.history_total, 0);
    }
}
