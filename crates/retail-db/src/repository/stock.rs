//! # Stock Ledger
//!
//! Per-(product, variant, store) quantity on hand, and the append-only log of
//! every change to it.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Stock Ledger                                   │
//! │                                                                         │
//! │  Standalone (own transaction)        Composed (caller's transaction)   │
//! │  ─────────────────────────────       ────────────────────────────────  │
//! │  create_position   PURCHASE +n       consume_for_sale    SALE   −q     │
//! │  adjust            ADJUSTMENT ±Δ     restore_for_return  RETURN +q     │
//! │  stock_take        ADJUSTMENT ±Δ                                       │
//! │  transfer          TRANSFER_OUT −q / TRANSFER_IN +q                    │
//! │  delete_position   position + its movement history                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! SQLite has no `SELECT ... FOR UPDATE`. Every read-modify-write here starts
//! with a write against the row (a guarded decrement, or a "claim" that
//! bumps `updated_at` and returns the old values). That first write takes
//! the database write lock, so no other writer can change the row until the
//! transaction ends.
//!
//! ## Key Equality
//! `variant_id` is compared with `IS`, so a NULL variant matches only the
//! product-level position.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use retail_core::requests::{
    page_bounds, AdjustStockRequest, CreatePositionRequest, InventoryFilter, MovementFilter,
    StockTakeRequest, TransferStockRequest, DEFAULT_MOVEMENT_LIMIT, DEFAULT_PAGE_SIZE,
};
use retail_core::validation::{
    validate_adjust_request, validate_position_request, validate_quantity,
    validate_stock_take_request, validate_transfer_request,
};
use retail_core::{
    CoreError, InventoryLevel, InventorySummary, MovementType, StockMovement, StockPosition,
    StockTransfer, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::repository::catalog;
use crate::rows::{LevelRow, MovementRow, PositionRow};

// =============================================================================
// Movement Log
// =============================================================================

/// A movement about to be appended.
#[derive(Debug, Clone)]
pub(crate) struct NewMovement {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub store_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reference_id: Option<i64>,
    pub user_id: i64,
    pub notes: Option<String>,
}

pub(crate) async fn record_movement(
    conn: &mut SqliteConnection,
    movement: NewMovement,
    at: DateTime<Utc>,
) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            product_id, variant_id, store_id, movement_type, quantity,
            reference_id, user_id, movement_date, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(movement.product_id)
    .bind(movement.variant_id)
    .bind(movement.store_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.reference_id)
    .bind(movement.user_id)
    .bind(at)
    .bind(movement.notes)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

// =============================================================================
// Composable Primitives
// =============================================================================

/// Current stock for a key, 0 when no position exists.
async fn available(
    conn: &mut SqliteConnection,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
) -> DbResult<i64> {
    let stock = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT current_stock FROM inventory
        WHERE product_id = ?1 AND variant_id IS ?2 AND store_id = ?3
        "#,
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(stock.unwrap_or(0))
}

/// Adds `quantity` to a key, creating the position if there is none.
async fn increment_or_create(
    conn: &mut SqliteConnection,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<PositionRow> {
    let updated = sqlx::query_as::<_, PositionRow>(
        r#"
        UPDATE inventory
        SET current_stock = current_stock + ?1, updated_at = ?2
        WHERE product_id = ?3 AND variant_id IS ?4 AND store_id = ?5
        RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                  last_reorder_date, last_stock_take_date, updated_at
        "#,
    )
    .bind(quantity)
    .bind(at)
    .bind(product_id)
    .bind(variant_id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = updated {
        return Ok(row);
    }

    debug!(product_id, ?variant_id, store_id, "Creating stock position on receipt");

    let created = sqlx::query_as::<_, PositionRow>(
        r#"
        INSERT INTO inventory (product_id, variant_id, store_id, current_stock, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                  last_reorder_date, last_stock_take_date, updated_at
        "#,
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(store_id)
    .bind(quantity)
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(created)
}

/// Takes `quantity` units out of stock for a sale line.
///
/// A missing position counts as zero stock. The decrement is guarded in SQL
/// (`current_stock >= ?`), so two sales racing for the last unit cannot both
/// succeed.
pub async fn consume_for_sale(
    conn: &mut SqliteConnection,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
    quantity: i64,
    sale_id: i64,
    user_id: i64,
) -> DbResult<()> {
    validate_quantity("quantity", quantity)?;
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET current_stock = current_stock - ?1, updated_at = ?2
        WHERE product_id = ?3 AND variant_id IS ?4 AND store_id = ?5
          AND current_stock >= ?1
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(variant_id)
    .bind(store_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = available(conn, product_id, variant_id, store_id).await?;
        warn!(product_id, store_id, available, requested = quantity, "Insufficient stock");
        return Err(CoreError::InsufficientStock {
            product_id,
            store_id,
            available,
            requested: quantity,
        }
        .into());
    }

    record_movement(
        conn,
        NewMovement {
            product_id,
            variant_id,
            store_id,
            movement_type: MovementType::Sale,
            quantity: -quantity,
            reference_id: Some(sale_id),
            user_id,
            notes: None,
        },
        now,
    )
    .await?;

    Ok(())
}

/// Puts `quantity` units back into stock for a return or void.
///
/// Recreates the position if it was deleted since the sale. There is no
/// upper bound here; callers bound the quantity by what was sold.
pub async fn restore_for_return(
    conn: &mut SqliteConnection,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
    quantity: i64,
    sale_id: i64,
    user_id: i64,
) -> DbResult<()> {
    validate_quantity("quantity", quantity)?;
    let now = Utc::now();

    increment_or_create(conn, product_id, variant_id, store_id, quantity, now).await?;

    record_movement(
        conn,
        NewMovement {
            product_id,
            variant_id,
            store_id,
            movement_type: MovementType::Return,
            quantity,
            reference_id: Some(sale_id),
            user_id,
            notes: None,
        },
        now,
    )
    .await?;

    Ok(())
}

/// Locks a position by bumping `updated_at`, returning the values it held.
async fn claim_position(
    conn: &mut SqliteConnection,
    inventory_id: i64,
    at: DateTime<Utc>,
) -> DbResult<PositionRow> {
    sqlx::query_as::<_, PositionRow>(
        r#"
        UPDATE inventory SET updated_at = ?2
        WHERE inventory_id = ?1
        RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                  last_reorder_date, last_stock_take_date, updated_at
        "#,
    )
    .bind(inventory_id)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Inventory", inventory_id))
}

fn stock_take_note(notes: Option<&str>) -> String {
    match notes {
        Some(text) if !text.trim().is_empty() => format!("Stock take: {}", text),
        _ => "Stock take".to_string(),
    }
}

fn transfer_note(direction: &str, store_id: i64, notes: Option<&str>) -> String {
    match notes {
        Some(text) if !text.trim().is_empty() => {
            format!("Transfer {} store {}: {}", direction, store_id, text)
        }
        _ => format!("Transfer {} store {}", direction, store_id),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the stock ledger.
///
/// ## Usage
/// ```rust,ignore
/// let stock = db.stock();
///
/// let position = stock.adjust(&AdjustStockRequest {
///     inventory_id: 7,
///     new_quantity: 12,
///     reason: "Damaged in delivery".into(),
///     user_id: 1,
/// }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Registers a position for a new (product, variant, store) key.
    ///
    /// A positive opening quantity is logged as a PURCHASE movement.
    pub async fn create_position(&self, request: &CreatePositionRequest) -> DbResult<StockPosition> {
        validate_position_request(request)?;
        debug!(
            product_id = request.product_id,
            variant_id = ?request.variant_id,
            store_id = request.store_id,
            "Creating stock position"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, PositionRow>(
            r#"
            INSERT INTO inventory (product_id, variant_id, store_id, current_stock, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                      last_reorder_date, last_stock_take_date, updated_at
            "#,
        )
        .bind(request.product_id)
        .bind(request.variant_id)
        .bind(request.store_id)
        .bind(request.initial_stock)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let position = match inserted.map_err(DbError::from) {
            Ok(row) => row,
            Err(DbError::UniqueViolation { .. }) => {
                return Err(DbError::duplicate(
                    "stock position",
                    format!(
                        "product {} variant {:?} store {}",
                        request.product_id, request.variant_id, request.store_id
                    ),
                ));
            }
            Err(err @ DbError::ForeignKeyViolation { .. }) => {
                // Name the missing reference instead of the bare constraint.
                catalog::resolve_product(&mut tx, request.product_id).await?;
                if let Some(variant_id) = request.variant_id {
                    catalog::resolve_variant(&mut tx, variant_id).await?;
                }
                catalog::store_name(&mut tx, request.store_id).await?;
                return Err(err);
            }
            Err(other) => return Err(other),
        };
        let created_by = catalog::user_name(&mut tx, request.user_id).await?;

        if request.initial_stock > 0 {
            record_movement(
                &mut tx,
                NewMovement {
                    product_id: position.product_id,
                    variant_id: position.variant_id,
                    store_id: position.store_id,
                    movement_type: MovementType::Purchase,
                    quantity: request.initial_stock,
                    reference_id: None,
                    user_id: request.user_id,
                    notes: Some("Opening stock".to_string()),
                },
                now,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            inventory_id = position.inventory_id,
            initial_stock = request.initial_stock,
            created_by = %created_by,
            "Stock position created"
        );
        Ok(position.into())
    }

    pub async fn get_position(&self, inventory_id: i64) -> DbResult<StockPosition> {
        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT inventory_id, product_id, variant_id, store_id, current_stock,
                   last_reorder_date, last_stock_take_date, updated_at
            FROM inventory
            WHERE inventory_id = ?1
            "#,
        )
        .bind(inventory_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Inventory", inventory_id))?;

        Ok(row.into())
    }

    /// Positions with product and store names, ordered by product then store.
    pub async fn list_positions(&self, filter: &InventoryFilter) -> DbResult<Vec<InventoryLevel>> {
        let (skip, limit) = page_bounds(filter.skip, filter.limit, DEFAULT_PAGE_SIZE);
        debug!(
            store_id = ?filter.store_id,
            product_id = ?filter.product_id,
            low_stock_only = filter.low_stock_only,
            "Listing positions"
        );

        let rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT
                i.inventory_id, i.product_id, i.variant_id, i.store_id, i.current_stock,
                i.last_reorder_date, i.last_stock_take_date, i.updated_at,
                p.product_name, p.product_code, s.store_name,
                p.reorder_level, p.max_stock_level
            FROM inventory i
            JOIN products p ON p.product_id = i.product_id
            JOIN stores s ON s.store_id = i.store_id
            WHERE (?1 IS NULL OR i.store_id = ?1)
              AND (?2 IS NULL OR i.product_id = ?2)
              AND (?3 = 0 OR (i.current_stock > 0 AND i.current_stock <= p.reorder_level))
            ORDER BY p.product_name, s.store_name, i.inventory_id
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(filter.store_id)
        .bind(filter.product_id)
        .bind(filter.low_stock_only)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InventoryLevel {
                position: row.position.into(),
                product_name: row.product_name,
                product_code: row.product_code,
                store_name: row.store_name,
                reorder_level: row.reorder_level,
                max_stock_level: row.max_stock_level,
            })
            .collect())
    }

    /// Inventory health counts, for one store or all of them.
    pub async fn summary(&self, store_id: Option<i64>) -> DbResult<InventorySummary> {
        let (total_positions, total_stock, low_stock_items, out_of_stock_items, over_stock_items) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(i.current_stock), 0),
                    COALESCE(SUM(CASE WHEN i.current_stock > 0
                                       AND i.current_stock <= p.reorder_level THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN i.current_stock = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN p.max_stock_level IS NOT NULL
                                       AND i.current_stock > p.max_stock_level THEN 1 ELSE 0 END), 0)
                FROM inventory i
                JOIN products p ON p.product_id = i.product_id
                WHERE (?1 IS NULL OR i.store_id = ?1)
                "#,
            )
            .bind(store_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(InventorySummary {
            total_positions,
            total_stock,
            low_stock_items,
            out_of_stock_items,
            over_stock_items,
        })
    }

    /// Movement history, newest first.
    pub async fn list_movements(&self, filter: &MovementFilter) -> DbResult<Vec<StockMovement>> {
        let (_, limit) = page_bounds(None, filter.limit, DEFAULT_MOVEMENT_LIMIT);

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT movement_id, product_id, variant_id, store_id, movement_type, quantity,
                   reference_id, user_id, movement_date, notes
            FROM inventory_movements
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR variant_id = ?2)
              AND (?3 IS NULL OR store_id = ?3)
              AND (?4 IS NULL OR movement_type = ?4)
            ORDER BY movement_date DESC, movement_id DESC
            LIMIT ?5
            "#,
        )
        .bind(filter.product_id)
        .bind(filter.variant_id)
        .bind(filter.store_id)
        .bind(filter.movement_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Sets a position to an absolute quantity, logging the difference.
    pub async fn adjust(&self, request: &AdjustStockRequest) -> DbResult<StockPosition> {
        validate_adjust_request(request)?;
        debug!(
            inventory_id = request.inventory_id,
            new_quantity = request.new_quantity,
            "Adjusting stock"
        );

        self.set_quantity(
            request.inventory_id,
            request.new_quantity,
            request.user_id,
            request.reason.clone(),
            false,
        )
        .await
    }

    /// Records a physical count. Same mechanics as [`adjust`](Self::adjust),
    /// plus `last_stock_take_date`.
    pub async fn stock_take(&self, request: &StockTakeRequest) -> DbResult<StockPosition> {
        validate_stock_take_request(request)?;
        debug!(
            inventory_id = request.inventory_id,
            counted = request.counted_quantity,
            "Stock take"
        );

        self.set_quantity(
            request.inventory_id,
            request.counted_quantity,
            request.user_id,
            stock_take_note(request.notes.as_deref()),
            true,
        )
        .await
    }

    async fn set_quantity(
        &self,
        inventory_id: i64,
        new_quantity: i64,
        user_id: i64,
        note: String,
        counted: bool,
    ) -> DbResult<StockPosition> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let before = claim_position(&mut tx, inventory_id, now).await?;
        let delta = new_quantity - before.current_stock;

        let after = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE inventory
            SET current_stock = ?2,
                last_stock_take_date = CASE WHEN ?3 THEN ?4 ELSE last_stock_take_date END,
                updated_at = ?4
            WHERE inventory_id = ?1
            RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                      last_reorder_date, last_stock_take_date, updated_at
            "#,
        )
        .bind(inventory_id)
        .bind(new_quantity)
        .bind(counted)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        record_movement(
            &mut tx,
            NewMovement {
                product_id: before.product_id,
                variant_id: before.variant_id,
                store_id: before.store_id,
                movement_type: MovementType::Adjustment,
                quantity: delta,
                reference_id: None,
                user_id,
                notes: Some(note),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(inventory_id, old = before.current_stock, new = new_quantity, delta, "Stock set");
        Ok(after.into())
    }

    /// Moves stock from one position to the same product at another store.
    ///
    /// The destination position is created if the store has none. Both sides
    /// change in one transaction, so a failure leaves both untouched.
    pub async fn transfer(&self, request: &TransferStockRequest) -> DbResult<StockTransfer> {
        validate_transfer_request(request)?;
        debug!(
            inventory_id = request.inventory_id,
            destination_store_id = request.destination_store_id,
            quantity = request.quantity,
            "Transferring stock"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let source = claim_position(&mut tx, request.inventory_id, now).await?;

        if source.store_id == request.destination_store_id {
            return Err(ValidationError::not_allowed(
                "destination_store_id",
                "source and destination stores must differ",
            )
            .into());
        }
        let destination_name = catalog::store_name(&mut tx, request.destination_store_id).await?;
        debug!(destination = %destination_name, "Transfer destination resolved");

        let source_after = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE inventory
            SET current_stock = current_stock - ?2, updated_at = ?3
            WHERE inventory_id = ?1 AND current_stock >= ?2
            RETURNING inventory_id, product_id, variant_id, store_id, current_stock,
                      last_reorder_date, last_stock_take_date, updated_at
            "#,
        )
        .bind(request.inventory_id)
        .bind(request.quantity)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(source_after) = source_after else {
            warn!(
                inventory_id = request.inventory_id,
                available = source.current_stock,
                requested = request.quantity,
                "Transfer rejected: insufficient stock"
            );
            return Err(CoreError::InsufficientStock {
                product_id: source.product_id,
                store_id: source.store_id,
                available: source.current_stock,
                requested: request.quantity,
            }
            .into());
        };

        let destination = increment_or_create(
            &mut tx,
            source.product_id,
            source.variant_id,
            request.destination_store_id,
            request.quantity,
            now,
        )
        .await?;

        let notes = request.notes.as_deref();
        record_movement(
            &mut tx,
            NewMovement {
                product_id: source.product_id,
                variant_id: source.variant_id,
                store_id: source.store_id,
                movement_type: MovementType::TransferOut,
                quantity: -request.quantity,
                reference_id: None,
                user_id: request.user_id,
                notes: Some(transfer_note("to", request.destination_store_id, notes)),
            },
            now,
        )
        .await?;
        record_movement(
            &mut tx,
            NewMovement {
                product_id: source.product_id,
                variant_id: source.variant_id,
                store_id: request.destination_store_id,
                movement_type: MovementType::TransferIn,
                quantity: request.quantity,
                reference_id: None,
                user_id: request.user_id,
                notes: Some(transfer_note("from", source.store_id, notes)),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            from = source.store_id,
            to = request.destination_store_id,
            quantity = request.quantity,
            "Stock transferred"
        );
        Ok(StockTransfer {
            source: source_after.into(),
            destination: destination.into(),
            quantity: request.quantity,
        })
    }

    /// Deletes a position together with the movement history of its key.
    pub async fn delete_position(&self, inventory_id: i64) -> DbResult<()> {
        debug!(inventory_id, "Deleting stock position");
        let mut tx = self.pool.begin().await?;

        let (product_id, variant_id, store_id) = sqlx::query_as::<_, (i64, Option<i64>, i64)>(
            r#"
            DELETE FROM inventory WHERE inventory_id = ?1
            RETURNING product_id, variant_id, store_id
            "#,
        )
        .bind(inventory_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Inventory", inventory_id))?;

        let removed = sqlx::query(
            r#"
            DELETE FROM inventory_movements
            WHERE product_id = ?1 AND variant_id IS ?2 AND store_id = ?3
            "#,
        )
        .bind(product_id)
        .bind(variant_id)
        .bind(store_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(inventory_id, movements_removed = removed, "Stock position deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{on_hand, seed, stock, test_db};

    #[tokio::test]
    async fn test_create_position_logs_opening_stock() {
        let db = test_db().await;
        let fx = seed(&db).await;

        stock(&db, &fx, fx.taxed_product, None, fx.store_a, 10).await;

        let movements = db
            .stock()
            .list_movements(&MovementFilter {
                product_id: Some(fx.taxed_product),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Purchase);
        assert_eq!(movements[0].quantity, 10);
        assert_eq!(movements[0].notes.as_deref(), Some("Opening stock"));
    }

    #[tokio::test]
    async fn test_duplicate_position_is_rejected() {
        let db = test_db().await;
        let fx = seed(&db).await;
        stock(&db, &fx, fx.taxed_product, None, fx.store_a, 1).await;

        let err = db
            .stock()
            .create_position(&CreatePositionRequest {
                product_id: fx.taxed_product,
                variant_id: None,
                store_id: fx.store_a,
                initial_stock: 4,
                user_id: fx.manager,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_null_variant_is_its_own_key() {
        let db = test_db().await;
        let fx = seed(&db).await;

        stock(&db, &fx, fx.shirt, None, fx.store_a, 1).await;
        stock(&db, &fx, fx.shirt, Some(fx.shirt_small), fx.store_a, 2).await;
        stock(&db, &fx, fx.shirt, Some(fx.shirt_large), fx.store_a, 3).await;

        assert_eq!(on_hand(&db, fx.shirt, None, fx.store_a).await, 1);
        assert_eq!(on_hand(&db, fx.shirt, Some(fx.shirt_small), fx.store_a).await, 2);
        assert_eq!(on_hand(&db, fx.shirt, Some(fx.shirt_large), fx.store_a).await, 3);
    }

    #[tokio::test]
    async fn test_unknown_product_position() {
        let db = test_db().await;
        let fx = seed(&db).await;

        let err = db
            .stock()
            .create_position(&CreatePositionRequest {
                product_id: 777,
                variant_id: None,
                store_id: fx.store_a,
                initial_stock: 0,
                user_id: fx.manager,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::ProductNotFound(777))));
    }

    #[tokio::test]
    async fn test_adjust_records_delta() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let id = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 10).await;

        let position = db
            .stock()
            .adjust(&AdjustStockRequest {
                inventory_id: id,
                new_quantity: 7,
                reason: "Damaged".to_string(),
                user_id: fx.manager,
            })
            .await
            .unwrap();
        assert_eq!(position.current_stock, 7);

        let latest = &db
            .stock()
            .list_movements(&MovementFilter {
                movement_type: Some(MovementType::Adjustment),
                ..Default::default()
            })
            .await
            .unwrap()[0];
        assert_eq!(latest.quantity, -3);
        assert_eq!(latest.notes.as_deref(), Some("Damaged"));
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_and_missing() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let id = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 10).await;

        let negative = db
            .stock()
            .adjust(&AdjustStockRequest {
                inventory_id: id,
                new_quantity: -1,
                reason: "Oops".to_string(),
                user_id: fx.manager,
            })
            .await;
        assert!(matches!(
            negative,
            Err(DbError::Core(CoreError::Validation(_)))
        ));

        let missing = db
            .stock()
            .adjust(&AdjustStockRequest {
                inventory_id: 999,
                new_quantity: 1,
                reason: "Count".to_string(),
                user_id: fx.manager,
            })
            .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_a).await, 10);
    }

    #[tokio::test]
    async fn test_stock_take_note_and_date() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let id = stock(&db, &fx, fx.untaxed_product, None, fx.store_a, 4).await;

        let position = db
            .stock()
            .stock_take(&StockTakeRequest {
                inventory_id: id,
                counted_quantity: 6,
                notes: Some("Back room".to_string()),
                user_id: fx.manager,
            })
            .await
            .unwrap();
        assert_eq!(position.current_stock, 6);
        assert!(position.last_stock_take_date.is_some());

        let latest = &db
            .stock()
            .list_movements(&MovementFilter::default())
            .await
            .unwrap()[0];
        assert_eq!(latest.quantity, 2);
        assert_eq!(latest.notes.as_deref(), Some("Stock take: Back room"));
    }

    #[tokio::test]
    async fn test_transfer_creates_destination_and_round_trips() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let source = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 10).await;

        let transfer = db
            .stock()
            .transfer(&TransferStockRequest {
                inventory_id: source,
                destination_store_id: fx.store_b,
                quantity: 3,
                notes: None,
                user_id: fx.manager,
            })
            .await
            .unwrap();
        assert_eq!(transfer.source.current_stock, 7);
        assert_eq!(transfer.destination.current_stock, 3);
        assert_eq!(transfer.destination.store_id, fx.store_b);

        db.stock()
            .transfer(&TransferStockRequest {
                inventory_id: transfer.destination.inventory_id,
                destination_store_id: fx.store_a,
                quantity: 3,
                notes: Some("Rebalance".to_string()),
                user_id: fx.manager,
            })
            .await
            .unwrap();

        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_a).await, 10);
        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_b).await, 0);

        let movements = db
            .stock()
            .list_movements(&MovementFilter {
                store_id: Some(fx.store_b),
                movement_type: Some(MovementType::TransferOut),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            movements[0].notes.as_deref(),
            Some(format!("Transfer to store {}: Rebalance", fx.store_a).as_str())
        );
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_both_sides_unchanged() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let source = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 2).await;
        stock(&db, &fx, fx.taxed_product, None, fx.store_b, 1).await;

        let err = db
            .stock()
            .transfer(&TransferStockRequest {
                inventory_id: source,
                destination_store_id: fx.store_b,
                quantity: 5,
                notes: None,
                user_id: fx.manager,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { available: 2, requested: 5, .. })
        ));

        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_a).await, 2);
        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_b).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_store_or_user_is_not_found() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let source = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 2).await;

        let err = db
            .stock()
            .transfer(&TransferStockRequest {
                inventory_id: source,
                destination_store_id: 404,
                quantity: 1,
                notes: None,
                user_id: fx.manager,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(err.to_string().contains("Store"));
        assert_eq!(on_hand(&db, fx.taxed_product, None, fx.store_a).await, 2);

        let position = |store_id, user_id| CreatePositionRequest {
            product_id: fx.untaxed_product,
            variant_id: None,
            store_id,
            initial_stock: 1,
            user_id,
        };
        let err = db.stock().create_position(&position(404, fx.manager)).await.unwrap_err();
        assert!(err.to_string().contains("Store"));
        let err = db.stock().create_position(&position(fx.store_a, 404)).await.unwrap_err();
        assert!(err.to_string().contains("User"));
    }

    #[tokio::test]
    async fn test_same_store_transfer_not_allowed() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let source = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 2).await;

        let err = db
            .stock()
            .transfer(&TransferStockRequest {
                inventory_id: source,
                destination_store_id: fx.store_a,
                quantity: 1,
                notes: None,
                user_id: fx.manager,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::NotAllowed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_consume_guards_and_restore_recreates() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let id = stock(&db, &fx, fx.untaxed_product, None, fx.store_a, 2).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = consume_for_sale(&mut conn, fx.untaxed_product, None, fx.store_a, 3, 1, fx.cashier)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { available: 2, .. })
        ));

        // No position at store B counts as zero.
        let err = consume_for_sale(&mut conn, fx.untaxed_product, None, fx.store_b, 1, 1, fx.cashier)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { available: 0, .. })
        ));
        drop(conn);

        db.stock().delete_position(id).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        restore_for_return(&mut conn, fx.untaxed_product, None, fx.store_a, 2, 1, fx.cashier)
            .await
            .unwrap();
        drop(conn);
        assert_eq!(on_hand(&db, fx.untaxed_product, None, fx.store_a).await, 2);
    }

    #[tokio::test]
    async fn test_delete_position_removes_its_history_only() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let a = stock(&db, &fx, fx.taxed_product, None, fx.store_a, 5).await;
        stock(&db, &fx, fx.taxed_product, None, fx.store_b, 5).await;

        db.stock().delete_position(a).await.unwrap();

        let remaining = db
            .stock()
            .list_movements(&MovementFilter {
                product_id: Some(fx.taxed_product),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].store_id, fx.store_b);

        assert!(matches!(
            db.stock().delete_position(a).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_and_summary() {
        let db = test_db().await;
        let fx = seed(&db).await;
        // reorder 5, max 50
        stock(&db, &fx, fx.taxed_product, None, fx.store_a, 3).await;
        stock(&db, &fx, fx.taxed_product, None, fx.store_b, 60).await;
        // reorder 10
        stock(&db, &fx, fx.untaxed_product, None, fx.store_a, 0).await;

        let low = db
            .stock()
            .list_positions(&InventoryFilter {
                low_stock_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_code, "KETTLE");
        assert_eq!(low[0].store_name, "Main Street");

        let summary = db.stock().summary(None).await.unwrap();
        assert_eq!(
            summary,
            InventorySummary {
                total_positions: 3,
                total_stock: 63,
                low_stock_items: 1,
                out_of_stock_items: 1,
                over_stock_items: 1,
            }
        );

        let store_a = db.stock().summary(Some(fx.store_a)).await.unwrap();
        assert_eq!(store_a.total_positions, 2);
    }
}
