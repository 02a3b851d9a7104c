//! # Catalog & Directory Lookups
//!
//! Read-only access to the reference tables other components own:
//! products, variants, tax categories, customers, stores, users, terminals
//! and payment methods.
//!
//! The lookups are free functions over a connection so the engines can call
//! them inside their own transaction.

use sqlx::SqliteConnection;

use retail_core::{
    CoreError, Customer, PaymentMethod, PosTerminal, Product, ProductVariant, TaxCategory, TaxRate,
};

use crate::error::{DbError, DbResult};
use crate::rows::{
    CustomerRow, PaymentMethodRow, ProductRow, TaxCategoryRow, TerminalRow, VariantRow,
};

// =============================================================================
// Lookups on a Connection
// =============================================================================

/// Product Catalog: a product by id, or `ProductNotFound`.
pub async fn resolve_product(conn: &mut SqliteConnection, product_id: i64) -> DbResult<Product> {
    let row = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT
            product_id, product_code, product_name, barcode, tax_category_id,
            retail_price, reorder_level, max_stock_level, is_active
        FROM products
        WHERE product_id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => row.into_domain(),
        None => Err(CoreError::ProductNotFound(product_id).into()),
    }
}

/// Product Catalog: a variant by id.
pub async fn resolve_variant(
    conn: &mut SqliteConnection,
    variant_id: i64,
) -> DbResult<ProductVariant> {
    sqlx::query_as::<_, VariantRow>(
        r#"
        SELECT variant_id, product_id, variant_name, barcode, retail_price, is_active
        FROM product_variants
        WHERE variant_id = ?1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("ProductVariant", variant_id))?
    .into_domain()
}

/// Tax Category Lookup. `None` when the id is unknown.
pub async fn resolve_tax_category(
    conn: &mut SqliteConnection,
    tax_category_id: i64,
) -> DbResult<Option<TaxCategory>> {
    sqlx::query_as::<_, TaxCategoryRow>(
        r#"
        SELECT tax_category_id, category_name, tax_rate, is_active
        FROM tax_categories
        WHERE tax_category_id = ?1
        "#,
    )
    .bind(tax_category_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(TaxCategoryRow::into_domain)
    .transpose()
}

/// Rate charged on a product: 0 without a category, or with an unknown or
/// inactive one.
pub async fn tax_rate_for(conn: &mut SqliteConnection, product: &Product) -> DbResult<TaxRate> {
    let Some(category_id) = product.tax_category_id else {
        return Ok(TaxRate::zero());
    };

    Ok(resolve_tax_category(conn, category_id)
        .await?
        .map(|category| category.effective_rate())
        .unwrap_or_default())
}

/// Customer Directory.
pub async fn get_customer(conn: &mut SqliteConnection, customer_id: i64) -> DbResult<Customer> {
    let row = sqlx::query_as::<_, CustomerRow>(
        r#"
        SELECT
            customer_id, first_name, last_name, phone_number, email,
            total_loyalty_points, last_purchase_date
        FROM customers
        WHERE customer_id = ?1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

    Ok(row.into())
}

pub async fn store_name(conn: &mut SqliteConnection, store_id: i64) -> DbResult<String> {
    sqlx::query_scalar::<_, String>("SELECT store_name FROM stores WHERE store_id = ?1")
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Store", store_id))
}

/// Display name of a staff member: `first last`.
pub async fn user_name(conn: &mut SqliteConnection, user_id: i64) -> DbResult<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT first_name || ' ' || last_name FROM users WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("User", user_id))
}

pub async fn terminal(conn: &mut SqliteConnection, terminal_id: i64) -> DbResult<PosTerminal> {
    let row = sqlx::query_as::<_, TerminalRow>(
        r#"
        SELECT terminal_id, store_id, terminal_name, is_active
        FROM pos_terminals
        WHERE terminal_id = ?1
        "#,
    )
    .bind(terminal_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Terminal", terminal_id))?;

    Ok(row.into())
}

/// Active tenders, by name.
pub async fn payment_methods(conn: &mut SqliteConnection) -> DbResult<Vec<PaymentMethod>> {
    let rows = sqlx::query_as::<_, PaymentMethodRow>(
        r#"
        SELECT payment_method_id, method_name, is_active
        FROM payment_methods
        WHERE is_active = 1
        ORDER BY method_name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(PaymentMethod::from).collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed, test_db};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_missing_product_is_product_not_found() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = resolve_product(&mut conn, 9999).await.unwrap_err();

        assert!(matches!(
            err.as_core(),
            Some(CoreError::ProductNotFound(9999))
        ));
    }

    #[tokio::test]
    async fn test_tax_rate_resolution() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let taxed = resolve_product(&mut conn, fx.taxed_product).await.unwrap();
        assert_eq!(tax_rate_for(&mut conn, &taxed).await.unwrap().percent(), dec!(10));

        let untaxed = resolve_product(&mut conn, fx.untaxed_product).await.unwrap();
        assert!(tax_rate_for(&mut conn, &untaxed).await.unwrap().is_zero());

        let inactive = resolve_product(&mut conn, fx.inactive_tax_product).await.unwrap();
        assert!(tax_rate_for(&mut conn, &inactive).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_directory_names() {
        let db = test_db().await;
        let fx = seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(store_name(&mut conn, fx.store_a).await.unwrap(), "Main Street");
        assert_eq!(user_name(&mut conn, fx.cashier).await.unwrap(), "Casey Clerk");
        assert_eq!(terminal(&mut conn, fx.terminal).await.unwrap().store_id, fx.store_a);
        assert!(matches!(
            get_customer(&mut conn, 4242).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_methods_are_active_only() {
        let db = test_db().await;
        seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let names: Vec<String> = payment_methods(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.method_name)
            .collect();

        assert_eq!(names, vec!["Cash", "Credit Card", "Debit Card", "Gift Card"]);
    }
}
