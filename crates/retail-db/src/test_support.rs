//! Shared fixtures for the repository tests.
//!
//! Every test gets its own in-memory database; [`seed`] fills the reference
//! tables with a small, fixed catalog.

use sqlx::SqlitePool;

use retail_core::requests::CreatePositionRequest;

use crate::pool::{Database, DbConfig};

/// Ids of the seeded reference rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fixture {
    pub store_a: i64,
    pub store_b: i64,
    pub cashier: i64,
    pub manager: i64,
    pub terminal: i64,
    /// 100.00, 10% tax, reorder level 5, max stock 50.
    pub taxed_product: i64,
    /// 9.99, no tax category.
    pub untaxed_product: i64,
    /// 20.00, category at 15% but inactive.
    pub inactive_tax_product: i64,
    /// 25.00, 10% tax, sold by size.
    pub shirt: i64,
    pub shirt_small: i64,
    pub shirt_large: i64,
    /// Ada Lovelace, 0 points.
    pub customer: i64,
    pub cash: i64,
    pub credit_card: i64,
    pub debit_card: i64,
    pub gift_card: i64,
}

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn insert(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query(sql)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub(crate) async fn seed(db: &Database) -> Fixture {
    let pool = db.pool();

    let store_a = insert(pool, "INSERT INTO stores (store_name) VALUES ('Main Street')").await;
    let store_b = insert(pool, "INSERT INTO stores (store_name) VALUES ('Harbour Mall')").await;

    let cashier = insert(
        pool,
        "INSERT INTO users (username, first_name, last_name) VALUES ('casey', 'Casey', 'Clerk')",
    )
    .await;
    let manager = insert(
        pool,
        "INSERT INTO users (username, first_name, last_name) VALUES ('morgan', 'Morgan', 'Lead')",
    )
    .await;

    let terminal = insert(
        pool,
        &format!(
            "INSERT INTO pos_terminals (store_id, terminal_name) VALUES ({}, 'Till 1')",
            store_a
        ),
    )
    .await;

    let standard = insert(
        pool,
        "INSERT INTO tax_categories (category_name, tax_rate) VALUES ('Standard', '10')",
    )
    .await;
    let retired = insert(
        pool,
        "INSERT INTO tax_categories (category_name, tax_rate, is_active) VALUES ('Luxury', '15', 0)",
    )
    .await;

    let taxed_product = insert(
        pool,
        &format!(
            "INSERT INTO products (product_code, product_name, tax_category_id, retail_price, reorder_level, max_stock_level)
             VALUES ('KETTLE', 'Electric Kettle', {}, '100.00', 5, 50)",
            standard
        ),
    )
    .await;
    let untaxed_product = insert(
        pool,
        "INSERT INTO products (product_code, product_name, retail_price, reorder_level)
         VALUES ('BREAD', 'Sourdough Loaf', '9.99', 10)",
    )
    .await;
    let inactive_tax_product = insert(
        pool,
        &format!(
            "INSERT INTO products (product_code, product_name, tax_category_id, retail_price)
             VALUES ('CANDLE', 'Scented Candle', {}, '20.00')",
            retired
        ),
    )
    .await;
    let shirt = insert(
        pool,
        &format!(
            "INSERT INTO products (product_code, product_name, tax_category_id, retail_price, reorder_level)
             VALUES ('TEE', 'Cotton Tee', {}, '25.00', 2)",
            standard
        ),
    )
    .await;
    let shirt_small = insert(
        pool,
        &format!(
            "INSERT INTO product_variants (product_id, variant_name) VALUES ({}, 'Small')",
            shirt
        ),
    )
    .await;
    let shirt_large = insert(
        pool,
        &format!(
            "INSERT INTO product_variants (product_id, variant_name, retail_price) VALUES ({}, 'Large', '27.50')",
            shirt
        ),
    )
    .await;

    let customer = insert(
        pool,
        "INSERT INTO customers (first_name, last_name, phone_number, email)
         VALUES ('Ada', 'Lovelace', '555-0100', 'ada@example.com')",
    )
    .await;

    let cash = insert(pool, "INSERT INTO payment_methods (method_name) VALUES ('Cash')").await;
    let credit_card =
        insert(pool, "INSERT INTO payment_methods (method_name) VALUES ('Credit Card')").await;
    let debit_card =
        insert(pool, "INSERT INTO payment_methods (method_name) VALUES ('Debit Card')").await;
    let gift_card =
        insert(pool, "INSERT INTO payment_methods (method_name) VALUES ('Gift Card')").await;
    insert(
        pool,
        "INSERT INTO payment_methods (method_name, is_active) VALUES ('Cheque', 0)",
    )
    .await;

    Fixture {
        store_a,
        store_b,
        cashier,
        manager,
        terminal,
        taxed_product,
        untaxed_product,
        inactive_tax_product,
        shirt,
        shirt_small,
        shirt_large,
        customer,
        cash,
        credit_card,
        debit_card,
        gift_card,
    }
}

/// Registers a stock position and returns its inventory id.
pub(crate) async fn stock(
    db: &Database,
    fx: &Fixture,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
    quantity: i64,
) -> i64 {
    db.stock()
        .create_position(&CreatePositionRequest {
            product_id,
            variant_id,
            store_id,
            initial_stock: quantity,
            user_id: fx.manager,
        })
        .await
        .unwrap()
        .inventory_id
}

/// Current stock for a key, 0 when no position exists.
pub(crate) async fn on_hand(
    db: &Database,
    product_id: i64,
    variant_id: Option<i64>,
    store_id: i64,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT current_stock FROM inventory WHERE product_id = ?1 AND variant_id IS ?2 AND store_id = ?3",
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(store_id)
    .fetch_optional(db.pool())
    .await
    .unwrap()
    .unwrap_or(0)
}

pub(crate) async fn loyalty_balance(db: &Database, customer_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT total_loyalty_points FROM customers WHERE customer_id = ?1",
    )
    .bind(customer_id)
    .fetch_one(db.pool())
    .await
    .unwrap()
}
