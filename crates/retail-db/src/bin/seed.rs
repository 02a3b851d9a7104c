//! # Seed Data Generator
//!
//! Populates a development database with reference data and opening stock.
//!
//! ## Usage
//! ```bash
//! # Seed ./retail_dev.db with 60 products (default)
//! cargo run -p retail-db --bin seed
//!
//! # Fewer products, different file
//! cargo run -p retail-db --bin seed -- --count 20 --db ./data/retail.db
//! ```
//!
//! ## Generated Data
//! - 2 stores, each with 2 terminals
//! - 3 users (one manager, two cashiers)
//! - Tax categories: Standard 10%, Reduced 5%, Zero 0%
//! - Payment methods: Cash, Credit Card, Debit Card, Gift Card
//! - Products across departments, apparel with S/M/L variants
//! - A handful of customers
//! - Opening stock at every store for every product / variant

use sqlx::SqlitePool;
use std::env;

use retail_core::requests::CreatePositionRequest;
use retail_db::{Database, DbConfig};

/// Departments: (code prefix, tax category index, has sizes, names)
const DEPARTMENTS: &[(&str, usize, bool, &[&str])] = &[
    (
        "HOME",
        0,
        false,
        &[
            "Electric Kettle",
            "Toaster",
            "Cast Iron Pan",
            "Chef Knife",
            "Cutting Board",
            "Dish Rack",
            "Coffee Grinder",
            "French Press",
            "Mixing Bowl Set",
            "Table Lamp",
        ],
    ),
    (
        "FOOD",
        1,
        false,
        &[
            "Sourdough Loaf",
            "Free Range Eggs",
            "Whole Milk",
            "Cheddar Block",
            "Olive Oil",
            "Basmati Rice",
            "Penne Pasta",
            "Tomato Passata",
            "Rolled Oats",
            "Honey Jar",
        ],
    ),
    (
        "KIDS",
        2,
        false,
        &[
            "Picture Book",
            "Crayon Set",
            "Wooden Blocks",
            "Baby Wipes",
            "Sippy Cup",
            "Story Puzzle",
        ],
    ),
    (
        "APRL",
        0,
        true,
        &[
            "Cotton Tee",
            "Denim Jacket",
            "Wool Socks",
            "Rain Coat",
            "Hoodie",
            "Chinos",
        ],
    ),
];

const TAX_CATEGORIES: &[(&str, &str)] = &[("Standard", "10"), ("Reduced", "5"), ("Zero Rated", "0")];

const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 0), ("Large", 200)];

const PAYMENT_METHODS: &[&str] = &["Cash", "Credit Card", "Debit Card", "Gift Card"];

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Ada", "Lovelace", "555-0100"),
    ("Grace", "Hopper", "555-0101"),
    ("Alan", "Turing", "555-0102"),
    ("Edsger", "Dijkstra", "555-0103"),
    ("Barbara", "Liskov", "555-0104"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./retail_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Retail Back Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Maximum number of products (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./retail_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Retail Back Office Seed Data Generator");
    println!("======================================");
    println!("Database: {}", db_path);
    println!("Products: up to {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let pool = db.pool();
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Stores and terminals
    let mut stores = Vec::new();
    for name in ["Main Street", "Harbour Mall"] {
        let store_id =
            insert_returning(pool, "INSERT INTO stores (store_name) VALUES (?1) RETURNING store_id", name)
                .await?;
        for till in 1..=2 {
            sqlx::query("INSERT INTO pos_terminals (store_id, terminal_name) VALUES (?1, ?2)")
                .bind(store_id)
                .bind(format!("{} Till {}", name, till))
                .execute(pool)
                .await?;
        }
        stores.push(store_id);
    }
    println!("✓ {} stores with terminals", stores.len());

    // Users
    let mut manager_id = 0;
    for (username, first, last) in [
        ("morgan", "Morgan", "Lead"),
        ("casey", "Casey", "Clerk"),
        ("riley", "Riley", "Shaw"),
    ] {
        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, first_name, last_name) VALUES (?1, ?2, ?3) RETURNING user_id",
        )
        .bind(username)
        .bind(first)
        .bind(last)
        .fetch_one(pool)
        .await?;
        if manager_id == 0 {
            manager_id = user_id;
        }
    }
    println!("✓ 3 users");

    // Tax categories
    let mut tax_categories = Vec::new();
    for (name, rate) in TAX_CATEGORIES {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tax_categories (category_name, tax_rate) VALUES (?1, ?2) RETURNING tax_category_id",
        )
        .bind(name)
        .bind(rate)
        .fetch_one(pool)
        .await?;
        tax_categories.push(id);
    }

    for name in PAYMENT_METHODS {
        insert_returning(
            pool,
            "INSERT INTO payment_methods (method_name) VALUES (?1) RETURNING payment_method_id",
            name,
        )
        .await?;
    }
    println!("✓ {} tax categories, {} payment methods", tax_categories.len(), PAYMENT_METHODS.len());

    for (first, last, phone) in CUSTOMERS {
        sqlx::query("INSERT INTO customers (first_name, last_name, phone_number) VALUES (?1, ?2, ?3)")
            .bind(first)
            .bind(last)
            .bind(phone)
            .execute(pool)
            .await?;
    }
    println!("✓ {} customers", CUSTOMERS.len());

    // Products, variants and opening stock
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let mut positions = 0;
    'departments: for (code, tax_idx, has_sizes, names) in DEPARTMENTS {
        for (idx, name) in names.iter().enumerate() {
            if generated >= count {
                break 'departments;
            }

            let seed = generated * 37 + idx;
            let price_cents = 299 + ((seed * 53) % 4700) as i64;
            let product_code = format!("{}-{:03}", code, idx + 1);

            let product_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO products (product_code, product_name, barcode, tax_category_id, retail_price, reorder_level, max_stock_level)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                RETURNING product_id
                "#,
            )
            .bind(&product_code)
            .bind(name)
            .bind(format!("590{:010}", seed))
            .bind(tax_categories[*tax_idx])
            .bind(cents_to_text(price_cents))
            .bind(5 + (seed % 6) as i64)
            .bind(100_i64)
            .fetch_one(pool)
            .await?;

            let mut variants: Vec<Option<i64>> = Vec::new();
            if *has_sizes {
                for (size, addon) in SIZES {
                    let variant_id: i64 = sqlx::query_scalar(
                        "INSERT INTO product_variants (product_id, variant_name, retail_price) VALUES (?1, ?2, ?3) RETURNING variant_id",
                    )
                    .bind(product_id)
                    .bind(size)
                    .bind((*addon > 0).then(|| cents_to_text(price_cents + addon)))
                    .fetch_one(pool)
                    .await?;
                    variants.push(Some(variant_id));
                }
            } else {
                variants.push(None);
            }

            for store_id in &stores {
                for variant_id in &variants {
                    let request = CreatePositionRequest {
                        product_id,
                        variant_id: *variant_id,
                        store_id: *store_id,
                        initial_stock: ((seed + positions) % 40) as i64,
                        user_id: manager_id,
                    };
                    if let Err(e) = db.stock().create_position(&request).await {
                        eprintln!("Failed to stock {}: {}", product_code, e);
                        continue;
                    }
                    positions += 1;
                }
            }

            generated += 1;
        }
    }

    println!();
    println!(
        "✓ Generated {} products and {} stock positions in {:?}",
        generated,
        positions,
        start.elapsed()
    );

    let summary = db.stock().summary(None).await?;
    println!("  Units on hand: {}", summary.total_stock);
    println!("  Low stock positions: {}", summary.low_stock_items);
    println!("  Out of stock positions: {}", summary.out_of_stock_items);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn insert_returning(pool: &SqlitePool, sql: &str, value: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).bind(value).fetch_one(pool).await
}

/// 1234 → "12.34"
fn cents_to_text(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
