//! # Retail Back Office API
//!
//! REST surface over the sales, inventory and returns core.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Request Pipeline                               │
//! │                                                                         │
//! │  TCP ──► TraceLayer ──► TimeoutLayer ──► Router ──► handler            │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                                   retail-db repository (1 transaction) │
//! │                                                   │                     │
//! │                         Json<T> or ApiError { code, message }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `API_HOST` - Interface to bind (default: 0.0.0.0)
//! - `API_PORT` - HTTP port (default: 8080)
//! - `DATABASE_PATH` - SQLite file (default: ./retail.db)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `INVOICE_PREFIX` - Invoice number prefix (default: INV)
//! - `REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `RUST_LOG` - Log filter (default: info,retail_db=debug)

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// Builds the full application router.
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    routes::router()
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use retail_db::{Database, DbConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Seeded {
        store: i64,
        terminal: i64,
        user: i64,
        product: i64,
        customer: i64,
        cash: i64,
    }

    async fn insert(db: &Database, sql: &str) -> i64 {
        sqlx::query(sql)
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn setup() -> (Router, Database, Seeded) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let store = insert(&db, "INSERT INTO stores (store_name) VALUES ('Main Street')").await;
        let terminal = insert(
            &db,
            &format!("INSERT INTO pos_terminals (store_id, terminal_name) VALUES ({}, 'Till 1')", store),
        )
        .await;
        let user = insert(
            &db,
            "INSERT INTO users (username, first_name, last_name) VALUES ('casey', 'Casey', 'Clerk')",
        )
        .await;
        let tax = insert(
            &db,
            "INSERT INTO tax_categories (category_name, tax_rate) VALUES ('Standard', '10')",
        )
        .await;
        let product = insert(
            &db,
            &format!(
                "INSERT INTO products (product_code, product_name, tax_category_id, retail_price)
                 VALUES ('KETTLE', 'Electric Kettle', {}, '100.00')",
                tax
            ),
        )
        .await;
        let customer = insert(
            &db,
            "INSERT INTO customers (first_name, last_name, phone_number) VALUES ('Ada', 'Lovelace', '555-0100')",
        )
        .await;
        let cash = insert(&db, "INSERT INTO payment_methods (method_name) VALUES ('Cash')").await;

        let router = app(AppState::new(db.clone()), Duration::from_secs(5));
        (
            router,
            db,
            Seeded {
                store,
                terminal,
                user,
                product,
                customer,
                cash,
            },
        )
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn sale_body(s: &Seeded, quantity: i64, paid: &str) -> Value {
        json!({
            "store_id": s.store,
            "terminal_id": s.terminal,
            "customer_id": s.customer,
            "user_id": s.user,
            "items": [{ "product_id": s.product, "quantity": quantity, "unit_price": "100.00" }],
            "payments": [{ "payment_method_id": s.cash, "amount": paid }]
        })
    }

    async fn stock_up(router: &Router, s: &Seeded, quantity: i64) -> i64 {
        let (status, body) = call(
            router,
            Method::POST,
            "/api/inventory",
            Some(json!({
                "product_id": s.product,
                "store_id": s.store,
                "initial_stock": quantity,
                "user_id": s.user
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["inventory_id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _db, _) = setup().await;
        let (status, body) = call(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_sale_return_void_flow() {
        let (router, _db, s) = setup().await;
        let inventory_id = stock_up(&router, &s, 10).await;

        let (status, sale) = call(&router, Method::POST, "/api/sales", Some(sale_body(&s, 2, "220"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["grand_total"], "220.00");
        assert_eq!(sale["payment_status"], "PAID");
        assert_eq!(sale["customer_name"], "Ada Lovelace");
        let sale_id = sale["sale_id"].as_i64().unwrap();
        let sale_item_id = sale["items"][0]["sale_item_id"].as_i64().unwrap();

        let (_, position) = call(&router, Method::GET, &format!("/api/inventory/{}", inventory_id), None).await;
        assert_eq!(position["current_stock"], 8);

        let return_body = |quantity: i64| {
            json!({
                "sale_id": sale_id,
                "returned_by_user_id": s.user,
                "items": [{ "sale_item_id": sale_item_id, "quantity_returned": quantity, "refund_per_item": "110" }]
            })
        };

        let (status, returned) = call(&router, Method::POST, "/api/returns", Some(return_body(1))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(returned["refund_amount"], "110.00");

        let (status, err) = call(&router, Method::POST, "/api/returns", Some(return_body(2))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "OVER_RETURN");

        let (_, history) = call(
            &router,
            Method::GET,
            &format!("/api/customers/{}/loyalty-history", s.customer),
            None,
        )
        .await;
        assert_eq!(history.as_array().unwrap().len(), 2);

        let void = json!({ "user_id": s.user, "reason": "Rang up twice" });
        let (status, voided) = call(
            &router,
            Method::POST,
            &format!("/api/sales/{}/void", sale_id),
            Some(void.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(voided["payment_status"], "VOID");

        let (status, err) = call(&router, Method::POST, &format!("/api/sales/{}/void", sale_id), Some(void)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "ALREADY_VOIDED");

        let (_, check) = call(
            &router,
            Method::GET,
            &format!("/api/customers/{}/loyalty-reconciliation", s.customer),
            None,
        )
        .await;
        assert_eq!(check["in_balance"], true);
        assert_eq!(check["balance"], 0);
    }

    #[tokio::test]
    async fn test_manual_loyalty_points() {
        let (router, _db, s) = setup().await;
        let uri = format!("/api/customers/{}/loyalty-points", s.customer);

        let (status, customer) = call(
            &router,
            Method::POST,
            &uri,
            Some(json!({ "points_change": 15, "description": "Welcome bonus" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(customer["total_loyalty_points"], 15);

        let (_, customer) = call(&router, Method::POST, &uri, Some(json!({ "points_change": -40 }))).await;
        assert_eq!(customer["total_loyalty_points"], 0);

        let (status, err) = call(&router, Method::POST, &uri, Some(json!({ "points_change": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");

        let (status, _) = call(
            &router,
            Method::POST,
            "/api/customers/9999/loyalty-points",
            Some(json!({ "points_change": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_discount_is_bad_request() {
        let (router, _db, s) = setup().await;
        stock_up(&router, &s, 10).await;

        let mut body = sale_body(&s, 1, "10");
        body["discount_amount"] = json!("500");
        let (status, err) = call(&router, Method::POST, "/api/sales", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");

        let mut body = sale_body(&s, 1, "10");
        body["items"][0]["quantity"] = json!(i64::MAX);
        let (status, err) = call(&router, Method::POST, "/api/sales", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (router, _db, s) = setup().await;
        stock_up(&router, &s, 1).await;

        let (status, err) = call(&router, Method::POST, "/api/sales", Some(sale_body(&s, 2, "220"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "INSUFFICIENT_STOCK");

        let mut no_items = sale_body(&s, 1, "110");
        no_items["items"] = json!([]);
        let (status, err) = call(&router, Method::POST, "/api/sales", Some(no_items)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "EMPTY_ORDER");

        let (status, err) = call(&router, Method::GET, "/api/sales/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");

        let (status, err) = call(
            &router,
            Method::POST,
            "/api/inventory",
            Some(json!({ "product_id": s.product, "store_id": s.store, "initial_stock": 3, "user_id": s.user })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "DUPLICATE_RECORD");
    }

    #[tokio::test]
    async fn test_reports_and_listings() {
        let (router, _db, s) = setup().await;
        stock_up(&router, &s, 10).await;
        call(&router, Method::POST, "/api/sales", Some(sale_body(&s, 1, "110"))).await;

        let (status, stats) = call(&router, Method::GET, "/api/sales/stats/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["sales_count"], 1);
        assert_eq!(stats["total_sales"], "110.00");

        let (_, sales) = call(&router, Method::GET, "/api/sales?payment_status=PAID", None).await;
        assert_eq!(sales.as_array().unwrap().len(), 1);

        let (_, returnable) = call(&router, Method::GET, "/api/returns/returnable?search=lovelace", None).await;
        assert_eq!(returnable.as_array().unwrap().len(), 1);

        let (_, methods) = call(&router, Method::GET, "/api/sales/payment-methods", None).await;
        assert_eq!(methods[0]["method_name"], "Cash");

        let (_, summary) = call(&router, Method::GET, "/api/inventory/summary", None).await;
        assert_eq!(summary["total_stock"], 9);

        let (_, movements) = call(&router, Method::GET, "/api/inventory/movements?movement_type=SALE", None).await;
        assert_eq!(movements[0]["quantity"], -1);
    }
}
