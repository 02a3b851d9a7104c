//! # Routes
//!
//! ```text
//! /health                                  liveness + database check
//! /api/sales                               create, list
//! /api/sales/payment-methods               active tenders
//! /api/sales/stats/{summary,daily-report}  reports
//! /api/sales/{id}                          detail
//! /api/sales/{id}/void                     void
//! /api/returns                             create, list
//! /api/returns/returnable                  sales that can take a return
//! /api/returns/stats/summary               returns report
//! /api/returns/{id}                        detail
//! /api/inventory                           list, create position
//! /api/inventory/{summary,movements}       health, history
//! /api/inventory/{adjust-stock,stock-take,transfer}
//! /api/inventory/{id}                      get, delete
//! /api/customers/{id}/loyalty-history
//! /api/customers/{id}/loyalty-points       manual adjustment
//! /api/customers/{id}/loyalty-reconciliation
//! ```

use axum::Router;

use crate::state::AppState;

pub mod customers;
pub mod health;
pub mod inventory;
pub mod returns;
pub mod sales;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/sales", sales::router())
        .nest("/api/returns", returns::router())
        .nest("/api/inventory", inventory::router())
        .nest("/api/customers", customers::router())
}
