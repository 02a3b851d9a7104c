//! # Sale Endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::debug;

use retail_core::requests::{CreateSaleRequest, DailyReportQuery, SaleFilter, StatsFilter, VoidSaleRequest};
use retail_core::{DailySalesReport, PaymentMethod, SaleDetail, SaleSummary, SalesStats};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/payment-methods", get(payment_methods))
        .route("/stats/summary", get(sales_stats))
        .route("/stats/daily-report", get(daily_report))
        .route("/{id}", get(get_sale))
        .route("/{id}/void", post(void_sale))
}

async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleDetail>), ApiError> {
    debug!(store_id = request.store_id, "POST /api/sales");
    let sale = state.db.sales().create_sale(&request).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn list_sales(
    State(state): State<AppState>,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<Vec<SaleSummary>>, ApiError> {
    Ok(Json(state.db.sales().list_sales(&filter).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> Result<Json<SaleDetail>, ApiError> {
    Ok(Json(state.db.sales().get_sale(sale_id).await?))
}

async fn void_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
    Json(request): Json<VoidSaleRequest>,
) -> Result<Json<SaleDetail>, ApiError> {
    debug!(sale_id, user_id = request.user_id, "POST void");
    Ok(Json(state.db.sales().void_sale(sale_id, &request).await?))
}

async fn payment_methods(State(state): State<AppState>) -> Result<Json<Vec<PaymentMethod>>, ApiError> {
    Ok(Json(state.db.sales().list_payment_methods().await?))
}

async fn sales_stats(
    State(state): State<AppState>,
    Query(filter): Query<StatsFilter>,
) -> Result<Json<SalesStats>, ApiError> {
    Ok(Json(state.db.reports().sales_stats(&filter).await?))
}

async fn daily_report(
    State(state): State<AppState>,
    Query(query): Query<DailyReportQuery>,
) -> Result<Json<DailySalesReport>, ApiError> {
    Ok(Json(state.db.reports().daily_report(&query).await?))
}
