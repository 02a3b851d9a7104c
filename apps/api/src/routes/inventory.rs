//! # Inventory Endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use retail_core::requests::{
    AdjustStockRequest, CreatePositionRequest, InventoryFilter, MovementFilter, StockTakeRequest,
    TransferStockRequest,
};
use retail_core::{InventoryLevel, InventorySummary, StockMovement, StockPosition, StockTransfer};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_positions).post(create_position))
        .route("/summary", get(summary))
        .route("/movements", get(list_movements))
        .route("/adjust-stock", post(adjust))
        .route("/stock-take", post(stock_take))
        .route("/transfer", post(transfer))
        .route("/{id}", get(get_position).delete(delete_position))
}

#[derive(Debug, Default, Deserialize)]
struct SummaryQuery {
    store_id: Option<i64>,
}

async fn list_positions(
    State(state): State<AppState>,
    Query(filter): Query<InventoryFilter>,
) -> Result<Json<Vec<InventoryLevel>>, ApiError> {
    Ok(Json(state.db.stock().list_positions(&filter).await?))
}

async fn create_position(
    State(state): State<AppState>,
    Json(request): Json<CreatePositionRequest>,
) -> Result<(StatusCode, Json<StockPosition>), ApiError> {
    debug!(product_id = request.product_id, store_id = request.store_id, "POST /api/inventory");
    let position = state.db.stock().create_position(&request).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

async fn get_position(
    State(state): State<AppState>,
    Path(inventory_id): Path<i64>,
) -> Result<Json<StockPosition>, ApiError> {
    Ok(Json(state.db.stock().get_position(inventory_id).await?))
}

async fn delete_position(
    State(state): State<AppState>,
    Path(inventory_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.stock().delete_position(inventory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<InventorySummary>, ApiError> {
    Ok(Json(state.db.stock().summary(query.store_id).await?))
}

async fn list_movements(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    Ok(Json(state.db.stock().list_movements(&filter).await?))
}

async fn adjust(
    State(state): State<AppState>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<StockPosition>, ApiError> {
    Ok(Json(state.db.stock().adjust(&request).await?))
}

async fn stock_take(
    State(state): State<AppState>,
    Json(request): Json<StockTakeRequest>,
) -> Result<Json<StockPosition>, ApiError> {
    Ok(Json(state.db.stock().stock_take(&request).await?))
}

async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferStockRequest>,
) -> Result<Json<StockTransfer>, ApiError> {
    Ok(Json(state.db.stock().transfer(&request).await?))
}
