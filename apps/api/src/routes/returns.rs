//! # Return Endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use retail_core::requests::{CreateReturnRequest, ReturnFilter, ReturnableQuery, StatsFilter};
use retail_core::{ReturnDetail, ReturnSummary, ReturnableSale, ReturnsStats};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_returns).post(create_return))
        .route("/returnable", get(returnable_sales))
        .route("/stats/summary", get(returns_stats))
        .route("/{id}", get(get_return))
}

async fn create_return(
    State(state): State<AppState>,
    Json(request): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<ReturnDetail>), ApiError> {
    debug!(sale_id = request.sale_id, "POST /api/returns");
    let detail = state.db.returns().create_return(&request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_returns(
    State(state): State<AppState>,
    Query(filter): Query<ReturnFilter>,
) -> Result<Json<Vec<ReturnSummary>>, ApiError> {
    Ok(Json(state.db.returns().list_returns(&filter).await?))
}

async fn get_return(
    State(state): State<AppState>,
    Path(return_id): Path<i64>,
) -> Result<Json<ReturnDetail>, ApiError> {
    Ok(Json(state.db.returns().get_return(return_id).await?))
}

async fn returnable_sales(
    State(state): State<AppState>,
    Query(query): Query<ReturnableQuery>,
) -> Result<Json<Vec<ReturnableSale>>, ApiError> {
    Ok(Json(state.db.returns().list_returnable_sales(&query).await?))
}

async fn returns_stats(
    State(state): State<AppState>,
    Query(filter): Query<StatsFilter>,
) -> Result<Json<ReturnsStats>, ApiError> {
    Ok(Json(state.db.reports().returns_stats(&filter).await?))
}
