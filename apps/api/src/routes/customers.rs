//! # Customer Loyalty Endpoints

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use retail_core::requests::AdjustLoyaltyRequest;
use retail_core::{Customer, LoyaltyHistoryEntry, LoyaltyReconciliation};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/loyalty-history", get(loyalty_history))
        .route("/{id}/loyalty-points", post(adjust_points))
        .route("/{id}/loyalty-reconciliation", get(reconcile))
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn loyalty_history(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<LoyaltyHistoryEntry>>, ApiError> {
    Ok(Json(
        state
            .db
            .loyalty()
            .history(customer_id, page.skip, page.limit)
            .await?,
    ))
}

async fn adjust_points(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
    Json(request): Json<AdjustLoyaltyRequest>,
) -> Result<Json<Customer>, ApiError> {
    debug!(customer_id, points_change = request.points_change, "POST loyalty-points");
    Ok(Json(state.db.loyalty().adjust(customer_id, &request).await?))
}

async fn reconcile(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> Result<Json<LoyaltyReconciliation>, ApiError> {
    Ok(Json(state.db.loyalty().reconcile(customer_id).await?))
}
