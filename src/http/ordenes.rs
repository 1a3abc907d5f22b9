//! Order placement endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::models::PlaceOrderRequest;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(place))
}

async fn place(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let orden_id = state.orders.place(request).await?;
    Ok(Json(json!({ "success": true, "orden_id": orden_id })))
}
