//! Public catalog endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Query;
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::Product;

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/buscar", get(search))
        .route("/:id", get(get_by_id))
}

/// Repeated keys accumulate: `?temporada_flor=verano&temporada_flor=otoño`.
#[derive(Debug, Deserialize)]
struct CatalogFilter {
    #[serde(default)]
    temporada_flor: Vec<String>,
    #[serde(default)]
    origen: Vec<String>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let products = state
        .catalog
        .list(&filter.temporada_flor, &filter.origen)
        .await?;
    Ok(Json(products))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.search(&params.q).await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.catalog.get(id).await?))
}
