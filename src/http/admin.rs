//! Admin endpoints: product CRUD, the delivery queue and receipt export.
//! All routes here sit behind [`super::auth::require_admin`].

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{DeliveredOrder, PendingOrder, Product, ProductInput};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/productos", get(list_products).post(create_product))
        .route("/productos/:id", put(update_product).delete(delete_product))
        .route("/ordenes", get(list_pending))
        .route("/ordenes/entregadas", get(list_delivered))
        .route("/ordenes/entregadas/:id", delete(delete_delivered))
        .route("/ordenes/entregar/:id", post(deliver))
        .route("/ordenes/exportar-pdf", get(export_pdf))
        .route("/comprobante/:id", get(receipt))
}

// ── Product CRUD ──

async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list_all().await?))
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> AppResult<impl IntoResponse> {
    let product = input
        .validated()
        .ok_or(AppError::BadRequest("Faltan datos requeridos"))?;
    let id = state.catalog.create(product).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<ProductInput>,
) -> AppResult<Json<serde_json::Value>> {
    let product = input
        .validated()
        .ok_or(AppError::BadRequest("Faltan datos requeridos"))?;
    let updated = state.catalog.update(id, product).await?;
    Ok(Json(json!({ "success": true, "producto": updated })))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    state.catalog.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}

// ── Delivery workflow ──

async fn list_pending(State(state): State<AppState>) -> AppResult<Json<Vec<PendingOrder>>> {
    Ok(Json(state.fulfillment.list_pending().await?))
}

async fn list_delivered(State(state): State<AppState>) -> AppResult<Json<Vec<DeliveredOrder>>> {
    Ok(Json(state.fulfillment.list_delivered().await?))
}

async fn delete_delivered(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    state.fulfillment.delete_delivered(id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn deliver(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    state.fulfillment.mark_delivered(id).await?;
    Ok(Json(json!({
        "success": true,
        "mensaje": "Pedido entregado y correo enviado."
    })))
}

// ── Receipts ──

async fn receipt(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let (filename, pdf) = state.fulfillment.single_receipt(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    ))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    desde: Option<NaiveDate>,
    hasta: Option<NaiveDate>,
    email: Option<String>,
}

async fn export_pdf(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> AppResult<Json<serde_json::Value>> {
    // An empty email parameter means "no mail", same as an absent one.
    let email = params.email.as_deref().filter(|e| !e.trim().is_empty());
    let outcome = state
        .fulfillment
        .export_range(params.desde, params.hasta, email)
        .await?;
    let message = if outcome.mailed {
        "PDF enviado por correo y guardado"
    } else {
        "PDF generado y guardado"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "file": outcome.file
    })))
}
