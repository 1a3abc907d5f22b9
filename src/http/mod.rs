//! HTTP surface: route groups, shared state and the CORS layer.

pub mod admin;
pub mod auth;
pub mod ordenes;
pub mod productos;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::catalog::CatalogService;
use crate::config::Config;
use crate::fulfillment::FulfillmentService;
use crate::mailer::Mailer;
use crate::orders::OrderService;
use crate::unit_of_work::PostgresUnitOfWork;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub fulfillment: FulfillmentService,
    admin_token: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool, mailer: Mailer, config: &Config) -> Self {
        Self {
            catalog: CatalogService::new(pool.clone()),
            orders: OrderService::new(PostgresUnitOfWork::new(pool.clone()), mailer.clone()),
            fulfillment: FulfillmentService::new(pool, mailer, config.export_dir.clone()),
            admin_token: config.admin_token.as_str().into(),
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }
}

pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let admin = admin::router()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/", get(health))
        .nest("/api/productos", productos::router())
        .nest("/api/ordenes", ordenes::router())
        .nest("/api/admin", admin)
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "API de la Florería funcionando"
}
