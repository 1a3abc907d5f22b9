//! Catalog queries and the admin product CRUD.
//!
//! Reads and single-row writes go straight to the pool; none of these need
//! the multi-statement transaction machinery the order pipeline uses.

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, nombre, descripcion, precio, imagen, temporada_flor, origen, pais";

#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Products matching the conjunction of multi-valued filters. Each
    /// filter is an OR-set over its column; an empty set leaves that column
    /// unrestricted.
    pub async fn list(&self, seasons: &[String], origins: &[String]) -> AppResult<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM productos \
             WHERE (cardinality($1::text[]) = 0 OR temporada_flor = ANY($1)) \
               AND (cardinality($2::text[]) = 0 OR origen = ANY($2)) \
             ORDER BY id"
        );
        let products = sqlx::query_as::<_, Product>(&query)
            .bind(seasons)
            .bind(origins)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Case-insensitive substring search over nombre, temporada_flor,
    /// origen and pais.
    pub async fn search(&self, q: &str) -> AppResult<Vec<Product>> {
        let q = q.trim();
        if q.is_empty() {
            return Err(AppError::BadRequest("Falta parámetro de búsqueda"));
        }
        let pattern = format!("%{q}%");
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM productos \
             WHERE nombre ILIKE $1 \
                OR temporada_flor ILIKE $1 \
                OR origen ILIKE $1 \
                OR pais ILIKE $1 \
             ORDER BY id"
        );
        let products = sqlx::query_as::<_, Product>(&query)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn get(&self, id: i32) -> AppResult<Product> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM productos WHERE id = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Producto no encontrado"))
    }

    /// Admin listing, newest first.
    pub async fn list_all(&self) -> AppResult<Vec<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM productos ORDER BY id DESC");
        Ok(sqlx::query_as::<_, Product>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn create(&self, product: NewProduct) -> AppResult<i32> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO productos (nombre, descripcion, precio, imagen, temporada_flor, origen, pais) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image)
        .bind(&product.season)
        .bind(&product.origin)
        .bind(&product.country)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Full-row update; returns the updated product.
    pub async fn update(&self, id: i32, product: NewProduct) -> AppResult<Product> {
        let query = format!(
            "UPDATE productos \
             SET nombre = $1, descripcion = $2, precio = $3, imagen = $4, \
                 temporada_flor = $5, origen = $6, pais = $7 \
             WHERE id = $8 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.image)
            .bind(&product.season)
            .bind(&product.origin)
            .bind(&product.country)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Producto no encontrado"))
    }

    /// Hard delete; no soft-delete, no recovery.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM productos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Producto no encontrado"));
        }
        Ok(())
    }
}
