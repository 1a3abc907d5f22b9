//! Domain types mapped onto the flower-shop schema.
//!
//! Wire names (JSON fields, query parameters) and column names stay in
//! Spanish because they are the contract the storefront frontend already
//! speaks. The Rust identifiers are English.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Commission rate credited to an affiliate per referred line item.
pub const REFERRAL_RATE: Decimal = dec!(0.02);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i32,
    #[serde(rename = "nombre")]
    #[sqlx(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    #[sqlx(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    #[sqlx(rename = "precio")]
    pub price: Decimal,
    #[serde(rename = "imagen")]
    #[sqlx(rename = "imagen")]
    pub image: Option<String>,
    #[serde(rename = "temporada_flor")]
    #[sqlx(rename = "temporada_flor")]
    pub season: String,
    #[serde(rename = "origen")]
    #[sqlx(rename = "origen")]
    pub origin: String,
    #[serde(rename = "pais")]
    #[sqlx(rename = "pais")]
    pub country: String,
}

/// Admin create/update payload. Required fields are validated by
/// [`ProductInput::validated`] rather than at deserialization time so that
/// a missing field reports as a 400, not a body-shape error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    pub price: Option<Decimal>,
    #[serde(rename = "imagen")]
    pub image: Option<String>,
    #[serde(rename = "temporada_flor")]
    pub season: Option<String>,
    #[serde(rename = "origen")]
    pub origin: Option<String>,
    #[serde(rename = "pais")]
    pub country: Option<String>,
}

/// A [`ProductInput`] with the mandatory fields present.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub season: String,
    pub origin: String,
    pub country: String,
}

impl ProductInput {
    /// nombre, precio, temporada_flor, origen and pais are mandatory;
    /// descripcion and imagen are optional.
    pub fn validated(self) -> Option<NewProduct> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Some(NewProduct {
            name: non_empty(self.name)?,
            description: self.description,
            price: self.price?,
            image: self.image,
            season: non_empty(self.season)?,
            origin: non_empty(self.origin)?,
            country: non_empty(self.country)?,
        })
    }
}

/// Customer record; read-only in this service.
#[derive(Debug, Clone)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

/// One client-submitted cart entry. Price is taken as given; line items are
/// placement-time snapshots, independent of later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "id")]
    pub product_id: i32,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio")]
    pub price: Decimal,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Affiliate commission for this line: 2% of the subtotal.
    pub fn commission(&self) -> Decimal {
        self.subtotal() * REFERRAL_RATE
    }
}

/// Order total as stored: the sum of line subtotals over the cart.
pub fn order_total(cart: &[CartItem]) -> Decimal {
    cart.iter().map(CartItem::subtotal).sum()
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub usuario_id: Option<i32>,
    #[serde(default)]
    pub carrito: Vec<CartItem>,
    #[serde(rename = "ref")]
    pub referral_code: Option<String>,
}

/// Pending order as shown in the admin queue: user joined in, line items
/// aggregated by the database into a JSON array.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PendingOrder {
    pub id: i32,
    #[serde(rename = "fecha")]
    #[sqlx(rename = "fecha")]
    pub date: DateTime<Utc>,
    pub total: Decimal,
    #[serde(rename = "cliente")]
    #[sqlx(rename = "cliente")]
    pub customer: String,
    #[serde(rename = "productos")]
    #[sqlx(rename = "productos")]
    pub items: serde_json::Value,
}

/// One line of the archived snapshot stored with a delivered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    #[serde(rename = "producto")]
    pub product: String,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    #[serde(rename = "precio")]
    pub price: Decimal,
}

/// Archived (delivered) order. Existence of this row implies the pending
/// order and its relational line items are gone.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeliveredOrder {
    pub id: i32,
    pub orden_id: i32,
    pub usuario_id: i32,
    #[serde(rename = "cliente")]
    #[sqlx(rename = "cliente")]
    pub customer: String,
    #[serde(rename = "fecha")]
    #[sqlx(rename = "fecha")]
    pub date: DateTime<Utc>,
    pub total: Decimal,
    #[serde(rename = "productos")]
    #[sqlx(rename = "productos")]
    pub items: serde_json::Value,
}

impl DeliveredOrder {
    /// Decode the JSONB line-item snapshot.
    pub fn snapshot(&self) -> Result<Vec<LineSnapshot>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}
