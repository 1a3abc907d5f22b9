//! Order placement.
//!
//! One unit-of-work session covers the whole placement: user lookup, order
//! row, both line-item representations and any referral commissions commit
//! or roll back together. The confirmation mail rides on the session as a
//! [`TransactionAware`] observer and only ever runs after commit.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::mailer::Mailer;
use crate::models::{order_total, CartItem, Customer, PlaceOrderRequest};
use crate::unit_of_work::{
    Executor, PostgresUnitOfWork, TransactionAware, TransactionError, TransactionResult,
    UnitOfWork, UnitOfWorkSession,
};

#[derive(Clone)]
pub struct OrderService {
    uow: PostgresUnitOfWork,
    mailer: Mailer,
}

impl OrderService {
    pub fn new(uow: PostgresUnitOfWork, mailer: Mailer) -> Self {
        Self { uow, mailer }
    }

    /// Place an order. Returns the new order id.
    pub async fn place(&self, request: PlaceOrderRequest) -> AppResult<i32> {
        let usuario_id = request
            .usuario_id
            .ok_or(AppError::BadRequest("Datos incompletos para crear la orden"))?;
        if request.carrito.is_empty() {
            return Err(AppError::BadRequest("Datos incompletos para crear la orden"));
        }

        let session = self.uow.begin().await?;
        let repo = OrderRepository::new(session.executor().clone());

        match Self::persist(&repo, usuario_id, &request).await {
            Ok((orden_id, customer)) => {
                session.register_transaction_aware(Arc::new(ConfirmationMail {
                    mailer: self.mailer.clone(),
                    customer,
                    orden_id,
                }));
                session.commit().await?;
                tracing::info!(orden_id, usuario_id, "order placed");
                Ok(orden_id)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn persist(
        repo: &OrderRepository,
        usuario_id: i32,
        request: &PlaceOrderRequest,
    ) -> AppResult<(i32, Customer)> {
        // An unknown user is an internal error here: nothing upstream
        // validates the id before the lookup.
        let customer = repo
            .find_customer(usuario_id)
            .await?
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        // Totals come from the client-supplied cart prices; line items are
        // snapshots of exactly what was submitted.
        let total = order_total(&request.carrito);
        let orden_id = repo.insert_order(usuario_id, total).await?;
        for item in &request.carrito {
            repo.insert_line_item(orden_id, item).await?;
        }

        if let Some(code) = request.referral_code.as_deref() {
            // A code that resolves to no affiliate is silently ignored.
            if let Some(afiliado_id) = repo.find_affiliate(code).await? {
                for item in &request.carrito {
                    repo.insert_commission(afiliado_id, item).await?;
                }
            }
        }

        Ok((orden_id, customer))
    }
}

/// Statements of the placement transaction, all issued through the shared
/// session executor.
pub struct OrderRepository {
    executor: Executor,
}

impl OrderRepository {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    pub async fn find_customer(&self, usuario_id: i32) -> TransactionResult<Option<Customer>> {
        use sqlx::Row;
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        let row = sqlx::query("SELECT nombre, email FROM usuarios WHERE id = $1")
            .bind(usuario_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(|r| Customer {
            name: r.get("nombre"),
            email: r.get("email"),
        }))
    }

    pub async fn insert_order(
        &self,
        usuario_id: i32,
        total: rust_decimal::Decimal,
    ) -> TransactionResult<i32> {
        use sqlx::Row;
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        let row = sqlx::query("INSERT INTO ordenes (usuario_id, total) VALUES ($1, $2) RETURNING id")
            .bind(usuario_id)
            .bind(total)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.get("id"))
    }

    /// Writes both line-item representations: the relational row and the
    /// denormalized display row carrying the name snapshot.
    pub async fn insert_line_item(&self, orden_id: i32, item: &CartItem) -> TransactionResult<()> {
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        sqlx::query(
            "INSERT INTO orden_productos (orden_id, producto_id, cantidad, precio) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(orden_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "INSERT INTO orden_detalle (orden_id, producto_id, nombre, precio, cantidad) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(orden_id)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.quantity)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn find_affiliate(&self, code: &str) -> TransactionResult<Option<i32>> {
        use sqlx::Row;
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        let row = sqlx::query("SELECT id FROM usuarios WHERE codigo_afiliado = $1 LIMIT 1")
            .bind(code)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn insert_commission(&self, afiliado_id: i32, item: &CartItem) -> TransactionResult<()> {
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        sqlx::query(
            "INSERT INTO referidos (afiliado_id, producto_id, monto, fecha) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(afiliado_id)
        .bind(item.product_id)
        .bind(item.commission())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Best-effort confirmation mail, sent strictly after commit. A transport
/// failure is logged and absorbed; the committed order stands.
struct ConfirmationMail {
    mailer: Mailer,
    customer: Customer,
    orden_id: i32,
}

#[async_trait]
impl TransactionAware for ConfirmationMail {
    async fn on_commit(&self) -> TransactionResult<()> {
        let subject = format!("Confirmación de pedido #{}", self.orden_id);
        let body = format!(
            "Hola {}, hemos recibido tu pedido con éxito. \
             En breve te confirmaremos la entrega y recibirás tu comprobante.",
            self.customer.name
        );
        if let Err(err) = self
            .mailer
            .send_plain(&self.customer.email, &subject, body)
            .await
        {
            tracing::warn!(
                orden_id = self.orden_id,
                error = %err,
                "confirmation mail failed; order already committed"
            );
        }
        Ok(())
    }

    async fn on_rollback(&self) -> TransactionResult<()> {
        Ok(())
    }
}
