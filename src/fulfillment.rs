//! Delivery fulfillment and receipt export.
//!
//! `mark_delivered` runs the archive insert and the pending deletes in one
//! unit-of-work transaction, so an order can never exist in both lifecycle
//! states or in neither. The receipt PDF and its mail happen after commit;
//! a failure there reports as partial success because the archival cannot
//! be rolled back.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::mailer::Mailer;
use crate::models::{DeliveredOrder, LineSnapshot, PendingOrder};
use crate::receipt::{self, Receipt};
use crate::unit_of_work::{
    Executor, PostgresUnitOfWork, TransactionError, TransactionResult, UnitOfWork,
    UnitOfWorkSession,
};

#[derive(Clone)]
pub struct FulfillmentService {
    pool: PgPool,
    uow: PostgresUnitOfWork,
    mailer: Mailer,
    export_dir: PathBuf,
}

/// Result of a summary export.
#[derive(Debug)]
pub struct ExportOutcome {
    pub file: String,
    pub mailed: bool,
}

/// Pending order joined with its customer, as read inside the delivery
/// transaction.
#[derive(Debug, Clone)]
struct PendingDelivery {
    orden_id: i32,
    usuario_id: i32,
    customer: String,
    email: String,
    date: DateTime<Utc>,
    total: Decimal,
}

impl FulfillmentService {
    pub fn new(pool: PgPool, mailer: Mailer, export_dir: PathBuf) -> Self {
        let uow = PostgresUnitOfWork::new(pool.clone());
        Self {
            pool,
            uow,
            mailer,
            export_dir,
        }
    }

    /// Admin queue: pending orders with customer and aggregated line items.
    pub async fn list_pending(&self) -> AppResult<Vec<PendingOrder>> {
        let orders = sqlx::query_as::<_, PendingOrder>(
            "SELECT o.id, o.fecha, o.total, \
                    u.nombre || ' ' || u.apellido AS cliente, \
                    json_agg(json_build_object( \
                        'producto', od.nombre, \
                        'cantidad', od.cantidad, \
                        'precio', od.precio \
                    )) AS productos \
             FROM ordenes o \
             JOIN usuarios u ON o.usuario_id = u.id \
             JOIN orden_detalle od ON od.orden_id = o.id \
             GROUP BY o.id, u.nombre, u.apellido, o.fecha, o.total \
             ORDER BY o.fecha DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn list_delivered(&self) -> AppResult<Vec<DeliveredOrder>> {
        let orders = sqlx::query_as::<_, DeliveredOrder>(
            "SELECT id, orden_id, usuario_id, cliente, fecha, total, productos \
             FROM pedidos_entregados ORDER BY fecha DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn delete_delivered(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM pedidos_entregados WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Entrega no encontrada"));
        }
        Ok(())
    }

    /// Archives a pending order as delivered. The transition is terminal.
    pub async fn mark_delivered(&self, orden_id: i32) -> AppResult<()> {
        let session = self.uow.begin().await?;
        let repo = FulfillmentRepository::new(session.executor().clone());

        let archived = async {
            let pending = repo
                .fetch_pending(orden_id)
                .await?
                .ok_or(AppError::NotFound("Orden no encontrada"))?;
            let items = repo.fetch_line_snapshot(orden_id).await?;
            repo.insert_archive(&pending, serde_json::to_value(&items)?)
                .await?;
            repo.delete_pending(orden_id).await?;
            Ok::<_, AppError>((pending, items))
        }
        .await;

        let (pending, items) = match archived {
            Ok(v) => v,
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };
        session.commit().await?;
        tracing::info!(orden_id, "order archived as delivered");

        // Irreversible from here on: failures downgrade to partial success.
        if let Err(err) = self.send_receipt(&pending, items).await {
            tracing::warn!(orden_id, error = %err, "receipt mail failed after delivery");
            return Err(AppError::DeliveredMailFailed { orden_id });
        }
        Ok(())
    }

    async fn send_receipt(
        &self,
        pending: &PendingDelivery,
        items: Vec<LineSnapshot>,
    ) -> AppResult<()> {
        let receipt = Receipt {
            orden_id: pending.orden_id,
            customer: pending.customer.clone(),
            date: pending.date,
            total: pending.total,
            items,
        };
        let pdf = receipt::render_receipt(&receipt)?;

        // Scoped on-disk copy; removed on drop whether the send succeeds or
        // not. The attachment itself goes out from the in-memory buffer.
        let orden_id = receipt.orden_id;
        let _tmp = tokio::task::spawn_blocking({
            let pdf = pdf.clone();
            move || -> std::io::Result<tempfile::NamedTempFile> {
                let mut tmp = tempfile::Builder::new()
                    .prefix(&format!("Comprobante-{orden_id}-"))
                    .suffix(".pdf")
                    .tempfile()?;
                tmp.write_all(&pdf)?;
                Ok(tmp)
            }
        })
        .await
        .map_err(std::io::Error::other)??;

        let filename = format!("Comprobante-{}.pdf", receipt.orden_id);
        self.mailer
            .send_with_pdf(
                &pending.email,
                &format!("Comprobante de Pedido #{}", receipt.orden_id),
                format!(
                    "Hola {}, gracias por tu compra. Adjuntamos tu comprobante en PDF.",
                    pending.customer
                ),
                &filename,
                pdf,
            )
            .await
    }

    /// Re-render a delivered order's receipt for direct download.
    pub async fn single_receipt(&self, orden_id: i32) -> AppResult<(String, Vec<u8>)> {
        let order = sqlx::query_as::<_, DeliveredOrder>(
            "SELECT id, orden_id, usuario_id, cliente, fecha, total, productos \
             FROM pedidos_entregados WHERE orden_id = $1",
        )
        .bind(orden_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Comprobante no encontrado"))?;

        let receipt = Receipt {
            orden_id: order.orden_id,
            customer: order.customer.clone(),
            date: order.date,
            total: order.total,
            items: order.snapshot()?,
        };
        let pdf = receipt::render_receipt(&receipt)?;
        Ok((format!("Comprobante-{orden_id}.pdf"), pdf))
    }

    /// Render a delivered-orders summary into the durable export directory
    /// and optionally mail it. Both date bounds must be present for the
    /// range to apply; the bounds are calendar days, inclusive on both
    /// ends.
    pub async fn export_range(
        &self,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
        email: Option<&str>,
    ) -> AppResult<ExportOutcome> {
        let base = "SELECT id, orden_id, usuario_id, cliente, fecha, total, productos \
                    FROM pedidos_entregados";
        let orders: Vec<DeliveredOrder> = match (desde, hasta) {
            (Some(desde), Some(hasta)) => {
                // Compare on the date part so orders placed any time on the
                // end day fall inside the range.
                sqlx::query_as(&format!(
                    "{base} WHERE fecha::date BETWEEN $1 AND $2 ORDER BY fecha DESC"
                ))
                .bind(desde)
                .bind(hasta)
                .fetch_all(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as(&format!("{base} ORDER BY fecha DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        if orders.is_empty() {
            return Err(AppError::NotFound("No hay pedidos en ese rango"));
        }

        let receipts = orders
            .iter()
            .map(|order| {
                Ok(Receipt {
                    orden_id: order.orden_id,
                    customer: order.customer.clone(),
                    date: order.date,
                    total: order.total,
                    items: order.snapshot()?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let pdf = receipt::render_summary(&receipts)?;

        let file = format!("Resumen_Pedidos_{}.pdf", Uuid::new_v4());
        tokio::fs::create_dir_all(&self.export_dir).await?;
        let path = self.export_dir.join(&file);
        tokio::fs::write(&path, &pdf).await?;
        tracing::info!(path = %path.display(), orders = receipts.len(), "summary export written");

        match email {
            Some(email) => {
                if let Err(err) = self
                    .mailer
                    .send_with_pdf(
                        email,
                        "Resumen de pedidos entregados",
                        "Adjunto encontrarás el resumen de pedidos entregados en PDF."
                            .to_string(),
                        &file,
                        pdf,
                    )
                    .await
                {
                    tracing::warn!(file = %file, error = %err, "export mail failed; file retained");
                    return Err(AppError::ExportMailFailed { file });
                }
                Ok(ExportOutcome { file, mailed: true })
            }
            None => Ok(ExportOutcome { file, mailed: false }),
        }
    }
}

/// Statements of the delivery transaction.
struct FulfillmentRepository {
    executor: Executor,
}

impl FulfillmentRepository {
    fn new(executor: Executor) -> Self {
        Self { executor }
    }

    async fn fetch_pending(&self, orden_id: i32) -> TransactionResult<Option<PendingDelivery>> {
        use sqlx::Row;
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        let row = sqlx::query(
            "SELECT o.id, o.usuario_id, o.fecha, o.total, \
                    u.nombre || ' ' || u.apellido AS cliente, \
                    u.email \
             FROM ordenes o \
             JOIN usuarios u ON o.usuario_id = u.id \
             WHERE o.id = $1",
        )
        .bind(orden_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|r| PendingDelivery {
            orden_id: r.get("id"),
            usuario_id: r.get("usuario_id"),
            customer: r.get("cliente"),
            email: r.get("email"),
            date: r.get("fecha"),
            total: r.get("total"),
        }))
    }

    async fn fetch_line_snapshot(&self, orden_id: i32) -> TransactionResult<Vec<LineSnapshot>> {
        use sqlx::Row;
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        let rows = sqlx::query(
            "SELECT nombre, cantidad, precio FROM orden_detalle \
             WHERE orden_id = $1 ORDER BY producto_id",
        )
        .bind(orden_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| LineSnapshot {
                product: r.get("nombre"),
                quantity: r.get("cantidad"),
                price: r.get("precio"),
            })
            .collect())
    }

    async fn insert_archive(
        &self,
        pending: &PendingDelivery,
        snapshot: serde_json::Value,
    ) -> TransactionResult<()> {
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        sqlx::query(
            "INSERT INTO pedidos_entregados (orden_id, usuario_id, cliente, fecha, total, productos) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(pending.orden_id)
        .bind(pending.usuario_id)
        .bind(&pending.customer)
        .bind(pending.date)
        .bind(pending.total)
        .bind(snapshot)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Removes both line-item representations, then the order row.
    async fn delete_pending(&self, orden_id: i32) -> TransactionResult<()> {
        let mut guard = self.executor.lock().await;
        let tx = guard.as_mut().ok_or(TransactionError::AlreadyConsumed)?;
        sqlx::query("DELETE FROM orden_productos WHERE orden_id = $1")
            .bind(orden_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM orden_detalle WHERE orden_id = $1")
            .bind(orden_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM ordenes WHERE id = $1")
            .bind(orden_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
