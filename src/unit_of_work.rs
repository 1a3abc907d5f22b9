//! Transaction handling for the order pipeline.
//!
//! Order placement and delivery fulfillment run their statements inside a
//! single PostgreSQL transaction. A [`UnitOfWorkSession`] hands every
//! participating repository a shared [`Executor`] over the open transaction
//! and notifies registered [`TransactionAware`] observers once the
//! transaction has committed or rolled back. The order-confirmation mailer
//! hooks in through that channel, so mail transport availability can never
//! affect whether an order commits.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Error type for transactional operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The session's transaction was already committed or rolled back.
    #[error("transaction already consumed")]
    AlreadyConsumed,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

/// Shared handle to an open transaction.
///
/// Cloned into each repository participating in the same unit of work so
/// that all of their statements land on one connection and commit or roll
/// back together.
#[derive(Clone)]
pub struct Executor {
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Lock the underlying transaction slot. The slot is `None` once the
    /// session has been committed or rolled back.
    pub async fn lock(
        &self,
    ) -> tokio::sync::MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.tx.lock().await
    }

    /// Take ownership of the transaction for commit/rollback, leaving `None`.
    async fn take(&self) -> TransactionResult<Transaction<'static, Postgres>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or(TransactionError::AlreadyConsumed)
    }
}

/// Observer notified after the transaction outcome is settled.
///
/// `on_commit` runs only after the database has durably committed; an
/// implementation performing best-effort side effects (sending mail) must
/// absorb its own failures rather than surface them, since the primary
/// effect is no longer undoable.
#[async_trait]
pub trait TransactionAware: Send + Sync {
    async fn on_commit(&self) -> TransactionResult<()>;

    async fn on_rollback(&self) -> TransactionResult<()>;
}

/// Factory for transaction sessions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Session: UnitOfWorkSession;

    async fn begin(&self) -> TransactionResult<Self::Session>;
}

/// One database transaction plus its registered observers.
#[async_trait]
pub trait UnitOfWorkSession: Send + Sync {
    /// Executor repositories use to issue statements inside this session.
    fn executor(&self) -> &Executor;

    /// Register an observer for the transaction outcome.
    fn register_transaction_aware(&self, observer: Arc<dyn TransactionAware>);

    async fn commit(self) -> TransactionResult<()>;

    async fn rollback(self) -> TransactionResult<()>;
}

/// Unit of work backed by a `PgPool`.
#[derive(Clone)]
pub struct PostgresUnitOfWork {
    pool: PgPool,
}

impl PostgresUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    type Session = PostgresUnitOfWorkSession;

    async fn begin(&self) -> TransactionResult<Self::Session> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWorkSession {
            executor: Executor::new(tx),
            observers: Arc::new(RwLock::new(Vec::new())),
        })
    }
}

pub struct PostgresUnitOfWorkSession {
    executor: Executor,
    observers: Arc<RwLock<Vec<Arc<dyn TransactionAware>>>>,
}

#[async_trait]
impl UnitOfWorkSession for PostgresUnitOfWorkSession {
    fn executor(&self) -> &Executor {
        &self.executor
    }

    fn register_transaction_aware(&self, observer: Arc<dyn TransactionAware>) {
        self.observers.write().push(observer);
    }

    async fn commit(self) -> TransactionResult<()> {
        let tx = self.executor.take().await?;
        tx.commit().await?;

        let observers = self.observers.read().clone();
        for observer in observers.iter() {
            observer.on_commit().await?;
        }
        Ok(())
    }

    async fn rollback(self) -> TransactionResult<()> {
        let tx = self.executor.take().await?;
        tx.rollback().await?;

        let observers = self.observers.read().clone();
        for observer in observers.iter() {
            observer.on_rollback().await?;
        }
        Ok(())
    }
}
