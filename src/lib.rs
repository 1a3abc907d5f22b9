//! Order-management backend for a retail flower shop.
//!
//! Catalog browsing and search, transactional order placement with
//! affiliate-referral commissions, an admin delivery workflow that archives
//! orders and mails PDF receipts, and ad-hoc receipt export.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod http;
pub mod mailer;
pub mod models;
pub mod orders;
pub mod receipt;
pub mod unit_of_work;

pub use error::{AppError, AppResult};
pub use unit_of_work::{
    Executor, PostgresUnitOfWork, PostgresUnitOfWorkSession, TransactionAware, TransactionError,
    TransactionResult, UnitOfWork, UnitOfWorkSession,
};
