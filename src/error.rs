//! Error taxonomy for the HTTP boundary.
//!
//! Everything a handler can fail with collapses into [`AppError`]. Client
//! responses carry a generic Spanish `{"error": …}` body; the underlying
//! cause (query text, transport errors) only reaches the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::unit_of_work::TransactionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("acceso denegado: solo para administradores")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    /// The order was archived and the pending rows removed, but the receipt
    /// could not be produced or mailed. Never rolled back: delivery is
    /// irreversible once archived.
    #[error("order {orden_id} delivered but receipt mail failed")]
    DeliveredMailFailed { orden_id: i32 },

    /// The summary PDF was written to the export directory, but mailing it
    /// failed.
    #[error("export {file} written but mail failed")]
    ExportMailFailed { file: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("pdf rendering failed: {0}")]
    Pdf(String),

    #[error("mail transport failed: {0}")]
    Mail(String),
}

impl From<printpdf::Error> for AppError {
    fn from(err: printpdf::Error) -> Self {
        AppError::Pdf(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Mail(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Mail(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DeliveredMailFailed { .. }
            | AppError::ExportMailFailed { .. }
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Transaction(_)
            | AppError::Pdf(_)
            | AppError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the caller.
    fn client_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) | AppError::NotFound(msg) => (*msg).to_string(),
            AppError::Forbidden => "Acceso denegado: solo para administradores".to_string(),
            AppError::DeliveredMailFailed { .. } => {
                "Pedido entregado, pero falló el envío de correo.".to_string()
            }
            AppError::ExportMailFailed { file } => {
                format!("PDF generado ({file}), pero falló el envío de correo.")
            }
            AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Io(_)
            | AppError::Transaction(_)
            | AppError::Pdf(_)
            | AppError::Mail(_) => "Error interno del servidor".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}
