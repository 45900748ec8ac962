//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::access::AccessError;
use crate::menu::{MenuConfigError, MenuRenderError};

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("menu configuration error")]
    MenuConfig(#[from] MenuConfigError),

    #[error("access evaluation error")]
    Access(#[from] AccessError),

    #[error("menu rendering error")]
    MenuRender(#[from] MenuRenderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::MenuConfig(_)
            | AppError::Access(_)
            | AppError::MenuRender(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Server-side failures are logged in full and reported vaguely.
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::MenuConfig(e) => {
                tracing::error!(error = %e, "menu configuration error");
                "internal server error".to_string()
            }
            AppError::Access(e) => {
                tracing::error!(error = ?e, "access evaluation error");
                "internal server error".to_string()
            }
            AppError::MenuRender(e) => {
                tracing::error!(error = ?e, "menu rendering error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
