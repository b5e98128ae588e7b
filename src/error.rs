//! Application-wide error type.
//!
//! Every failure a handler can hit funnels into [`AppError`]. Rendering it logs
//! the cause and shows the generic "Hubo un problema" page; the cause itself is
//! never shown to the visitor.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::services::listing_form_service::FieldErrors;

pub type Result<T> = std::result::Result<T, AppError>;

pub const GENERIC_ERROR_MESSAGE: &str = "Hubo un problema, inténtalo de nuevo.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Authentication required")]
    Unauthenticated,
}

impl AppError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    title: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Unauthenticated) {
            return Redirect::to("/sign-in").into_response();
        }

        let status = self.status();
        let (title, message) = match &self {
            AppError::NotFound => (
                "No encontrado".to_string(),
                "El anuncio que buscas no existe o fue eliminado.".to_string(),
            ),
            AppError::Forbidden => (
                "Sin permiso".to_string(),
                "Solo el dueño del anuncio puede modificarlo.".to_string(),
            ),
            AppError::BadRequest(detail) => ("Solicitud inválida".to_string(), detail.clone()),
            _ => ("Error".to_string(), GENERIC_ERROR_MESSAGE.to_string()),
        };

        if status.is_server_error() {
            error!("❌ Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let body = ErrorTemplate { title, message }
            .render()
            .unwrap_or_else(|_| GENERIC_ERROR_MESSAGE.to_string());
        (status, Html(body)).into_response()
    }
}
