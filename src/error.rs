//! Unified application error model and HTTP mapping helpers.
//! Handlers return `AppResult<T>`; lower layers (stores, providers) return `anyhow::Result`
//! and are mapped into one of these variants at the handler boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String },
    Unauthorized { code: String, message: String },
    NotFound { code: String, message: String },
    Unavailable { code: String, message: String },
    Storage { code: String, message: String },
    Provider { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Provider { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Provider { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn provider<S: Into<String>>(code: S, msg: S) -> Self { AppError::Provider { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Store failure with the underlying message passed through to the caller.
    pub fn from_store(err: anyhow::Error) -> Self {
        AppError::Storage { code: "storage_error".into(), message: format!("{:#}", err) }
    }

    /// Completion provider failure with the underlying message passed through.
    pub fn from_provider(err: anyhow::Error) -> Self {
        AppError::Provider { code: "provider_error".into(), message: format!("{:#}", err) }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Unauthorized { .. } => 401,
            AppError::NotFound { .. } => 404,
            AppError::Unavailable { .. } => 503,
            AppError::Storage { .. } => 500,
            AppError::Provider { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Prefer an AppError carried inside the anyhow chain
        if let Some(app) = err.downcast_ref::<AppError>() {
            return app.clone();
        }
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(target: "http", code = self.code_str(), "{}", self.message());
        }
        (status, Json(serde_json::json!({
            "error": self.message(),
            "code": self.code_str(),
        }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::validation("missing_title", "oops").http_status(), 400);
        assert_eq!(AppError::unauthorized("invalid_token", "no").http_status(), 401);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::unavailable("openai_unavailable", "down").http_status(), 503);
        assert_eq!(AppError::storage("storage_error", "insert failed").http_status(), 500);
        assert_eq!(AppError::provider("provider_error", "rate limited").http_status(), 500);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn anyhow_keeps_wrapped_app_error() {
        let err = anyhow::Error::new(AppError::not_found("not_found", "Study set not found"));
        let app: AppError = err.into();
        assert_eq!(app.http_status(), 404);
        assert_eq!(app.message(), "Study set not found");

        let plain: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(plain.code_str(), "internal_error");
    }

    #[test]
    fn store_errors_expose_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("insert study_sets");
        let app = AppError::from_store(err);
        assert_eq!(app.http_status(), 500);
        assert!(app.message().contains("insert study_sets"));
        assert!(app.message().contains("connection refused"));
    }
}
