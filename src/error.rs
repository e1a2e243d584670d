use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed: {}", .0.join(". "))]
    Validation(Vec<String>),

    #[error("Duplicate value for {0}. Please use another {0}.")]
    DuplicateKey(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Database error")]
    OrmError(sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_)
            | AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::DuplicateKey(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                AppError::DuplicateKey(duplicate_field(&detail))
            }
            _ => AppError::OrmError(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages(&errors, &mut messages);
        messages.sort();
        AppError::Validation(messages)
    }
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    out.push(message);
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_messages(inner, out);
                }
            }
        }
    }
}

// Postgres reports either `Key (email)=(a@b.c) already exists.` or just the
// constraint name, e.g. `"users_email_key"`.
fn duplicate_field(detail: &str) -> String {
    if let Some((field, _)) = detail
        .split_once("Key (")
        .and_then(|(_, rest)| rest.split_once(')'))
    {
        return field.to_string();
    }

    detail
        .split('"')
        .nth(1)
        .and_then(|constraint| constraint.strip_suffix("_key"))
        .and_then(|constraint| constraint.split_once('_'))
        .map(|(_, field)| field.to_string())
        .unwrap_or_else(|| "field".to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse::error(self.to_string());
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
