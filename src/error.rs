use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::constants::{ERR_INVALID_CREDENTIALS, ERR_NOT_AUTHENTICATED};

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Family not found")]
    FamilyNotFound,

    #[error("Record not found")]
    RecordNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Delete request not found")]
    DeleteRequestNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Wrong security answer")]
    WrongSecurityAnswer,

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Too many failed login attempts")]
    TooManyAttempts,
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
            }
            AppError::Migration(ref e) => {
                tracing::error!("Migration error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
            }
            AppError::PasswordHash(ref e) => {
                tracing::error!("Password hashing error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
            }
            AppError::TaskJoin(ref e) => {
                tracing::error!("Task join error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
            }
            AppError::UserAlreadyExists => (StatusCode::CONFLICT, "用户名已存在"),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "用户不存在"),
            AppError::FamilyNotFound => (StatusCode::NOT_FOUND, "家庭不存在"),
            AppError::RecordNotFound => (StatusCode::NOT_FOUND, "记录不存在"),
            AppError::NotificationNotFound => (StatusCode::NOT_FOUND, "通知不存在"),
            AppError::DeleteRequestNotFound => (StatusCode::NOT_FOUND, "删除申请不存在"),
            AppError::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.as_str()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS),
            AppError::WrongSecurityAnswer => (StatusCode::UNAUTHORIZED, "密保答案错误"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, ERR_NOT_AUTHENTICATED),
            AppError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "登录失败次数过多，请稍后再试",
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
