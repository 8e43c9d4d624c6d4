// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Minimum password length accepted by the identity service.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Identity-service call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    SignIn,
    SignUp,
    SignOut,
    UpdateProfile,
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthOperation::SignIn => "sign-in",
            AuthOperation::SignUp => "sign-up",
            AuthOperation::SignOut => "sign-out",
            AuthOperation::UpdateProfile => "profile update",
        };
        f.write_str(name)
    }
}

/// Classified identity-service rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Malformed email address")]
    MalformedEmail,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Password must be at least 6 characters")]
    WeakCredential,

    #[error("Identity service {operation} failed: {detail}")]
    Service {
        operation: AuthOperation,
        detail: String,
    },
}

impl AuthError {
    pub fn service(operation: AuthOperation, detail: impl Into<String>) -> Self {
        AuthError::Service {
            operation,
            detail: detail.into(),
        }
    }

    /// Fixed user-facing message for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "帳號或密碼錯誤",
            AuthError::MalformedEmail => "電子郵件格式不正確",
            AuthError::EmailAlreadyRegistered => "此電子郵件已被註冊",
            AuthError::WeakCredential => "密碼強度不足（至少 6 位數）",
            AuthError::Service { operation, .. } => match operation {
                AuthOperation::SignUp | AuthOperation::UpdateProfile => "註冊失敗",
                AuthOperation::SignIn => "登入失敗",
                AuthOperation::SignOut => "登出失敗",
            },
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Activity is full")]
    Full,

    #[error("Activity is closed")]
    Closed,

    #[error("Only the creator may {0} this activity")]
    Forbidden(&'static str),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Activity list is still loading")]
    Loading,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

impl AppError {
    /// Localized message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Unauthenticated | AppError::InvalidToken => "請先登入",
            AppError::Auth(err) => err.user_message(),
            AppError::NotFound(_) => "活動不存在",
            AppError::Full => "活動已額滿！",
            AppError::Closed => "活動已截止",
            AppError::Forbidden(_) => "只有團主可以執行此操作",
            AppError::BadRequest(_) => "資料格式不正確",
            AppError::Loading => "活動載入中，請稍後再試",
            AppError::Database(_) | AppError::Internal(_) => "系統忙碌中，請稍後再試",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Auth(auth) => match auth {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
                }
                AuthError::MalformedEmail => (StatusCode::BAD_REQUEST, "malformed_email", None),
                AuthError::EmailAlreadyRegistered => {
                    (StatusCode::CONFLICT, "email_already_registered", None)
                }
                AuthError::WeakCredential => (StatusCode::BAD_REQUEST, "weak_credential", None),
                AuthError::Service { .. } => {
                    tracing::error!(error = %auth, "Identity service error");
                    (StatusCode::BAD_GATEWAY, "identity_service_error", None)
                }
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Full => (StatusCode::CONFLICT, "full", None),
            AppError::Closed => (StatusCode::CONFLICT, "closed", None),
            AppError::Forbidden(action) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                Some(format!("only the creator may {}", action)),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Loading => (StatusCode::SERVICE_UNAVAILABLE, "loading", None),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message: self.user_message().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_messages_are_fixed() {
        assert_eq!(AuthError::InvalidCredentials.user_message(), "帳號或密碼錯誤");
        assert_eq!(AuthError::MalformedEmail.user_message(), "電子郵件格式不正確");
        assert_eq!(
            AuthError::EmailAlreadyRegistered.user_message(),
            "此電子郵件已被註冊"
        );
        assert_eq!(
            AuthError::WeakCredential.user_message(),
            "密碼強度不足（至少 6 位數）"
        );
        assert_eq!(
            AuthError::service(AuthOperation::SignIn, "timeout").user_message(),
            "登入失敗"
        );
        assert_eq!(
            AuthError::service(AuthOperation::SignUp, "timeout").user_message(),
            "註冊失敗"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::EmailAlreadyRegistered), StatusCode::CONFLICT),
            (AppError::Auth(AuthError::WeakCredential), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (AppError::Full, StatusCode::CONFLICT),
            (AppError::Closed, StatusCode::CONFLICT),
            (AppError::Forbidden("close"), StatusCode::FORBIDDEN),
            (AppError::Loading, StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Database("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_full_message_matches_board_text() {
        assert_eq!(AppError::Full.user_message(), "活動已額滿！");
    }
}
