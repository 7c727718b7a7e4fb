//! Error handling for the Tendero backend
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{ledger::RuleViolation, ValidationMessage};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger rule violations
    #[error("Insufficient stock for '{item}'. Available: {available}, requested: {requested}")]
    InsufficientStock {
        item: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Credit limit exceeded. Available: {available}")]
    CreditLimitExceeded { available: Decimal },

    #[error("Payments total {payments} does not match sale total {total}")]
    PaymentMismatch { payments: Decimal, total: Decimal },

    #[error("Payment of {requested} exceeds outstanding balance {balance}")]
    PaymentExceedsBalance { balance: Decimal, requested: Decimal },

    #[error("Invalid state transition: {message}")]
    InvalidStateTransition { message: String, message_es: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure
    pub fn invalid(field: &str, message: ValidationMessage) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.en.to_string(),
            message_es: message.es.to_string(),
        }
    }

    /// Rejected lifecycle transition
    pub fn invalid_state(message: impl Into<String>, message_es: impl Into<String>) -> Self {
        AppError::InvalidStateTransition {
            message: message.into(),
            message_es: message_es.into(),
        }
    }
}

impl From<RuleViolation> for AppError {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::CreditLimitExceeded { available } => {
                AppError::CreditLimitExceeded { available }
            }
            RuleViolation::PaymentMismatch { payments, total } => {
                AppError::PaymentMismatch { payments, total }
            }
            RuleViolation::PaymentExceedsBalance { balance, requested } => {
                AppError::PaymentExceedsBalance { balance, requested }
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: format!("Invalid value for {}", field),
            message_es: format!("Valor inválido para {}", field),
            field,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_es: "El token ha expirado".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_es: "Token inválido".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions(permission) => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: format!("Permission denied: requires {}", permission),
                    message_es: format!("Permiso denegado: requiere {}", permission),
                    field: None,
                },
            ),
            AppError::Unauthorized { message, message_es } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("{} no encontrado", resource),
                    field: None,
                },
            ),
            AppError::InsufficientStock {
                item,
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: format!(
                        "Insufficient stock for '{}'. Available: {}, requested: {}",
                        item, available, requested
                    ),
                    message_es: format!(
                        "Stock insuficiente para '{}'. Disponible: {}, solicitado: {}",
                        item, available, requested
                    ),
                    field: None,
                },
            ),
            AppError::CreditLimitExceeded { available } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "CREDIT_LIMIT_EXCEEDED".to_string(),
                    message_en: format!("Credit limit exceeded. Available: {}", available),
                    message_es: format!("Límite de crédito excedido. Disponible: {}", available),
                    field: None,
                },
            ),
            AppError::PaymentMismatch { payments, total } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "PAYMENT_MISMATCH".to_string(),
                    message_en: format!(
                        "Payments total ({}) does not match sale total ({})",
                        payments, total
                    ),
                    message_es: format!(
                        "La suma de pagos ({}) no coincide con el total ({})",
                        payments, total
                    ),
                    field: Some("payments".to_string()),
                },
            ),
            AppError::PaymentExceedsBalance { balance, requested } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "PAYMENT_EXCEEDS_BALANCE".to_string(),
                    message_en: format!(
                        "Payment of {} exceeds outstanding balance {}",
                        requested, balance
                    ),
                    message_es: format!(
                        "El abono ({}) excede la deuda actual ({})",
                        requested, balance
                    ),
                    field: Some("amount".to_string()),
                },
            ),
            AppError::InvalidStateTransition {
                message,
                message_es,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error de base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers and engines
pub type AppResult<T> = Result<T, AppError>;
