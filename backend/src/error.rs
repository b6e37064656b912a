//! Error handling for the inventory ledger
//!
//! Callers see the specific kind for business rejections. Unexpected
//! failures are logged and replaced with a generic error once the
//! transaction has been rolled back.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::CostError;
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock for product {product_id} in warehouse {warehouse_id}: requested {requested}, available {available}")]
    InsufficientStock {
        warehouse_id: Uuid,
        product_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

/// Serializable view of an error for callers
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Errors that are not a caller mistake or a business rule
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_)
        )
    }

    pub fn detail(&self) -> ErrorDetail {
        match self {
            AppError::NotFound(resource) => ErrorDetail {
                code: self.code().to_string(),
                message: format!("{} not found", resource),
                field: None,
            },
            AppError::Validation { field, message } => ErrorDetail {
                code: self.code().to_string(),
                message: message.clone(),
                field: Some(field.clone()),
            },
            AppError::Conflict { resource, message } => ErrorDetail {
                code: self.code().to_string(),
                message: message.clone(),
                field: Some(resource.clone()),
            },
            AppError::InsufficientStock { .. } => ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                field: None,
            },
            AppError::Internal(message) => ErrorDetail {
                code: self.code().to_string(),
                message: message.clone(),
                field: None,
            },
            _ => ErrorDetail {
                code: self.code().to_string(),
                message: "An internal error occurred".to_string(),
                field: None,
            },
        }
    }

    /// Log an internal cause and replace it with a generic failure.
    /// Business errors pass through unchanged.
    pub fn surface(self, operation: &str) -> Self {
        if self.is_internal() {
            tracing::error!(operation, error = ?self, "operation failed");
            AppError::Internal(format!("{} failed", operation))
        } else {
            tracing::warn!(operation, code = self.code(), "operation rejected: {}", self);
            self
        }
    }
}

impl From<CostError> for AppError {
    fn from(err: CostError) -> Self {
        AppError::validation("unit_cost", err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let (field, message) = first_field_error("", &errors)
            .unwrap_or_else(|| ("input".to_string(), errors.to_string()));
        AppError::Validation { field, message }
    }
}

fn first_field_error(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| *name);

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", error.code));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_field_error(&path, inner) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    if let Some(found) = first_field_error(&format!("{}[{}]", path, index), inner) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Result type alias for ledger operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_masked() {
        let err = AppError::Internal("connection reset".to_string()).surface("sale.void");
        match err {
            AppError::Internal(message) => assert_eq!(message, "sale.void failed"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_business_errors_pass_through() {
        let err = AppError::conflict("sale", "Sale is already void").surface("sale.void");
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn test_cost_error_maps_to_validation() {
        let err: AppError = CostError::Overflow.into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
