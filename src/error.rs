// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::inventory::InventoryError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    StorageError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::StorageError(msg) => write!(f, "Storage Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Unauthorized(_) => HttpResponse::Unauthorized().json(error_response),
            ApiError::Forbidden(_) => HttpResponse::Forbidden().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::StorageError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::StorageError(format!("Corrupt data file: {}", err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::InternalServerError(format!("Password hashing failed: {}", err))
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        let message = err.to_string();
        match err {
            InventoryError::InvalidQuantity { .. } => ApiError::BadRequest(message),
            InventoryError::MaterialNotFound(_) => ApiError::NotFound(message),
            InventoryError::InsufficientStock { .. } => ApiError::BadRequest(message),
            InventoryError::AccessDenied(_) => ApiError::Forbidden(message),
            InventoryError::NotFound(_) => ApiError::NotFound(message),
            InventoryError::AlreadyReceived(_) => ApiError::Conflict(message),
            InventoryError::InvalidMaterial(_) => ApiError::ValidationError(message),
            InventoryError::StockOverflow { .. } => ApiError::BadRequest(message),
        }
    }
}

impl ApiError {
    pub fn unknown_user(username: &str) -> Self {
        ApiError::Unauthorized(format!("Unknown user '{}'", username))
    }

    pub fn job_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Job with ID '{}' not found", id))
    }

    pub fn notification_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Notification with ID '{}' not found", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_inventory_errors_map_to_status_codes() {
        let cases = vec![
            (InventoryError::InvalidQuantity { material_id: 1, value: "-3".into() }, StatusCode::BAD_REQUEST),
            (InventoryError::MaterialNotFound(9), StatusCode::NOT_FOUND),
            (InventoryError::AccessDenied("nope".into()), StatusCode::FORBIDDEN),
            (InventoryError::AlreadyReceived("c-1".into()), StatusCode::CONFLICT),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.error_response().status(), expected);
        }
    }

    #[test]
    fn test_display_keeps_detail() {
        let api: ApiError = InventoryError::MaterialNotFound(42).into();
        assert!(api.to_string().contains("42"));
    }
}
