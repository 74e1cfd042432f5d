use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::store::StorageError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    PayloadTooLarge(String),
    RangeNotSatisfiable(u64),
    InternalServerError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl AppError {
    /// Logs the underlying cause and hides it behind a generic message.
    pub fn storage(context: &str, err: StorageError) -> Self {
        match err {
            StorageError::Contention(key) => {
                log::warn!("{}: concurrent modification of {}", context, key);
                AppError::Conflict("Folder was modified concurrently, please retry".to_string())
            }
            other => {
                log::error!("{}: {}", context, other);
                AppError::InternalServerError(context.to_string())
            }
        }
    }

    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        log::error!("{}: {}", context, err);
        AppError::InternalServerError(context.to_string())
    }

    fn message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Conflict(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::RangeNotSatisfiable(_) => "Range not satisfiable".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload Too Large: {}", msg),
            AppError::RangeNotSatisfiable(size) => write!(f, "Range Not Satisfiable: object has {} bytes", size),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RangeNotSatisfiable(size) = self {
            builder.insert_header((header::CONTENT_RANGE, format!("bytes */{}", size)));
        }
        builder.json(ErrorResponse {
            success: false,
            error: self.message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_range_error_carries_content_range() {
        let resp = AppError::RangeNotSatisfiable(1000).error_response();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers().get(header::CONTENT_RANGE).unwrap(), "bytes */1000");
    }

    #[actix_web::test]
    async fn test_error_body_uses_envelope() {
        let resp = AppError::NotFound("Folder not found".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Folder not found");
    }

    #[test]
    fn test_storage_fault_is_generic_500() {
        let err = AppError::storage("Failed to get folder", StorageError::Backend("connection reset".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Failed to get folder");
    }

    #[test]
    fn test_contention_is_conflict() {
        let err = AppError::storage("Failed to upload file", StorageError::Contention("files:abc".into()));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
