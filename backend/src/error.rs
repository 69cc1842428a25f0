use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::auth::CsrfError;
use crate::classify::InferenceError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("Form token error: {0}")]
    Csrf(#[from] CsrfError),
    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Blocking task failed: {0}")]
    Blocking(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Storage(StorageError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error".to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn missing_files_are_server_errors() {
        let err = AppError::from(StorageError::Io(io::Error::from(io::ErrorKind::NotFound)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_names_and_oversized_uploads_are_client_errors() {
        let err = AppError::from(StorageError::InvalidName("..".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = AppError::PayloadTooLarge { limit: 10 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
