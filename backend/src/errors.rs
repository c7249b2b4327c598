use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorDetail;

use crate::inference::model::InferenceError;

/// Everything a `/predict` request can fail with. The `Display` text is the
/// `detail` string returned to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid file type")]
    InvalidContentType,
    #[error("Invalid image")]
    UndecodableImage,
    #[error("Not a valid MRI")]
    NonMriImage,
    #[error("Missing file field")]
    MissingUpload,
    #[error("File too large")]
    PayloadTooLarge,
    #[error("Malformed upload")]
    MalformedUpload(String),
    #[error("Internal Server Error")]
    Inference(#[from] InferenceError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidContentType
            | ApiError::UndecodableImage
            | ApiError::NonMriImage
            | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingUpload => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorDetail {
            detail: self.to_string(),
        })
    }
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        ApiError::MalformedUpload(err.to_string())
    }
}
