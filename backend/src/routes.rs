use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use log::{error, info, warn};
use shared::{PredictionResponse, StatusResponse};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::inference::decode::decode_image;
use crate::inference::model::InferenceError;
use crate::inference::predictor::{Prediction, Predictor};
use crate::upload::{UploadedImage, read_image_upload};

/// Request-scoped limits that come from server configuration.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub max_pixels: u64,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        status: "API running".into(),
    })
}

async fn predict(
    predictor: web::Data<Predictor>,
    limits: web::Data<UploadLimits>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();

    let upload = read_image_upload(payload, limits.max_bytes)
        .await
        .inspect_err(|e| warn!("[{}] Upload rejected: {}", request_id, e))?;
    info!(
        "[{}] Received {:?} ({}, {} bytes)",
        request_id,
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.content_type,
        upload.bytes.len()
    );

    let predictor = predictor.get_ref().clone();
    let max_pixels = limits.max_pixels;
    let prediction = web::block(move || classify_upload(&predictor, upload, max_pixels, request_id))
        .await
        .map_err(|e| {
            error!("[{}] Inference task failed: {}", request_id, e);
            ApiError::Inference(InferenceError::Task(e.to_string()))
        })??;

    log::debug!("[{}] Raw scores: {:?}", request_id, prediction.scores);
    info!(
        "[{}] Predicted {:?} (class {}) with {:.2}% confidence",
        request_id, prediction.label, prediction.index, prediction.confidence
    );

    Ok(HttpResponse::Ok().json(PredictionResponse {
        prediction: prediction.label,
        confidence: prediction.confidence,
    }))
}

/// Decode, screen and classify on the blocking pool; all three scale with the
/// pixel count of the upload.
fn classify_upload(
    predictor: &Predictor,
    upload: UploadedImage,
    max_pixels: u64,
    request_id: Uuid,
) -> Result<Prediction, ApiError> {
    let image = decode_image(&upload.bytes, max_pixels).map_err(|e| {
        warn!("[{}] Invalid image: {}", request_id, e);
        ApiError::UndecodableImage
    })?;
    drop(upload);
    let image = image.into_rgb8();

    let screening = predictor.screen(&image);
    if !screening.admitted {
        warn!(
            "[{}] Not MRI-like, channel spread rg={:.2} rb={:.2} gb={:.2} (max {:.2})",
            request_id,
            screening.spread.red_green,
            screening.spread.red_blue,
            screening.spread.green_blue,
            screening.spread.max()
        );
        return Err(ApiError::NonMriImage);
    }

    predictor
        .predict(&image)
        .inspect_err(|e| error!("[{}] Model inference error: {}", request_id, e))
        .map_err(ApiError::from)
}
