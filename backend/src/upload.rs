use actix_multipart::{Field, Multipart};
use actix_web::http::header::CONTENT_TYPE;
use futures::{StreamExt, TryStreamExt};

use crate::errors::ApiError;

/// Name of the multipart field carrying the scan.
pub const UPLOAD_FIELD: &str = "file";

/// Declared media types we accept, matched as case-insensitive prefixes of the
/// raw `Content-Type` header of the upload part.
pub const ACCEPTED_MEDIA_PREFIXES: &[&str] = &["image/"];

pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub fn is_accepted_media_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    ACCEPTED_MEDIA_PREFIXES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// Pulls the `file` part out of the multipart stream. The declared type is
/// checked before any of the part's body is buffered; other parts are drained.
pub async fn read_image_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            drain(&mut field).await?;
            continue;
        }

        let content_type = field
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_accepted_media_type(&content_type) {
            log::info!("Rejecting upload with content type {:?}", content_type);
            return Err(ApiError::InvalidContentType);
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if bytes.len() + data.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&data);
        }

        return Ok(UploadedImage {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::MissingUpload)
}

async fn drain(field: &mut Field) -> Result<(), ApiError> {
    while let Some(chunk) = field.next().await {
        chunk?;
    }
    Ok(())
}
