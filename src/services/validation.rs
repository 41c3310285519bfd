//! Upload validation for user photos.
//!
//! Photos arrive as base64 data URIs from the uploader. Only JPEG, PNG and
//! WebP up to 10 MB are accepted, judged by the decoded bytes rather than the
//! declared MIME type.

use base64::Engine;
use image::ImageFormat;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ImageValidationError {
    #[error("No image provided")]
    Empty,

    #[error("Image must be a base64 data URI")]
    NotDataUri,

    #[error("Image data is not valid base64")]
    BadEncoding,

    #[error("Image must be less than 10MB")]
    TooLarge,

    #[error("Please upload a valid image (JPEG, PNG, or WebP)")]
    UnsupportedFormat,
}

/// Decode and sniff a `data:image/...;base64,...` URI.
pub fn validate_image_data_uri(data_uri: &str) -> Result<ImageFormat, ImageValidationError> {
    let data_uri = data_uri.trim();
    if data_uri.is_empty() {
        return Err(ImageValidationError::Empty);
    }

    let (header, payload) = data_uri
        .split_once(',')
        .ok_or(ImageValidationError::NotDataUri)?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(ImageValidationError::NotDataUri);
    }

    // base64 inflates by 4/3; reject obviously oversized payloads before decoding
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(ImageValidationError::TooLarge);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ImageValidationError::BadEncoding)?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageValidationError::TooLarge);
    }

    match image::guess_format(&bytes) {
        Ok(fmt @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => Ok(fmt),
        _ => Err(ImageValidationError::UnsupportedFormat),
    }
}
