use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::JobStatus;
use crate::services::styles;

/// POST /api/upload body. `image` is a base64 data URI.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[garde(length(min = 1))]
    pub image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
    #[serde(rename = "imageUUID")]
    pub image_uuid: Option<String>,
}

/// POST /api/generate body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[garde(length(min = 1))]
    pub image: String,

    #[garde(length(min = 1, max = 100))]
    pub job_title: String,

    #[garde(length(max = 50))]
    #[serde(default)]
    pub gender: String,

    #[garde(length(min = 1, max = 50))]
    #[serde(default = "default_image_style")]
    pub style: String,
}

fn default_image_style() -> String {
    styles::DEFAULT_IMAGE_STYLE.to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub image_url: String,
    pub prompt: String,
}

/// POST /api/animate body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnimateRequest {
    #[garde(length(min = 1))]
    pub image_url: String,

    #[garde(skip)]
    #[serde(default = "default_duration")]
    pub duration: u32,

    #[garde(length(min = 1, max = 50))]
    #[serde(default = "default_animate_style")]
    pub style: String,

    #[garde(skip)]
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

fn default_duration() -> u32 {
    5
}

fn default_animate_style() -> String {
    styles::ORIGINAL_STYLE.to_string()
}

#[derive(Debug, Serialize)]
pub struct AnimateResponse {
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,
}

/// POST /api/animate/poll body.
#[derive(Debug, Deserialize, Validate)]
pub struct PollRequest {
    #[garde(length(min = 1))]
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let generate: GenerateRequest =
            serde_json::from_str(r#"{"image":"data:image/png;base64,AA==","jobTitle":"Chef"}"#)
                .unwrap();
        assert_eq!(generate.style, styles::DEFAULT_IMAGE_STYLE);
        assert_eq!(generate.gender, "");

        let animate: AnimateRequest = serde_json::from_str(r#"{"imageUrl":"https://img/1.png"}"#).unwrap();
        assert_eq!(animate.duration, 5);
        assert_eq!(animate.style, styles::ORIGINAL_STYLE);
        assert!(animate.thumbnail_url.is_none());
    }
}
