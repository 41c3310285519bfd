use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::poller::TaskStatusSource;

const IMAGE_MODEL: &str = "runware:100@1";
const VIDEO_MODEL: &str = "klingai:1@1";
const IMAGE_SIZE: u32 = 1024;
const IMAGE_STEPS: u32 = 30;
const IMAGE_STRENGTH: f64 = 0.75;
const GENERATE_ATTEMPTS: u32 = 2;

/// Client for the Runware task API.
///
/// Every call POSTs a one-element JSON array of tasks and reads back a
/// `{data: [...], errors: [...]}` envelope.
pub struct RunwareClient {
    http: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub data: Vec<TaskItem>,
    #[serde(default)]
    pub errors: Vec<TaskErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskItem {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "imageUUID")]
    pub image_uuid: Option<String>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(default, rename = "videoURL", alias = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskErrorItem {
    #[serde(default)]
    pub message: Option<String>,
}

/// An uploaded image, referenced by later tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub image_uuid: Option<String>,
    pub image_url: String,
}

/// Provider-side state of an async video task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Processing,
    Complete {
        video_url: String,
        cost: Option<f64>,
    },
    Error {
        message: String,
    },
}

impl TaskStatus {
    /// Interpret a `getResponse` envelope.
    ///
    /// Errors win over data. Within data, the first item that is a success
    /// with a video URL, an error, or still processing decides. An empty
    /// envelope means the task is not ready yet.
    pub fn from_response(resp: &TaskResponse) -> Self {
        if let Some(err) = resp.errors.first() {
            return TaskStatus::Error {
                message: err
                    .message
                    .clone()
                    .unwrap_or_else(|| "Video generation failed".to_string()),
            };
        }

        for item in &resp.data {
            match item.status.as_deref() {
                Some("success") => {
                    if let Some(url) = &item.video_url {
                        return TaskStatus::Complete {
                            video_url: url.clone(),
                            cost: item.cost,
                        };
                    }
                }
                Some("error") => {
                    return TaskStatus::Error {
                        message: item
                            .message
                            .clone()
                            .unwrap_or_else(|| "Video generation failed at provider".to_string()),
                    };
                }
                Some("processing") => return TaskStatus::Processing,
                _ => {}
            }
        }

        TaskStatus::Processing
    }
}

impl RunwareClient {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_url,
            api_key,
        }
    }

    async fn send_task(&self, task: serde_json::Value) -> Result<TaskResponse, RunwareError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!([task]))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunwareError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TaskResponse = response.json().await?;
        Ok(envelope)
    }

    fn first_error(resp: &TaskResponse, fallback: &str) -> Option<RunwareError> {
        resp.errors.first().map(|e| {
            RunwareError::Provider(e.message.clone().unwrap_or_else(|| fallback.to_string()))
        })
    }

    /// Upload a data-URI image so later tasks can reference it.
    pub async fn upload_image(&self, data_uri: &str) -> Result<UploadedImage, RunwareError> {
        let resp = self
            .send_task(json!({
                "taskType": "imageUpload",
                "taskUUID": Uuid::new_v4().to_string(),
                "image": data_uri,
            }))
            .await?;

        if let Some(err) = Self::first_error(&resp, "Image upload failed") {
            return Err(err);
        }

        let item = resp.data.into_iter().next().unwrap_or_default();
        let image_url = item
            .image_url
            .ok_or(RunwareError::MissingResult("imageURL"))?;

        Ok(UploadedImage {
            image_uuid: item.image_uuid,
            image_url,
        })
    }

    async fn image_inference(&self, seed_image: &str, prompt: &str) -> Result<String, RunwareError> {
        let resp = self
            .send_task(json!({
                "taskType": "imageInference",
                "taskUUID": Uuid::new_v4().to_string(),
                "model": IMAGE_MODEL,
                "positivePrompt": prompt,
                "seedImage": seed_image,
                "strength": IMAGE_STRENGTH,
                "width": IMAGE_SIZE,
                "height": IMAGE_SIZE,
                "steps": IMAGE_STEPS,
                "numberResults": 1,
                "outputType": "URL",
                "outputFormat": "JPG",
                "includeCost": true,
            }))
            .await?;

        if let Some(err) = Self::first_error(&resp, "Image generation failed") {
            return Err(err);
        }

        resp.data
            .into_iter()
            .find_map(|item| item.image_url)
            .ok_or(RunwareError::MissingResult("imageURL"))
    }

    /// Stylize `seed_image` (an uploaded image UUID or URL) with `prompt`.
    /// One failed attempt is retried.
    pub async fn generate_image(&self, seed_image: &str, prompt: &str) -> Result<String, RunwareError> {
        let mut attempt = 1;
        loop {
            match self.image_inference(seed_image, prompt).await {
                Ok(url) => return Ok(url),
                Err(e) if attempt < GENERATE_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "Image generation failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Submit an async image-to-video task and return its task UUID.
    pub async fn submit_video(
        &self,
        image_url: &str,
        duration: u32,
        prompt: &str,
    ) -> Result<String, RunwareError> {
        let task_uuid = Uuid::new_v4().to_string();

        let resp = self
            .send_task(json!({
                "taskType": "videoInference",
                "taskUUID": task_uuid,
                "frameImages": [{ "inputImage": image_url, "frame": "first" }],
                "model": VIDEO_MODEL,
                "duration": duration,
                "positivePrompt": prompt,
                "numberResults": 1,
                "outputType": "URL",
                "outputFormat": "mp4",
                "includeCost": true,
                "deliveryMethod": "async",
            }))
            .await?;

        if let Some(err) = Self::first_error(&resp, "Video generation failed") {
            return Err(err);
        }

        Ok(task_uuid)
    }

    /// Look up an async task. A non-2xx answer means "not ready yet".
    pub async fn poll_task(&self, task_uuid: &str) -> Result<TaskStatus, RunwareError> {
        let result = self
            .send_task(json!({
                "taskType": "getResponse",
                "taskUUID": task_uuid,
            }))
            .await;

        match result {
            Ok(resp) => Ok(TaskStatus::from_response(&resp)),
            Err(RunwareError::Status { status, .. }) => {
                tracing::debug!(task_uuid, status, "Poll returned non-success status");
                Ok(TaskStatus::Processing)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TaskStatusSource for RunwareClient {
    async fn task_status(&self, task_uuid: &str) -> Result<TaskStatus, RunwareError> {
        self.poll_task(task_uuid).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunwareError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runware returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Runware task error: {0}")]
    Provider(String),

    #[error("Runware response missing {0}")]
    MissingResult(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> TaskStatus {
        let resp: TaskResponse = serde_json::from_str(raw).unwrap();
        TaskStatus::from_response(&resp)
    }

    #[test]
    fn test_success_with_video_is_complete() {
        let status = parse(
            r#"{"data":[{"taskType":"getResponse","status":"success","videoURL":"https://x/y.mp4","cost":0.1234}]}"#,
        );
        assert_eq!(
            status,
            TaskStatus::Complete {
                video_url: "https://x/y.mp4".to_string(),
                cost: Some(0.1234)
            }
        );
    }

    #[test]
    fn test_lowercase_video_url_alias() {
        let status = parse(r#"{"data":[{"status":"success","videoUrl":"https://x/z.mp4"}]}"#);
        assert!(matches!(status, TaskStatus::Complete { video_url, .. } if video_url == "https://x/z.mp4"));
    }

    #[test]
    fn test_errors_array_wins() {
        let status = parse(
            r#"{"data":[{"status":"success","videoURL":"u"}],"errors":[{"message":"NSFW content"}]}"#,
        );
        assert_eq!(
            status,
            TaskStatus::Error {
                message: "NSFW content".to_string()
            }
        );
    }

    #[test]
    fn test_item_error_uses_default_message() {
        let status = parse(r#"{"data":[{"status":"error"}]}"#);
        assert_eq!(
            status,
            TaskStatus::Error {
                message: "Video generation failed at provider".to_string()
            }
        );
    }

    #[test]
    fn test_empty_or_pending_is_processing() {
        assert_eq!(parse(r#"{"data":[]}"#), TaskStatus::Processing);
        assert_eq!(parse(r#"{}"#), TaskStatus::Processing);
        assert_eq!(parse(r#"{"data":[{"status":"processing"}]}"#), TaskStatus::Processing);
        // success without a URL is not done yet
        assert_eq!(parse(r#"{"data":[{"status":"success"}]}"#), TaskStatus::Processing);
    }
}
