use serde::{Deserialize, Serialize};

/// Status of an animation job. `Complete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// A client-tracked video generation request.
///
/// Serialized in camelCase so a stored blob keeps the layout the web client
/// reads (`taskUUID`, `startedAt`, ...). Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnimationJob {
    pub id: String,
    #[serde(rename = "taskUUID")]
    pub task_uuid: String,
    pub source_image_url: String,
    pub thumbnail_url: String,
    pub style: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl AnimationJob {
    /// A freshly submitted job. The task UUID doubles as the job id.
    pub fn submitted(
        task_uuid: impl Into<String>,
        source_image_url: impl Into<String>,
        thumbnail_url: impl Into<String>,
        style: impl Into<String>,
        started_at: i64,
    ) -> Self {
        let task_uuid = task_uuid.into();
        Self {
            id: task_uuid.clone(),
            task_uuid,
            source_image_url: source_image_url.into(),
            thumbnail_url: thumbnail_url.into(),
            style: style.into(),
            status: JobStatus::Processing,
            video_url: None,
            error: None,
            started_at,
            completed_at: None,
        }
    }

    /// Merge a partial update into this job.
    ///
    /// A terminal job is frozen. The merged job must still satisfy the
    /// lifecycle rules in [`AnimationJob::check`], otherwise nothing changes.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::Finished {
                id: self.id.clone(),
                status: self.status,
            });
        }

        let mut merged = self.clone();
        if let Some(next) = update.status {
            merged.status = next;
        }
        if let Some(url) = update.video_url {
            merged.video_url = Some(url);
        }
        if let Some(err) = update.error {
            merged.error = Some(err);
        }
        if let Some(at) = update.completed_at {
            merged.completed_at = Some(at);
        }

        merged.check()?;
        *self = merged;
        Ok(())
    }

    /// `processing` carries no outcome. `complete` carries a video URL and
    /// `error` a message, never both, and both carry `completed_at`.
    pub fn check(&self) -> Result<(), JobError> {
        let problem = match self.status {
            JobStatus::Processing if self.completed_at.is_some() => {
                Some("processing job has completedAt")
            }
            JobStatus::Processing if self.video_url.is_some() || self.error.is_some() => {
                Some("processing job has an outcome")
            }
            JobStatus::Processing => None,
            _ if self.completed_at.is_none() => Some("finished job has no completedAt"),
            JobStatus::Complete if self.video_url.is_none() => Some("complete job has no videoUrl"),
            JobStatus::Complete if self.error.is_some() => Some("complete job has an error"),
            JobStatus::Error if self.error.is_none() => Some("failed job has no error"),
            JobStatus::Error if self.video_url.is_some() => Some("failed job has a videoUrl"),
            _ => None,
        };

        match problem {
            Some(reason) => Err(JobError::Inconsistent {
                id: self.id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Partial fields merged by `JobQueue::update_job`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<i64>,
}

impl JobUpdate {
    pub fn completed(video_url: impl Into<String>, at: i64) -> Self {
        Self {
            status: Some(JobStatus::Complete),
            video_url: Some(video_url.into()),
            error: None,
            completed_at: Some(at),
        }
    }

    pub fn failed(message: impl Into<String>, at: i64) -> Self {
        Self {
            status: Some(JobStatus::Error),
            video_url: None,
            error: Some(message.into()),
            completed_at: Some(at),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JobError {
    #[error("Job {id} already finished as {status:?}")]
    Finished { id: String, status: JobStatus },

    #[error("Job {id} update rejected: {reason}")]
    Inconsistent { id: String, reason: &'static str },
}
