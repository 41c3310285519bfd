//! Background poller that advances processing animation jobs.
//!
//! Every tick visits each owner's `processing` jobs. A job older than the
//! timeout is failed without a network call. Otherwise the provider is asked
//! for the task's status: `complete` and `error` are terminal, and anything
//! else (including a transport failure) leaves the job for the next tick.
//! The cadence is fixed, with no backoff or jitter.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::models::job::{AnimationJob, JobUpdate};
use crate::services::job_queue::{JobQueue, QueueError};
use crate::services::runware::{RunwareError, TaskStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Answers "where is this task?" for a provider task UUID.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn task_status(&self, task_uuid: &str) -> Result<TaskStatus, RunwareError>;
}

/// Told once per job when it completes successfully.
pub trait CompletionNotifier: Send + Sync {
    fn job_completed(&self, owner: &str, job: &AnimationJob);
}

/// Logs completions.
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn job_completed(&self, owner: &str, job: &AnimationJob) {
        metrics::counter!("animation_notifications_total").increment(1);
        tracing::info!(
            owner,
            job_id = %job.id,
            style = %job.style,
            video_url = job.video_url.as_deref().unwrap_or_default(),
            "Animation ready"
        );
    }
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Jobs asked about at the provider.
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

pub struct JobPoller {
    queue: Arc<JobQueue>,
    source: Arc<dyn TaskStatusSource>,
    notifier: Arc<dyn CompletionNotifier>,
    interval: Duration,
    timeout: Duration,
}

impl JobPoller {
    pub fn new(
        queue: Arc<JobQueue>,
        source: Arc<dyn TaskStatusSource>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        Self {
            queue,
            source,
            notifier,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn timeout_message(&self) -> String {
        let minutes = self.timeout.as_secs() / 60;
        if minutes > 0 && self.timeout.as_secs() % 60 == 0 {
            format!("Timed out after {minutes} minutes")
        } else {
            format!("Timed out after {} seconds", self.timeout.as_secs())
        }
    }

    /// Advance every processing job once, as of `now_ms` (epoch millis).
    pub async fn tick(&self, now_ms: i64) -> Result<TickReport, QueueError> {
        let mut report = TickReport::default();
        let mut still_processing = 0usize;

        for owner in self.queue.owners().await? {
            let jobs = match self.queue.get_processing_jobs(&owner).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::warn!(owner = %owner, error = %e, "Failed to load jobs, skipping owner");
                    continue;
                }
            };

            for job in jobs {
                match self.advance(&owner, &job, now_ms, &mut report).await {
                    Ok(true) => still_processing += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(owner = %owner, job_id = %job.id, error = %e, "Failed to update job");
                    }
                }
            }
        }

        metrics::gauge!("animation_jobs_processing").set(still_processing as f64);
        Ok(report)
    }

    /// Returns whether the job is still processing afterwards.
    async fn advance(
        &self,
        owner: &str,
        job: &AnimationJob,
        now_ms: i64,
        report: &mut TickReport,
    ) -> Result<bool, QueueError> {
        let timeout_ms = self.timeout.as_millis() as i64;

        if now_ms - job.started_at > timeout_ms {
            let update = JobUpdate::failed(self.timeout_message(), now_ms);
            if self.queue.update_job(owner, &job.id, update).await?.is_some() {
                report.timed_out += 1;
                metrics::counter!("animation_jobs_timed_out").increment(1);
                tracing::warn!(owner, job_id = %job.id, "Animation job timed out");
            }
            return Ok(false);
        }

        report.checked += 1;
        let status = match self.source.task_status(&job.task_uuid).await {
            Ok(status) => status,
            Err(e) => {
                // Transient; try again next tick.
                tracing::debug!(owner, job_id = %job.id, error = %e, "Status check failed");
                return Ok(true);
            }
        };

        match status {
            TaskStatus::Processing => Ok(true),
            TaskStatus::Complete { video_url, cost } => {
                let update = JobUpdate::completed(video_url, now_ms);
                if let Some(done) = self.queue.update_job(owner, &job.id, update).await? {
                    report.completed += 1;
                    metrics::counter!("animation_jobs_completed").increment(1);
                    tracing::info!(owner, job_id = %job.id, cost, "Animation job complete");
                    self.notifier.job_completed(owner, &done);
                }
                Ok(false)
            }
            TaskStatus::Error { message } => {
                let message = if message.is_empty() {
                    "Generation failed".to_string()
                } else {
                    message
                };
                tracing::warn!(owner, job_id = %job.id, error = %message, "Animation job failed");
                if self.queue.update_job(owner, &job.id, JobUpdate::failed(message, now_ms)).await?.is_some() {
                    report.failed += 1;
                    metrics::counter!("animation_jobs_failed").increment(1);
                }
                Ok(false)
            }
        }
    }

    /// Tick immediately, then every interval, until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "Job poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    match self.tick(now_ms).await {
                        Ok(report) if report != TickReport::default() => {
                            tracing::debug!(?report, "Poll tick finished");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Poll tick failed, will retry"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Job poller stopped");
    }
}
