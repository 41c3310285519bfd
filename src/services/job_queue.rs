//! Per-owner list of animation jobs.
//!
//! Each owner's jobs are a single JSON blob, newest first. Every mutation is
//! a whole-blob read-modify-write with no locking: two writers racing on the
//! same owner can lose an update (last write wins).

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::models::job::{AnimationJob, JobError, JobStatus, JobUpdate};

const STORAGE_KEY: &str = "mymeme_animation_jobs";
const OWNERS_KEY: &str = "mymeme_animation_jobs:owners";

/// Most recent jobs kept per owner.
pub const MAX_JOBS: usize = 20;

/// Persistence for job blobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError>;
    async fn save(&self, owner: &str, jobs: &[AnimationJob]) -> Result<(), QueueError>;
    /// Owners with a stored list.
    async fn owners(&self) -> Result<Vec<String>, QueueError>;
}

/// Redis-backed job store: one string key per owner plus an owner index set.
pub struct RedisJobStore {
    client: redis::Client,
}

impl RedisJobStore {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    fn key(owner: &str) -> String {
        format!("{STORAGE_KEY}:{owner}")
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn load(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(Self::key(owner)).await?;

        let Some(payload) = stored else {
            return Ok(Vec::new());
        };

        // An unreadable blob is treated as empty; the next save replaces it.
        match serde_json::from_str(&payload) {
            Ok(jobs) => Ok(jobs),
            Err(e) => {
                tracing::warn!(owner, error = %e, "Discarding unreadable job list");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, owner: &str, jobs: &[AnimationJob]) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        if jobs.is_empty() {
            conn.del::<_, ()>(Self::key(owner)).await?;
            conn.srem::<_, _, ()>(OWNERS_KEY, owner).await?;
            return Ok(());
        }

        let payload = serde_json::to_string(jobs)?;
        conn.set::<_, _, ()>(Self::key(owner), payload).await?;
        conn.sadd::<_, _, ()>(OWNERS_KEY, owner).await?;
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<String>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let owners: Vec<String> = conn.smembers(OWNERS_KEY).await?;
        Ok(owners)
    }
}

/// In-process job store.
#[derive(Default)]
pub struct MemoryJobStore {
    lists: Mutex<HashMap<String, Vec<AnimationJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError> {
        Ok(self.lists.lock().await.get(owner).cloned().unwrap_or_default())
    }

    async fn save(&self, owner: &str, jobs: &[AnimationJob]) -> Result<(), QueueError> {
        let mut lists = self.lists.lock().await;
        if jobs.is_empty() {
            lists.remove(owner);
        } else {
            lists.insert(owner.to_string(), jobs.to_vec());
        }
        Ok(())
    }

    async fn owners(&self) -> Result<Vec<String>, QueueError> {
        let mut owners: Vec<String> = self.lists.lock().await.keys().cloned().collect();
        owners.sort();
        Ok(owners)
    }
}

/// Change notification emitted after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Updated { owner: String },
}

/// Job list operations over a [`JobStore`].
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    events: broadcast::Sender<JobEvent>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { store, events }
    }

    /// Receive `JobEvent`s for every subsequent mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn notify(&self, owner: &str) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent::Updated {
            owner: owner.to_string(),
        });
    }

    pub async fn get_jobs(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError> {
        self.store.load(owner).await
    }

    pub async fn get_processing_jobs(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError> {
        self.with_status(owner, JobStatus::Processing).await
    }

    pub async fn get_completed_jobs(&self, owner: &str) -> Result<Vec<AnimationJob>, QueueError> {
        self.with_status(owner, JobStatus::Complete).await
    }

    async fn with_status(
        &self,
        owner: &str,
        status: JobStatus,
    ) -> Result<Vec<AnimationJob>, QueueError> {
        let jobs = self.store.load(owner).await?;
        Ok(jobs.into_iter().filter(|j| j.status == status).collect())
    }

    pub async fn owners(&self) -> Result<Vec<String>, QueueError> {
        self.store.owners().await
    }

    /// Prepend a job, keeping only the `MAX_JOBS` most recent.
    pub async fn add_job(&self, owner: &str, job: AnimationJob) -> Result<(), QueueError> {
        let mut jobs = self.store.load(owner).await?;
        jobs.insert(0, job);
        jobs.truncate(MAX_JOBS);
        self.store.save(owner, &jobs).await?;
        self.notify(owner);
        Ok(())
    }

    /// Merge `update` into the job with `id`.
    ///
    /// Returns the merged job, or `None` (and emits nothing) when no job has
    /// that id.
    pub async fn update_job(
        &self,
        owner: &str,
        id: &str,
        update: JobUpdate,
    ) -> Result<Option<AnimationJob>, QueueError> {
        let mut jobs = self.store.load(owner).await?;
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };

        job.apply(update)?;
        let merged = job.clone();

        self.store.save(owner, &jobs).await?;
        self.notify(owner);
        Ok(Some(merged))
    }

    pub async fn remove_job(&self, owner: &str, id: &str) -> Result<(), QueueError> {
        let mut jobs = self.store.load(owner).await?;
        jobs.retain(|j| j.id != id);
        self.store.save(owner, &jobs).await?;
        self.notify(owner);
        Ok(())
    }

    /// Drop every finished job (complete or error), keeping those still processing.
    pub async fn clear_completed_jobs(&self, owner: &str) -> Result<(), QueueError> {
        let mut jobs = self.store.load(owner).await?;
        jobs.retain(|j| j.status == JobStatus::Processing);
        self.store.save(owner, &jobs).await?;
        self.notify(owner);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Job(#[from] JobError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn job(id: &str, started_at: i64) -> AnimationJob {
        AnimationJob::submitted(id, "https://img/src.png", "", "original", started_at)
    }

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(MemoryJobStore::new()))
    }

    #[tokio::test]
    async fn test_add_job_is_newest_first_and_capped() {
        let q = queue();
        for i in 0..25 {
            assert_ok!(q.add_job("u1", job(&format!("job-{i}"), i)).await);
            assert!(q.get_jobs("u1").await.unwrap().len() <= MAX_JOBS);
        }

        let jobs = q.get_jobs("u1").await.unwrap();
        assert_eq!(jobs.len(), MAX_JOBS);
        assert_eq!(jobs[0].id, "job-24");
        assert_eq!(jobs[MAX_JOBS - 1].id, "job-5");
        assert!(jobs.windows(2).all(|w| w[0].started_at > w[1].started_at));
    }

    #[tokio::test]
    async fn test_update_job_merges_and_notifies() {
        let q = queue();
        q.add_job("u1", job("a", 1)).await.unwrap();
        let mut rx = q.subscribe();

        let merged = q
            .update_job("u1", "a", JobUpdate::completed("https://x/y.mp4", 10))
            .await
            .unwrap()
            .expect("job exists");

        assert_eq!(merged.status, JobStatus::Complete);
        assert_eq!(q.get_completed_jobs("u1").await.unwrap().len(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent::Updated {
                owner: "u1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_update_unknown_job_is_noop() {
        let q = queue();
        q.add_job("u1", job("a", 1)).await.unwrap();
        let mut rx = q.subscribe();

        let result = q
            .update_job("u1", "missing", JobUpdate::failed("x", 2))
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(q.get_processing_jobs("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_of_finished_job_is_rejected() {
        let q = queue();
        q.add_job("u1", job("a", 1)).await.unwrap();
        q.update_job("u1", "a", JobUpdate::failed("boom", 2))
            .await
            .unwrap();

        let err = q
            .update_job("u1", "a", JobUpdate::completed("https://x/y.mp4", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Job(_)));

        let stored = &q.get_jobs("u1").await.unwrap()[0];
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.completed_at, Some(2));
    }

    #[tokio::test]
    async fn test_remove_and_clear_completed() {
        let q = queue();
        q.add_job("u1", job("a", 1)).await.unwrap();
        q.add_job("u1", job("b", 2)).await.unwrap();
        q.add_job("u1", job("c", 3)).await.unwrap();
        q.update_job("u1", "a", JobUpdate::completed("v", 4))
            .await
            .unwrap();
        q.update_job("u1", "b", JobUpdate::failed("e", 4))
            .await
            .unwrap();

        q.clear_completed_jobs("u1").await.unwrap();
        let ids: Vec<_> = q
            .get_jobs("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec!["c"]);

        q.remove_job("u1", "c").await.unwrap();
        assert!(q.get_jobs("u1").await.unwrap().is_empty());
        assert!(q.owners().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let q = queue();
        q.add_job("u1", job("a", 1)).await.unwrap();
        q.add_job("u2", job("b", 1)).await.unwrap();

        assert_eq!(q.owners().await.unwrap(), vec!["u1", "u2"]);
        assert_eq!(q.get_jobs("u2").await.unwrap()[0].id, "b");
    }
}
