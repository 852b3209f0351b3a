//! Durable import-job state
//!
//! Persists the `ImportJob` progress blob plus the chunk partition and the
//! per-job `update_existing` flag under the job id namespace. The progress
//! blob is rewritten whole after each chunk (readers never observe a
//! partial record); the side records are bulky, carry no TTL and are
//! deleted once the run completes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::job::ImportJob;
use crate::domain::repositories::KeyValueStore;

pub struct ImportJobStore {
    kv: Arc<dyn KeyValueStore>,
    job_ttl_seconds: u64,
}

impl ImportJobStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, job_ttl_seconds: u64) -> Self {
        Self { kv, job_ttl_seconds }
    }

    fn job_key(job_id: &str) -> String {
        format!("job:{job_id}")
    }

    fn chunks_key(job_id: &str) -> String {
        format!("job:{job_id}:chunks")
    }

    fn flag_key(job_id: &str) -> String {
        format!("job:{job_id}:update_existing")
    }

    /// `None` means the job never existed, expired, or was cleaned up —
    /// all equivalent terminal signals for consumers.
    pub async fn get(&self, job_id: &str) -> Result<Option<ImportJob>> {
        match self.kv.get(&Self::job_key(job_id)).await? {
            Some(raw) => {
                let job = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt job record for {job_id}"))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Atomic whole-record swap.
    pub async fn put(&self, job: &ImportJob) -> Result<()> {
        let raw = serde_json::to_string(job).context("failed to encode job record")?;
        self.kv
            .put(&Self::job_key(&job.id), &raw, Some(self.job_ttl_seconds))
            .await
    }

    /// Persist the chunk partition for a run. Kept outside the progress
    /// record because it can be large and is consumed exactly once.
    pub async fn put_chunks(&self, job_id: &str, chunks: &[Vec<Vec<String>>]) -> Result<()> {
        let raw = serde_json::to_string(chunks).context("failed to encode chunk partition")?;
        self.kv.put(&Self::chunks_key(job_id), &raw, None).await
    }

    pub async fn get_chunks(&self, job_id: &str) -> Result<Option<Vec<Vec<Vec<String>>>>> {
        match self.kv.get(&Self::chunks_key(job_id)).await? {
            Some(raw) => {
                let chunks = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt chunk partition for {job_id}"))?;
                Ok(Some(chunks))
            }
            None => Ok(None),
        }
    }

    pub async fn put_update_existing(&self, job_id: &str, update_existing: bool) -> Result<()> {
        self.kv
            .put(&Self::flag_key(job_id), if update_existing { "1" } else { "0" }, None)
            .await
    }

    pub async fn get_update_existing(&self, job_id: &str) -> Result<bool> {
        Ok(self
            .kv
            .get(&Self::flag_key(job_id))
            .await?
            .is_some_and(|v| v == "1"))
    }

    /// Drop the consumed side records once the last chunk finished. The
    /// progress blob stays behind until its TTL runs out.
    pub async fn cleanup_run(&self, job_id: &str) -> Result<()> {
        self.kv.delete(&Self::chunks_key(job_id)).await?;
        self.kv.delete(&Self::flag_key(job_id)).await?;
        debug!(job_id, "cleaned up chunk partition and run settings");
        Ok(())
    }
}
