//! Chunked import scheduling
//!
//! A run is partitioned into fixed-size chunks persisted up front; each
//! chunk executes as one discrete task dispatched through the external
//! work queue and re-submits its successor when it finishes. Chunks for a
//! job never overlap, which keeps counters race-free and row numbering
//! monotonic. All inter-chunk state lives in the durable job store, so a
//! run survives process restarts between chunks.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::events::{EventEmitter, ImportEvent, MissingState};
use super::import_error::ImportError;
use super::row_processor::RowProcessor;
use crate::domain::job::{ImportJob, RowOutcome, RowStatus};
use crate::domain::repositories::WorkQueue;
use crate::domain::sanitize;
use crate::infrastructure::config::ImportConfig;
use crate::infrastructure::job_store::ImportJobStore;

/// Task name under which chunk steps are submitted to the work queue.
pub const CHUNK_TASK: &str = "sheetpress.process_chunk";

/// Rows are padded to this many columns before processing.
const MIN_COLUMNS: usize = 3;

/// Immediate response to the initiator of a run.
#[derive(Debug, Clone)]
pub struct StartReceipt {
    pub job_id: String,
    pub total_rows: u32,
    pub total_batches: u32,
}

pub struct BatchScheduler {
    config: Arc<ImportConfig>,
    processor: Arc<RowProcessor>,
    job_store: Arc<ImportJobStore>,
    queue: Arc<dyn WorkQueue>,
    events: EventEmitter,
}

impl BatchScheduler {
    pub fn new(
        config: Arc<ImportConfig>,
        processor: Arc<RowProcessor>,
        job_store: Arc<ImportJobStore>,
        queue: Arc<dyn WorkQueue>,
        events: EventEmitter,
    ) -> Self {
        Self {
            config,
            processor,
            job_store,
            queue,
            events,
        }
    }

    /// Partition `rows`, persist the run state and schedule chunk 0 to run
    /// immediately. Fails when there are no rows or the queue refuses the
    /// first submission; nothing is retried automatically.
    pub async fn start(
        &self,
        rows: Vec<Vec<String>>,
        update_existing: bool,
    ) -> Result<StartReceipt> {
        if rows.is_empty() {
            return Err(ImportError::configuration("no data rows to import").into());
        }

        let job_id = format!("import-{}", Uuid::new_v4());
        let total_rows = rows.len() as u32;
        let chunks = partition(rows, self.config.chunk_size as usize);
        let total_batches = chunks.len() as u32;

        self.job_store
            .put(&ImportJob::new(job_id.clone(), total_rows))
            .await
            .context("failed to initialize job record")?;
        self.job_store
            .put_chunks(&job_id, &chunks)
            .await
            .context("failed to persist chunk partition")?;
        self.job_store
            .put_update_existing(&job_id, update_existing)
            .await
            .context("failed to persist run settings")?;

        let accepted = self
            .queue
            .schedule(
                Utc::now(),
                CHUNK_TASK,
                json!({ "job_id": job_id, "chunk_index": 0 }),
            )
            .await?;
        if !accepted {
            return Err(ImportError::scheduling(job_id, 0).into());
        }

        info!(%job_id, total_rows, total_batches, "import started");
        self.events.emit(ImportEvent::Started {
            job_id: job_id.clone(),
            total_rows,
            total_batches,
        });

        Ok(StartReceipt {
            job_id,
            total_rows,
            total_batches,
        })
    }

    /// Execute one chunk step.
    ///
    /// Missing job or chunk state ends the step silently (the job was
    /// cleaned up or the id is stale); a diagnostic event is emitted so
    /// the path stays observable. Row failures are recorded as outcomes
    /// and never abort the chunk.
    pub async fn run_chunk(&self, job_id: &str, chunk_index: u32) -> Result<()> {
        let Some(mut job) = self.job_store.get(job_id).await? else {
            warn!(%job_id, chunk_index, "job record missing or expired, step abandoned");
            self.events.emit(ImportEvent::StateMissing {
                job_id: job_id.to_string(),
                chunk_index,
                what: MissingState::JobRecord,
            });
            return Ok(());
        };

        let chunks = self.job_store.get_chunks(job_id).await?;
        let Some(chunk) = chunks
            .as_ref()
            .and_then(|all| all.get(chunk_index as usize))
        else {
            warn!(%job_id, chunk_index, "chunk data missing, step abandoned");
            self.events.emit(ImportEvent::StateMissing {
                job_id: job_id.to_string(),
                chunk_index,
                what: MissingState::ChunkData,
            });
            return Ok(());
        };
        let total_chunks = chunks.as_ref().map(Vec::len).unwrap_or(0) as u32;

        let update_existing = self.job_store.get_update_existing(job_id).await?;

        for (offset, row) in chunk.iter().enumerate() {
            let mut padded = row.clone();
            if padded.len() < MIN_COLUMNS {
                padded.resize(MIN_COLUMNS, String::new());
            }

            let row_number = chunk_index * self.config.chunk_size + offset as u32 + 2;
            let report_title = padded
                .first()
                .map(|cell| sanitize::plain_text(cell))
                .unwrap_or_else(|| "Unknown".to_string());

            let outcome = match self.processor.process(&padded, update_existing).await {
                Ok(result) => RowOutcome {
                    row_number,
                    title: report_title,
                    status: result.status,
                    message: result.message,
                    page_id: result.page_id,
                },
                Err(e) => {
                    error!(%job_id, row_number, error = %e, "row processing failed");
                    RowOutcome {
                        row_number,
                        title: report_title,
                        status: RowStatus::Error,
                        message: e.to_string(),
                        page_id: None,
                    }
                }
            };
            job.record(outcome);
        }

        let is_last = chunk_index + 1 >= total_chunks;
        if is_last {
            job.completed = true;
        }
        self.job_store.put(&job).await?;

        self.events.emit(ImportEvent::ChunkCompleted {
            job_id: job_id.to_string(),
            chunk_index,
            processed_rows: job.processed(),
        });

        if is_last {
            self.job_store.cleanup_run(job_id).await?;
            info!(
                %job_id,
                created = job.created,
                updated = job.updated,
                skipped = job.skipped,
                errors = job.errors,
                "import completed"
            );
            self.events.emit(ImportEvent::Completed {
                job_id: job_id.to_string(),
                job,
            });
            return Ok(());
        }

        // Throttle: the successor runs after a fixed delay.
        let run_at = Utc::now() + Duration::seconds(self.config.chunk_delay_seconds as i64);
        let next_index = chunk_index + 1;
        let accepted = self
            .queue
            .schedule(
                run_at,
                CHUNK_TASK,
                json!({ "job_id": job_id, "chunk_index": next_index }),
            )
            .await?;
        if !accepted {
            // Already-persisted outcomes stay valid; the run simply stops.
            return Err(ImportError::scheduling(job_id, next_index).into());
        }
        Ok(())
    }
}

/// Split rows into fixed-size chunks, last one short.
fn partition(rows: Vec<Vec<String>>, size: usize) -> Vec<Vec<Vec<String>>> {
    rows.chunks(size.max(1)).map(<[Vec<String>]>::to_vec).collect()
}
