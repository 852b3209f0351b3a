//! Application facade for the import pipeline
//!
//! Thin orchestration over the domain services: fetches the source sheet,
//! hands rows to the batch scheduler and exposes progress and result
//! queries against the persisted job state.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::info;

use super::events::{EventEmitter, ImportEvent};
use super::import_error::ImportError;
use super::row_processor::RowProcessor;
use super::scheduler::{BatchScheduler, StartReceipt};
use crate::domain::job::{ImportJob, ImportProgress};
use crate::domain::repositories::{KeyValueStore, MediaStore, PageStore, SpreadsheetSource, WorkQueue};
use crate::infrastructure::config::ImportConfig;
use crate::infrastructure::job_store::ImportJobStore;

pub struct ImportUseCases {
    config: Arc<ImportConfig>,
    source: Arc<dyn SpreadsheetSource>,
    scheduler: BatchScheduler,
    job_store: Arc<ImportJobStore>,
    events: EventEmitter,
}

impl ImportUseCases {
    pub fn new(
        config: Arc<ImportConfig>,
        source: Arc<dyn SpreadsheetSource>,
        pages: Arc<dyn PageStore>,
        media: Arc<dyn MediaStore>,
        queue: Arc<dyn WorkQueue>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let events = EventEmitter::default();
        let job_store = Arc::new(ImportJobStore::new(kv, config.job_ttl_seconds));
        let processor = Arc::new(RowProcessor::new(
            Arc::clone(&config),
            pages,
            media,
        ));
        let scheduler = BatchScheduler::new(
            Arc::clone(&config),
            processor,
            Arc::clone(&job_store),
            queue,
            events.clone(),
        );
        Self {
            config,
            source,
            scheduler,
            job_store,
            events,
        }
    }

    /// Fetch the configured sheet, drop the header row and kick off a
    /// chunked run. Returns the job handle the caller polls progress with.
    pub async fn start_import(&self, update_existing: bool) -> Result<StartReceipt> {
        if self.config.spreadsheet_id.trim().is_empty() {
            return Err(ImportError::configuration("spreadsheet id is not configured").into());
        }

        let mut rows = self
            .source
            .fetch(&self.config.spreadsheet_id, &self.config.sheet_range)
            .await?;
        if rows.is_empty() {
            return Err(ImportError::configuration("no data found in spreadsheet").into());
        }

        // Row 1 is the header.
        rows.remove(0);
        if rows.is_empty() {
            return Err(ImportError::configuration(
                "spreadsheet contains only a header row",
            )
            .into());
        }

        info!(
            spreadsheet_id = %self.config.spreadsheet_id,
            range = %self.config.sheet_range,
            rows = rows.len(),
            update_existing,
            "starting import"
        );
        self.scheduler.start(rows, update_existing).await
    }

    /// Entry point for the work queue consumer.
    pub async fn run_chunk(&self, job_id: &str, chunk_index: u32) -> Result<()> {
        self.scheduler.run_chunk(job_id, chunk_index).await
    }

    /// Derived progress for a running or finished job. `None` when the job
    /// is unknown or its state has expired.
    pub async fn get_progress(&self, job_id: &str) -> Result<Option<ImportProgress>> {
        Ok(self
            .job_store
            .get(job_id)
            .await?
            .map(|job| job.progress(self.config.chunk_size)))
    }

    /// Full per-row results for a job, including counters.
    pub async fn get_results(&self, job_id: &str) -> Result<Option<ImportJob>> {
        self.job_store.get(job_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.events.subscribe()
    }
}
