//! Import lifecycle events
//!
//! Fire-and-forget broadcast of run milestones for progress UIs, hooks and
//! tests. The missing-state diagnostic makes the scheduler's silent-abort
//! path observable without turning it into a hard failure.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::job::ImportJob;

/// What piece of durable state a chunk step found absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingState {
    JobRecord,
    ChunkData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    Started {
        job_id: String,
        total_rows: u32,
        total_batches: u32,
    },
    ChunkCompleted {
        job_id: String,
        chunk_index: u32,
        processed_rows: u32,
    },
    Completed {
        job_id: String,
        job: ImportJob,
    },
    StateMissing {
        job_id: String,
        chunk_index: u32,
        what: MissingState,
    },
}

/// Broadcast emitter for import events. Sending never fails the pipeline;
/// an event with no subscribers is simply dropped.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<ImportEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ImportEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}
