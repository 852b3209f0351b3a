//! Import pipeline error taxonomy
//!
//! Only the classes that propagate as errors live here: configuration
//! problems abort a run before it starts and surface to the initiator;
//! scheduling refusals stop the run at that point while keeping
//! already-persisted outcomes. Row failures are recorded as outcomes and
//! never escalate, and missing job state silently ends a chunk step
//! (observable through events only), so neither carries a variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("work queue rejected scheduling of chunk {chunk_index} for job {job_id}")]
    Scheduling { job_id: String, chunk_index: u32 },
}

impl ImportError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn scheduling(job_id: impl Into<String>, chunk_index: u32) -> Self {
        Self::Scheduling {
            job_id: job_id.into(),
            chunk_index,
        }
    }
}
