//! Application layer - import orchestration
//!
//! Coordinates the domain logic over the collaborator seams: per-row
//! processing, chunked scheduling and the facade exposed to UI/reporting
//! layers.

pub mod events;
pub mod import_error;
pub mod row_processor;
pub mod scheduler;
pub mod use_cases;

pub use events::{EventEmitter, ImportEvent};
pub use import_error::ImportError;
pub use use_cases::ImportUseCases;
