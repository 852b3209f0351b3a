//! sheetpress - Spreadsheet to content-page import engine
//!
//! Imports tabular rows from an external spreadsheet and materializes each
//! row as a content page: rows are partitioned into fixed-size chunks that
//! run as self-rescheduling async steps, and each row rewrites field values
//! inside serialized content-block payloads before the page is stored.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

pub mod test_utils;

// Re-export the surface consumed by UI/reporting layers
pub use application::use_cases::ImportUseCases;
pub use domain::job::{ImportJob, ImportProgress, RowOutcome, RowStatus};
pub use infrastructure::config::ImportConfig;
