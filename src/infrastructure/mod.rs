//! Infrastructure module - configuration, persistence and logging
//!
//! Concrete plumbing behind the domain seams: the deployment-static import
//! configuration, the durable job store layered over a key-value backend,
//! a sqlite implementation of that backend, and tracing setup.

pub mod config;
pub mod job_store;
pub mod logging;
pub mod sqlite_kv;

pub use config::{BlockConfig, FieldConfig, ImportConfig};
pub use job_store::ImportJobStore;
pub use sqlite_kv::SqliteKv;
