//! Domain module - Core import logic and collaborator seams
//!
//! Contains the field-path resolver, the block-merge engine, the job state
//! model and the trait interfaces behind which the host CMS, spreadsheet
//! client, media library and storage live.

pub mod block_merge;
pub mod field_path;
pub mod job;
pub mod repositories;
pub mod sanitize;

pub use field_path::FieldRef;
pub use job::{ImportJob, RowOutcome, RowStatus};
