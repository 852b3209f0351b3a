//! Collaborator interfaces for the import pipeline
//!
//! Trait definitions for everything the pipeline talks to but does not
//! own: the spreadsheet service, the host page/media storage, the async
//! work queue and the durable key-value store backing job state.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A stored page reference in the host content system.
pub type PageId = u64;
/// A stored media asset reference.
pub type AssetId = u64;

/// Fetches the raw 2-D cell grid for an import run.
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Returns all rows in `range`, header row included. Fails when the
    /// source is unreachable or the credentials are misconfigured.
    async fn fetch(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;
}

/// Host page storage: lookup, create/update, meta and taxonomy writes.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Find a published page whose title equals `title` or `alt_title`
    /// (the entity-encoded form, tolerating encoding drift).
    async fn find_by_title(&self, title: &str, alt_title: &str) -> Result<Option<PageId>>;

    /// Fetch the serialized template content of a reusable block, or
    /// `None` when the reference does not resolve to a template block.
    async fn block_template(&self, block_id: u64) -> Result<Option<String>>;

    async fn create(&self, title: &str, body: &str) -> Result<PageId>;
    async fn update(&self, page_id: PageId, body: &str) -> Result<PageId>;
    async fn set_meta(&self, page_id: PageId, key: &str, value: &str) -> Result<()>;

    /// Assign `term_name` in `taxonomy` to the page, creating the term if
    /// needed and replacing prior terms. A missing taxonomy is a no-op.
    async fn set_taxonomy_term(&self, page_id: PageId, taxonomy: &str, term_name: &str)
        -> Result<()>;
}

/// Media sideloading: fetch a remote URL into the host's media library.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_from_url(&self, url: &str) -> Result<AssetId>;
    /// Resolved public URL of a stored asset, `None` when unresolvable.
    async fn public_url(&self, asset_id: AssetId) -> Result<Option<String>>;
}

/// External scheduler for discrete units of work. Chunk steps re-submit
/// their successor through this seam, which is what makes a run survive
/// process restarts between chunks.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Schedule `task` with `args` to run at `run_at`. Returns false when
    /// the queue refused the submission.
    async fn schedule(&self, run_at: DateTime<Utc>, task: &str, args: Value) -> Result<bool>;
}

/// Durable, TTL-capable key-value storage for cross-step job state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Upsert `value`; `ttl_seconds` of `None` means no expiry.
    async fn put(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}
