//! Shared in-memory test doubles
//!
//! Deterministic implementations of the collaborator traits for unit and
//! integration tests. All of them keep their state behind a mutex so a
//! test can hold an `Arc` to the double and inspect it after the code
//! under test ran.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::repositories::{
    AssetId, KeyValueStore, MediaStore, PageId, PageStore, SpreadsheetSource, WorkQueue,
};

/// Key-value store with real TTL semantics, backed by a hash map.
#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

#[async_trait]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).and_then(|(value, expires_at)| {
            match expires_at {
                Some(at) if *at <= Instant::now() => None,
                _ => Some(value.clone()),
            }
        }))
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredPage {
    title: String,
    body: String,
}

#[derive(Default)]
struct PageState {
    next_id: PageId,
    pages: HashMap<PageId, StoredPage>,
    metas: HashMap<(PageId, String), String>,
    terms: HashMap<(PageId, String), String>,
    block_templates: HashMap<u64, String>,
}

/// Page storage double with helpers to seed block templates and inspect
/// the stored pages, meta fields and taxonomy terms.
#[derive(Default)]
pub struct InMemoryPageStore {
    state: Mutex<PageState>,
}

impl InMemoryPageStore {
    pub async fn add_block_template(&self, block_id: u64, template: &str) {
        self.state
            .lock()
            .unwrap()
            .block_templates
            .insert(block_id, template.to_string());
    }

    pub async fn page_count(&self) -> usize {
        self.state.lock().unwrap().pages.len()
    }

    pub async fn page_body(&self, page_id: PageId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(&page_id)
            .map(|p| p.body.clone())
    }

    pub async fn page_title(&self, page_id: PageId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(&page_id)
            .map(|p| p.title.clone())
    }

    pub async fn meta(&self, page_id: PageId, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .metas
            .get(&(page_id, key.to_string()))
            .cloned()
    }

    pub async fn term(&self, page_id: PageId, taxonomy: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .terms
            .get(&(page_id, taxonomy.to_string()))
            .cloned()
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn find_by_title(&self, title: &str, alt_title: &str) -> Result<Option<PageId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .iter()
            .find(|(_, page)| page.title == title || page.title == alt_title)
            .map(|(id, _)| *id))
    }

    async fn block_template(&self, block_id: u64) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .block_templates
            .get(&block_id)
            .cloned())
    }

    async fn create(&self, title: &str, body: &str) -> Result<PageId> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.pages.insert(
            id,
            StoredPage {
                title: title.to_string(),
                body: body.to_string(),
            },
        );
        Ok(id)
    }

    async fn update(&self, page_id: PageId, body: &str) -> Result<PageId> {
        let mut state = self.state.lock().unwrap();
        match state.pages.get_mut(&page_id) {
            Some(page) => {
                page.body = body.to_string();
                Ok(page_id)
            }
            None => Err(anyhow!("page {page_id} does not exist")),
        }
    }

    async fn set_meta(&self, page_id: PageId, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .metas
            .insert((page_id, key.to_string()), value.to_string());
        Ok(())
    }

    async fn set_taxonomy_term(
        &self,
        page_id: PageId,
        taxonomy: &str,
        term_name: &str,
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .terms
            .insert((page_id, taxonomy.to_string()), term_name.to_string());
        Ok(())
    }
}

/// Media double handing out sequential asset ids. The failing variant
/// rejects every sideload, for exercising the field-skip path.
pub struct InMemoryMediaStore {
    fail_uploads: bool,
    next_id: Mutex<AssetId>,
    last_id: Mutex<Option<AssetId>>,
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self {
            fail_uploads: false,
            next_id: Mutex::new(100),
            last_id: Mutex::new(None),
        }
    }
}

impl InMemoryMediaStore {
    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Default::default()
        }
    }

    pub async fn last_asset_id(&self) -> Option<AssetId> {
        *self.last_id.lock().unwrap()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn upload_from_url(&self, url: &str) -> Result<AssetId> {
        if self.fail_uploads {
            return Err(anyhow!("sideload failed for {url}"));
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = *next;
        *self.last_id.lock().unwrap() = Some(id);
        Ok(id)
    }

    async fn public_url(&self, asset_id: AssetId) -> Result<Option<String>> {
        Ok(Some(format!("https://media.local/{asset_id}.jpg")))
    }
}

/// A task accepted by [`InMemoryWorkQueue`].
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub run_at: DateTime<Utc>,
    pub task: String,
    pub args: Value,
}

/// Work queue double that records submissions instead of running them.
/// Tests drain it with [`InMemoryWorkQueue::pop_task`] to drive the chunk
/// loop synchronously. Refusal can be enabled up front or toggled mid-run
/// to stage a queue outage.
pub struct InMemoryWorkQueue {
    refuse: AtomicBool,
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self {
            refuse: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryWorkQueue {
    pub fn refusing() -> Self {
        Self {
            refuse: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub async fn pop_task(&self) -> Option<ScheduledTask> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() {
            None
        } else {
            Some(tasks.remove(0))
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn schedule(&self, run_at: DateTime<Utc>, task: &str, args: Value) -> Result<bool> {
        if self.refuse.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.tasks.lock().unwrap().push(ScheduledTask {
            run_at,
            task: task.to_string(),
            args,
        });
        Ok(true)
    }
}

/// Spreadsheet source returning a fixed grid.
pub struct StaticSheetSource {
    rows: Vec<Vec<String>>,
}

impl StaticSheetSource {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl SpreadsheetSource for StaticSheetSource {
    async fn fetch(&self, _spreadsheet_id: &str, _range: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.rows.clone())
    }
}
