//! Per-row import processing
//!
//! Turns one spreadsheet row into a page body by merging mapped cell
//! values into each configured block template, then creates, updates or
//! skips the target page. Field-level failures (missing columns, failed
//! image sideloads, unresolved block references) degrade to skipping that
//! piece; only a storage failure on the final write makes the row an
//! `error` outcome.

use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::block_merge;
use crate::domain::field_path::FieldRef;
use crate::domain::job::RowStatus;
use crate::domain::repositories::{MediaStore, PageId, PageStore};
use crate::domain::sanitize;
use crate::infrastructure::config::ImportConfig;

/// Row outcome before the scheduler attaches the spreadsheet row number
/// and reporting title.
#[derive(Debug, Clone)]
pub struct RowResult {
    pub status: RowStatus,
    pub message: String,
    pub page_id: Option<PageId>,
}

impl RowResult {
    fn skipped(message: &str) -> Self {
        Self {
            status: RowStatus::Skipped,
            message: message.to_string(),
            page_id: None,
        }
    }
}

pub struct RowProcessor {
    config: Arc<ImportConfig>,
    pages: Arc<dyn PageStore>,
    media: Arc<dyn MediaStore>,
}

impl RowProcessor {
    pub fn new(
        config: Arc<ImportConfig>,
        pages: Arc<dyn PageStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config,
            pages,
            media,
        }
    }

    /// Process one row. Storage write failures become `error` outcomes;
    /// an `Err` return is reserved for unexpected collaborator failures
    /// and is caught by the chunk step.
    pub async fn process(&self, row: &[String], update_existing: bool) -> Result<RowResult> {
        if row.is_empty() {
            return Ok(RowResult::skipped(
                "Insufficient data (need at least title column)",
            ));
        }

        let title = sanitize::plain_text(
            row.get(self.config.columns.title).map(String::as_str).unwrap_or(""),
        );
        if title.is_empty() {
            return Ok(RowResult::skipped("Empty title"));
        }

        // Tolerate encoding drift: stored titles may carry HTML entities.
        let alt_title = sanitize::encode_entities(&title);
        let existing = self.pages.find_by_title(&title, &alt_title).await?;
        debug!(%title, ?existing, "looked up existing page");

        if let Some(page_id) = existing {
            if !update_existing {
                return Ok(RowResult {
                    status: RowStatus::Skipped,
                    message: "Page already exists".to_string(),
                    page_id: Some(page_id),
                });
            }
        }

        let body = self.assemble_body(row).await?;

        let (page_id, status, message) = match existing {
            Some(page_id) => match self.pages.update(page_id, &body).await {
                Ok(id) => (id, RowStatus::Updated, "Page updated successfully"),
                Err(e) => {
                    return Ok(RowResult {
                        status: RowStatus::Error,
                        message: e.to_string(),
                        page_id: Some(page_id),
                    });
                }
            },
            None => match self.pages.create(&title, &body).await {
                Ok(id) => (id, RowStatus::Created, "Page created successfully"),
                Err(e) => {
                    return Ok(RowResult {
                        status: RowStatus::Error,
                        message: e.to_string(),
                        page_id: None,
                    });
                }
            },
        };

        self.apply_seo_meta(page_id, row).await;
        self.apply_taxonomy(page_id, row).await;

        info!(%title, page_id, ?status, "row processed");
        Ok(RowResult {
            status,
            message: message.to_string(),
            page_id: Some(page_id),
        })
    }

    /// Merge mapped cells into each enabled block template, in order, and
    /// concatenate the results with blank-line separators.
    async fn assemble_body(&self, row: &[String]) -> Result<String> {
        let mut body = String::new();

        for block in self.config.enabled_blocks() {
            // Fresh template per row, never a mutated cached copy.
            let Some(template) = self.pages.block_template(block.block_id).await? else {
                warn!(block_id = block.block_id, "block reference did not resolve, skipping");
                continue;
            };

            let mut content = template;
            for field in &block.fields {
                let Some(cell) = row.get(field.column_index) else {
                    continue;
                };
                content = self.merge_field(content, field, cell).await;
            }

            let stripped = strip_block_wrapper(&content, block.block_id);
            body.push_str(stripped.trim());
            body.push_str("\n\n");
        }

        Ok(body)
    }

    async fn merge_field(
        &self,
        content: String,
        field: &crate::infrastructure::config::FieldConfig,
        cell: &str,
    ) -> String {
        let field_ref = FieldRef::parse(&field.field_id);

        let value: Value = if field.is_image && Url::parse(cell).is_ok() {
            match self.media.upload_from_url(cell).await {
                Ok(asset_id) => json!(asset_id),
                Err(e) => {
                    // Field-level abort only; the row keeps going.
                    warn!(field_id = %field.field_id, url = %cell, error = %e,
                        "image sideload failed, field skipped");
                    return content;
                }
            }
        } else {
            json!(sanitize::rich_text(cell))
        };

        // Companion URL is emitted for image-named fields holding a
        // numeric asset reference; an unresolvable URL is skipped.
        let image_url = if field_ref.is_image_field() && value.is_u64() {
            match self.media.public_url(value.as_u64().unwrap_or(0)).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(field_id = %field.field_id, error = %e, "asset URL lookup failed");
                    None
                }
            }
        } else {
            None
        };

        block_merge::merge(&content, &field_ref, &value, image_url.as_deref())
    }

    async fn apply_seo_meta(&self, page_id: PageId, row: &[String]) {
        let columns = &self.config.columns;
        let keys = &self.config.meta_keys;
        let pairs = [
            (columns.seo_title, &keys.seo_title),
            (columns.seo_keywords, &keys.seo_keywords),
            (columns.seo_description, &keys.seo_description),
        ];

        for (column, key) in pairs {
            let value = sanitize::plain_text(row.get(column).map(String::as_str).unwrap_or(""));
            if value.is_empty() {
                continue;
            }
            if let Err(e) = self.pages.set_meta(page_id, key, &value).await {
                warn!(page_id, key = %key, error = %e, "failed to set meta field");
            }
        }
    }

    async fn apply_taxonomy(&self, page_id: PageId, row: &[String]) {
        let term = sanitize::plain_text(
            row.get(self.config.columns.taxonomy_term).map(String::as_str).unwrap_or(""),
        );
        if term.is_empty() {
            return;
        }
        if let Err(e) = self
            .pages
            .set_taxonomy_term(page_id, &self.config.taxonomy, &term)
            .await
        {
            warn!(page_id, term = %term, error = %e, "failed to assign taxonomy term");
        }
    }
}

/// Remove the reusable-block container wrapper, keeping the inner markup.
fn strip_block_wrapper(content: &str, block_id: u64) -> String {
    let pattern = format!(
        r#"(?s)<!-- wp:block \{{"ref":{block_id}\}} -->(.*)<!-- /wp:block -->"#
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(content, "$1").into_owned(),
        Err(_) => content.to_string(),
    }
}
