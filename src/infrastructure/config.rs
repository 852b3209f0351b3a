//! Import configuration
//!
//! The block/field mapping is declared statically per deployment and
//! loaded once per run; everything downstream receives the resulting
//! `ImportConfig` value explicitly instead of reading ambient state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mapping from one spreadsheet column to one block field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Flat key or `<group>_<index>_<subfield>` repeater path.
    pub field_id: String,
    /// Zero-based column offset into the row.
    pub column_index: usize,
    /// Sideload the cell value as an image when it is a well-formed URL.
    #[serde(default)]
    pub is_image: bool,
    /// Declared repeater flag from the mapping UI; resolution itself is
    /// name-based, this is informational.
    #[serde(default)]
    pub is_repeater: bool,
}

/// One content block instance on the generated page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Reference to the reusable template block in the host system.
    pub block_id: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Processing position, ascending.
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Fixed semantic column roles of the deployment's sheet layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub title: usize,
    pub seo_title: usize,
    pub seo_keywords: usize,
    pub seo_description: usize,
    pub taxonomy_term: usize,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            title: 5,
            seo_title: 1,
            seo_keywords: 2,
            seo_description: 3,
            taxonomy_term: 4,
        }
    }
}

/// Page meta keys receiving the SEO columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaKeys {
    pub seo_title: String,
    pub seo_keywords: String,
    pub seo_description: String,
}

impl Default for MetaKeys {
    fn default() -> Self {
        Self {
            seo_title: "_yoast_wpseo_title".to_string(),
            seo_keywords: "_yoast_wpseo_focuskw".to_string(),
            seo_description: "_yoast_wpseo_metadesc".to_string(),
        }
    }
}

/// Complete per-deployment import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Spreadsheet reference; empty means the deployment is unconfigured.
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub sheet_range: String,
    /// Rows per chunk step.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Throttling delay between chunk steps.
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_seconds: u64,
    /// Retention of the job progress record.
    #[serde(default = "default_job_ttl")]
    pub job_ttl_seconds: u64,
    /// Taxonomy receiving the term column.
    #[serde(default = "default_taxonomy")]
    pub taxonomy: String,
    #[serde(default)]
    pub columns: ColumnRoles,
    #[serde(default)]
    pub meta_keys: MetaKeys,
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
}

fn default_true() -> bool {
    true
}
fn default_sheet_range() -> String {
    "Sheet1!A:C".to_string()
}
fn default_chunk_size() -> u32 {
    20
}
fn default_chunk_delay() -> u64 {
    10
}
fn default_job_ttl() -> u64 {
    24 * 60 * 60
}
fn default_taxonomy() -> String {
    "roles".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_range: default_sheet_range(),
            chunk_size: default_chunk_size(),
            chunk_delay_seconds: default_chunk_delay(),
            job_ttl_seconds: default_job_ttl(),
            taxonomy: default_taxonomy(),
            columns: ColumnRoles::default(),
            meta_keys: MetaKeys::default(),
            blocks: Vec::new(),
        }
    }
}

impl ImportConfig {
    /// Load from a TOML file layered with `SHEETPRESS_*` environment
    /// overrides. Missing file keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("SHEETPRESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to build import configuration")?;

        settings
            .try_deserialize()
            .context("failed to deserialize import configuration")
    }

    /// Enabled blocks in effective processing order.
    pub fn enabled_blocks(&self) -> Vec<&BlockConfig> {
        let mut blocks: Vec<&BlockConfig> = self.blocks.iter().filter(|b| b.enabled).collect();
        blocks.sort_by_key(|b| b.order);
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: u64, order: i32, enabled: bool) -> BlockConfig {
        BlockConfig {
            block_id: id,
            enabled,
            order,
            fields: Vec::new(),
        }
    }

    #[test]
    fn enabled_blocks_sorted_by_order() {
        let config = ImportConfig {
            blocks: vec![block(1, 3, true), block(2, 1, true), block(3, 2, false)],
            ..Default::default()
        };
        let ids: Vec<u64> = config.enabled_blocks().iter().map(|b| b.block_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn defaults_match_deployment_layout() {
        let config = ImportConfig::default();
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.chunk_delay_seconds, 10);
        assert_eq!(config.job_ttl_seconds, 86_400);
        assert_eq!(config.columns.title, 5);
        assert_eq!(config.taxonomy, "roles");
    }

    #[test]
    fn toml_round_trip_keeps_field_flags() {
        let toml = r#"
            spreadsheet_id = "sheet-1"

            [[blocks]]
            block_id = 42
            order = 1

            [[blocks.fields]]
            field_id = "testimonials_0_quote"
            column_index = 6
            is_repeater = true
        "#;
        let config: ImportConfig = toml_from_str(toml);
        assert_eq!(config.spreadsheet_id, "sheet-1");
        assert_eq!(config.blocks.len(), 1);
        let field = &config.blocks[0].fields[0];
        assert!(field.is_repeater);
        assert!(!field.is_image);
        assert!(config.blocks[0].enabled);
    }

    fn toml_from_str(raw: &str) -> ImportConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
