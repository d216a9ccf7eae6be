use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub code: String,
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub page_count: usize,
    pub pages: Vec<PageEntry>,
}

impl PageInventoryManifest {
    pub fn find(&self, code: &str) -> Option<&PageEntry> {
        self.pages.iter().find(|page| page.code == code)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub pages_dir: String,
    pub aliases_path: String,
    pub inventory_manifest_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub origins_requested: usize,
    pub origins_processed: usize,
    pub origins_missing: usize,
    pub records_inserted: usize,
    pub unmapped_destinations: usize,
    pub sentinel_records: usize,
    pub records_by_category: BTreeMap<String, usize>,
    pub origins_total: i64,
    pub records_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OriginIngestSummary {
    pub origin: String,
    pub source_sha256: Option<String>,
    pub record_count: usize,
    pub unmapped_count: usize,
    pub sentinel_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub origins: Vec<OriginIngestSummary>,
    pub warnings: Vec<String>,
}
