use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "visareq",
    version,
    about = "Visa requirement table extraction and lookup tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Query(QueryArgs),
    Status(StatusArgs),
}

/// Locations shared by every command, all defaulting under the cache root.
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[arg(long, default_value = ".cache/visareq")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub pages_dir: Option<PathBuf>,

    #[arg(long)]
    pub aliases_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl CacheArgs {
    pub fn manifest_dir(&self) -> PathBuf {
        self.cache_root.join("manifests")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.pages_dir
            .clone()
            .unwrap_or_else(|| self.cache_root.join("pages"))
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.aliases_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("country_aliases.json"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("visareq.sqlite"))
    }

    pub fn inventory_manifest_path(&self) -> PathBuf {
        self.manifest_dir().join("page_inventory.json")
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    #[arg(long = "origin")]
    pub origins: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[arg(long)]
    pub origin: String,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = false)]
    pub unmapped_only: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}
