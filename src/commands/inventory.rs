use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{PageEntry, PageInventoryManifest};
use crate::util::{normalize_origin_code, now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.cache.pages_dir())?;

    if args.dry_run {
        info!(
            page_count = manifest.page_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.cache.inventory_manifest_path());

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote page inventory manifest");
    info!(page_count = manifest.page_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(pages_dir: &Path) -> Result<PageInventoryManifest> {
    let page_paths = discover_pages(pages_dir)?;

    if page_paths.is_empty() {
        bail!("no HTML pages found in {}", pages_dir.display());
    }

    let mut pages = Vec::with_capacity(page_paths.len());
    for path in page_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
        let code = origin_code_from_path(&path)?;
        let sha256 = sha256_file(&path)?;

        pages.push(PageEntry {
            code,
            filename,
            sha256,
        });
    }

    pages.sort_by(|a, b| a.code.cmp(&b.code).then(a.filename.cmp(&b.filename)));

    Ok(PageInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: pages_dir.display().to_string(),
        page_count: pages.len(),
        pages,
    })
}

fn discover_pages(pages_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();

    let entries = fs::read_dir(pages_dir)
        .with_context(|| format!("failed to read {}", pages_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", pages_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("html"))
            .unwrap_or(false);

        if is_html {
            pages.push(path);
        }
    }

    Ok(pages)
}

fn origin_code_from_path(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("invalid page filename: {}", path.display()))?;

    let code = normalize_origin_code(stem);
    if code.is_empty() {
        bail!("page filename has no country code: {}", path.display());
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_manifest_hashes_html_pages_sorted_by_code() {
        let dir = std::env::temp_dir().join(format!("visareq-inventory-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        fs::write(dir.join("gb.html"), "<table></table>").expect("fixture should be writable");
        fs::write(dir.join("AL.html"), "<table></table>").expect("fixture should be writable");
        fs::write(dir.join("notes.txt"), "ignored").expect("fixture should be writable");

        let manifest = build_manifest(&dir).expect("manifest should build");

        assert_eq!(manifest.page_count, 2);
        assert_eq!(manifest.pages[0].code, "AL");
        assert_eq!(manifest.pages[1].code, "GB");
        assert_eq!(manifest.pages[1].filename, "gb.html");
        assert_eq!(manifest.pages[0].sha256, manifest.pages[1].sha256);
        assert_eq!(manifest.pages[0].sha256.len(), 64);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn build_manifest_fails_without_pages() {
        let dir =
            std::env::temp_dir().join(format!("visareq-inventory-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");

        assert!(build_manifest(&dir).is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
