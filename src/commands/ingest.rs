use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::commands::inventory;
use crate::extract::{
    AliasTable, CountryCode, CountryResolver, DocumentSource, Extractor, PageCache, SourceError,
    VisaRequirementsFor,
};
use crate::model::{
    IngestCounts, IngestPaths, IngestRunManifest, OriginIngestSummary, PageInventoryManifest,
};
use crate::store::{self, DB_SCHEMA_VERSION};
use crate::util::{
    ensure_directory, normalize_origin_code, now_utc_string, read_json, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache.cache_root().to_path_buf();
    let manifest_dir = args.cache.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let pages_dir = args.cache.pages_dir();
    let aliases_path = args.cache.aliases_path();
    let db_path = args.cache.db_path();
    let inventory_manifest_path = args.cache.inventory_manifest_path();
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting ingest");

    let inventory =
        load_or_refresh_inventory(&pages_dir, &inventory_manifest_path, args.refresh_inventory)?;
    let origins = select_origins(&args.origins, &inventory);
    if origins.is_empty() {
        bail!("no origins to ingest");
    }

    let aliases = AliasTable::load(&aliases_path)?;
    let resolver = CountryResolver::new(&aliases)?;
    info!(
        codes = aliases.code_count(),
        aliases = resolver.alias_count(),
        "loaded alias table"
    );

    let extractor = Extractor::new()?;
    let source = PageCache::new(&pages_dir).with_filenames(
        inventory
            .pages
            .iter()
            .map(|page| (CountryCode::new(page.code.as_str()), page.filename.clone())),
    );

    let mut connection = store::open(&db_path)?;

    let outcome = ingest_origins(
        &mut connection,
        &extractor,
        &source,
        &resolver,
        &inventory,
        &origins,
        args.strict,
        &started_at,
    )?;

    let mut counts = outcome.counts;
    counts.origins_total = store::count_rows(&connection, "SELECT COUNT(*) FROM origins")?;
    counts.records_total =
        store::count_rows(&connection, "SELECT COUNT(*) FROM visa_requirements")?;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            pages_dir: pages_dir.display().to_string(),
            aliases_path: aliases_path.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts,
        origins: outcome.origins,
        warnings: outcome.warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        origins = manifest.counts.origins_processed,
        missing = manifest.counts.origins_missing,
        records = manifest.counts.records_inserted,
        unmapped = manifest.counts.unmapped_destinations,
        sentinels = manifest.counts.sentinel_records,
        "ingest completed"
    );

    Ok(())
}

#[derive(Debug, Default)]
struct IngestOutcome {
    counts: IngestCounts,
    origins: Vec<OriginIngestSummary>,
    warnings: Vec<String>,
}

impl IngestOutcome {
    fn record(&mut self, summary: &store::StoredOrigin, records: &[VisaRequirementsFor]) {
        self.counts.origins_processed += 1;
        self.counts.records_inserted += records.len();
        self.counts.unmapped_destinations += summary.unmapped_count as usize;
        self.counts.sentinel_records += summary.sentinel_count as usize;
        for record in records {
            *self
                .counts
                .records_by_category
                .entry(record.category.as_str().to_string())
                .or_default() += 1;
        }

        self.origins.push(OriginIngestSummary {
            origin: summary.origin_code.clone(),
            source_sha256: summary.source_sha256.clone(),
            record_count: records.len(),
            unmapped_count: summary.unmapped_count as usize,
            sentinel_count: summary.sentinel_count as usize,
        });
    }
}

/// Extracts and stores every origin in turn. A missing page only skips its
/// origin unless `strict` is set.
#[allow(clippy::too_many_arguments)]
fn ingest_origins(
    connection: &mut Connection,
    extractor: &Extractor,
    source: &dyn DocumentSource,
    resolver: &CountryResolver,
    inventory: &PageInventoryManifest,
    origins: &[CountryCode],
    strict: bool,
    ingested_at: &str,
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();
    outcome.counts.origins_requested = origins.len();

    for origin in origins {
        let records = match extractor.visa_requirements_for(origin, source, resolver) {
            Ok(records) => records,
            Err(err @ SourceError::NotFound { .. }) => {
                if strict {
                    return Err(err).context("strict ingest requires every origin page");
                }
                warn!(origin = %origin, "no source page, skipping origin");
                outcome.counts.origins_missing += 1;
                outcome.warnings.push(err.to_string());
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to fetch page for {origin}"));
            }
        };

        let source_sha256 = inventory.find(origin.as_str()).map(|page| page.sha256.as_str());
        let summary =
            store::replace_origin_records(connection, origin, source_sha256, ingested_at, &records)?;

        if records.is_empty() {
            warn!(origin = %origin, "page has no sortable visa table");
            outcome
                .warnings
                .push(format!("no visa records extracted for {origin}"));
        }

        info!(
            origin = %origin,
            records = summary.record_count,
            unmapped = summary.unmapped_count,
            sentinels = summary.sentinel_count,
            "stored origin records"
        );

        outcome.record(&summary, &records);
    }

    Ok(outcome)
}

fn load_or_refresh_inventory(
    pages_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<PageInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(pages_dir)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            page_count = manifest.page_count,
            "refreshed page inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: PageInventoryManifest = read_json(inventory_manifest_path)?;

    info!(
        path = %inventory_manifest_path.display(),
        page_count = manifest.page_count,
        "loaded existing page inventory manifest"
    );

    Ok(manifest)
}

/// Requested origins in the order given, deduplicated; every inventoried page
/// when none were requested.
fn select_origins(requested: &[String], inventory: &PageInventoryManifest) -> Vec<CountryCode> {
    let mut origins = Vec::<CountryCode>::new();

    let codes = if requested.is_empty() {
        inventory
            .pages
            .iter()
            .map(|page| page.code.clone())
            .collect::<Vec<String>>()
    } else {
        requested
            .iter()
            .map(|code| normalize_origin_code(code))
            .collect::<Vec<String>>()
    };

    for code in codes {
        if code.is_empty() {
            continue;
        }
        let code = CountryCode::new(code);
        if !origins.contains(&code) {
            origins.push(code);
        }
    }

    origins
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut parts = vec![
        "visareq".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache.cache_root().display().to_string(),
    ];

    for origin in &args.origins {
        parts.push("--origin".to_string());
        parts.push(origin.clone());
    }
    if args.refresh_inventory {
        parts.push("--refresh-inventory".to_string());
    }
    if args.strict {
        parts.push("--strict".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::cli::CacheArgs;
    use crate::extract::{Destination, VisaCategory};

    const GB_PAGE: &str = r#"
    <html><body>
    <table class="wikitable sortable">
      <tr><th>Country</th><th>Visa requirement</th><th>Allowed stay</th><th>Notes</th></tr>
      <tr><td>Ireland</td><td>Visa not required</td><td>Unlimited</td><td>✓</td></tr>
      <tr><td>Kosovo*</td><td>Visa not required</td><td>90 days</td><td>X</td></tr>
      <tr><td>Peru</td><td>eVisa</td><td>30 days</td><td>Online application</td></tr>
    </table>
    </body></html>
    "#;

    fn fixture_cache(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("visareq-{name}-{}", std::process::id()));
        fs::remove_dir_all(&root).ok();
        fs::create_dir_all(root.join("pages")).expect("pages dir should be creatable");
        fs::write(root.join("pages").join("GB.html"), GB_PAGE).expect("page should be writable");
        fs::write(
            root.join("country_aliases.json"),
            r#"{"IE": ["Ireland"], "PE": ["Peru"], "GB": ["United Kingdom"]}"#,
        )
        .expect("aliases should be writable");
        root
    }

    fn ingest_args(root: &Path, origins: &[&str], strict: bool) -> IngestArgs {
        IngestArgs {
            cache: CacheArgs {
                cache_root: root.to_path_buf(),
                pages_dir: None,
                aliases_path: None,
                db_path: None,
            },
            ingest_manifest_path: Some(root.join("manifests").join("ingest_run_test.json")),
            refresh_inventory: true,
            origins: origins.iter().map(|origin| origin.to_string()).collect(),
            strict,
        }
    }

    #[test]
    fn select_origins_normalizes_and_deduplicates() {
        let inventory = PageInventoryManifest {
            manifest_version: 1,
            generated_at: String::new(),
            source_directory: String::new(),
            page_count: 0,
            pages: Vec::new(),
        };

        let origins = select_origins(
            &["gb".to_string(), " GB ".to_string(), "fr".to_string()],
            &inventory,
        );

        assert_eq!(origins, vec![CountryCode::from("GB"), CountryCode::from("FR")]);
    }

    #[test]
    fn run_stores_records_and_skips_missing_origins() {
        let root = fixture_cache("ingest");

        run(ingest_args(&root, &["gb", "fr"], false)).expect("ingest should succeed");

        let connection = Connection::open(root.join("visareq.sqlite")).expect("db should open");
        let records = store::load_origin_records(&connection, &CountryCode::from("GB"))
            .expect("records should load");
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0].destination,
            Destination::Resolved(CountryCode::from("IE"))
        );
        assert_eq!(records[0].description, "Unlimited");
        assert_eq!(records[1].destination.code(), CountryCode::from("Kosovo*"));
        assert_eq!(records[2].category, VisaCategory::EVisa);
        assert_eq!(records[2].description, "30 days Online application");

        let manifest: serde_json::Value =
            read_json(&root.join("manifests").join("ingest_run_test.json"))
                .expect("manifest should parse");
        assert_eq!(manifest["counts"]["origins_processed"], 1);
        assert_eq!(manifest["counts"]["origins_missing"], 1);
        assert_eq!(manifest["counts"]["unmapped_destinations"], 1);
        assert_eq!(manifest["counts"]["records_by_category"]["visa_free"], 2);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn run_in_strict_mode_fails_on_missing_origin() {
        let root = fixture_cache("ingest-strict");

        let err = run(ingest_args(&root, &["FR"], true)).expect_err("FR has no page");

        assert!(
            err.chain()
                .any(|cause| cause.to_string().contains("no source page for country FR"))
        );

        fs::remove_dir_all(&root).ok();
    }
}
