use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::extract::{AliasTable, CountryResolver};
use crate::model::PageInventoryManifest;
use crate::store;
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let inventory_path = args.cache.inventory_manifest_path();
    let aliases_path = args.cache.aliases_path();
    let db_path = args.cache.db_path();

    info!(cache_root = %args.cache.cache_root().display(), "status requested");

    if inventory_path.exists() {
        let inventory: PageInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            page_count = inventory.page_count,
            source = %inventory.source_directory,
            "loaded page inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "page inventory manifest missing");
    }

    if aliases_path.exists() {
        let aliases = AliasTable::load(&aliases_path)?;
        let resolver = CountryResolver::new(&aliases)?;
        info!(
            path = %aliases_path.display(),
            codes = aliases.code_count(),
            aliases = aliases.alias_count(),
            distinct_aliases = resolver.alias_count(),
            "loaded alias table"
        );
    } else {
        warn!(path = %aliases_path.display(), "alias table missing");
    }

    if db_path.exists() {
        let connection = store::open(&db_path)?;
        let origins = store::count_rows(&connection, "SELECT COUNT(*) FROM origins").unwrap_or(0);
        let records =
            store::count_rows(&connection, "SELECT COUNT(*) FROM visa_requirements").unwrap_or(0);
        let unmapped = store::count_rows(
            &connection,
            "SELECT COUNT(*) FROM visa_requirements WHERE destination_kind = 'unmapped'",
        )
        .unwrap_or(0);

        info!(
            path = %db_path.display(),
            origins,
            records,
            unmapped,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}
