use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::QueryArgs;
use crate::extract::{CountryCode, VisaCategory, VisaRequirementsFor};
use crate::store;
use crate::util::normalize_origin_code;

#[derive(Debug, Serialize)]
struct QueryResponse {
    origin: String,
    ingested_at: String,
    category_filter: Option<VisaCategory>,
    unmapped_only: bool,
    returned: usize,
    records: Vec<VisaRequirementsFor>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let origin = CountryCode::new(normalize_origin_code(&args.origin));
    let category_filter = args
        .category
        .as_deref()
        .map(parse_category_filter)
        .transpose()?;

    let db_path = args.cache.db_path();
    if !db_path.exists() {
        bail!("database not found at {}; run ingest first", db_path.display());
    }
    let connection = store::open(&db_path)?;

    let Some(stored) = store::load_origin(&connection, &origin)? else {
        bail!("origin {origin} has not been ingested");
    };

    let records = filter_records(
        store::load_origin_records(&connection, &origin)?,
        category_filter,
        args.unmapped_only,
    );

    info!(
        origin = %origin,
        returned = records.len(),
        stored = stored.record_count,
        "query completed"
    );

    let response = QueryResponse {
        origin: origin.to_string(),
        ingested_at: stored.ingested_at,
        category_filter,
        unmapped_only: args.unmapped_only,
        returned: records.len(),
        records,
    };

    if args.json {
        write_json_response(&response)
    } else {
        write_text_response(&response)
    }
}

/// Rejects labels outside the category vocabulary instead of silently
/// matching the unknown sentinel.
fn parse_category_filter(label: &str) -> Result<VisaCategory> {
    let category = VisaCategory::from_label(label);
    if category == VisaCategory::UnknownVisaCategory
        && !label
            .trim()
            .eq_ignore_ascii_case(VisaCategory::UnknownVisaCategory.as_str())
    {
        let known = VisaCategory::ALL
            .iter()
            .map(|category| category.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        bail!("unknown category `{label}`; expected one of: {known}");
    }

    Ok(category)
}

fn filter_records(
    records: Vec<VisaRequirementsFor>,
    category: Option<VisaCategory>,
    unmapped_only: bool,
) -> Vec<VisaRequirementsFor> {
    records
        .into_iter()
        .filter(|record| category.is_none_or(|category| record.category == category))
        .filter(|record| !unmapped_only || !record.destination.is_resolved())
        .collect()
}

fn write_json_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Origin: {} (ingested {})",
        response.origin, response.ingested_at
    )?;
    writeln!(output, "Results: {}", response.returned)?;

    for record in &response.records {
        let marker = if record.destination.is_resolved() {
            ""
        } else {
            " (unmapped)"
        };
        writeln!(
            output,
            "{}{}\t{}\t{}",
            record.destination.code(),
            marker,
            record.category.as_str(),
            record.description
        )?;
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CountryName, Destination};

    fn record(destination: Destination, category: VisaCategory) -> VisaRequirementsFor {
        VisaRequirementsFor {
            origin: CountryCode::from("GB"),
            destination,
            category,
            description: String::new(),
        }
    }

    #[test]
    fn parse_category_filter_accepts_labels_and_rejects_unknown_text() {
        assert_eq!(
            parse_category_filter("VISA_FREE").expect("label should parse"),
            VisaCategory::VisaFree
        );
        assert_eq!(
            parse_category_filter("unknown_visa_category").expect("sentinel label should parse"),
            VisaCategory::UnknownVisaCategory
        );
        assert!(parse_category_filter("visa-free").is_err());
    }

    #[test]
    fn filter_records_applies_category_and_unmapped_filters() {
        let records = vec![
            record(
                Destination::Resolved(CountryCode::from("IE")),
                VisaCategory::VisaFree,
            ),
            record(
                Destination::Unmapped(CountryName::new("Kosovo*")),
                VisaCategory::VisaFree,
            ),
            record(
                Destination::Resolved(CountryCode::from("PE")),
                VisaCategory::EVisa,
            ),
        ];

        let free = filter_records(records.clone(), Some(VisaCategory::VisaFree), false);
        assert_eq!(free.len(), 2);

        let unmapped = filter_records(records.clone(), None, true);
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].destination.code(), CountryCode::from("Kosovo*"));

        assert_eq!(filter_records(records, None, false).len(), 3);
    }
}
