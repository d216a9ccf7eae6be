use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::extract::{CountryCode, CountryName, Destination, VisaCategory, VisaRequirementsFor};

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrigin {
    pub origin_code: String,
    pub source_sha256: Option<String>,
    pub ingested_at: String,
    pub record_count: i64,
    pub unmapped_count: i64,
    pub sentinel_count: i64,
}

pub fn open(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS origins (
          origin_code TEXT PRIMARY KEY,
          source_sha256 TEXT,
          ingested_at TEXT NOT NULL,
          record_count INTEGER NOT NULL,
          unmapped_count INTEGER NOT NULL,
          sentinel_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS visa_requirements (
          origin_code TEXT NOT NULL,
          seq INTEGER NOT NULL,
          destination_code TEXT NOT NULL,
          destination_kind TEXT NOT NULL,
          category TEXT NOT NULL,
          description TEXT NOT NULL,
          PRIMARY KEY (origin_code, seq),
          FOREIGN KEY(origin_code) REFERENCES origins(origin_code)
        );

        CREATE INDEX IF NOT EXISTS idx_visa_requirements_destination
          ON visa_requirements(destination_code);
        ",
        )
        .context("failed to create schema")?;

    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES ('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

/// Replaces every stored row of `origin` with `records`, keeping their order.
pub fn replace_origin_records(
    connection: &mut Connection,
    origin: &CountryCode,
    source_sha256: Option<&str>,
    ingested_at: &str,
    records: &[VisaRequirementsFor],
) -> Result<StoredOrigin> {
    let summary = StoredOrigin {
        origin_code: origin.to_string(),
        source_sha256: source_sha256.map(ToOwned::to_owned),
        ingested_at: ingested_at.to_string(),
        record_count: records.len() as i64,
        unmapped_count: records
            .iter()
            .filter(|record| !record.destination.is_resolved() && !record.is_sentinel())
            .count() as i64,
        sentinel_count: records.iter().filter(|record| record.is_sentinel()).count() as i64,
    };

    let tx = connection
        .transaction()
        .context("failed to start origin transaction")?;

    tx.execute(
        "DELETE FROM visa_requirements WHERE origin_code = ?1",
        params![origin.as_str()],
    )
    .with_context(|| format!("failed to clear records for {origin}"))?;

    tx.execute(
        "INSERT INTO origins(origin_code, source_sha256, ingested_at, record_count, unmapped_count, sentinel_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(origin_code) DO UPDATE SET
           source_sha256 = excluded.source_sha256,
           ingested_at = excluded.ingested_at,
           record_count = excluded.record_count,
           unmapped_count = excluded.unmapped_count,
           sentinel_count = excluded.sentinel_count",
        params![
            summary.origin_code,
            summary.source_sha256,
            summary.ingested_at,
            summary.record_count,
            summary.unmapped_count,
            summary.sentinel_count,
        ],
    )
    .with_context(|| format!("failed to upsert origin {origin}"))?;

    {
        let mut statement = tx
            .prepare(
                "INSERT INTO visa_requirements(origin_code, seq, destination_code, destination_kind, category, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .context("failed to prepare record insert")?;

        for (seq, record) in records.iter().enumerate() {
            statement
                .execute(params![
                    origin.as_str(),
                    seq as i64,
                    record.destination.code().as_str(),
                    record.destination.kind(),
                    record.category.as_str(),
                    record.description,
                ])
                .with_context(|| format!("failed to insert record {seq} for {origin}"))?;
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit records for {origin}"))?;

    Ok(summary)
}

pub fn load_origin(connection: &Connection, origin: &CountryCode) -> Result<Option<StoredOrigin>> {
    connection
        .query_row(
            "SELECT origin_code, source_sha256, ingested_at, record_count, unmapped_count, sentinel_count
             FROM origins WHERE origin_code = ?1",
            params![origin.as_str()],
            |row| {
                Ok(StoredOrigin {
                    origin_code: row.get(0)?,
                    source_sha256: row.get(1)?,
                    ingested_at: row.get(2)?,
                    record_count: row.get(3)?,
                    unmapped_count: row.get(4)?,
                    sentinel_count: row.get(5)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to load origin {origin}"))
}

/// Stored records of one origin in source table order.
pub fn load_origin_records(
    connection: &Connection,
    origin: &CountryCode,
) -> Result<Vec<VisaRequirementsFor>> {
    let mut statement = connection
        .prepare(
            "SELECT destination_code, destination_kind, category, description
             FROM visa_requirements WHERE origin_code = ?1 ORDER BY seq",
        )
        .context("failed to prepare record query")?;

    let rows = statement
        .query_map(params![origin.as_str()], |row| {
            let code: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let category: String = row.get(2)?;
            let description: String = row.get(3)?;
            Ok((code, kind, category, description))
        })
        .with_context(|| format!("failed to query records for {origin}"))?;

    let mut records = Vec::new();
    for row in rows {
        let (code, kind, category, description) =
            row.with_context(|| format!("failed to read record for {origin}"))?;
        let destination = match kind.as_str() {
            "resolved" => Destination::Resolved(CountryCode::new(code)),
            _ => Destination::Unmapped(CountryName::new(code)),
        };
        records.push(VisaRequirementsFor {
            origin: origin.clone(),
            destination,
            category: VisaCategory::from_label(&category),
            description,
        });
    }

    Ok(records)
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        destination: Destination,
        category: VisaCategory,
        description: &str,
    ) -> VisaRequirementsFor {
        VisaRequirementsFor {
            origin: CountryCode::from("GB"),
            destination,
            category,
            description: description.to_string(),
        }
    }

    #[test]
    fn replace_origin_records_round_trips_in_source_order() {
        let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
        ensure_schema(&connection).expect("schema should apply");
        let origin = CountryCode::from("GB");
        let records = vec![
            record(
                Destination::Resolved(CountryCode::from("IE")),
                VisaCategory::VisaFree,
                "90 days",
            ),
            record(
                Destination::Unmapped(CountryName::new("Kosovo*")),
                VisaCategory::UnknownVisaCategory,
                "",
            ),
            record(
                Destination::Unmapped(CountryName::new(crate::extract::NOT_FOUND_NAME)),
                VisaCategory::UnknownVisaCategory,
                "",
            ),
        ];

        let summary = replace_origin_records(
            &mut connection,
            &origin,
            Some("abc"),
            "2026-01-01T00:00:00Z",
            &records,
        )
        .expect("records should store");

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.unmapped_count, 1);
        assert_eq!(summary.sentinel_count, 1);
        assert_eq!(
            load_origin_records(&connection, &origin).expect("records should load"),
            records
        );
        assert_eq!(
            load_origin(&connection, &origin)
                .expect("origin should load")
                .expect("origin exists"),
            summary
        );
    }

    #[test]
    fn replace_origin_records_discards_previous_rows() {
        let mut connection = Connection::open_in_memory().expect("in-memory DB should open");
        ensure_schema(&connection).expect("schema should apply");
        let origin = CountryCode::from("GB");
        let first = vec![
            record(
                Destination::Resolved(CountryCode::from("IE")),
                VisaCategory::VisaFree,
                "",
            ),
            record(
                Destination::Resolved(CountryCode::from("AL")),
                VisaCategory::VisaFree,
                "",
            ),
        ];
        let second = vec![record(
            Destination::Resolved(CountryCode::from("PE")),
            VisaCategory::EVisa,
            "30 days",
        )];

        replace_origin_records(&mut connection, &origin, None, "t1", &first)
            .expect("first ingest should store");
        replace_origin_records(&mut connection, &origin, None, "t2", &second)
            .expect("second ingest should store");

        assert_eq!(
            load_origin_records(&connection, &origin).expect("records should load"),
            second
        );
        assert_eq!(
            count_rows(&connection, "SELECT COUNT(*) FROM visa_requirements")
                .expect("count should run"),
            1
        );
        assert!(
            load_origin(&connection, &CountryCode::from("FR"))
                .expect("lookup should run")
                .is_none()
        );
    }
}
