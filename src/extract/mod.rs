use std::fmt;

use anyhow::{Result, anyhow};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod flatten;
mod group;
mod normalize;
mod resolve;
mod rowspan;
mod shape;
mod source;

pub use normalize::CellNormalizer;
pub use resolve::{AliasLookup, AliasTable, CountryResolver};
pub use source::{DocumentSource, PageCache, SourceError};

use flatten::FlatRow;
use group::group_records;
use rowspan::reconcile_rows;
use shape::TableShape;

/// Display name used for records that could not be mapped from a chunk.
pub const NOT_FOUND_NAME: &str = "Not Found";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CountryCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Free-text country name as shown on the source page, after artifact stripping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryName(String);

impl CountryName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaCategory {
    VisaFree,
    VisaOnArrival,
    EVisa,
    Eta,
    VisaRequired,
    AdmissionRefused,
    UnknownVisaCategory,
}

impl VisaCategory {
    pub const ALL: [VisaCategory; 7] = [
        VisaCategory::VisaFree,
        VisaCategory::VisaOnArrival,
        VisaCategory::EVisa,
        VisaCategory::Eta,
        VisaCategory::VisaRequired,
        VisaCategory::AdmissionRefused,
        VisaCategory::UnknownVisaCategory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VisaCategory::VisaFree => "visa_free",
            VisaCategory::VisaOnArrival => "visa_on_arrival",
            VisaCategory::EVisa => "e_visa",
            VisaCategory::Eta => "eta",
            VisaCategory::VisaRequired => "visa_required",
            VisaCategory::AdmissionRefused => "admission_refused",
            VisaCategory::UnknownVisaCategory => "unknown_visa_category",
        }
    }

    /// Inverse of [`VisaCategory::as_str`]; unrecognised labels map to the sentinel.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(VisaCategory::UnknownVisaCategory)
    }
}

/// A grouped table row before its destination name is resolved to a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisaRequirementsParsing {
    pub destination_name: CountryName,
    pub category: VisaCategory,
    pub description: String,
}

impl VisaRequirementsParsing {
    pub fn not_found() -> Self {
        Self {
            destination_name: CountryName::new(NOT_FOUND_NAME),
            category: VisaCategory::UnknownVisaCategory,
            description: String::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.destination_name.as_str() == NOT_FOUND_NAME
    }
}

/// Outcome of mapping a display name onto the alias table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Destination {
    Resolved(CountryCode),
    Unmapped(CountryName),
}

impl Destination {
    /// Canonical code, or the raw name coerced into a code when unmapped.
    pub fn code(&self) -> CountryCode {
        match self {
            Destination::Resolved(code) => code.clone(),
            Destination::Unmapped(name) => CountryCode::new(name.as_str()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Destination::Resolved(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Resolved(_) => "resolved",
            Destination::Unmapped(_) => "unmapped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaRequirementsFor {
    pub origin: CountryCode,
    pub destination: Destination,
    pub category: VisaCategory,
    pub description: String,
}

impl VisaRequirementsFor {
    /// True for placeholder rows emitted when a chunk could not be mapped.
    pub fn is_sentinel(&self) -> bool {
        self.destination == Destination::Unmapped(CountryName::new(NOT_FOUND_NAME))
    }
}

/// Table extraction engine. Holds the compiled selectors and cell patterns so
/// that one instance can be reused across documents.
pub struct Extractor {
    normalizer: CellNormalizer,
    sortable_table: Selector,
    table_row: Selector,
    sort_key: Selector,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            normalizer: CellNormalizer::new()?,
            sortable_table: compile_selector("table.sortable")?,
            table_row: compile_selector("tr")?,
            sort_key: compile_selector(".sortkey, [data-sort-value]")?,
        })
    }

    /// Fetches the origin's page and turns its sortable table into records,
    /// preserving source row order. Only the fetch can fail.
    pub fn visa_requirements_for(
        &self,
        origin: &CountryCode,
        source: &dyn DocumentSource,
        resolver: &CountryResolver,
    ) -> Result<Vec<VisaRequirementsFor>, SourceError> {
        let document = source.fetch(origin)?;
        let parsed = self.extract_document(&document);

        Ok(parsed
            .into_iter()
            .map(|record| {
                let destination = resolver.resolve(&record.destination_name);
                if !destination.is_resolved() {
                    debug!(
                        origin = %origin,
                        name = %record.destination_name,
                        "destination name has no alias match"
                    );
                }
                VisaRequirementsFor {
                    origin: origin.clone(),
                    destination,
                    category: record.category,
                    description: record.description,
                }
            })
            .collect())
    }

    /// Grid reconstruction and grouping for one parsed page. A page without a
    /// sortable table yields no records.
    pub fn extract_document(&self, document: &Html) -> Vec<VisaRequirementsParsing> {
        let Some(table) = document.select(&self.sortable_table).next() else {
            debug!("no sortable table in document");
            return Vec::new();
        };

        let rows = self.table_rows(table);
        let shape = TableShape::detect(&rows);
        let body = rows
            .iter()
            .filter(|row| shape::is_body_row(row))
            .map(|row| self.flatten_row(row))
            .collect::<Vec<FlatRow>>();
        let values = reconcile_rows(body);

        debug!(
            column_count = ?shape.column_count,
            layout = shape.layout.as_str(),
            values = values.len(),
            "reconciled table body"
        );

        group_records(&values, &shape, &self.normalizer)
    }
}

fn compile_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("failed to compile selector `{css}`: {err:?}"))
}
