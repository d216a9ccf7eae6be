use tracing::debug;

use super::normalize::{CellNormalizer, absorb_annotations};
use super::shape::{TableLayout, TableShape};
use super::{CountryName, VisaCategory, VisaRequirementsParsing};

/// Splits the reconciled values into header-sized chunks and maps each one
/// with the mapper for the detected layout. A trailing partial chunk is
/// mapped like any other.
pub fn group_records(
    values: &[String],
    shape: &TableShape,
    normalizer: &CellNormalizer,
) -> Vec<VisaRequirementsParsing> {
    values
        .chunks(shape.chunk_size())
        .map(|chunk| {
            let record = shape.layout.map_chunk(chunk, normalizer);
            if record.is_not_found() {
                debug!(
                    arity = chunk.len(),
                    layout = shape.layout.as_str(),
                    "chunk arity not supported, emitting sentinel"
                );
            }
            record
        })
        .collect()
}

impl TableLayout {
    /// Never fails; unsupported arities produce the `Not Found` sentinel.
    pub fn map_chunk(
        self,
        chunk: &[String],
        normalizer: &CellNormalizer,
    ) -> VisaRequirementsParsing {
        match self {
            TableLayout::Normal => map_normal(chunk, normalizer),
            TableLayout::Colspan => map_colspan(chunk, normalizer),
        }
    }
}

fn map_normal(chunk: &[String], normalizer: &CellNormalizer) -> VisaRequirementsParsing {
    match chunk {
        [name, category, description, extra] => record(
            name,
            normalizer.classify_visa_category(category),
            normalizer.build_description(description, extra),
        ),
        _ => map_short(chunk, normalizer),
    }
}

fn map_colspan(chunk: &[String], normalizer: &CellNormalizer) -> VisaRequirementsParsing {
    match chunk {
        [name, category, description, note, extra] => record(
            name,
            normalizer.classify_visa_category(category),
            absorb_annotations(description, &[note.as_str(), extra.as_str()]),
        ),
        [name, category, description, extra] => record(
            name,
            normalizer.classify_visa_category(category),
            absorb_annotations(description, &[extra.as_str()]),
        ),
        _ => map_short(chunk, normalizer),
    }
}

/// Arities shared by both layouts.
fn map_short(chunk: &[String], normalizer: &CellNormalizer) -> VisaRequirementsParsing {
    match chunk {
        [name, category, description] => record(
            name,
            normalizer.classify_visa_category(category),
            description.clone(),
        ),
        [name, category] => record(
            name,
            normalizer.classify_visa_category(category),
            String::new(),
        ),
        [name] => record(name, VisaCategory::UnknownVisaCategory, String::new()),
        _ => VisaRequirementsParsing::not_found(),
    }
}

fn record(name: &str, category: VisaCategory, description: String) -> VisaRequirementsParsing {
    VisaRequirementsParsing {
        destination_name: CountryName::new(name),
        category,
        description,
    }
}
