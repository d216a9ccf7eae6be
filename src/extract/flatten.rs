use scraper::ElementRef;

use super::Extractor;
use super::shape::{RawRow, span_attr};

/// Separates a display value from a trailing disambiguator.
const DISAMBIGUATOR_SPLIT: char = '!';

/// One physical table row reduced to its cell values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRow {
    pub values: Vec<String>,
    pub spans_rows: bool,
}

impl FlatRow {
    pub fn new(values: Vec<String>, spans_rows: bool) -> Self {
        Self { values, spans_rows }
    }
}

impl Extractor {
    /// One value per cell, or one per spanned column for col-span cells so the
    /// grouper stays aligned.
    pub(super) fn flatten_row(&self, row: &RawRow<'_>) -> FlatRow {
        let mut values = Vec::with_capacity(row.cells.len());
        let mut spans_rows = false;

        for cell in &row.cells {
            if span_attr(cell, "rowspan") > 1 {
                spans_rows = true;
            }

            values.push(self.cell_text(cell));
            for _ in 1..span_attr(cell, "colspan") {
                values.push(String::new());
            }
        }

        FlatRow::new(values, spans_rows)
    }

    pub(super) fn cell_text(&self, cell: &ElementRef<'_>) -> String {
        if let Some(sort_key) = cell.select(&self.sort_key).next() {
            let raw = match sort_key.value().attr("data-sort-value") {
                Some(value) => value.to_string(),
                None => sort_key.text().collect::<String>(),
            };
            let cleaned = self.normalizer.strip_artifacts(&raw);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }

        let displayed = cell.text().collect::<String>();
        let kept = displayed
            .split(DISAMBIGUATOR_SPLIT)
            .next()
            .unwrap_or_default();
        self.normalizer.strip_artifacts(kept)
    }
}
